//! Case timeline (event log) queries.

use super::{ts_from_sql, ts_to_sql, SqliteStore};
use crate::{error::EngineResult, event::EventLogEntry};
use rusqlite::params;

impl SqliteStore {
    pub fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (case_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &entry.case_id,
                &entry.event_type,
                &entry.payload,
                ts_to_sql(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_case(&self, case_id: &str) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, case_id, event_type, payload, created_at
             FROM event_log WHERE case_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![case_id], |row| {
                let created_at: String = row.get(4)?;
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    case_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: ts_from_sql(4, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
