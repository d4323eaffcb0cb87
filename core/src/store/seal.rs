//! Case seal records.

use super::{ts_from_sql, ts_to_sql, SqliteStore};
use crate::{domain::SealRecord, error::EngineResult};
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    pub fn seal_case(&self, record: &SealRecord) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO case_seal
                (case_id, hash, merkle_root, sealed_by, seal_reason, sealed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &record.case_id,
                &record.hash,
                &record.merkle_root,
                &record.sealed_by,
                &record.seal_reason,
                ts_to_sql(&record.sealed_at),
            ],
        )?;
        Ok(())
    }

    pub fn sealed_case(&self, case_id: &str) -> EngineResult<Option<SealRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT case_id, hash, merkle_root, sealed_by, seal_reason, sealed_at
                 FROM case_seal WHERE case_id = ?1",
                params![case_id],
                |r| {
                    let sealed_at: String = r.get(5)?;
                    Ok(SealRecord {
                        case_id: r.get(0)?,
                        hash: r.get(1)?,
                        merkle_root: r.get(2)?,
                        sealed_by: r.get(3)?,
                        seal_reason: r.get(4)?,
                        sealed_at: ts_from_sql(5, &sealed_at)?,
                    })
                },
            )
            .optional()?)
    }
}
