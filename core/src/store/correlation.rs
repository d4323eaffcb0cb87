//! Correlation edge queries.

use super::{ts_from_sql, ts_to_sql, SqliteStore};
use crate::{domain::CorrelationEdge, error::EngineResult};
use rusqlite::params;

impl SqliteStore {
    pub fn record_correlation(&self, edge: &CorrelationEdge) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO correlation
                 (alert_id, related_id, reason, confidence, reason_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &edge.alert_id,
                &edge.related_id,
                &edge.reason,
                edge.confidence,
                &edge.reason_token,
                ts_to_sql(&edge.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn list_correlations(&self, alert_id: &str) -> EngineResult<Vec<CorrelationEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_id, related_id, reason, confidence, reason_token, created_at
             FROM correlation WHERE alert_id = ?1 ORDER BY id ASC",
        )?;
        let edges = stmt
            .query_map(params![alert_id], |r| {
                let created_at: String = r.get(5)?;
                Ok(CorrelationEdge {
                    alert_id: r.get(0)?,
                    related_id: r.get(1)?,
                    reason: r.get(2)?,
                    confidence: r.get(3)?,
                    reason_token: r.get(4)?,
                    created_at: ts_from_sql(5, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}
