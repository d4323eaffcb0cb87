//! Case, alert and case-note queries.

use super::{
    enum_from_sql, json_from_sql,
    transaction::{tx_from_row, TX_COLUMNS},
    ts_from_sql, ts_to_sql, SqliteStore,
};
use crate::{
    domain::{Alert, Case, CaseNote},
    error::EngineResult,
};
use rusqlite::{params, OptionalExtension, Row};

const CASE_COLUMNS: &str = "id, account_id, alert_ids, status, label, priority, band,
     policy_triggers, created_at, updated_at";

const ALERT_COLUMNS: &str = "a.id, a.score, a.risk_level, a.evaluated, a.created_at,
     a.status, a.case_id, a.priority";

/// Notes are loaded separately.
fn case_from_row(r: &Row<'_>) -> rusqlite::Result<Case> {
    let alert_ids: String = r.get(2)?;
    let status: String = r.get(3)?;
    let label: Option<String> = r.get(4)?;
    let priority: String = r.get(5)?;
    let band: Option<String> = r.get(6)?;
    let triggers: String = r.get(7)?;
    let created_at: String = r.get(8)?;
    let updated_at: String = r.get(9)?;
    Ok(Case {
        id: r.get(0)?,
        account_id: r.get(1)?,
        alert_ids: json_from_sql(2, &alert_ids)?,
        status: enum_from_sql(3, &status)?,
        label: label.map(|l| enum_from_sql(4, &l)).transpose()?,
        priority: enum_from_sql(5, &priority)?,
        band: band.map(|b| enum_from_sql(6, &b)).transpose()?,
        policy_triggers: json_from_sql(7, &triggers)?,
        notes: Vec::new(),
        created_at: ts_from_sql(8, &created_at)?,
        updated_at: ts_from_sql(9, &updated_at)?,
    })
}

fn alert_from_row(r: &Row<'_>) -> rusqlite::Result<Alert> {
    let risk_level: String = r.get(2)?;
    let evaluated: String = r.get(3)?;
    let created_at: String = r.get(4)?;
    let status: String = r.get(5)?;
    let priority: String = r.get(7)?;
    Ok(Alert {
        id: r.get(0)?,
        transaction: tx_from_row(r, 8)?,
        score: r.get(1)?,
        risk_level: enum_from_sql(2, &risk_level)?,
        evaluated_indicators: json_from_sql(3, &evaluated)?,
        created_at: ts_from_sql(4, &created_at)?,
        status: enum_from_sql(5, &status)?,
        case_id: r.get(6)?,
        priority: enum_from_sql(7, &priority)?,
    })
}

impl SqliteStore {
    // ── Cases ─────────────────────────────────────────────────────

    pub fn record_case(&self, case: &Case) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO cases (
                id, account_id, alert_ids, status, label, priority, band,
                policy_triggers, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                alert_ids = excluded.alert_ids,
                status = excluded.status,
                label = excluded.label,
                priority = excluded.priority,
                band = excluded.band,
                policy_triggers = excluded.policy_triggers,
                updated_at = excluded.updated_at",
            params![
                &case.id,
                &case.account_id,
                serde_json::to_string(&case.alert_ids)?,
                case.status.as_str(),
                case.label.map(|l| l.as_str()),
                case.priority.as_str(),
                case.band.map(|b| b.as_str()),
                serde_json::to_string(&case.policy_triggers)?,
                ts_to_sql(&case.created_at),
                ts_to_sql(&case.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_case(&self, id: &str) -> EngineResult<Option<Case>> {
        let case = self
            .conn
            .query_row(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1"),
                params![id],
                case_from_row,
            )
            .optional()?;
        self.with_notes(case)
    }

    pub fn list_cases(&self) -> EngineResult<Vec<Case>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM cases ORDER BY created_at ASC, rowid ASC"
        ))?;
        let cases = stmt
            .query_map([], case_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut result = Vec::with_capacity(cases.len());
        for case in cases {
            if let Some(case) = self.with_notes(Some(case))? {
                result.push(case);
            }
        }
        Ok(result)
    }

    pub fn open_case_for_account(&self, account_id: &str) -> EngineResult<Option<Case>> {
        let case = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CASE_COLUMNS} FROM cases
                     WHERE account_id = ?1 AND status != 'CLOSED'
                     ORDER BY created_at ASC, rowid ASC LIMIT 1"
                ),
                params![account_id],
                case_from_row,
            )
            .optional()?;
        self.with_notes(case)
    }

    fn with_notes(&self, case: Option<Case>) -> EngineResult<Option<Case>> {
        match case {
            Some(mut case) => {
                case.notes = self.case_notes(&case.id)?;
                Ok(Some(case))
            }
            None => Ok(None),
        }
    }

    // ── Alerts ────────────────────────────────────────────────────

    /// Also records the alert's transaction if it is not yet stored.
    pub fn record_alert(&self, alert: &Alert) -> EngineResult<()> {
        self.record_transaction(&alert.transaction)?;
        self.conn.execute(
            "INSERT INTO alerts (
                id, transaction_id, score, risk_level, evaluated, created_at,
                status, case_id, priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                score = excluded.score,
                risk_level = excluded.risk_level,
                evaluated = excluded.evaluated,
                status = excluded.status,
                case_id = excluded.case_id,
                priority = excluded.priority",
            params![
                &alert.id,
                &alert.transaction.id,
                alert.score,
                alert.risk_level.as_str(),
                serde_json::to_string(&alert.evaluated_indicators)?,
                ts_to_sql(&alert.created_at),
                alert.status.as_str(),
                &alert.case_id,
                alert.priority.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, id: &str) -> EngineResult<Option<Alert>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {ALERT_COLUMNS}, {TX_COLUMNS}
                     FROM alerts a JOIN transactions t ON t.id = a.transaction_id
                     WHERE a.id = ?1"
                ),
                params![id],
                alert_from_row,
            )
            .optional()?)
    }

    pub fn alerts_for_case(&self, case_id: &str) -> EngineResult<Vec<Alert>> {
        let Some(case) = self.get_case(case_id)? else {
            return Ok(Vec::new());
        };
        let mut alerts = Vec::with_capacity(case.alert_ids.len());
        for alert_id in &case.alert_ids {
            match self.get_alert(alert_id)? {
                Some(alert) => alerts.push(alert),
                None => log::warn!("Case {case_id} references missing alert {alert_id}"),
            }
        }
        Ok(alerts)
    }

    pub fn recent_alerts(&self, limit: usize) -> EngineResult<Vec<Alert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS}, {TX_COLUMNS}
             FROM alerts a JOIN transactions t ON t.id = a.transaction_id
             ORDER BY a.created_at DESC, a.rowid DESC LIMIT ?1"
        ))?;
        let alerts = stmt
            .query_map(params![limit as i64], alert_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    // ── Notes ─────────────────────────────────────────────────────

    pub fn add_case_note(&self, case_id: &str, note: &CaseNote) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO case_note (case_id, author, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![case_id, &note.author, &note.message, ts_to_sql(&note.created_at)],
        )?;
        Ok(())
    }

    pub fn case_notes(&self, case_id: &str) -> EngineResult<Vec<CaseNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT author, message, created_at FROM case_note
             WHERE case_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let notes = stmt
            .query_map(params![case_id], |r| {
                let created_at: String = r.get(2)?;
                Ok(CaseNote {
                    author: r.get(0)?,
                    message: r.get(1)?,
                    created_at: ts_from_sql(2, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }
}
