//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database.
//! Services go through `DetectionStore`; they never execute SQL directly.

mod case;
mod correlation;
mod event;
mod seal;
mod transaction;

use crate::{
    domain::{Alert, Case, CaseNote, CorrelationEdge, SealRecord, Transaction},
    error::{EngineError, EngineResult},
    event::EventLogEntry,
    types::Timestamp,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection};
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// Storage contract consumed by the detection core.
///
/// Implementations must give read-after-write consistency to a single
/// caller. Nothing here is expected to serialise concurrent writers.
pub trait DetectionStore {
    // ── Transactions ───────────────────────────────────────────
    /// Transactions are immutable: re-recording an id is a no-op.
    fn record_transaction(&self, tx: &Transaction) -> EngineResult<()>;
    /// Transactions of `account_id` with `until - window <= timestamp <= until`,
    /// ascending by timestamp.
    fn recent_transactions(
        &self,
        account_id: &str,
        until: Timestamp,
        window: Duration,
    ) -> EngineResult<Vec<Transaction>>;

    // ── Cases ──────────────────────────────────────────────────
    /// Upserts the case row. Notes are written through `add_case_note`.
    fn record_case(&self, case: &Case) -> EngineResult<()>;
    fn get_case(&self, id: &str) -> EngineResult<Option<Case>>;
    fn list_cases(&self) -> EngineResult<Vec<Case>>;
    /// Oldest non-closed case for the account, if any.
    fn open_case_for_account(&self, account_id: &str) -> EngineResult<Option<Case>>;

    // ── Alerts ─────────────────────────────────────────────────
    fn record_alert(&self, alert: &Alert) -> EngineResult<()>;
    fn get_alert(&self, id: &str) -> EngineResult<Option<Alert>>;
    /// Alerts in the case's attachment order.
    fn alerts_for_case(&self, case_id: &str) -> EngineResult<Vec<Alert>>;
    /// Newest first.
    fn recent_alerts(&self, limit: usize) -> EngineResult<Vec<Alert>>;

    // ── Notes ──────────────────────────────────────────────────
    fn add_case_note(&self, case_id: &str, note: &CaseNote) -> EngineResult<()>;
    /// Ordered by `created_at`, then insertion.
    fn case_notes(&self, case_id: &str) -> EngineResult<Vec<CaseNote>>;

    // ── Correlation ────────────────────────────────────────────
    fn record_correlation(&self, edge: &CorrelationEdge) -> EngineResult<()>;
    fn list_correlations(&self, alert_id: &str) -> EngineResult<Vec<CorrelationEdge>>;

    // ── Seals ──────────────────────────────────────────────────
    /// One record per case; a later seal overwrites the earlier one.
    fn seal_case(&self, record: &SealRecord) -> EngineResult<()>;
    fn sealed_case(&self, case_id: &str) -> EngineResult<Option<SealRecord>>;

    // ── Event log ──────────────────────────────────────────────
    fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()>;
    fn events_for_case(&self, case_id: &str) -> EngineResult<Vec<EventLogEntry>>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_detection.sql"))?;
        Ok(())
    }
}

impl DetectionStore for SqliteStore {
    fn record_transaction(&self, tx: &Transaction) -> EngineResult<()> {
        SqliteStore::record_transaction(self, tx)
    }

    fn recent_transactions(
        &self,
        account_id: &str,
        until: Timestamp,
        window: Duration,
    ) -> EngineResult<Vec<Transaction>> {
        SqliteStore::recent_transactions(self, account_id, until, window)
    }

    fn record_case(&self, case: &Case) -> EngineResult<()> {
        SqliteStore::record_case(self, case)
    }

    fn get_case(&self, id: &str) -> EngineResult<Option<Case>> {
        SqliteStore::get_case(self, id)
    }

    fn list_cases(&self) -> EngineResult<Vec<Case>> {
        SqliteStore::list_cases(self)
    }

    fn open_case_for_account(&self, account_id: &str) -> EngineResult<Option<Case>> {
        SqliteStore::open_case_for_account(self, account_id)
    }

    fn record_alert(&self, alert: &Alert) -> EngineResult<()> {
        SqliteStore::record_alert(self, alert)
    }

    fn get_alert(&self, id: &str) -> EngineResult<Option<Alert>> {
        SqliteStore::get_alert(self, id)
    }

    fn alerts_for_case(&self, case_id: &str) -> EngineResult<Vec<Alert>> {
        SqliteStore::alerts_for_case(self, case_id)
    }

    fn recent_alerts(&self, limit: usize) -> EngineResult<Vec<Alert>> {
        SqliteStore::recent_alerts(self, limit)
    }

    fn add_case_note(&self, case_id: &str, note: &CaseNote) -> EngineResult<()> {
        SqliteStore::add_case_note(self, case_id, note)
    }

    fn case_notes(&self, case_id: &str) -> EngineResult<Vec<CaseNote>> {
        SqliteStore::case_notes(self, case_id)
    }

    fn record_correlation(&self, edge: &CorrelationEdge) -> EngineResult<()> {
        SqliteStore::record_correlation(self, edge)
    }

    fn list_correlations(&self, alert_id: &str) -> EngineResult<Vec<CorrelationEdge>> {
        SqliteStore::list_correlations(self, alert_id)
    }

    fn seal_case(&self, record: &SealRecord) -> EngineResult<()> {
        SqliteStore::seal_case(self, record)
    }

    fn sealed_case(&self, case_id: &str) -> EngineResult<Option<SealRecord>> {
        SqliteStore::sealed_case(self, case_id)
    }

    fn append_event(&self, entry: &EventLogEntry) -> EngineResult<()> {
        SqliteStore::append_event(self, entry)
    }

    fn events_for_case(&self, case_id: &str) -> EngineResult<Vec<EventLogEntry>> {
        SqliteStore::events_for_case(self, case_id)
    }
}

// ── Column codecs ────────────────────────────────────────────────────────────

/// Fixed-width so that lexical and chronological order agree.
pub(crate) fn ts_to_sql(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(idx: usize, value: &str) -> rusqlite::Result<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn enum_from_sql<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = EngineError>,
{
    value.parse().map_err(|e: EngineError| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

pub(crate) fn json_from_sql<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + Duration::microseconds(1_500);
        assert!(ts_to_sql(&early) < ts_to_sql(&late));
        assert_eq!(ts_to_sql(&early).len(), ts_to_sql(&late).len());
        assert_eq!(ts_from_sql(0, &ts_to_sql(&late)).unwrap(), late);
    }

    #[test]
    fn migrations_apply_twice() {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.migrate().unwrap();
    }
}
