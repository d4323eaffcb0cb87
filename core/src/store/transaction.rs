//! Transaction ledger queries.

use super::{ts_from_sql, ts_to_sql, SqliteStore};
use crate::{domain::Transaction, error::EngineResult, types::Timestamp};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};

/// Column list shared with the alert join in `case.rs`.
pub(super) const TX_COLUMNS: &str = "t.id, t.account_id, t.timestamp, t.amount, t.currency,
     t.counterparty_country, t.channel, t.is_credit, t.merchant_category,
     t.purpose, t.device_id, t.card_present";

/// Reads the twelve `TX_COLUMNS` starting at column `at`.
pub(super) fn tx_from_row(r: &Row<'_>, at: usize) -> rusqlite::Result<Transaction> {
    let timestamp: String = r.get(at + 2)?;
    Ok(Transaction {
        id: r.get(at)?,
        account_id: r.get(at + 1)?,
        timestamp: ts_from_sql(at + 2, &timestamp)?,
        amount: r.get(at + 3)?,
        currency: r.get(at + 4)?,
        counterparty_country: r.get(at + 5)?,
        channel: r.get(at + 6)?,
        is_credit: r.get::<_, i32>(at + 7)? != 0,
        merchant_category: r.get(at + 8)?,
        purpose: r.get(at + 9)?,
        device_id: r.get(at + 10)?,
        card_present: r.get::<_, Option<i32>>(at + 11)?.map(|v| v != 0),
    })
}

impl SqliteStore {
    pub fn record_transaction(&self, tx: &Transaction) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO transactions (
                id, account_id, timestamp, amount, currency, counterparty_country,
                channel, is_credit, merchant_category, purpose, device_id, card_present
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &tx.id,
                &tx.account_id,
                ts_to_sql(&tx.timestamp),
                tx.amount,
                &tx.currency,
                &tx.counterparty_country,
                &tx.channel,
                tx.is_credit as i32,
                &tx.merchant_category,
                &tx.purpose,
                &tx.device_id,
                tx.card_present.map(|v| v as i32),
            ],
        )?;
        Ok(())
    }

    pub fn recent_transactions(
        &self,
        account_id: &str,
        until: Timestamp,
        window: Duration,
    ) -> EngineResult<Vec<Transaction>> {
        let since = until
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TX_COLUMNS} FROM transactions t
             WHERE t.account_id = ?1 AND t.timestamp >= ?2 AND t.timestamp <= ?3
             ORDER BY t.timestamp ASC, t.id ASC"
        ))?;
        let rows = stmt
            .query_map(
                params![account_id, ts_to_sql(&since), ts_to_sql(&until)],
                |r| tx_from_row(r, 0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
