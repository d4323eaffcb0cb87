//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use riskcase_core::{
    clock::EngineClock,
    domain::{
        Alert, AlertStatus, EvaluatedIndicator, Priority, RiskDomain, RiskIndicator, RiskLevel,
        Transaction,
    },
    store::SqliteStore,
    types::Timestamp,
};

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn at(minutes: i64) -> Timestamp {
    t0() + Duration::minutes(minutes)
}

pub fn fixed_clock() -> EngineClock {
    EngineClock::fixed(t0())
}

pub fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

/// A plain domestic debit with no risk attributes.
pub fn tx(id: &str, account: &str, minutes: i64, amount: f64) -> Transaction {
    Transaction {
        id: id.into(),
        account_id: account.into(),
        timestamp: at(minutes),
        amount,
        currency: "USD".into(),
        counterparty_country: "DE".into(),
        channel: "online".into(),
        is_credit: false,
        merchant_category: None,
        purpose: None,
        device_id: None,
        card_present: None,
    }
}

pub fn alert(id: &str, transaction: Transaction, score: f64, level: RiskLevel) -> Alert {
    Alert {
        id: id.into(),
        created_at: transaction.timestamp,
        transaction,
        score,
        risk_level: level,
        evaluated_indicators: Vec::new(),
        status: AlertStatus::Open,
        case_id: None,
        priority: Priority::from(level),
    }
}

/// Alert whose evaluated indicators hit one indicator per given domain.
pub fn alert_with_domains(
    id: &str,
    transaction: Transaction,
    score: f64,
    level: RiskLevel,
    domains: &[RiskDomain],
) -> Alert {
    let mut a = alert(id, transaction, score, level);
    a.evaluated_indicators = domains
        .iter()
        .enumerate()
        .map(|(i, domain)| EvaluatedIndicator {
            indicator: RiskIndicator {
                code: format!("TEST_{i}"),
                description: "test indicator".into(),
                domain: *domain,
                weight: 10.0,
            },
            is_hit: true,
            explanation: Some("test hit".into()),
        })
        .collect();
    a
}
