//! Domain model: value types shared by every component.
//!
//! RULE: these types carry invariants, not behaviour. Status and label
//! enums persist by their canonical string names and are parsed strictly;
//! an unknown string is an error, never a silent default.

use crate::{
    error::{EngineError, EngineResult},
    types::{EntityId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ── Risk domain ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskDomain {
    MoneyLaundering,
    Fraud,
    TerroristFinancing,
    TaxEvasion,
}

impl RiskDomain {
    pub const ALL: [RiskDomain; 4] = [
        RiskDomain::MoneyLaundering,
        RiskDomain::Fraud,
        RiskDomain::TerroristFinancing,
        RiskDomain::TaxEvasion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskDomain::MoneyLaundering => "MONEY_LAUNDERING",
            RiskDomain::Fraud => "FRAUD",
            RiskDomain::TerroristFinancing => "TERRORIST_FINANCING",
            RiskDomain::TaxEvasion => "TAX_EVASION",
        }
    }

    /// Canonical name, case-insensitive. Used for `indicators.json`.
    pub fn from_name(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|d| d.as_str() == upper)
    }

    /// Canonical name or a short alias (`AML`, `FRAUD`, `TF`, `TAX`),
    /// case-insensitive. Used for policy domain conditions.
    pub fn from_alias(value: &str) -> Option<Self> {
        if let Some(domain) = Self::from_name(value) {
            return Some(domain);
        }
        match value.trim().to_ascii_uppercase().as_str() {
            "AML" | "ML" => Some(RiskDomain::MoneyLaundering),
            "TF" => Some(RiskDomain::TerroristFinancing),
            "TAX" => Some(RiskDomain::TaxEvasion),
            _ => None,
        }
    }
}

impl fmt::Display for RiskDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Levels, priorities, bands ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "Low" => Ok(RiskLevel::Low),
            "Medium" => Ok(RiskLevel::Medium),
            "High" => Ok(RiskLevel::High),
            other => Err(unknown("risk level", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl From<RiskLevel> for Priority {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Priority::Low,
            RiskLevel::Medium => Priority::Medium,
            RiskLevel::High => Priority::High,
        }
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            "Critical" => Ok(Priority::Critical),
            other => Err(unknown("priority", other)),
        }
    }
}

/// Aggregate case severity. Ordered GREEN < YELLOW < RED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Green,
    Yellow,
    Red,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Green => "GREEN",
            Band::Yellow => "YELLOW",
            Band::Red => "RED",
        }
    }
}

impl FromStr for Band {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "GREEN" => Ok(Band::Green),
            "YELLOW" => Ok(Band::Yellow),
            "RED" => Ok(Band::Red),
            other => Err(unknown("band", other)),
        }
    }
}

// ── Statuses and labels ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Attached,
    Closed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Attached => "ATTACHED",
            AlertStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "OPEN" => Ok(AlertStatus::Open),
            "ATTACHED" => Ok(AlertStatus::Attached),
            "CLOSED" => Ok(AlertStatus::Closed),
            other => Err(unknown("alert status", other)),
        }
    }
}

/// Case lifecycle. Variants are declared in lifecycle order; transitions
/// only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Open,
    InReview,
    Escalated,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "OPEN",
            CaseStatus::InReview => "IN_REVIEW",
            CaseStatus::Escalated => "ESCALATED",
            CaseStatus::Closed => "CLOSED",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CaseStatus::Closed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "OPEN" => Ok(CaseStatus::Open),
            "IN_REVIEW" => Ok(CaseStatus::InReview),
            "ESCALATED" => Ok(CaseStatus::Escalated),
            "CLOSED" => Ok(CaseStatus::Closed),
            other => Err(unknown("case status", other)),
        }
    }
}

/// Investigator disposition attached to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseLabel {
    Suspicious,
    FalsePositive,
    SarFiled,
    NoAction,
}

impl CaseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseLabel::Suspicious => "SUSPICIOUS",
            CaseLabel::FalsePositive => "FALSE_POSITIVE",
            CaseLabel::SarFiled => "SAR_FILED",
            CaseLabel::NoAction => "NO_ACTION",
        }
    }
}

impl FromStr for CaseLabel {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "SUSPICIOUS" => Ok(CaseLabel::Suspicious),
            "FALSE_POSITIVE" => Ok(CaseLabel::FalsePositive),
            "SAR_FILED" => Ok(CaseLabel::SarFiled),
            "NO_ACTION" => Ok(CaseLabel::NoAction),
            other => Err(unknown("case label", other)),
        }
    }
}

fn unknown(kind: &'static str, value: &str) -> EngineError {
    EngineError::UnknownVariant {
        kind,
        value: value.to_string(),
    }
}

// ── Customers and accounts (rule context) ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub customer_id: String,
    pub name: String,
    pub country: String,
    pub is_pep: bool,
    pub annual_declared_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityId,
    pub account_number: String,
    pub customer_id: EntityId,
    #[serde(default)]
    pub device_fingerprint: Option<String>,
}

// ── Transactions and indicators ──────────────────────────────────────────────

/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: EntityId,
    pub account_id: EntityId,
    pub timestamp: Timestamp,
    pub amount: f64,
    pub currency: String,
    pub counterparty_country: String,
    pub channel: String,
    pub is_credit: bool,
    #[serde(default)]
    pub merchant_category: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    /// `None` when the channel has no card semantics.
    #[serde(default)]
    pub card_present: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub code: String,
    pub description: String,
    pub domain: RiskDomain,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedIndicator {
    pub indicator: RiskIndicator,
    pub is_hit: bool,
    pub explanation: Option<String>,
}

impl EvaluatedIndicator {
    pub fn score_contribution(&self) -> f64 {
        if self.is_hit {
            self.indicator.weight
        } else {
            0.0
        }
    }
}

// ── Alerts and cases ─────────────────────────────────────────────────────────

/// Created when a transaction's risk level is alert-worthy. Only `case_id`
/// and `status` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: EntityId,
    pub transaction: Transaction,
    /// Always within [0, 100].
    pub score: f64,
    pub risk_level: RiskLevel,
    pub evaluated_indicators: Vec<EvaluatedIndicator>,
    pub created_at: Timestamp,
    pub status: AlertStatus,
    pub case_id: Option<EntityId>,
    pub priority: Priority,
}

impl Alert {
    pub fn account_id(&self) -> &str {
        &self.transaction.account_id
    }

    /// Domains of the indicators that hit on this alert, deduplicated.
    pub fn hit_domains(&self) -> Vec<RiskDomain> {
        let mut domains: Vec<RiskDomain> = self
            .evaluated_indicators
            .iter()
            .filter(|e| e.is_hit)
            .map(|e| e.indicator.domain)
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

/// Append-only, ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseNote {
    pub author: String,
    pub message: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: EntityId,
    /// Account of the case's first alert. Used for the one-open-case rule.
    pub account_id: EntityId,
    /// Alert ids in attachment order.
    pub alert_ids: Vec<EntityId>,
    pub status: CaseStatus,
    pub label: Option<CaseLabel>,
    pub priority: Priority,
    pub band: Option<Band>,
    pub policy_triggers: Vec<String>,
    pub notes: Vec<CaseNote>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Case {
    pub fn new(id: EntityId, account_id: EntityId, priority: Priority, now: Timestamp) -> Self {
        Self {
            id,
            account_id,
            alert_ids: Vec::new(),
            status: CaseStatus::Open,
            label: None,
            priority,
            band: None,
            policy_triggers: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn alert_count(&self) -> usize {
        self.alert_ids.len()
    }
}

/// One direction of a correlation link. Every link is persisted twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEdge {
    pub alert_id: EntityId,
    pub related_id: EntityId,
    pub reason: String,
    /// Within [0, 0.95].
    pub confidence: f64,
    pub reason_token: String,
    pub created_at: Timestamp,
}

/// One record per case; re-sealing overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealRecord {
    pub case_id: EntityId,
    pub hash: String,
    pub merkle_root: String,
    pub sealed_by: String,
    pub seal_reason: Option<String>,
    pub sealed_at: Timestamp,
}
