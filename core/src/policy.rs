//! Policy bands: aggregate alert metrics of a case against configured policies.
//!
//! A policy matches iff every declared condition holds. The band starts at
//! GREEN and only ever rises to the highest matching severity.

use crate::domain::{Alert, Band, Case, RiskDomain, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConditions {
    pub min_alerts: Option<usize>,
    pub min_high_alerts: Option<usize>,
    pub min_score: Option<f64>,
    /// Must intersect the case's domains when present and non-empty.
    pub domains: Option<Vec<RiskDomain>>,
}

impl PolicyConditions {
    pub fn is_empty(&self) -> bool {
        self.min_alerts.is_none()
            && self.min_high_alerts.is_none()
            && self.min_score.is_none()
            && self.domains.as_ref().map_or(true, |d| d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    /// Free-form owning domain label, e.g. "AML".
    pub domain: String,
    pub severity: Band,
    pub description: String,
    pub conditions: PolicyConditions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseMetrics {
    pub alert_count: usize,
    pub high_alerts: usize,
    pub domains: BTreeSet<RiskDomain>,
    pub max_score: f64,
}

impl CaseMetrics {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        Self {
            alert_count: alerts.len(),
            high_alerts: alerts
                .iter()
                .filter(|a| a.risk_level == RiskLevel::High)
                .count(),
            domains: alerts.iter().flat_map(Alert::hit_domains).collect(),
            max_score: alerts.iter().map(|a| a.score).fold(0.0, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub band: Band,
    pub triggered_policy_ids: Vec<String>,
    pub explanations: Vec<String>,
}

pub struct PolicyEngine {
    policies: Vec<Policy>,
}

impl PolicyEngine {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// The case itself contributes nothing beyond its alerts today; it is
    /// taken so callers evaluate against a specific case snapshot.
    pub fn evaluate(&self, _case: &Case, alerts: &[Alert]) -> PolicyResult {
        self.evaluate_metrics(&CaseMetrics::from_alerts(alerts))
    }

    pub fn evaluate_metrics(&self, metrics: &CaseMetrics) -> PolicyResult {
        let mut result = PolicyResult {
            band: Band::Green,
            triggered_policy_ids: Vec::new(),
            explanations: Vec::new(),
        };
        for policy in &self.policies {
            if matches(&policy.conditions, metrics) {
                result.triggered_policy_ids.push(policy.id.clone());
                result.explanations.push(policy.description.clone());
                result.band = result.band.max(policy.severity);
            }
        }
        result
    }
}

fn matches(conditions: &PolicyConditions, metrics: &CaseMetrics) -> bool {
    if conditions.min_alerts.is_some_and(|min| metrics.alert_count < min) {
        return false;
    }
    if conditions
        .min_high_alerts
        .is_some_and(|min| metrics.high_alerts < min)
    {
        return false;
    }
    if conditions.min_score.is_some_and(|min| metrics.max_score < min) {
        return false;
    }
    match conditions.domains.as_deref() {
        Some(domains) if !domains.is_empty() => {
            domains.iter().any(|d| metrics.domains.contains(d))
        }
        _ => true,
    }
}

pub fn default_policies() -> Vec<Policy> {
    vec![
        Policy {
            id: "AML_HIGH_SCORE".into(),
            domain: "AML".into(),
            severity: Band::Red,
            description: "AML high score with strong alert density".into(),
            conditions: PolicyConditions {
                min_score: Some(70.0),
                min_alerts: Some(2),
                ..Default::default()
            },
        },
        Policy {
            id: "FRAUD_CARD_PATTERN".into(),
            domain: "FRAUD".into(),
            severity: Band::Yellow,
            description: "Fraud velocity pattern detected".into(),
            conditions: PolicyConditions {
                domains: Some(vec![RiskDomain::Fraud]),
                min_high_alerts: Some(1),
                ..Default::default()
            },
        },
        Policy {
            id: "TF_ROUTE".into(),
            domain: "TF".into(),
            severity: Band::Yellow,
            description: "Terrorism financing corridor risk".into(),
            conditions: PolicyConditions {
                domains: Some(vec![RiskDomain::TerroristFinancing]),
                min_alerts: Some(1),
                ..Default::default()
            },
        },
    ]
}
