//! Risk scoring: weighted indicators over windowed history, squashed to 0–100.
//!
//! SCORING (fixed, must not drift):
//!   raw        = Σ weight(hit) + correlation_bonus
//!   bonus      = 5.0 if ≥3 hits, 3.0 if exactly 2 hits with one in TF, else 0
//!   normalized = 100 / (1 + e^(-0.1 · (raw − 10)))

use crate::{
    domain::{EvaluatedIndicator, RiskDomain, RiskIndicator, RiskLevel, Transaction},
    error::{ConfigError, EngineResult},
    rules::{CustomerDirectory, RuleOutcome, RuleRegistry},
};
use serde::{Deserialize, Serialize};

const MULTI_HIT_BONUS: f64 = 5.0;
const TF_PAIR_BONUS: f64 = 3.0;
const LOGISTIC_SLOPE: f64 = 0.1;
const LOGISTIC_MIDPOINT: f64 = 10.0;

// ── Thresholds ───────────────────────────────────────────────────────────────

/// Two ordered cutoffs. Boundary values belong to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
}

impl RiskThresholds {
    pub fn new(low: f64, medium: f64) -> Result<Self, ConfigError> {
        if !(low > 0.0 && medium > low) {
            return Err(ConfigError::InvalidThresholds { low, medium });
        }
        Ok(Self { low, medium })
    }

    pub fn level(&self, score: f64) -> RiskLevel {
        if score < self.low {
            RiskLevel::Low
        } else if score < self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 30.0,
            medium: 60.0,
        }
    }
}

// ── Scoring engine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RiskScore {
    /// Normalized score in [0, 100].
    pub score: f64,
    pub raw: f64,
    pub correlation_bonus: f64,
    /// One entry per configured indicator, in configuration order.
    pub evaluated: Vec<EvaluatedIndicator>,
}

impl RiskScore {
    pub fn hits(&self) -> impl Iterator<Item = &EvaluatedIndicator> {
        self.evaluated.iter().filter(|e| e.is_hit)
    }
}

pub struct RiskScoringEngine {
    indicators: Vec<RiskIndicator>,
    registry: RuleRegistry,
    directory: CustomerDirectory,
}

impl RiskScoringEngine {
    /// Unbound indicator codes are logged and treated as non-hits.
    /// Use `self_check()` at startup to make them fatal instead.
    pub fn new(
        indicators: Vec<RiskIndicator>,
        registry: RuleRegistry,
        directory: CustomerDirectory,
    ) -> Self {
        for code in registry.unbound(&indicators) {
            log::warn!("Indicator {code} has no bound rule; it will never hit");
        }
        Self {
            indicators,
            registry,
            directory,
        }
    }

    /// Default indicators with the built-in rule registry.
    pub fn with_defaults(directory: CustomerDirectory) -> Self {
        Self::new(default_indicators(), RuleRegistry::builtin(), directory)
    }

    pub fn self_check(&self) -> EngineResult<()> {
        self.registry.check_coverage(&self.indicators)
    }

    pub fn indicators(&self) -> &[RiskIndicator] {
        &self.indicators
    }

    pub fn directory(&self) -> &CustomerDirectory {
        &self.directory
    }

    /// Pure in `(tx, history)` for a given engine.
    pub fn score(&self, tx: &Transaction, history: &[Transaction]) -> RiskScore {
        let evaluated: Vec<EvaluatedIndicator> = self
            .indicators
            .iter()
            .map(|indicator| {
                let outcome = match self.registry.get(&indicator.code) {
                    Some(rule) => rule(tx, history, &self.directory),
                    None => RuleOutcome::miss(),
                };
                EvaluatedIndicator {
                    indicator: indicator.clone(),
                    is_hit: outcome.hit,
                    explanation: outcome.explanation,
                }
            })
            .collect();

        let weights: f64 = evaluated.iter().map(EvaluatedIndicator::score_contribution).sum();
        let correlation_bonus = correlation_bonus(&evaluated);
        let raw = weights + correlation_bonus;
        let score = normalize(raw);

        log::debug!(
            "tx={} account={} hits={} raw={raw:.2} score={score:.2}",
            tx.id,
            tx.account_id,
            evaluated.iter().filter(|e| e.is_hit).count()
        );

        RiskScore {
            score,
            raw,
            correlation_bonus,
            evaluated,
        }
    }
}

fn correlation_bonus(evaluated: &[EvaluatedIndicator]) -> f64 {
    let hits: Vec<&EvaluatedIndicator> = evaluated.iter().filter(|e| e.is_hit).collect();
    if hits.len() >= 3 {
        MULTI_HIT_BONUS
    } else if hits.len() == 2
        && hits
            .iter()
            .any(|e| e.indicator.domain == RiskDomain::TerroristFinancing)
    {
        TF_PAIR_BONUS
    } else {
        0.0
    }
}

/// Logistic squashing into [0, 100].
pub fn normalize(raw: f64) -> f64 {
    100.0 / (1.0 + (-LOGISTIC_SLOPE * (raw - LOGISTIC_MIDPOINT)).exp())
}

// ── Built-in indicators ──────────────────────────────────────────────────────

fn indicator(code: &str, description: &str, domain: RiskDomain, weight: f64) -> RiskIndicator {
    RiskIndicator {
        code: code.into(),
        description: description.into(),
        domain,
        weight,
    }
}

pub fn default_indicators() -> Vec<RiskIndicator> {
    use RiskDomain::*;
    vec![
        indicator(
            "AML_HIGH_RISK_COUNTRY",
            "Counterparty in a high-risk or sanctioned country",
            MoneyLaundering,
            15.0,
        ),
        indicator(
            "AML_HIGH_RISK_SECTOR",
            "Transaction in a high-risk sector (crypto, luxury)",
            MoneyLaundering,
            9.0,
        ),
        indicator(
            "AML_PEP_HIGH_VALUE",
            "PEP customer with a high-value transaction",
            MoneyLaundering,
            18.0,
        ),
        indicator(
            "AML_STRUCTURING",
            "Many sub-threshold transactions within 30 minutes",
            MoneyLaundering,
            20.0,
        ),
        indicator(
            "AML_AMOUNT_VS_INCOME",
            "Short-term flow out of proportion to declared income",
            MoneyLaundering,
            16.0,
        ),
        indicator(
            "AML_REPEATED_OFFSHORE",
            "Repeated offshore payments in a short period",
            MoneyLaundering,
            12.0,
        ),
        indicator(
            "FRAUD_UNUSUAL_DEVICE_CHANNEL",
            "Unusual or anonymous device or channel",
            Fraud,
            10.0,
        ),
        indicator(
            "FRAUD_VELOCITY_SPENDING",
            "High frequency and volume in a short period",
            Fraud,
            14.0,
        ),
        indicator(
            "FRAUD_DEVICE_CHANNEL_MIX",
            "Many distinct channels in a short period",
            Fraud,
            9.5,
        ),
        indicator(
            "FRAUD_DEVICE_MISMATCH",
            "Device differs from the account's trusted fingerprint",
            Fraud,
            11.0,
        ),
        indicator(
            "FRAUD_CARD_NOT_PRESENT_BURST",
            "Burst of card-not-present payments across devices",
            Fraud,
            12.0,
        ),
        indicator(
            "TF_CONFLICT_REGION",
            "Payment to a conflict or TF-risk region",
            TerroristFinancing,
            12.5,
        ),
        indicator(
            "TF_NGO_CONFLICT_DONATION",
            "NGO donation into a conflict or TF-risk region",
            TerroristFinancing,
            13.5,
        ),
        indicator(
            "TF_REPEATED_SMALL_DONATIONS",
            "Series of similar small donations to conflict regions",
            TerroristFinancing,
            11.0,
        ),
        indicator(
            "TAX_LOW_TAX_JURISDICTION",
            "Payment to a low-tax offshore territory",
            TaxEvasion,
            8.0,
        ),
        indicator(
            "TAX_INCOME_MISMATCH",
            "Rolling cash flow well above declared income",
            TaxEvasion,
            13.0,
        ),
    ]
}
