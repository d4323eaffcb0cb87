//! The detection engine: one transaction in, alert/case/correlation out.
//!
//! PIPELINE (fixed order per transaction):
//!   1. Load account history (window ending at tx.timestamp)
//!   2. Score and derive the risk level
//!   3. Record the transaction
//!   4. If alert-worthy: create and persist an alert
//!   5. Attach the alert to the account's open case
//!   6. Correlate the alert against the most recent alerts
//!   7. Re-evaluate policies on the case and persist band/triggers
//!
//! RULES:
//!   - Scoring never reads the clock; it is pure in (tx, history).
//!   - All mutating operations take `&mut self`: one writer per engine.
//!   - Every case mutation lands in the event log.

use crate::{
    case_management::CaseManagementService,
    clock::EngineClock,
    config::{EngineConfig, EngineSettings},
    correlation::{CorrelationEngine, CorrelationMap},
    domain::{
        Alert, AlertStatus, Band, Case, CaseLabel, CaseStatus, CorrelationEdge, Priority,
        RiskLevel, SealRecord, Transaction,
    },
    error::EngineResult,
    event::DetectionEvent,
    kyc::{evaluate_customer, KycProfile},
    policy::{PolicyEngine, PolicyResult},
    risk_engine::{RiskScore, RiskScoringEngine, RiskThresholds},
    rules::RuleRegistry,
    sealed_case,
    store::DetectionStore,
    types::EntityId,
};
use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

/// What happened to one scored transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub transaction_id: EntityId,
    pub score:          f64,
    pub risk_level:     RiskLevel,
    /// Codes of the indicators that hit.
    pub hits:           Vec<String>,
    pub alert_id:       Option<EntityId>,
    pub case_id:        Option<EntityId>,
    pub case_status:    Option<CaseStatus>,
    pub band:           Option<Band>,
    /// Alerts linked to the new alert by this call.
    pub correlated:     Vec<EntityId>,
}

pub struct DetectionEngine<'s, S: DetectionStore> {
    store:       &'s S,
    scoring:     RiskScoringEngine,
    thresholds:  RiskThresholds,
    policy:      PolicyEngine,
    settings:    EngineSettings,
    cases:       CaseManagementService<'s, S>,
    correlation: CorrelationEngine<'s, S>,
    clock:       EngineClock,
}

impl<'s, S: DetectionStore> DetectionEngine<'s, S> {
    /// Wire an engine with the built-in rule registry.
    /// Fails if any configured indicator has no bound rule.
    pub fn build(config: EngineConfig, store: &'s S, clock: EngineClock) -> EngineResult<Self> {
        Self::with_registry(config, RuleRegistry::builtin(), store, clock)
    }

    pub fn with_registry(
        config: EngineConfig,
        registry: RuleRegistry,
        store: &'s S,
        clock: EngineClock,
    ) -> EngineResult<Self> {
        let scoring = RiskScoringEngine::new(config.indicators, registry, config.directory);
        scoring.self_check()?;
        log::info!(
            "Detection engine ready: {} indicators, {} policies",
            scoring.indicators().len(),
            config.policies.len()
        );
        Ok(Self {
            store,
            scoring,
            thresholds:  config.thresholds,
            policy:      PolicyEngine::new(config.policies),
            settings:    config.settings,
            cases:       CaseManagementService::new(store, clock.clone()),
            correlation: CorrelationEngine::new(store, clock.clone()),
            clock,
        })
    }

    pub fn set_clock(&mut self, clock: EngineClock) {
        self.cases.set_clock(clock.clone());
        self.correlation.set_clock(clock.clone());
        self.clock = clock;
    }

    pub fn advance_clock(&mut self, by: Duration) {
        let mut clock = self.clock.clone();
        clock.advance(by);
        self.set_clock(clock);
    }

    // ── Scoring ───────────────────────────────────────────────────

    /// History for `tx`: same account, within the configured window ending
    /// at `tx.timestamp`, excluding `tx` itself.
    pub fn history_for(&self, tx: &Transaction) -> EngineResult<Vec<Transaction>> {
        let mut history = self.store.recent_transactions(
            &tx.account_id,
            tx.timestamp,
            self.settings.history_window(),
        )?;
        history.retain(|h| h.id != tx.id);
        Ok(history)
    }

    /// Score without recording anything.
    pub fn score_transaction(&self, tx: &Transaction) -> EngineResult<(RiskScore, RiskLevel)> {
        let history = self.history_for(tx)?;
        let score = self.scoring.score(tx, &history);
        let level = self.thresholds.level(score.score);
        Ok((score, level))
    }

    pub fn process_transaction(&mut self, tx: &Transaction) -> EngineResult<ProcessOutcome> {
        let (score, level) = self.score_transaction(tx)?;
        self.store.record_transaction(tx)?;

        let mut outcome = ProcessOutcome {
            transaction_id: tx.id.clone(),
            score:          score.score,
            risk_level:     level,
            hits:           score.hits().map(|e| e.indicator.code.clone()).collect(),
            alert_id:       None,
            case_id:        None,
            case_status:    None,
            band:           None,
            correlated:     Vec::new(),
        };
        if level < self.settings.alert_min_level {
            return Ok(outcome);
        }

        let alert = Alert {
            id:                   Uuid::new_v4().to_string(),
            transaction:          tx.clone(),
            score:                score.score,
            risk_level:           level,
            evaluated_indicators: score.evaluated,
            created_at:           self.clock.now(),
            status:               AlertStatus::Open,
            case_id:              None,
            priority:             Priority::from(level),
        };
        self.store.record_alert(&alert)?;

        let case = self.cases.attach_alert(&alert)?;
        let attached = Alert {
            case_id: Some(case.id.clone()),
            status: AlertStatus::Attached,
            ..alert
        };

        let candidates: Vec<Alert> = self
            .store
            .recent_alerts(self.settings.correlation_candidates.saturating_add(1))?
            .into_iter()
            .filter(|a| a.id != attached.id)
            .take(self.settings.correlation_candidates)
            .collect();
        let linked: CorrelationMap = self.correlation.correlate_with(&attached, &candidates)?;

        self.refresh_policy(&case.id)?;
        let case = self.cases.get_case(&case.id)?.unwrap_or(case);

        outcome.correlated = linked
            .get(&attached.id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        outcome.alert_id = Some(attached.id);
        outcome.case_status = Some(case.status);
        outcome.band = case.band;
        outcome.case_id = Some(case.id);
        Ok(outcome)
    }

    // ── Policy ────────────────────────────────────────────────────

    pub fn evaluate_policy(&self, case_id: &str) -> EngineResult<Option<PolicyResult>> {
        let Some(case) = self.store.get_case(case_id)? else {
            return Ok(None);
        };
        let alerts = self.store.alerts_for_case(case_id)?;
        Ok(Some(self.policy.evaluate(&case, &alerts)))
    }

    /// Re-evaluate and persist. `None` when the case is unknown.
    pub fn refresh_policy(&mut self, case_id: &str) -> EngineResult<Option<PolicyResult>> {
        let Some(result) = self.evaluate_policy(case_id)? else {
            return Ok(None);
        };
        self.cases.apply_policy(case_id, &result)?;
        Ok(Some(result))
    }

    // ── Operator actions ──────────────────────────────────────────

    pub fn get_case(&self, case_id: &str) -> EngineResult<Option<Case>> {
        self.cases.get_case(case_id)
    }

    pub fn list_cases(&self) -> EngineResult<Vec<Case>> {
        self.cases.list_cases()
    }

    pub fn close_case(&mut self, case_id: &str) -> EngineResult<bool> {
        self.cases.close_case(case_id)
    }

    pub fn escalate_case(
        &mut self,
        case_id: &str,
        label: Option<CaseLabel>,
        priority: Option<Priority>,
    ) -> EngineResult<bool> {
        self.cases.escalate_case(case_id, label, priority)
    }

    pub fn add_note(&mut self, case_id: &str, author: &str, message: &str) -> EngineResult<bool> {
        self.cases.add_note(case_id, author, message)
    }

    pub fn seal_case(
        &mut self,
        case_id: &str,
        sealed_by: &str,
        reason: Option<&str>,
    ) -> EngineResult<Option<SealRecord>> {
        sealed_case::seal_case(self.store, case_id, sealed_by, reason, self.clock.now())
    }

    pub fn verify_seal(&mut self, case_id: &str) -> EngineResult<bool> {
        sealed_case::verify_seal(self.store, case_id, self.clock.now())
    }

    pub fn case_timeline(&self, case_id: &str) -> EngineResult<Vec<DetectionEvent>> {
        self.cases.timeline(case_id)
    }

    pub fn correlated_for(&self, alert_id: &str) -> EngineResult<Vec<CorrelationEdge>> {
        self.correlation.correlated_for(alert_id)
    }

    /// KYC profile for a customer in the engine's directory.
    pub fn customer_profile(&self, customer_id: &str) -> Option<KycProfile> {
        self.scoring
            .directory()
            .customer(customer_id)
            .map(evaluate_customer)
    }
}
