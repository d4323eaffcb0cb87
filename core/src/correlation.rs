//! Alert correlation.
//!
//! Alerts are bucketed twice (shared account, shared counterparty country)
//! and every pair inside a bucket is scored. Each qualifying pair is
//! persisted in both directions with identical reason and confidence.

use crate::{
    clock::EngineClock,
    domain::{Alert, CorrelationEdge},
    error::EngineResult,
    store::DetectionStore,
    types::EntityId,
};
use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const BASE_CONFIDENCE: f64 = 0.55;
pub const MAX_CONFIDENCE: f64 = 0.95;
const SIMILAR_SCORE_BONUS: f64 = 0.10;
const TEMPORAL_BURST_BONUS: f64 = 0.10;
const AMOUNT_MATCH_BONUS: f64 = 0.05;
const SIMILAR_SCORE_DELTA: f64 = 5.0;
const BURST_WINDOW_HOURS: i64 = 2;

/// Which key a bucket was formed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BucketKind {
    SharedAccount,
    SharedCountry,
}

impl BucketKind {
    pub fn reason_token(&self) -> &'static str {
        match self {
            BucketKind::SharedAccount => "shared_destination",
            BucketKind::SharedCountry => "timing_anomaly",
        }
    }

    pub fn base_reason(&self) -> &'static str {
        match self {
            BucketKind::SharedAccount => "Shared account linkage",
            BucketKind::SharedCountry => "Shared counterparty country",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub confidence: f64,
    pub reason: String,
}

/// Confidence and reason for one pair inside a bucket of `kind`.
pub fn score_pair(a: &Alert, b: &Alert, kind: BucketKind) -> PairScore {
    let mut confidence = BASE_CONFIDENCE;
    let mut reason = kind.base_reason().to_string();

    if (a.score - b.score).abs() < SIMILAR_SCORE_DELTA {
        confidence += SIMILAR_SCORE_BONUS;
        reason.push_str(";similar_score");
    }
    let (ta, tb) = (a.transaction.timestamp, b.transaction.timestamp);
    let gap = if ta >= tb { ta - tb } else { tb - ta };
    if gap <= Duration::hours(BURST_WINDOW_HOURS) {
        confidence += TEMPORAL_BURST_BONUS;
        reason.push_str(";temporal_burst");
    }
    if a.transaction.amount == b.transaction.amount {
        confidence += AMOUNT_MATCH_BONUS;
        reason.push_str(";amount_match");
    }

    PairScore {
        confidence: confidence.min(MAX_CONFIDENCE),
        reason,
    }
}

/// Alert id → ids of alerts it was linked to in this call.
pub type CorrelationMap = BTreeMap<EntityId, BTreeSet<EntityId>>;

pub struct CorrelationEngine<'s, S: DetectionStore> {
    store: &'s S,
    clock: EngineClock,
}

impl<'s, S: DetectionStore> CorrelationEngine<'s, S> {
    pub fn new(store: &'s S, clock: EngineClock) -> Self {
        Self { store, clock }
    }

    pub fn set_clock(&mut self, clock: EngineClock) {
        self.clock = clock;
    }

    /// Correlate every pair in `alerts`.
    pub fn correlate(&self, alerts: &[Alert]) -> EngineResult<CorrelationMap> {
        let alerts = dedupe(alerts.iter());
        let pairs = bucket_pairs(&alerts);
        self.persist(&alerts, &pairs)
    }

    /// Correlate `anchor` against `candidates`, emitting only pairs that
    /// involve the anchor. Pairs among candidates were linked when they
    /// themselves were new.
    pub fn correlate_with(
        &self,
        anchor: &Alert,
        candidates: &[Alert],
    ) -> EngineResult<CorrelationMap> {
        let alerts = dedupe(std::iter::once(anchor).chain(candidates));
        let pairs: Vec<_> = bucket_pairs(&alerts)
            .into_iter()
            .filter(|(i, j, _)| *i == 0 || *j == 0)
            .collect();
        self.persist(&alerts, &pairs)
    }

    pub fn correlated_for(&self, alert_id: &str) -> EngineResult<Vec<CorrelationEdge>> {
        self.store.list_correlations(alert_id)
    }

    fn persist(
        &self,
        alerts: &[&Alert],
        pairs: &[(usize, usize, BucketKind)],
    ) -> EngineResult<CorrelationMap> {
        let now = self.clock.now();
        let mut linked = CorrelationMap::new();
        for &(i, j, kind) in pairs {
            let (a, b) = (alerts[i], alerts[j]);
            let PairScore { confidence, reason } = score_pair(a, b, kind);
            for (from, to) in [(a, b), (b, a)] {
                self.store.record_correlation(&CorrelationEdge {
                    alert_id: from.id.clone(),
                    related_id: to.id.clone(),
                    reason: reason.clone(),
                    confidence,
                    reason_token: kind.reason_token().to_string(),
                    created_at: now,
                })?;
                linked
                    .entry(from.id.clone())
                    .or_default()
                    .insert(to.id.clone());
            }
        }
        if !pairs.is_empty() {
            log::debug!(
                "Correlated {} alerts into {} pairs",
                alerts.len(),
                pairs.len()
            );
        }
        Ok(linked)
    }
}

/// First occurrence of each alert id wins.
fn dedupe<'a>(alerts: impl Iterator<Item = &'a Alert>) -> Vec<&'a Alert> {
    let mut seen = HashSet::new();
    alerts.filter(|a| seen.insert(a.id.as_str())).collect()
}

/// All unordered pairs `(i, j)` with `i < j` per bucket, account buckets
/// first. Bucket order is deterministic.
fn bucket_pairs(alerts: &[&Alert]) -> Vec<(usize, usize, BucketKind)> {
    let mut by_account: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut by_country: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, alert) in alerts.iter().enumerate() {
        by_account.entry(alert.account_id()).or_default().push(idx);
        by_country
            .entry(alert.transaction.counterparty_country.as_str())
            .or_default()
            .push(idx);
    }

    let mut pairs = Vec::new();
    for (kind, buckets) in [
        (BucketKind::SharedAccount, by_account),
        (BucketKind::SharedCountry, by_country),
    ] {
        for members in buckets.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    pairs.push((i, j, kind));
                }
            }
        }
    }
    pairs
}
