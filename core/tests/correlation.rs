//! Correlation: bucketing, confidence bonuses and symmetric persistence.

mod common;

use common::{alert, fixed_clock, store, tx};
use riskcase_core::{
    correlation::{score_pair, BucketKind, CorrelationEngine, MAX_CONFIDENCE},
    domain::{Alert, RiskLevel},
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn all_bonuses_stack_on_base() {
    let a = alert("a", tx("ta", "acc-1", 0, 500.0), 70.0, RiskLevel::High);
    let b = alert("b", tx("tb", "acc-1", 30, 500.0), 72.0, RiskLevel::High);

    let pair = score_pair(&a, &b, BucketKind::SharedAccount);
    assert!(close(pair.confidence, 0.80), "confidence {}", pair.confidence);
    assert_eq!(
        pair.reason,
        "Shared account linkage;similar_score;temporal_burst;amount_match"
    );
}

#[test]
fn base_only_pair() {
    let a = alert("a", tx("ta", "acc-1", 0, 500.0), 40.0, RiskLevel::Medium);
    let b = alert("b", tx("tb", "acc-2", 5 * 60, 800.0), 70.0, RiskLevel::High);

    let pair = score_pair(&a, &b, BucketKind::SharedCountry);
    assert!(close(pair.confidence, 0.55));
    assert_eq!(pair.reason, "Shared counterparty country");
}

#[test]
fn two_hour_window_is_inclusive() {
    let a = alert("a", tx("ta", "acc-1", 0, 1.0), 10.0, RiskLevel::Medium);
    let b = alert("b", tx("tb", "acc-1", 120, 2.0), 90.0, RiskLevel::High);
    let c = alert("c", tx("tc", "acc-1", 121, 3.0), 50.0, RiskLevel::Medium);

    assert!(score_pair(&a, &b, BucketKind::SharedAccount).reason.contains("temporal_burst"));
    assert!(!score_pair(&a, &c, BucketKind::SharedAccount).reason.contains("temporal_burst"));
}

/// Every linked pair is persisted a→b and b→a with the same reason and confidence.
#[test]
fn edges_are_symmetric() {
    let store = store();
    let engine = CorrelationEngine::new(&store, fixed_clock());

    let alerts = vec![
        alert("a", tx("ta", "acc-1", 0, 500.0), 70.0, RiskLevel::High),
        alert("b", tx("tb", "acc-1", 10, 500.0), 71.0, RiskLevel::High),
        alert("c", tx("tc", "acc-9", 20, 900.0), 45.0, RiskLevel::Medium),
    ];
    let linked = engine.correlate(&alerts).unwrap();

    for a in &alerts {
        for edge in store.list_correlations(&a.id).unwrap() {
            let back = store.list_correlations(&edge.related_id).unwrap();
            let mirror = back
                .iter()
                .find(|e| e.related_id == edge.alert_id && e.reason_token == edge.reason_token)
                .unwrap_or_else(|| {
                    panic!("no mirror for {} -> {}", edge.alert_id, edge.related_id)
                });
            assert_eq!(mirror.reason, edge.reason);
            assert_eq!(mirror.confidence, edge.confidence);
            assert!(edge.confidence <= MAX_CONFIDENCE);
        }
    }

    // a-b share account and country; a-c and b-c share only country.
    let a_edges = store.list_correlations("a").unwrap();
    assert_eq!(a_edges.len(), 3, "edges for a: {a_edges:?}");
    assert_eq!(
        a_edges.iter().filter(|e| e.reason_token == "shared_destination").count(),
        1
    );
    assert_eq!(
        a_edges.iter().filter(|e| e.reason_token == "timing_anomaly").count(),
        2
    );
    assert_eq!(linked["a"].len(), 2, "returned map is deduplicated");
    assert!(linked["c"].contains("a") && linked["c"].contains("b"));
}

#[test]
fn duplicate_alerts_in_input_are_ignored() {
    let store = store();
    let engine = CorrelationEngine::new(&store, fixed_clock());
    let a = alert("a", tx("ta", "acc-1", 0, 500.0), 70.0, RiskLevel::High);
    let b = alert("b", tx("tb", "acc-2", 10, 600.0), 40.0, RiskLevel::Medium);

    engine.correlate(&[a.clone(), a.clone(), b]).unwrap();
    assert_eq!(store.list_correlations("a").unwrap().len(), 1);
}

#[test]
fn unrelated_alerts_produce_no_edges() {
    let store = store();
    let engine = CorrelationEngine::new(&store, fixed_clock());
    let a = alert("a", tx("ta", "acc-1", 0, 500.0), 70.0, RiskLevel::High);
    let mut tb = tx("tb", "acc-2", 10, 600.0);
    tb.counterparty_country = "FR".into();
    let b = alert("b", tb, 40.0, RiskLevel::Medium);

    assert!(engine.correlate(&[a, b]).unwrap().is_empty());
    assert!(engine.correlated_for("a").unwrap().is_empty());
}

/// Anchored correlation links only pairs that involve the anchor.
#[test]
fn correlate_with_only_links_anchor() {
    let store = store();
    let engine = CorrelationEngine::new(&store, fixed_clock());
    let anchor = alert("new", tx("tn", "acc-1", 30, 100.0), 80.0, RiskLevel::High);
    let candidates: Vec<Alert> = vec![
        alert("old1", tx("t1", "acc-1", 0, 100.0), 79.0, RiskLevel::High),
        alert("old2", tx("t2", "acc-1", 10, 100.0), 78.0, RiskLevel::High),
    ];

    let linked = engine.correlate_with(&anchor, &candidates).unwrap();

    assert_eq!(linked["new"].len(), 2);
    assert!(store
        .list_correlations("old1")
        .unwrap()
        .iter()
        .all(|e| e.related_id == "new"));
    assert!(!linked["old1"].contains("old2"));
}
