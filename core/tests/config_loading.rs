//! Configuration loading: optional files fall back, invalid files are fatal.

use riskcase_core::{
    config::{
        EngineConfig, EngineSettings, MAX_CORRELATION_CANDIDATES, MAX_HISTORY_WINDOW_HOURS,
    },
    domain::{Band, RiskDomain, RiskLevel},
    error::ConfigError,
};
use std::{fs, path::Path};
use tempfile::TempDir;

fn dir_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

fn load(files: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
    let dir = dir_with(files);
    EngineConfig::load(dir.path())
}

#[test]
fn empty_directory_uses_defaults() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = load(&[]).unwrap();
    let defaults = EngineConfig::default();

    assert_eq!(config.indicators, defaults.indicators);
    assert_eq!(config.indicators.len(), 16);
    assert_eq!(config.thresholds.low, 30.0);
    assert_eq!(config.thresholds.medium, 60.0);
    assert_eq!(config.policies.len(), 3);
    assert_eq!(config.settings, EngineSettings::default());
    assert!(config.directory.is_empty());
}

#[test]
fn missing_directory_uses_defaults() {
    let config = EngineConfig::load(Path::new("/nonexistent/riskcase-config")).unwrap();
    assert_eq!(config.indicators.len(), 16);
}

#[test]
fn indicator_domains_are_case_insensitive() {
    let config = load(&[(
        "indicators.json",
        r#"[{"code": "FRAUD_VELOCITY_SPENDING", "description": "velocity", "domain": "fraud", "weight": 7.5}]"#,
    )])
    .unwrap();
    assert_eq!(config.indicators.len(), 1);
    assert_eq!(config.indicators[0].domain, RiskDomain::Fraud);
    assert_eq!(config.indicators[0].weight, 7.5);
}

#[test]
fn indicator_missing_weight_is_fatal() {
    let err = load(&[(
        "indicators.json",
        r#"[{"code": "AML_STRUCTURING", "description": "s", "domain": "MONEY_LAUNDERING"}]"#,
    )])
    .unwrap_err();
    assert!(
        matches!(err, ConfigError::MissingField { field: "weight", index: 0, .. }),
        "got {err:?}"
    );
}

#[test]
fn non_positive_weight_is_fatal() {
    for weight in ["0", "-3"] {
        let json = format!(
            r#"[{{"code": "AML_STRUCTURING", "description": "s", "domain": "MONEY_LAUNDERING", "weight": {weight}}}]"#
        );
        let err = load(&[("indicators.json", &json)]).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveWeight { .. }), "weight {weight}: {err:?}");
    }
}

#[test]
fn unknown_indicator_domain_is_fatal() {
    let err = load(&[(
        "indicators.json",
        r#"[{"code": "X", "description": "x", "domain": "PIRACY", "weight": 1}]"#,
    )])
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDomain { .. }), "got {err:?}");
}

#[test]
fn duplicate_indicator_code_is_fatal() {
    let err = load(&[(
        "indicators.json",
        r#"[
            {"code": "AML_STRUCTURING", "description": "a", "domain": "MONEY_LAUNDERING", "weight": 1},
            {"code": "aml_structuring", "description": "b", "domain": "MONEY_LAUNDERING", "weight": 2}
        ]"#,
    )])
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateIndicator { .. }), "got {err:?}");
}

#[test]
fn malformed_json_is_fatal() {
    let err = load(&[("thresholds.json", "{ low: 30")]).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }), "got {err:?}");
}

#[test]
fn inverted_thresholds_are_fatal() {
    let err = load(&[("thresholds.json", r#"{"low": 60, "medium": 30}"#)]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidThresholds { .. }), "got {err:?}");

    let err = load(&[("thresholds.json", r#"{"low": 20}"#)]).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "medium", .. }), "got {err:?}");
}

#[test]
fn custom_thresholds_load() {
    let config = load(&[("thresholds.json", r#"{"low": 20, "medium": 50}"#)]).unwrap();
    assert_eq!(config.thresholds.level(20.0), RiskLevel::Medium);
    assert_eq!(config.thresholds.level(50.0), RiskLevel::High);
}

#[test]
fn policies_load_with_aliases_and_lowercase_severity() {
    let config = load(&[(
        "policies.json",
        r#"[{
            "id": "TF_ANY",
            "domain": "TF",
            "severity": "red",
            "description": "any TF exposure",
            "conditions": {"domains": ["tf", "Terrorist_Financing"], "min_alerts": 1}
        }]"#,
    )])
    .unwrap();
    let policy = &config.policies[0];
    assert_eq!(policy.severity, Band::Red);
    assert_eq!(
        policy.conditions.domains.as_deref(),
        Some(&[RiskDomain::TerroristFinancing, RiskDomain::TerroristFinancing][..])
    );
    assert_eq!(policy.conditions.min_alerts, Some(1));
}

#[test]
fn unconditional_policy_is_fatal() {
    for conditions in [r#""conditions": {},"#, ""] {
        let json = format!(
            r#"[{{"id": "ALWAYS", "domain": "AML", "severity": "RED", {conditions} "description": "matches everything"}}]"#
        );
        let err = load(&[("policies.json", &json)]).unwrap_err();
        assert!(
            matches!(err, ConfigError::UnconditionalPolicy { ref id } if id == "ALWAYS"),
            "got {err:?}"
        );
    }
}

#[test]
fn unknown_policy_domain_is_fatal() {
    let err = load(&[(
        "policies.json",
        r#"[{"id": "P", "domain": "X", "severity": "YELLOW", "description": "d", "conditions": {"domains": ["SMUGGLING"]}}]"#,
    )])
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDomain { .. }), "got {err:?}");
}

#[test]
fn unknown_policy_condition_is_fatal() {
    let err = load(&[(
        "policies.json",
        r#"[{"id": "P", "domain": "X", "severity": "YELLOW", "description": "d", "conditions": {"max_alerts": 3}}]"#,
    )])
    .unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }), "got {err:?}");
}

#[test]
fn invalid_severity_is_fatal() {
    let err = load(&[(
        "policies.json",
        r#"[{"id": "P", "domain": "X", "severity": "ORANGE", "description": "d", "conditions": {"min_alerts": 1}}]"#,
    )])
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSeverity { .. }), "got {err:?}");
}

#[test]
fn partial_engine_settings_keep_defaults() {
    let config = load(&[("engine.json", r#"{"correlation_candidates": 5}"#)]).unwrap();
    assert_eq!(config.settings.correlation_candidates, 5);
    assert_eq!(config.settings.history_window_hours, 168);
    assert_eq!(config.settings.alert_min_level, RiskLevel::Medium);

    let err = load(&[("engine.json", r#"{"history_window_hours": 0}"#)]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSetting { .. }), "got {err:?}");
}

#[test]
fn out_of_range_engine_settings_are_fatal() {
    for json in [
        r#"{"history_window_hours": 1000000000000}"#,
        r#"{"correlation_candidates": 18446744073709551615, "alert_min_level": "Low"}"#,
        r#"{"correlation_candidates": 10001}"#,
    ] {
        let err = load(&[("engine.json", json)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }), "{json}: {err:?}");
    }

    let config = load(&[(
        "engine.json",
        &format!(
            r#"{{"history_window_hours": {MAX_HISTORY_WINDOW_HOURS}, "correlation_candidates": {MAX_CORRELATION_CANDIDATES}}}"#
        ),
    )])
    .unwrap();
    assert_eq!(config.settings.correlation_candidates, MAX_CORRELATION_CANDIDATES);
}

#[test]
fn directory_file_populates_rule_context() {
    let config = load(&[(
        "directory.json",
        r#"{
            "customers": [{"id": "cu-1", "customer_id": "C-1", "name": "Ada", "country": "GB",
                           "is_pep": true, "annual_declared_income": 90000}],
            "accounts": [{"id": "acc-1", "account_number": "GB00 0001", "customer_id": "cu-1",
                          "device_fingerprint": "dev-a"}]
        }"#,
    )])
    .unwrap();
    let customer = config.directory.customer_for_account("acc-1").unwrap();
    assert!(customer.is_pep);
    assert_eq!(
        config.directory.account("acc-1").unwrap().device_fingerprint.as_deref(),
        Some("dev-a")
    );
}
