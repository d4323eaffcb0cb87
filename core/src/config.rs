//! Startup configuration: indicators, thresholds, policies, engine settings
//! and the customer directory, each from its own JSON file.
//!
//! RULE: a missing file falls back to the built-in default with a warning.
//! A present but invalid file is fatal: the engine never starts with a
//! half-valid rule set.

use crate::{
    domain::{Account, Band, Customer, RiskDomain, RiskIndicator, RiskLevel},
    error::ConfigError,
    policy::{default_policies, Policy, PolicyConditions},
    risk_engine::{default_indicators, RiskThresholds},
    rules::CustomerDirectory,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, str::FromStr};

pub const INDICATORS_FILE: &str = "indicators.json";
pub const THRESHOLDS_FILE: &str = "thresholds.json";
pub const POLICIES_FILE: &str = "policies.json";
pub const ENGINE_FILE: &str = "engine.json";
pub const DIRECTORY_FILE: &str = "directory.json";

/// One hundred leap years.
pub const MAX_HISTORY_WINDOW_HOURS: i64 = 24 * 366 * 100;
pub const MAX_CORRELATION_CANDIDATES: usize = 10_000;

// ── Engine settings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How far back history is loaded for each scored transaction.
    pub history_window_hours: i64,
    /// How many of the most recent alerts a new alert is correlated against.
    pub correlation_candidates: usize,
    /// Lowest risk level that raises an alert.
    pub alert_min_level: RiskLevel,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_window_hours: 24 * 7,
            correlation_candidates: 25,
            alert_min_level: RiskLevel::Medium,
        }
    }
}

impl EngineSettings {
    /// Clamped to the accepted range for settings built in code.
    pub fn history_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.history_window_hours.clamp(1, MAX_HISTORY_WINDOW_HOURS))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_window_hours <= 0 {
            return Err(ConfigError::InvalidSetting {
                name: "history_window_hours",
                reason: format!("must be positive, got {}", self.history_window_hours),
            });
        }
        if self.history_window_hours > MAX_HISTORY_WINDOW_HOURS {
            return Err(ConfigError::InvalidSetting {
                name: "history_window_hours",
                reason: format!(
                    "must be at most {MAX_HISTORY_WINDOW_HOURS}, got {}",
                    self.history_window_hours
                ),
            });
        }
        if self.correlation_candidates > MAX_CORRELATION_CANDIDATES {
            return Err(ConfigError::InvalidSetting {
                name: "correlation_candidates",
                reason: format!(
                    "must be at most {MAX_CORRELATION_CANDIDATES}, got {}",
                    self.correlation_candidates
                ),
            });
        }
        Ok(())
    }
}

// ── Raw file shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIndicator {
    code: Option<String>,
    description: Option<String>,
    domain: Option<String>,
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    low: Option<f64>,
    medium: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    id: Option<String>,
    domain: Option<String>,
    severity: Option<String>,
    description: Option<String>,
    #[serde(default)]
    conditions: RawConditions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConditions {
    min_alerts: Option<usize>,
    min_high_alerts: Option<usize>,
    min_score: Option<f64>,
    domains: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    customers: Vec<Customer>,
    #[serde(default)]
    accounts: Vec<Account>,
}

// ── Parsing ──────────────────────────────────────────────────────────────────

fn required<T>(
    value: Option<T>,
    file: &'static str,
    index: usize,
    field: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingField { file, index, field })
}

fn malformed(path: &str) -> impl FnOnce(serde_json::Error) -> ConfigError + '_ {
    move |source| ConfigError::Malformed {
        path: path.to_string(),
        source,
    }
}

pub fn parse_indicators(json: &str, path: &str) -> Result<Vec<RiskIndicator>, ConfigError> {
    let raw: Vec<RawIndicator> = serde_json::from_str(json).map_err(malformed(path))?;
    let mut seen = HashSet::new();
    let mut indicators = Vec::with_capacity(raw.len());
    for (index, entry) in raw.into_iter().enumerate() {
        let code = required(entry.code, INDICATORS_FILE, index, "code")?;
        let description = required(entry.description, INDICATORS_FILE, index, "description")?;
        let domain_name = required(entry.domain, INDICATORS_FILE, index, "domain")?;
        let weight = required(entry.weight, INDICATORS_FILE, index, "weight")?;

        let domain = RiskDomain::from_name(&domain_name).ok_or(ConfigError::InvalidDomain {
            file: INDICATORS_FILE,
            value: domain_name,
        })?;
        if weight <= 0.0 || !weight.is_finite() {
            return Err(ConfigError::NonPositiveWeight { code, weight });
        }
        if !seen.insert(code.to_ascii_uppercase()) {
            return Err(ConfigError::DuplicateIndicator { code });
        }
        indicators.push(RiskIndicator {
            code,
            description,
            domain,
            weight,
        });
    }
    Ok(indicators)
}

pub fn parse_thresholds(json: &str, path: &str) -> Result<RiskThresholds, ConfigError> {
    let raw: RawThresholds = serde_json::from_str(json).map_err(malformed(path))?;
    let low = required(raw.low, THRESHOLDS_FILE, 0, "low")?;
    let medium = required(raw.medium, THRESHOLDS_FILE, 0, "medium")?;
    RiskThresholds::new(low, medium)
}

pub fn parse_policies(json: &str, path: &str) -> Result<Vec<Policy>, ConfigError> {
    let raw: Vec<RawPolicy> = serde_json::from_str(json).map_err(malformed(path))?;
    let mut policies = Vec::with_capacity(raw.len());
    for (index, entry) in raw.into_iter().enumerate() {
        let id = required(entry.id, POLICIES_FILE, index, "id")?;
        let domain = required(entry.domain, POLICIES_FILE, index, "domain")?;
        let severity_name = required(entry.severity, POLICIES_FILE, index, "severity")?;
        let description = required(entry.description, POLICIES_FILE, index, "description")?;

        let severity = Band::from_str(&severity_name.trim().to_ascii_uppercase()).map_err(|_| {
            ConfigError::InvalidSeverity {
                id: id.clone(),
                value: severity_name.clone(),
            }
        })?;

        let domains = entry
            .conditions
            .domains
            .map(|names| {
                names
                    .into_iter()
                    .map(|name| {
                        RiskDomain::from_alias(&name).ok_or(ConfigError::InvalidDomain {
                            file: POLICIES_FILE,
                            value: name,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let conditions = PolicyConditions {
            min_alerts: entry.conditions.min_alerts,
            min_high_alerts: entry.conditions.min_high_alerts,
            min_score: entry.conditions.min_score,
            domains,
        };
        if conditions.is_empty() {
            return Err(ConfigError::UnconditionalPolicy { id });
        }
        policies.push(Policy {
            id,
            domain,
            severity,
            description,
            conditions,
        });
    }
    Ok(policies)
}

pub fn parse_settings(json: &str, path: &str) -> Result<EngineSettings, ConfigError> {
    let settings: EngineSettings = serde_json::from_str(json).map_err(malformed(path))?;
    settings.validate()?;
    Ok(settings)
}

pub fn parse_directory(json: &str, path: &str) -> Result<CustomerDirectory, ConfigError> {
    let file: DirectoryFile = serde_json::from_str(json).map_err(malformed(path))?;
    Ok(CustomerDirectory::new(file.customers, file.accounts))
}

/// `Ok(None)` when the file does not exist.
fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn load_or_default<T>(
    dir: &Path,
    file: &'static str,
    parse: fn(&str, &str) -> Result<T, ConfigError>,
    fallback: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    let path = dir.join(file);
    match read_optional(&path)? {
        Some(content) => parse(&content, &path.display().to_string()),
        None => {
            log::warn!(
                "{file} not found in {} - using built-in defaults",
                dir.display()
            );
            Ok(fallback())
        }
    }
}

// ── Engine config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub indicators: Vec<RiskIndicator>,
    pub thresholds: RiskThresholds,
    pub policies: Vec<Policy>,
    pub settings: EngineSettings,
    pub directory: CustomerDirectory,
}

impl EngineConfig {
    /// Load every config file from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            indicators: load_or_default(
                dir,
                INDICATORS_FILE,
                parse_indicators,
                default_indicators,
            )?,
            thresholds: load_or_default(
                dir,
                THRESHOLDS_FILE,
                parse_thresholds,
                RiskThresholds::default,
            )?,
            policies: load_or_default(dir, POLICIES_FILE, parse_policies, default_policies)?,
            settings: load_or_default(dir, ENGINE_FILE, parse_settings, EngineSettings::default)?,
            directory: load_or_default(
                dir,
                DIRECTORY_FILE,
                parse_directory,
                CustomerDirectory::default,
            )?,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
            thresholds: RiskThresholds::default(),
            policies: default_policies(),
            settings: EngineSettings::default(),
            directory: CustomerDirectory::default(),
        }
    }
}
