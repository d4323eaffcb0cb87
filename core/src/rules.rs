//! Rule predicates and the indicator-code → rule registry.
//!
//! Every configured indicator is bound to exactly one rule by its code.
//! Rules are pure: they see the scored transaction, the account's prior
//! history and the customer directory, nothing else. Time windows are
//! anchored at `tx.timestamp`.
//!
//! Rule families:
//!   - static attribute   (country, sector, channel)
//!   - windowed aggregate (structuring, velocity, income roll-ups)
//!   - cross-reference    (PEP, trusted device, card-not-present)
//!   - pattern            (donation series to conflict regions)

use crate::{
    domain::{Account, Customer, RiskIndicator, Transaction},
    error::{EngineError, EngineResult},
};
use chrono::Duration;
use std::collections::{BTreeSet, HashMap};

// ── Constants ────────────────────────────────────────────────────────────────

const HIGH_RISK_COUNTRIES: &[&str] = &["IR", "KP", "AF", "CU", "SY"];
const HIGH_RISK_SECTORS: &[&str] = &["crypto", "luxury"];
const OFFSHORE_JURISDICTIONS: &[&str] = &["PA", "KY", "VG", "MT"];
const CONFLICT_REGIONS: &[&str] = &["RU", "UA", "IR", "SY"];
const DONATION_CONFLICT_REGIONS: &[&str] = &["SY", "IR", "AF", "UA"];
const ANONYMOUS_CHANNELS: &[&str] = &["unknown_device", "tor", "anonymous_proxy"];

const PEP_HIGH_VALUE: f64 = 5_000.0;

const STRUCTURING_CEILING: f64 = 9_500.0;
const STRUCTURING_MIN_COUNT: usize = 5;
const STRUCTURING_WINDOW_MINUTES: i64 = 30;

const INCOME_FLOW_WINDOW_HOURS: i64 = 4;
const INCOME_FLOW_DIVISOR: f64 = 6.0;

const OFFSHORE_WINDOW_HOURS: i64 = 1;
const OFFSHORE_MIN_PRIOR: usize = 2;
const OFFSHORE_MIN_AMOUNT: f64 = 5_000.0;

const VELOCITY_WINDOW_MINUTES: i64 = 10;
const VELOCITY_MIN_COUNT: usize = 4;
const VELOCITY_MIN_SUM: f64 = 20_000.0;

const CHANNEL_MIX_WINDOW_HOURS: i64 = 2;
const CHANNEL_MIX_MIN_DISTINCT: usize = 3;

const CNP_WINDOW_MINUTES: i64 = 15;
const CNP_MIN_PRIOR: usize = 2;
const CNP_MIN_DEVICES: usize = 2;

const DONATION_SERIES_WINDOW_DAYS: i64 = 7;
const DONATION_SERIES_CEILING: f64 = 1_000.0;
const DONATION_SERIES_MIN_PRIOR: usize = 2;
const DONATION_SERIES_TOLERANCE: f64 = 0.20;

const TAX_FLOW_WINDOW_HOURS: i64 = 24;
const TAX_FLOW_MULTIPLE: f64 = 1.5;

// ── Rule context ─────────────────────────────────────────────────────────────

/// Customer and account lookups needed by cross-referencing rules.
#[derive(Debug, Clone, Default)]
pub struct CustomerDirectory {
    customers: HashMap<String, Customer>,
    accounts: HashMap<String, Account>,
}

impl CustomerDirectory {
    pub fn new(
        customers: impl IntoIterator<Item = Customer>,
        accounts: impl IntoIterator<Item = Account>,
    ) -> Self {
        Self {
            customers: customers.into_iter().map(|c| (c.id.clone(), c)).collect(),
            accounts: accounts.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.get(customer_id)
    }

    pub fn customer_for_account(&self, account_id: &str) -> Option<&Customer> {
        self.account(account_id)
            .and_then(|a| self.customers.get(&a.customer_id))
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty() && self.accounts.is_empty()
    }
}

// ── Rule outcome and registry ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub hit: bool,
    pub explanation: Option<String>,
}

impl RuleOutcome {
    pub fn miss() -> Self {
        Self {
            hit: false,
            explanation: None,
        }
    }

    pub fn hit(explanation: impl Into<String>) -> Self {
        Self {
            hit: true,
            explanation: Some(explanation.into()),
        }
    }
}

pub type RuleFn = fn(&Transaction, &[Transaction], &CustomerDirectory) -> RuleOutcome;

/// Explicit mapping from indicator code to rule predicate.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, RuleFn>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in rule bound to its default indicator code.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("AML_HIGH_RISK_COUNTRY", aml_high_risk_country);
        registry.register("AML_HIGH_RISK_SECTOR", aml_high_risk_sector);
        registry.register("AML_PEP_HIGH_VALUE", aml_pep_high_value);
        registry.register("AML_STRUCTURING", aml_structuring);
        registry.register("AML_AMOUNT_VS_INCOME", aml_amount_vs_income);
        registry.register("AML_REPEATED_OFFSHORE", aml_repeated_offshore);
        registry.register("FRAUD_UNUSUAL_DEVICE_CHANNEL", fraud_unusual_device_channel);
        registry.register("FRAUD_VELOCITY_SPENDING", fraud_velocity_spending);
        registry.register("FRAUD_DEVICE_CHANNEL_MIX", fraud_device_channel_mix);
        registry.register("FRAUD_DEVICE_MISMATCH", fraud_device_mismatch);
        registry.register("FRAUD_CARD_NOT_PRESENT_BURST", fraud_card_not_present_burst);
        registry.register("TF_CONFLICT_REGION", tf_conflict_region);
        registry.register("TF_NGO_CONFLICT_DONATION", tf_ngo_conflict_donation);
        registry.register("TF_REPEATED_SMALL_DONATIONS", tf_repeated_small_donations);
        registry.register("TAX_LOW_TAX_JURISDICTION", tax_low_tax_jurisdiction);
        registry.register("TAX_INCOME_MISMATCH", tax_income_mismatch);
        registry
    }

    /// Bind (or rebind) a rule. Codes are matched case-insensitively.
    pub fn register(&mut self, code: &str, rule: RuleFn) {
        self.rules.insert(code.to_ascii_uppercase(), rule);
    }

    pub fn get(&self, code: &str) -> Option<RuleFn> {
        self.rules.get(&code.to_ascii_uppercase()).copied()
    }

    /// Codes of configured indicators with no bound rule, in config order.
    pub fn unbound<'a>(&self, indicators: &'a [RiskIndicator]) -> Vec<&'a str> {
        indicators
            .iter()
            .filter(|i| self.get(&i.code).is_none())
            .map(|i| i.code.as_str())
            .collect()
    }

    /// Startup self-check: every configured indicator must have a rule.
    pub fn check_coverage(&self, indicators: &[RiskIndicator]) -> EngineResult<()> {
        let unbound = self.unbound(indicators);
        if unbound.is_empty() {
            Ok(())
        } else {
            Err(EngineError::UnboundIndicators {
                codes: unbound.into_iter().map(String::from).collect(),
            })
        }
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: BTreeSet<&String> = self.rules.keys().collect();
        f.debug_struct("RuleRegistry").field("codes", &codes).finish()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Prior transactions of the same account inside `[tx.timestamp - window, tx.timestamp]`.
fn within<'a>(
    tx: &'a Transaction,
    history: &'a [Transaction],
    window: Duration,
) -> impl Iterator<Item = &'a Transaction> + 'a {
    let start = tx.timestamp - window;
    history.iter().filter(move |h| {
        h.account_id == tx.account_id
            && h.id != tx.id
            && h.timestamp >= start
            && h.timestamp <= tx.timestamp
    })
}

fn country_in(tx: &Transaction, set: &[&str]) -> bool {
    let country = tx.counterparty_country.trim().to_ascii_uppercase();
    set.contains(&country.as_str())
}

fn is_donation(tx: &Transaction) -> bool {
    tx.purpose
        .as_deref()
        .map(|p| p.to_lowercase().contains("donation"))
        .unwrap_or(false)
}

// ── Static attribute rules ───────────────────────────────────────────────────

pub fn aml_high_risk_country(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if country_in(tx, HIGH_RISK_COUNTRIES) {
        RuleOutcome::hit(format!(
            "Counterparty country {} is high-risk or sanctioned",
            tx.counterparty_country
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn aml_high_risk_sector(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    match tx.merchant_category.as_deref() {
        Some(category) if HIGH_RISK_SECTORS.contains(&category.to_lowercase().as_str()) => {
            RuleOutcome::hit(format!("Merchant category '{category}' is a high-risk sector"))
        }
        _ => RuleOutcome::miss(),
    }
}

pub fn fraud_unusual_device_channel(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if ANONYMOUS_CHANNELS.contains(&tx.channel.to_lowercase().as_str()) {
        RuleOutcome::hit(format!("Channel '{}' is anonymous or unrecognised", tx.channel))
    } else {
        RuleOutcome::miss()
    }
}

pub fn tf_conflict_region(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if country_in(tx, CONFLICT_REGIONS) {
        RuleOutcome::hit(format!(
            "Counterparty country {} is a conflict or TF-risk region",
            tx.counterparty_country
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn tax_low_tax_jurisdiction(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if country_in(tx, OFFSHORE_JURISDICTIONS) {
        RuleOutcome::hit(format!(
            "Counterparty country {} is a low-tax offshore jurisdiction",
            tx.counterparty_country
        ))
    } else {
        RuleOutcome::miss()
    }
}

// ── Windowed aggregation rules ───────────────────────────────────────────────

pub fn aml_structuring(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if tx.amount >= STRUCTURING_CEILING {
        return RuleOutcome::miss();
    }
    let count = within(tx, history, Duration::minutes(STRUCTURING_WINDOW_MINUTES))
        .filter(|h| h.is_credit == tx.is_credit && h.amount < STRUCTURING_CEILING)
        .count();
    if count >= STRUCTURING_MIN_COUNT {
        RuleOutcome::hit(format!(
            "{count} same-direction transactions under {STRUCTURING_CEILING:.0} \
             within {STRUCTURING_WINDOW_MINUTES} minutes"
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn aml_repeated_offshore(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if !country_in(tx, OFFSHORE_JURISDICTIONS) || tx.amount < OFFSHORE_MIN_AMOUNT {
        return RuleOutcome::miss();
    }
    let prior = within(tx, history, Duration::hours(OFFSHORE_WINDOW_HOURS))
        .filter(|h| country_in(h, OFFSHORE_JURISDICTIONS))
        .count();
    if prior >= OFFSHORE_MIN_PRIOR {
        RuleOutcome::hit(format!(
            "{prior} prior offshore payments within {OFFSHORE_WINDOW_HOURS} hour"
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn fraud_velocity_spending(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    let (count, total) = within(tx, history, Duration::minutes(VELOCITY_WINDOW_MINUTES))
        .fold((0usize, 0.0f64), |(n, sum), h| (n + 1, sum + h.amount));
    if count >= VELOCITY_MIN_COUNT && total > VELOCITY_MIN_SUM {
        RuleOutcome::hit(format!(
            "{count} transactions totalling {total:.2} within {VELOCITY_WINDOW_MINUTES} minutes"
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn fraud_device_channel_mix(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    let channels: BTreeSet<String> = within(tx, history, Duration::hours(CHANNEL_MIX_WINDOW_HOURS))
        .map(|h| h.channel.to_lowercase())
        .chain(std::iter::once(tx.channel.to_lowercase()))
        .collect();
    if channels.len() >= CHANNEL_MIX_MIN_DISTINCT {
        RuleOutcome::hit(format!(
            "{} distinct channels within {CHANNEL_MIX_WINDOW_HOURS} hours",
            channels.len()
        ))
    } else {
        RuleOutcome::miss()
    }
}

// ── Cross-reference rules ────────────────────────────────────────────────────

pub fn aml_pep_high_value(
    tx: &Transaction,
    _: &[Transaction],
    directory: &CustomerDirectory,
) -> RuleOutcome {
    match directory.customer_for_account(&tx.account_id) {
        Some(customer) if customer.is_pep && tx.amount >= PEP_HIGH_VALUE => RuleOutcome::hit(
            format!("PEP customer {} moved {:.2}", customer.customer_id, tx.amount),
        ),
        _ => RuleOutcome::miss(),
    }
}

pub fn aml_amount_vs_income(
    tx: &Transaction,
    history: &[Transaction],
    directory: &CustomerDirectory,
) -> RuleOutcome {
    let Some(customer) = directory.customer_for_account(&tx.account_id) else {
        return RuleOutcome::miss();
    };
    let flow: f64 = within(tx, history, Duration::hours(INCOME_FLOW_WINDOW_HOURS))
        .map(|h| h.amount)
        .sum::<f64>()
        + tx.amount;
    let limit = customer.annual_declared_income / INCOME_FLOW_DIVISOR;
    if flow > limit {
        RuleOutcome::hit(format!(
            "{flow:.2} moved in {INCOME_FLOW_WINDOW_HOURS} hours exceeds {limit:.2} \
             (declared income / {INCOME_FLOW_DIVISOR})"
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn tax_income_mismatch(
    tx: &Transaction,
    history: &[Transaction],
    directory: &CustomerDirectory,
) -> RuleOutcome {
    let Some(customer) = directory.customer_for_account(&tx.account_id) else {
        return RuleOutcome::miss();
    };
    let rolling: f64 = within(tx, history, Duration::hours(TAX_FLOW_WINDOW_HOURS))
        .map(|h| h.amount)
        .sum::<f64>()
        + tx.amount;
    let limit = customer.annual_declared_income / 12.0 * TAX_FLOW_MULTIPLE;
    if rolling > limit {
        RuleOutcome::hit(format!(
            "Rolling {TAX_FLOW_WINDOW_HOURS}h cash flow {rolling:.2} exceeds {limit:.2}"
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn fraud_device_mismatch(
    tx: &Transaction,
    _: &[Transaction],
    directory: &CustomerDirectory,
) -> RuleOutcome {
    let trusted = directory
        .account(&tx.account_id)
        .and_then(|a| a.device_fingerprint.as_deref());
    match (trusted, tx.device_id.as_deref()) {
        (Some(trusted), Some(device)) if trusted != device => RuleOutcome::hit(format!(
            "Device '{device}' does not match trusted fingerprint '{trusted}'"
        )),
        _ => RuleOutcome::miss(),
    }
}

pub fn fraud_card_not_present_burst(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if tx.card_present != Some(false) {
        return RuleOutcome::miss();
    }
    let prior: Vec<&Transaction> = within(tx, history, Duration::minutes(CNP_WINDOW_MINUTES))
        .filter(|h| h.card_present == Some(false))
        .collect();
    let devices: BTreeSet<&str> = prior
        .iter()
        .filter_map(|h| h.device_id.as_deref())
        .chain(tx.device_id.as_deref())
        .collect();
    if prior.len() >= CNP_MIN_PRIOR && devices.len() >= CNP_MIN_DEVICES {
        RuleOutcome::hit(format!(
            "{} card-not-present transactions from {} devices within {CNP_WINDOW_MINUTES} minutes",
            prior.len() + 1,
            devices.len()
        ))
    } else {
        RuleOutcome::miss()
    }
}

// ── Pattern rules ────────────────────────────────────────────────────────────

pub fn tf_ngo_conflict_donation(
    tx: &Transaction,
    _: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if is_donation(tx) && country_in(tx, DONATION_CONFLICT_REGIONS) {
        RuleOutcome::hit(format!(
            "Donation to counterparty in {}",
            tx.counterparty_country
        ))
    } else {
        RuleOutcome::miss()
    }
}

pub fn tf_repeated_small_donations(
    tx: &Transaction,
    history: &[Transaction],
    _: &CustomerDirectory,
) -> RuleOutcome {
    if !is_donation(tx)
        || !country_in(tx, DONATION_CONFLICT_REGIONS)
        || tx.amount >= DONATION_SERIES_CEILING
    {
        return RuleOutcome::miss();
    }
    let tolerance = tx.amount * DONATION_SERIES_TOLERANCE;
    let similar = within(tx, history, Duration::days(DONATION_SERIES_WINDOW_DAYS))
        .filter(|h| {
            is_donation(h)
                && country_in(h, DONATION_CONFLICT_REGIONS)
                && (h.amount - tx.amount).abs() <= tolerance
        })
        .count();
    if similar >= DONATION_SERIES_MIN_PRIOR {
        RuleOutcome::hit(format!(
            "{} similar small donations to conflict regions \
             within {DONATION_SERIES_WINDOW_DAYS} days",
            similar + 1
        ))
    } else {
        RuleOutcome::miss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, minutes_ago: i64, amount: f64) -> Transaction {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Transaction {
            id: id.into(),
            account_id: "acc-1".into(),
            timestamp: now - Duration::minutes(minutes_ago),
            amount,
            currency: "EUR".into(),
            counterparty_country: "DE".into(),
            channel: "branch".into(),
            is_credit: true,
            merchant_category: None,
            purpose: None,
            device_id: None,
            card_present: None,
        }
    }

    #[test]
    fn window_excludes_other_accounts_and_self() {
        let current = tx("t0", 0, 100.0);
        let mut other = tx("t1", 5, 100.0);
        other.account_id = "acc-2".into();
        let history = vec![current.clone(), other, tx("t2", 5, 100.0), tx("t3", 90, 100.0)];
        let ids: Vec<&str> = within(&current, &history, Duration::minutes(30))
            .map(|h| h.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t2"]);
    }

    #[test]
    fn window_ignores_transactions_after_the_scored_one() {
        let current = tx("t0", 10, 100.0);
        let history = vec![tx("later", 0, 100.0)];
        assert_eq!(within(&current, &history, Duration::minutes(30)).count(), 0);
    }

    #[test]
    fn structuring_requires_direction_match() {
        let dir = CustomerDirectory::default();
        let mut history: Vec<Transaction> =
            (1..=5).map(|i| tx(&format!("h{i}"), i * 4, 9_000.0)).collect();
        history[0].is_credit = false;
        let outcome = aml_structuring(&tx("t0", 0, 9_100.0), &history, &dir);
        assert!(!outcome.hit, "only four credits in the window");
    }

    #[test]
    fn country_matching_is_case_insensitive() {
        let dir = CustomerDirectory::default();
        let mut t = tx("t0", 0, 10.0);
        t.counterparty_country = "ir".into();
        assert!(aml_high_risk_country(&t, &[], &dir).hit);
        assert!(tf_conflict_region(&t, &[], &dir).hit);
    }

    #[test]
    fn device_mismatch_needs_a_trusted_fingerprint() {
        let account = Account {
            id: "acc-1".into(),
            account_number: "DE01".into(),
            customer_id: "cust-1".into(),
            device_fingerprint: Some("dev-home".into()),
        };
        let dir = CustomerDirectory::new(Vec::<Customer>::new(), vec![account]);
        let mut t = tx("t0", 0, 10.0);
        t.device_id = Some("dev-proxy".into());
        assert!(fraud_device_mismatch(&t, &[], &dir).hit);

        t.device_id = Some("dev-home".into());
        assert!(!fraud_device_mismatch(&t, &[], &dir).hit);

        let empty = CustomerDirectory::default();
        t.device_id = Some("dev-proxy".into());
        assert!(!fraud_device_mismatch(&t, &[], &empty).hit);
    }

    #[test]
    fn card_not_present_burst_counts_distinct_devices() {
        let dir = CustomerDirectory::default();
        let history: Vec<Transaction> = (1..=2)
            .map(|i| {
                let mut h = tx(&format!("h{i}"), i * 3, 2_500.0);
                h.card_present = Some(false);
                h.device_id = Some(format!("dev-proxy-{i}"));
                h
            })
            .collect();
        let mut t = tx("t0", 0, 2_500.0);
        t.card_present = Some(false);
        t.device_id = Some("dev-proxy-0".into());
        assert!(fraud_card_not_present_burst(&t, &history, &dir).hit);

        t.card_present = Some(true);
        assert!(!fraud_card_not_present_burst(&t, &history, &dir).hit);
    }

    #[test]
    fn donation_series_needs_similar_amounts() {
        let dir = CustomerDirectory::default();
        let donation = |id: &str, minutes_ago: i64, amount: f64| {
            let mut d = tx(id, minutes_ago, amount);
            d.purpose = Some("NGO Donation".into());
            d.counterparty_country = "SY".into();
            d
        };
        let history = vec![donation("h1", 600, 250.0), donation("h2", 1200, 260.0)];
        assert!(tf_repeated_small_donations(&donation("t0", 0, 255.0), &history, &dir).hit);

        let spread = vec![donation("h1", 600, 250.0), donation("h2", 1200, 900.0)];
        assert!(!tf_repeated_small_donations(&donation("t0", 0, 255.0), &spread, &dir).hit);
    }

    /// Account acc-1 owned by one customer with the given profile.
    fn directory(is_pep: bool, income: f64) -> CustomerDirectory {
        CustomerDirectory::new(
            vec![Customer {
                id: "cust-1".into(),
                customer_id: "C-1".into(),
                name: "Test Customer".into(),
                country: "DE".into(),
                is_pep,
                annual_declared_income: income,
            }],
            vec![Account {
                id: "acc-1".into(),
                account_number: "DE01".into(),
                customer_id: "cust-1".into(),
                device_fingerprint: None,
            }],
        )
    }

    fn abroad(id: &str, minutes_ago: i64, amount: f64, country: &str) -> Transaction {
        let mut t = tx(id, minutes_ago, amount);
        t.counterparty_country = country.into();
        t
    }

    #[test]
    fn static_rules_match_their_lists() {
        let dir = CustomerDirectory::default();
        let mut t = tx("t0", 0, 10.0);
        assert!(!aml_high_risk_sector(&t, &[], &dir).hit);
        t.merchant_category = Some("Crypto".into());
        assert!(aml_high_risk_sector(&t, &[], &dir).hit);
        t.merchant_category = Some("grocery".into());
        assert!(!aml_high_risk_sector(&t, &[], &dir).hit);

        assert!(tax_low_tax_jurisdiction(&abroad("t1", 0, 10.0, "pa"), &[], &dir).hit);
        assert!(!tax_low_tax_jurisdiction(&abroad("t2", 0, 10.0, "DE"), &[], &dir).hit);
    }

    #[test]
    fn ngo_donation_needs_purpose_and_region() {
        let dir = CustomerDirectory::default();
        let mut t = abroad("t0", 0, 300.0, "af");
        assert!(!tf_ngo_conflict_donation(&t, &[], &dir).hit, "no purpose given");
        t.purpose = Some("Donation to relief fund".into());
        assert!(tf_ngo_conflict_donation(&t, &[], &dir).hit);
        t.counterparty_country = "DE".into();
        assert!(!tf_ngo_conflict_donation(&t, &[], &dir).hit);
    }

    #[test]
    fn pep_high_value_starts_at_five_thousand() {
        let pep = directory(true, 60_000.0);
        assert!(aml_pep_high_value(&tx("t0", 0, 5_000.0), &[], &pep).hit);
        assert!(!aml_pep_high_value(&tx("t0", 0, 4_999.99), &[], &pep).hit);
        assert!(!aml_pep_high_value(&tx("t0", 0, 50_000.0), &[], &directory(false, 60_000.0)).hit);
        let empty = CustomerDirectory::default();
        assert!(!aml_pep_high_value(&tx("t0", 0, 50_000.0), &[], &empty).hit);
    }

    /// Income 60 000: the four-hour flow limit is 10 000, exclusive.
    #[test]
    fn amount_vs_income_is_strictly_above_a_sixth() {
        let dir = directory(false, 60_000.0);
        let history = vec![tx("h1", 60, 4_000.0), tx("h2", 300, 50_000.0)];
        assert!(!aml_amount_vs_income(&tx("t0", 0, 6_000.0), &history, &dir).hit);
        assert!(aml_amount_vs_income(&tx("t0", 0, 6_000.01), &history, &dir).hit);
        let empty = CustomerDirectory::default();
        assert!(!aml_amount_vs_income(&tx("t0", 0, 1e6), &history, &empty).hit);
    }

    /// Income 60 000: the rolling 24-hour limit is 5 000 × 1.5 = 7 500.
    #[test]
    fn tax_income_mismatch_uses_the_daily_window() {
        let dir = directory(false, 60_000.0);
        let history = vec![tx("h1", 23 * 60, 3_000.0), tx("h2", 25 * 60, 90_000.0)];
        assert!(!tax_income_mismatch(&tx("t0", 0, 4_500.0), &history, &dir).hit);
        assert!(tax_income_mismatch(&tx("t0", 0, 4_500.5), &history, &dir).hit);
    }

    #[test]
    fn repeated_offshore_needs_two_priors_within_the_hour() {
        let dir = CustomerDirectory::default();
        let history = vec![abroad("h1", 20, 100.0, "PA"), abroad("h2", 60, 100.0, "VG")];
        assert!(aml_repeated_offshore(&abroad("t0", 0, 5_000.0, "KY"), &history, &dir).hit);
        assert!(!aml_repeated_offshore(&abroad("t0", 0, 4_999.0, "KY"), &history, &dir).hit);
        assert!(!aml_repeated_offshore(&abroad("t0", 0, 5_000.0, "DE"), &history, &dir).hit);

        let stale = vec![abroad("h1", 20, 100.0, "PA"), abroad("h2", 61, 100.0, "VG")];
        assert!(!aml_repeated_offshore(&abroad("t0", 0, 5_000.0, "KY"), &stale, &dir).hit);
    }

    #[test]
    fn velocity_sum_must_exceed_twenty_thousand() {
        let dir = CustomerDirectory::default();
        let mut history: Vec<Transaction> =
            [1, 2, 3, 10].iter().map(|m| tx(&format!("h{m}"), *m, 5_000.0)).collect();
        assert!(!fraud_velocity_spending(&tx("t0", 0, 1.0), &history, &dir).hit);

        history[3].amount = 5_000.01;
        assert!(fraud_velocity_spending(&tx("t0", 0, 1.0), &history, &dir).hit);

        history.pop();
        history[0].amount = 50_000.0;
        assert!(!fraud_velocity_spending(&tx("t0", 0, 1.0), &history, &dir).hit, "three priors");
    }

    #[test]
    fn channel_mix_counts_distinct_channels_including_current() {
        let dir = CustomerDirectory::default();
        let channel = |id: &str, minutes_ago: i64, channel: &str| {
            let mut t = tx(id, minutes_ago, 10.0);
            t.channel = channel.into();
            t
        };
        let history = vec![channel("h1", 30, "online"), channel("h2", 120, "ATM")];
        assert!(fraud_device_channel_mix(&channel("t0", 0, "branch"), &history, &dir).hit);
        assert!(!fraud_device_channel_mix(&channel("t0", 0, "Online"), &history, &dir).hit);

        let stale = vec![channel("h1", 30, "online"), channel("h2", 121, "ATM")];
        assert!(!fraud_device_channel_mix(&channel("t0", 0, "branch"), &stale, &dir).hit);
    }

    #[test]
    fn coverage_check_lists_unbound_codes() {
        let registry = RuleRegistry::builtin();
        let indicators = vec![RiskIndicator {
            code: "AML_MYSTERY".into(),
            description: String::new(),
            domain: crate::domain::RiskDomain::MoneyLaundering,
            weight: 1.0,
        }];
        match registry.check_coverage(&indicators) {
            Err(EngineError::UnboundIndicators { codes }) => assert_eq!(codes, vec!["AML_MYSTERY"]),
            other => panic!("expected unbound indicator error, got {other:?}"),
        }
    }
}
