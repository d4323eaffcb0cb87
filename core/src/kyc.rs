//! KYC customer risk profile: a static, explainable score per customer.

use crate::domain::{Customer, RiskLevel};
use serde::{Deserialize, Serialize};

const BASELINE: f64 = 10.0;
const PEP_POINTS: f64 = 40.0;
const HIGH_RISK_JURISDICTION_POINTS: f64 = 30.0;
const MEDIUM_RISK_JURISDICTION_POINTS: f64 = 15.0;
const STANDARD_JURISDICTION_POINTS: f64 = 5.0;
const NO_INCOME_POINTS: f64 = 20.0;
const LOW_INCOME_POINTS: f64 = 10.0;
const LOW_INCOME_CEILING: f64 = 35_000.0;

const HIGH_RISK_JURISDICTIONS: &[&str] = &["IR", "KP", "AF", "SY"];
const MEDIUM_RISK_JURISDICTIONS: &[&str] = &["TR", "AE", "RU"];

const HIGH_LEVEL_FLOOR: f64 = 75.0;
const MEDIUM_LEVEL_FLOOR: f64 = 45.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycDimension {
    pub name: String,
    pub points: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycProfile {
    pub customer_id: String,
    /// Within [0, 100].
    pub score: f64,
    pub level: RiskLevel,
    pub dimensions: Vec<KycDimension>,
}

fn dimension(name: &str, points: f64, rationale: impl Into<String>) -> KycDimension {
    KycDimension {
        name: name.to_string(),
        points,
        rationale: rationale.into(),
    }
}

pub fn evaluate_customer(customer: &Customer) -> KycProfile {
    let mut dimensions = vec![dimension("baseline", BASELINE, "Baseline onboarding risk")];

    if customer.is_pep {
        dimensions.push(dimension("pep", PEP_POINTS, "Politically exposed person"));
    }

    let country = customer.country.trim().to_ascii_uppercase();
    dimensions.push(if HIGH_RISK_JURISDICTIONS.contains(&country.as_str()) {
        dimension(
            "jurisdiction",
            HIGH_RISK_JURISDICTION_POINTS,
            format!("High-risk jurisdiction {country}"),
        )
    } else if MEDIUM_RISK_JURISDICTIONS.contains(&country.as_str()) {
        dimension(
            "jurisdiction",
            MEDIUM_RISK_JURISDICTION_POINTS,
            format!("Elevated-risk jurisdiction {country}"),
        )
    } else {
        dimension(
            "jurisdiction",
            STANDARD_JURISDICTION_POINTS,
            format!("Standard jurisdiction {country}"),
        )
    });

    let income = customer.annual_declared_income;
    if income <= 0.0 {
        dimensions.push(dimension("income", NO_INCOME_POINTS, "No declared income"));
    } else if income < LOW_INCOME_CEILING {
        dimensions.push(dimension(
            "income",
            LOW_INCOME_POINTS,
            format!("Low declared income {income:.0}"),
        ));
    }

    let score = dimensions.iter().map(|d| d.points).sum::<f64>().min(100.0);
    let level = if score >= HIGH_LEVEL_FLOOR {
        RiskLevel::High
    } else if score >= MEDIUM_LEVEL_FLOOR {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    KycProfile {
        customer_id: customer.customer_id.clone(),
        score,
        level,
        dimensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(country: &str, is_pep: bool, income: f64) -> Customer {
        Customer {
            id: "c-1".into(),
            customer_id: "CUST-1".into(),
            name: "Test Customer".into(),
            country: country.into(),
            is_pep,
            annual_declared_income: income,
        }
    }

    #[test]
    fn pep_in_sanctioned_country_is_high() {
        let profile = evaluate_customer(&customer("IR", true, 120_000.0));
        assert_eq!(profile.score, 80.0);
        assert_eq!(profile.level, RiskLevel::High);
    }

    #[test]
    fn ordinary_customer_is_low() {
        let profile = evaluate_customer(&customer("DE", false, 60_000.0));
        assert_eq!(profile.score, 15.0);
        assert_eq!(profile.level, RiskLevel::Low);
        assert_eq!(profile.dimensions.len(), 2);
    }

    #[test]
    fn medium_floor_is_inclusive() {
        // 10 + 15 + 20
        let profile = evaluate_customer(&customer("ae", false, 0.0));
        assert_eq!(profile.score, 45.0);
        assert_eq!(profile.level, RiskLevel::Medium);
    }
}
