//! Risk detection and case correlation core.
//!
//! Transactions are scored against weighted indicators, alert-worthy ones
//! grouped into per-account cases, linked by correlation, banded by policy
//! and finally sealed for tamper evidence.

pub mod case_management;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod kyc;
pub mod policy;
pub mod risk_engine;
pub mod rules;
pub mod sealed_case;
pub mod store;
pub mod types;
