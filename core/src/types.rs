//! Shared primitive types used across the detection core.

use chrono::{DateTime, Utc};

/// A stable, unique identifier for any persisted entity.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;
