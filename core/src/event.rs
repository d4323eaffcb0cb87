//! Case timeline events.
//!
//! RULE: every case mutation appends exactly one event. The log is
//! append-only and read back in insertion order.

use crate::{
    domain::{Band, CaseStatus, Priority},
    error::EngineResult,
    types::{EntityId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    CaseOpened {
        case_id: EntityId,
        account_id: EntityId,
        priority: Priority,
    },
    AlertAttached {
        case_id: EntityId,
        alert_id: EntityId,
        score: f64,
    },
    CaseStatusChanged {
        case_id: EntityId,
        from: CaseStatus,
        to: CaseStatus,
    },
    NoteAdded {
        case_id: EntityId,
        author: String,
    },
    BandChanged {
        case_id: EntityId,
        from: Option<Band>,
        to: Band,
        triggered: Vec<String>,
    },
    CaseSealed {
        case_id: EntityId,
        sealed_by: String,
        merkle_root: String,
    },
    SealVerified {
        case_id: EntityId,
        intact: bool,
    },
}

impl DetectionEvent {
    pub fn case_id(&self) -> &str {
        match self {
            DetectionEvent::CaseOpened { case_id, .. }
            | DetectionEvent::AlertAttached { case_id, .. }
            | DetectionEvent::CaseStatusChanged { case_id, .. }
            | DetectionEvent::NoteAdded { case_id, .. }
            | DetectionEvent::BandChanged { case_id, .. }
            | DetectionEvent::CaseSealed { case_id, .. }
            | DetectionEvent::SealVerified { case_id, .. } => case_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DetectionEvent::CaseOpened { .. } => "case_opened",
            DetectionEvent::AlertAttached { .. } => "alert_attached",
            DetectionEvent::CaseStatusChanged { .. } => "case_status_changed",
            DetectionEvent::NoteAdded { .. } => "note_added",
            DetectionEvent::BandChanged { .. } => "band_changed",
            DetectionEvent::CaseSealed { .. } => "case_sealed",
            DetectionEvent::SealVerified { .. } => "seal_verified",
        }
    }
}

/// Persisted envelope for a `DetectionEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub case_id: EntityId,
    pub event_type: String,
    pub payload: String, // JSON-serialized DetectionEvent
    pub created_at: Timestamp,
}

impl EventLogEntry {
    pub fn from_event(event: &DetectionEvent, at: Timestamp) -> EngineResult<Self> {
        Ok(Self {
            id: None,
            case_id: event.case_id().to_string(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: at,
        })
    }

    pub fn decode(&self) -> EngineResult<DetectionEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn payload_tag_matches_event_type() {
        let event = DetectionEvent::CaseStatusChanged {
            case_id: "c1".into(),
            from: CaseStatus::Open,
            to: CaseStatus::InReview,
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = EventLogEntry::from_event(&event, at).unwrap();
        let value: serde_json::Value = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(value["type"], entry.event_type.as_str());
        assert_eq!(entry.decode().unwrap(), event);
    }
}
