//! Tamper-evident case sealing.
//!
//! digest = SHA-256(canonical JSON of {case, alerts, notes})
//! leaves = [digest] + [canonical JSON of each alert]
//! root   = pairwise SHA-256 of hex-concatenated children, odd layers
//!          duplicating their last element; no leaves hashes "empty".
//!
//! Canonical JSON sorts object keys at every depth, so the same stored
//! state always yields the same digest and root.

use crate::{
    domain::{Alert, Case, CaseNote, SealRecord},
    error::EngineResult,
    event::{DetectionEvent, EventLogEntry},
    store::DetectionStore,
    types::Timestamp,
};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const EMPTY_SENTINEL: &str = "empty";

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Serialise with every object's keys in sorted order.
pub fn canonical_json<T: Serialize>(value: &T) -> EngineResult<String> {
    Ok(serde_json::to_string(&sorted(serde_json::to_value(value)?))?)
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, sorted(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return sha256_hex(EMPTY_SENTINEL.as_bytes());
    }
    let mut layer: Vec<String> = leaves.iter().map(|l| sha256_hex(l.as_bytes())).collect();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            if let Some(last) = layer.last().cloned() {
                layer.push(last);
            }
        }
        layer = layer
            .chunks(2)
            .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1]).as_bytes()))
            .collect();
    }
    layer.swap_remove(0)
}

/// Digest and Merkle root of a case's current stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFingerprint {
    pub digest: String,
    pub merkle_root: String,
}

#[derive(Serialize)]
struct SealDocument<'a> {
    case: &'a Case,
    alerts: &'a [Alert],
    notes: &'a [CaseNote],
}

/// `None` when the case does not exist.
pub fn fingerprint<S: DetectionStore>(
    store: &S,
    case_id: &str,
) -> EngineResult<Option<CaseFingerprint>> {
    let Some(case) = store.get_case(case_id)? else {
        return Ok(None);
    };
    let alerts = store.alerts_for_case(case_id)?;
    let notes = store.case_notes(case_id)?;

    let digest = sha256_hex(
        canonical_json(&SealDocument {
            case: &case,
            alerts: &alerts,
            notes: &notes,
        })?
        .as_bytes(),
    );
    let mut leaves = Vec::with_capacity(alerts.len() + 1);
    leaves.push(digest.clone());
    for alert in &alerts {
        leaves.push(canonical_json(alert)?);
    }
    Ok(Some(CaseFingerprint {
        merkle_root: merkle_root(&leaves),
        digest,
    }))
}

/// Seal a case, replacing any earlier seal. `None` when the case is unknown.
pub fn seal_case<S: DetectionStore>(
    store: &S,
    case_id: &str,
    sealed_by: &str,
    reason: Option<&str>,
    now: Timestamp,
) -> EngineResult<Option<SealRecord>> {
    let Some(case) = store.get_case(case_id)? else {
        return Ok(None);
    };
    if !case.status.is_closed() {
        log::warn!("Sealing case {case_id} while it is still {}", case.status);
    }
    let Some(print) = fingerprint(store, case_id)? else {
        return Ok(None);
    };

    let record = SealRecord {
        case_id: case_id.to_string(),
        hash: print.digest,
        merkle_root: print.merkle_root,
        sealed_by: sealed_by.to_string(),
        seal_reason: reason.map(str::to_string),
        sealed_at: now,
    };
    store.seal_case(&record)?;
    store.append_event(&EventLogEntry::from_event(
        &DetectionEvent::CaseSealed {
            case_id: record.case_id.clone(),
            sealed_by: record.sealed_by.clone(),
            merkle_root: record.merkle_root.clone(),
        },
        now,
    )?)?;
    log::info!("Sealed case {case_id} root={}", record.merkle_root);
    Ok(Some(record))
}

/// Recompute the root from current storage and compare. `false` when the
/// case was never sealed or no longer exists.
pub fn verify_seal<S: DetectionStore>(
    store: &S,
    case_id: &str,
    now: Timestamp,
) -> EngineResult<bool> {
    let Some(record) = store.sealed_case(case_id)? else {
        return Ok(false);
    };
    let intact = match fingerprint(store, case_id)? {
        Some(print) => print.merkle_root == record.merkle_root,
        None => false,
    };
    if !intact {
        log::warn!("Seal mismatch on case {case_id}");
    }
    store.append_event(&EventLogEntry::from_event(
        &DetectionEvent::SealVerified {
            case_id: case_id.to_string(),
            intact,
        },
        now,
    )?)?;
    Ok(intact)
}
