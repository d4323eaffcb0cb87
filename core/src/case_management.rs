//! Case lifecycle: OPEN → IN_REVIEW → ESCALATED → CLOSED.
//!
//! RULE: at most one non-closed case per account. `attach_alert` finds that
//! case or opens it. CLOSED is terminal; nothing here moves a case back.
//!
//! The store is the source of truth. The account → open case index is a
//! lookup cache only; every hit is re-read and verified, and closing a case
//! evicts its entry.

use crate::{
    clock::EngineClock,
    domain::{Alert, AlertStatus, Case, CaseLabel, CaseNote, CaseStatus, Priority},
    error::{EngineError, EngineResult},
    event::{DetectionEvent, EventLogEntry},
    policy::PolicyResult,
    store::DetectionStore,
    types::{EntityId, Timestamp},
};
use std::collections::HashMap;
use uuid::Uuid;

/// An OPEN case with this many alerts moves to IN_REVIEW.
pub const REVIEW_ALERT_COUNT: usize = 3;

pub struct CaseManagementService<'s, S: DetectionStore> {
    store: &'s S,
    clock: EngineClock,
    open_by_account: HashMap<EntityId, EntityId>,
}

impl<'s, S: DetectionStore> CaseManagementService<'s, S> {
    pub fn new(store: &'s S, clock: EngineClock) -> Self {
        Self {
            store,
            clock,
            open_by_account: HashMap::new(),
        }
    }

    pub fn set_clock(&mut self, clock: EngineClock) {
        self.clock = clock;
    }

    pub fn get_case(&self, id: &str) -> EngineResult<Option<Case>> {
        self.store.get_case(id)
    }

    pub fn list_cases(&self) -> EngineResult<Vec<Case>> {
        self.store.list_cases()
    }

    pub fn alerts_for_case(&self, id: &str) -> EngineResult<Vec<Alert>> {
        self.store.alerts_for_case(id)
    }

    /// Attach `alert` to its account's open case, opening one if needed.
    /// Returns the case as persisted after the attach.
    pub fn attach_alert(&mut self, alert: &Alert) -> EngineResult<Case> {
        let already = match &alert.case_id {
            Some(case_id) => Some(case_id.clone()),
            None => self
                .store
                .get_alert(&alert.id)?
                .and_then(|stored| stored.case_id),
        };
        if let Some(case_id) = already {
            return Err(EngineError::AlertAlreadyAttached {
                alert_id: alert.id.clone(),
                case_id,
            });
        }

        let now = self.clock.now();
        let mut case = match self.find_open_case(alert.account_id())? {
            Some(case) => case,
            None => self.open_case(alert, now)?,
        };

        case.alert_ids.push(alert.id.clone());
        case.priority = case.priority.max(alert.priority);
        case.updated_at = now;
        let previous = case.status;
        if case.status == CaseStatus::Open && case.alert_count() >= REVIEW_ALERT_COUNT {
            case.status = CaseStatus::InReview;
        }
        self.store.record_case(&case)?;

        let mut attached = alert.clone();
        attached.case_id = Some(case.id.clone());
        attached.status = AlertStatus::Attached;
        self.store.record_alert(&attached)?;

        self.emit(DetectionEvent::AlertAttached {
            case_id: case.id.clone(),
            alert_id: alert.id.clone(),
            score: alert.score,
        })?;
        if case.status != previous {
            log::info!("Case {} moved {previous} -> {}", case.id, case.status);
            self.emit(DetectionEvent::CaseStatusChanged {
                case_id: case.id.clone(),
                from: previous,
                to: case.status,
            })?;
        }
        Ok(case)
    }

    /// Attach several alerts in order. Returns the final state of every
    /// case touched, in first-touched order.
    pub fn attach_alerts(&mut self, alerts: &[Alert]) -> EngineResult<Vec<Case>> {
        let mut touched: Vec<Case> = Vec::new();
        for alert in alerts {
            let case = self.attach_alert(alert)?;
            match touched.iter_mut().find(|c| c.id == case.id) {
                Some(slot) => *slot = case,
                None => touched.push(case),
            }
        }
        Ok(touched)
    }

    /// Forces CLOSED and closes the case's alerts. Idempotent.
    /// `false` when the case is unknown.
    pub fn close_case(&mut self, id: &str) -> EngineResult<bool> {
        let Some(mut case) = self.store.get_case(id)? else {
            return Ok(false);
        };
        self.evict(&case);
        if case.status.is_closed() {
            return Ok(true);
        }

        let previous = case.status;
        case.status = CaseStatus::Closed;
        case.updated_at = self.clock.now();
        self.store.record_case(&case)?;

        for mut alert in self.store.alerts_for_case(id)? {
            alert.status = AlertStatus::Closed;
            self.store.record_alert(&alert)?;
        }

        log::info!("Case {id} closed (was {previous})");
        self.emit(DetectionEvent::CaseStatusChanged {
            case_id: case.id.clone(),
            from: previous,
            to: CaseStatus::Closed,
        })?;
        Ok(true)
    }

    /// Forces ESCALATED, optionally setting label and priority.
    /// `false` when the case is unknown or already CLOSED.
    pub fn escalate_case(
        &mut self,
        id: &str,
        label: Option<CaseLabel>,
        priority: Option<Priority>,
    ) -> EngineResult<bool> {
        let Some(mut case) = self.store.get_case(id)? else {
            return Ok(false);
        };
        if case.status.is_closed() {
            log::warn!("Refusing to escalate closed case {id}");
            return Ok(false);
        }

        let previous = case.status;
        case.status = CaseStatus::Escalated;
        if label.is_some() {
            case.label = label;
        }
        if let Some(priority) = priority {
            case.priority = priority;
        }
        case.updated_at = self.clock.now();
        self.store.record_case(&case)?;

        if previous != CaseStatus::Escalated {
            log::info!("Case {id} escalated (was {previous})");
            self.emit(DetectionEvent::CaseStatusChanged {
                case_id: case.id.clone(),
                from: previous,
                to: CaseStatus::Escalated,
            })?;
        }
        Ok(true)
    }

    /// Appends a note. Closed cases accept notes too.
    /// `false` when the case is unknown.
    pub fn add_note(&mut self, id: &str, author: &str, message: &str) -> EngineResult<bool> {
        let Some(mut case) = self.store.get_case(id)? else {
            return Ok(false);
        };
        let now = self.clock.now();
        let note = CaseNote {
            author: author.to_string(),
            message: message.to_string(),
            created_at: now,
        };
        self.store.add_case_note(id, &note)?;
        case.updated_at = now;
        self.store.record_case(&case)?;

        self.emit(DetectionEvent::NoteAdded {
            case_id: case.id,
            author: note.author,
        })?;
        Ok(true)
    }

    /// Persist a policy evaluation on the case. Writes only when band or
    /// triggers differ. `false` when the case is unknown.
    pub fn apply_policy(&mut self, id: &str, result: &PolicyResult) -> EngineResult<bool> {
        let Some(mut case) = self.store.get_case(id)? else {
            return Ok(false);
        };
        let previous = case.band;
        if previous == Some(result.band) && case.policy_triggers == result.triggered_policy_ids {
            return Ok(true);
        }

        case.band = Some(result.band);
        case.policy_triggers = result.triggered_policy_ids.clone();
        case.updated_at = self.clock.now();
        self.store.record_case(&case)?;

        if previous != Some(result.band) {
            log::info!("Case {id} band -> {}", result.band.as_str());
            self.emit(DetectionEvent::BandChanged {
                case_id: case.id,
                from: previous,
                to: result.band,
                triggered: result.triggered_policy_ids.clone(),
            })?;
        }
        Ok(true)
    }

    /// Decoded timeline events for a case, oldest first.
    pub fn timeline(&self, id: &str) -> EngineResult<Vec<DetectionEvent>> {
        self.store
            .events_for_case(id)?
            .iter()
            .map(EventLogEntry::decode)
            .collect()
    }

    // ── Internals ─────────────────────────────────────────────────

    fn find_open_case(&mut self, account_id: &str) -> EngineResult<Option<Case>> {
        if let Some(case_id) = self.open_by_account.get(account_id).cloned() {
            match self.store.get_case(&case_id)? {
                Some(case) if !case.status.is_closed() && case.account_id == account_id => {
                    return Ok(Some(case));
                }
                _ => {
                    self.open_by_account.remove(account_id);
                }
            }
        }
        let case = self.store.open_case_for_account(account_id)?;
        if let Some(case) = &case {
            self.open_by_account
                .insert(account_id.to_string(), case.id.clone());
        }
        Ok(case)
    }

    fn open_case(&mut self, alert: &Alert, now: Timestamp) -> EngineResult<Case> {
        let case = Case::new(
            Uuid::new_v4().to_string(),
            alert.account_id().to_string(),
            alert.priority,
            now,
        );
        self.store.record_case(&case)?;
        self.open_by_account
            .insert(case.account_id.clone(), case.id.clone());
        log::info!("Opened case {} for account {}", case.id, case.account_id);
        self.emit(DetectionEvent::CaseOpened {
            case_id: case.id.clone(),
            account_id: case.account_id.clone(),
            priority: case.priority,
        })?;
        Ok(case)
    }

    fn evict(&mut self, case: &Case) {
        if self.open_by_account.get(&case.account_id) == Some(&case.id) {
            self.open_by_account.remove(&case.account_id);
        }
    }

    fn emit(&self, event: DetectionEvent) -> EngineResult<()> {
        self.store
            .append_event(&EventLogEntry::from_event(&event, self.clock.now())?)
    }
}
