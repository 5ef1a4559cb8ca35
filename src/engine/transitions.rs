use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::models::alert::{Alert, AlertStatus, MIN_CLOSING_NOTE_LEN};
use crate::models::history::{AlertHistoryEntry, HistoryAction};
use crate::models::note::AlertNote;

/// A lifecycle command against a single alert.
#[derive(Debug, Clone)]
pub enum Command {
    Acknowledge {
        actor: String,
    },
    SetStatus {
        status: AlertStatus,
        actor: String,
    },
    AddNote {
        content: String,
        actor: String,
        internal: bool,
    },
    Escalate {
        target: String,
        reason: String,
        actor: String,
    },
    Close {
        notes: String,
        actor: String,
        false_positive: bool,
    },
    Resolve {
        notes: String,
        actor: String,
    },
}

/// Result of applying a command: the full post-transition alert snapshot,
/// plus the entries produced by this command (already appended to the
/// snapshot) so the repository can persist exactly the delta.
#[derive(Debug, Clone)]
pub struct Applied {
    pub alert: Alert,
    pub new_history: Vec<AlertHistoryEntry>,
    pub new_note: Option<AlertNote>,
    /// True when the command was an idempotent repeat: nothing changed,
    /// nothing to persist.
    pub no_op: bool,
}

impl Applied {
    fn no_op(alert: &Alert) -> Self {
        Self {
            alert: alert.clone(),
            new_history: Vec::new(),
            new_note: None,
            no_op: true,
        }
    }
}

/// Pure reducer: validates `command` against `alert` and returns the applied
/// snapshot, without touching any shared state and without suspending.
/// Illegal requests return a typed error and imply no mutation anywhere;
/// idempotent repeats return a no-op `Applied`.
pub fn apply(alert: &Alert, command: &Command, now: DateTime<Utc>) -> Result<Applied, EngineError> {
    match command {
        Command::Acknowledge { actor } => acknowledge(alert, actor, now),
        Command::SetStatus { status, actor } => set_status(alert, *status, actor, now),
        Command::AddNote {
            content,
            actor,
            internal,
        } => add_note(alert, content, actor, *internal, now),
        Command::Escalate {
            target,
            reason,
            actor,
        } => escalate(alert, target, reason, actor, now),
        Command::Close {
            notes,
            actor,
            false_positive,
        } => close(alert, notes, actor, *false_positive, now),
        Command::Resolve { notes, actor } => resolve(alert, notes, actor, now),
    }
}

fn acknowledge(alert: &Alert, actor: &str, now: DateTime<Utc>) -> Result<Applied, EngineError> {
    if alert.status == AlertStatus::Acknowledged {
        // Second operator clicking acknowledge loses the race quietly.
        return Ok(Applied::no_op(alert));
    }
    if alert.status != AlertStatus::New {
        return Err(EngineError::InvalidTransition {
            from: alert.status,
            to: AlertStatus::Acknowledged,
        });
    }

    let mut next = alert.clone();
    next.status = AlertStatus::Acknowledged;
    next.acknowledged_by = Some(actor.to_string());
    next.acknowledged_at = Some(now);
    let entry = AlertHistoryEntry::new(&alert.id, HistoryAction::Acknowledged, actor, now)
        .with_change(alert.status.as_str(), AlertStatus::Acknowledged.as_str());
    Ok(commit(next, vec![entry], None, now))
}

fn set_status(
    alert: &Alert,
    status: AlertStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Applied, EngineError> {
    if status == alert.status {
        return Ok(Applied::no_op(alert));
    }
    if alert.status.is_terminal() {
        return Err(EngineError::InvalidTransition {
            from: alert.status,
            to: status,
        });
    }
    match status {
        AlertStatus::Closed => {
            return Err(EngineError::ValidationFailed(
                "closing an alert requires closure notes; use close".to_string(),
            ));
        }
        AlertStatus::Resolved => {
            return Err(EngineError::ValidationFailed(
                "resolving an alert requires resolution notes; use resolve".to_string(),
            ));
        }
        AlertStatus::Escalated => {
            return Err(EngineError::ValidationFailed(
                "escalation requires a target; use escalate".to_string(),
            ));
        }
        _ => {}
    }

    let mut next = alert.clone();
    next.status = status;
    // Moving an escalated alert back to new/acknowledged is a decline: the
    // escalation is withdrawn entirely.
    if alert.status == AlertStatus::Escalated
        && matches!(status, AlertStatus::New | AlertStatus::Acknowledged)
    {
        next.escalated = false;
        next.escalated_to = None;
        next.escalated_at = None;
        next.escalation_reason = None;
    }
    let entry = AlertHistoryEntry::new(&alert.id, HistoryAction::StatusChanged, actor, now)
        .with_change(alert.status.as_str(), status.as_str());
    Ok(commit(next, vec![entry], None, now))
}

fn add_note(
    alert: &Alert,
    content: &str,
    actor: &str,
    internal: bool,
    now: DateTime<Utc>,
) -> Result<Applied, EngineError> {
    if content.trim().is_empty() {
        return Err(EngineError::ValidationFailed(
            "note content must not be empty".to_string(),
        ));
    }

    // Notes are accepted in every state, closed included, for record-keeping.
    let next = alert.clone();
    let note = AlertNote::new(&alert.id, actor, content, internal, now);
    let entry = AlertHistoryEntry::new(&alert.id, HistoryAction::NoteAdded, actor, now)
        .with_detail(content);
    Ok(commit(next, vec![entry], Some(note), now))
}

fn escalate(
    alert: &Alert,
    target: &str,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Applied, EngineError> {
    if alert.status == AlertStatus::Escalated {
        return Ok(Applied::no_op(alert));
    }
    if target.trim().is_empty() {
        return Err(EngineError::ValidationFailed(
            "escalation target must not be empty".to_string(),
        ));
    }
    if !matches!(
        alert.status,
        AlertStatus::New | AlertStatus::Acknowledged | AlertStatus::Investigating
    ) {
        return Err(EngineError::InvalidTransition {
            from: alert.status,
            to: AlertStatus::Escalated,
        });
    }

    let mut next = alert.clone();
    next.status = AlertStatus::Escalated;
    next.escalated = true;
    next.escalated_to = Some(target.to_string());
    next.escalated_at = Some(now);
    next.escalation_reason = Some(reason.to_string());
    let entry = AlertHistoryEntry::new(&alert.id, HistoryAction::Escalated, actor, now)
        .with_change(alert.status.as_str(), AlertStatus::Escalated.as_str())
        .with_detail(&format!("to {}: {}", target, reason));
    Ok(commit(next, vec![entry], None, now))
}

fn close(
    alert: &Alert,
    notes: &str,
    actor: &str,
    false_positive: bool,
    now: DateTime<Utc>,
) -> Result<Applied, EngineError> {
    if alert.status == AlertStatus::Closed {
        // closed_at is set at most once; re-closing never overwrites it.
        return Ok(Applied::no_op(alert));
    }
    validate_closing_notes(notes)?;

    let mut next = alert.clone();
    next.status = AlertStatus::Closed;
    next.closed_by = Some(actor.to_string());
    next.closed_at = Some(now);
    if false_positive {
        next.false_positive = true;
    }
    let note = AlertNote::new(&alert.id, actor, notes, false, now);
    let note_entry = AlertHistoryEntry::new(&alert.id, HistoryAction::NoteAdded, actor, now)
        .with_detail(notes);
    let mut close_entry = AlertHistoryEntry::new(&alert.id, HistoryAction::Closed, actor, now)
        .with_change(alert.status.as_str(), AlertStatus::Closed.as_str());
    if false_positive {
        close_entry = close_entry.with_detail("false positive");
    }
    Ok(commit(next, vec![note_entry, close_entry], Some(note), now))
}

fn resolve(
    alert: &Alert,
    notes: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Applied, EngineError> {
    if alert.status == AlertStatus::Resolved {
        return Ok(Applied::no_op(alert));
    }
    if alert.status == AlertStatus::Closed {
        return Err(EngineError::InvalidTransition {
            from: alert.status,
            to: AlertStatus::Resolved,
        });
    }
    validate_closing_notes(notes)?;

    let mut next = alert.clone();
    next.status = AlertStatus::Resolved;
    next.resolved_by = Some(actor.to_string());
    next.resolved_at = Some(now);
    let note = AlertNote::new(&alert.id, actor, notes, false, now);
    let note_entry = AlertHistoryEntry::new(&alert.id, HistoryAction::NoteAdded, actor, now)
        .with_detail(notes);
    let resolve_entry = AlertHistoryEntry::new(&alert.id, HistoryAction::Resolved, actor, now)
        .with_change(alert.status.as_str(), AlertStatus::Resolved.as_str());
    Ok(commit(next, vec![note_entry, resolve_entry], Some(note), now))
}

fn validate_closing_notes(notes: &str) -> Result<(), EngineError> {
    if notes.trim().chars().count() < MIN_CLOSING_NOTE_LEN {
        return Err(EngineError::ValidationFailed(format!(
            "closing notes must be at least {} characters",
            MIN_CLOSING_NOTE_LEN
        )));
    }
    Ok(())
}

/// Appends the produced entries to the snapshot and bumps `updated_at`.
/// `updated_at` never moves backwards, even if `now` lags a remote echo.
fn commit(
    mut alert: Alert,
    new_history: Vec<AlertHistoryEntry>,
    new_note: Option<AlertNote>,
    now: DateTime<Utc>,
) -> Applied {
    alert.history.extend(new_history.iter().cloned());
    if let Some(note) = &new_note {
        alert.notes.push(note.clone());
    }
    if now > alert.updated_at {
        alert.updated_at = now;
    }
    Applied {
        alert,
        new_history,
        new_note,
        no_op: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::{AlertType, Severity};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn sample_alert(id: &str, status: AlertStatus) -> Alert {
        let t = Utc::now() - Duration::hours(1);
        Alert {
            id: id.to_string(),
            alert_type: AlertType::Speeding,
            severity: Severity::High,
            status,
            title: "Speeding detected".to_string(),
            vehicle_id: "veh-1".to_string(),
            vehicle_registration: "ABC-123".to_string(),
            driver_id: "drv-1".to_string(),
            driver_name: "J. Doe".to_string(),
            timestamp: t,
            location: None,
            screenshots: Vec::new(),
            video_clips: Vec::new(),
            assigned_to: None,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            closed_by: None,
            closed_at: None,
            escalated: false,
            escalated_to: None,
            escalated_at: None,
            escalation_reason: None,
            notes: Vec::new(),
            history: Vec::new(),
            requires_action: true,
            auto_resolved: false,
            false_positive: false,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn acknowledge_from_new() {
        let alert = sample_alert("A1", AlertStatus::New);
        let now = Utc::now();
        let applied = apply(
            &alert,
            &Command::Acknowledge {
                actor: "op-1".to_string(),
            },
            now,
        )
        .unwrap();
        assert!(!applied.no_op);
        assert_eq!(applied.alert.status, AlertStatus::Acknowledged);
        assert_eq!(applied.alert.acknowledged_by.as_deref(), Some("op-1"));
        assert_eq!(applied.alert.acknowledged_at, Some(now));
        assert_eq!(applied.alert.history.len(), 1);
        assert_eq!(applied.alert.history[0].action, HistoryAction::Acknowledged);
    }

    #[test]
    fn acknowledge_twice_is_a_no_op() {
        let alert = sample_alert("A1", AlertStatus::New);
        let t1 = Utc::now();
        let first = apply(
            &alert,
            &Command::Acknowledge {
                actor: "op-1".to_string(),
            },
            t1,
        )
        .unwrap();
        let second = apply(
            &first.alert,
            &Command::Acknowledge {
                actor: "op-2".to_string(),
            },
            t1 + Duration::seconds(2),
        )
        .unwrap();
        assert!(second.no_op);
        assert_eq!(second.alert.acknowledged_by.as_deref(), Some("op-1"));
        assert_eq!(second.alert.acknowledged_at, Some(t1));
        assert_eq!(second.alert.history.len(), 1);
    }

    #[test]
    fn acknowledge_from_investigating_is_invalid() {
        let alert = sample_alert("A1", AlertStatus::Investigating);
        let err = apply(
            &alert,
            &Command::Acknowledge {
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn escalate_scenario() {
        // {id:"A1", type:speeding, severity:high, status:new} escalated by op-1.
        let alert = sample_alert("A1", AlertStatus::New);
        let applied = apply(
            &alert,
            &Command::Escalate {
                target: "mgr-1".to_string(),
                reason: "urgent review".to_string(),
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Escalated);
        assert!(applied.alert.escalated);
        assert_eq!(applied.alert.escalated_to.as_deref(), Some("mgr-1"));
        assert_eq!(applied.alert.escalation_reason.as_deref(), Some("urgent review"));
        assert_eq!(applied.new_history.len(), 1);
        assert_eq!(applied.new_history[0].action, HistoryAction::Escalated);
    }

    #[test]
    fn escalate_already_escalated_is_a_no_op() {
        let mut alert = sample_alert("A1", AlertStatus::Escalated);
        alert.escalated = true;
        alert.escalated_to = Some("mgr-1".to_string());
        let applied = apply(
            &alert,
            &Command::Escalate {
                target: "mgr-2".to_string(),
                reason: "again".to_string(),
                actor: "op-2".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert!(applied.no_op);
        assert_eq!(applied.alert.escalated_to.as_deref(), Some("mgr-1"));
    }

    #[test]
    fn escalate_requires_target() {
        let alert = sample_alert("A1", AlertStatus::New);
        let err = apply(
            &alert,
            &Command::Escalate {
                target: "  ".to_string(),
                reason: "x".to_string(),
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed(_)));
    }

    #[test]
    fn escalate_from_resolved_is_invalid() {
        let alert = sample_alert("A1", AlertStatus::Resolved);
        let err = apply(
            &alert,
            &Command::Escalate {
                target: "mgr-1".to_string(),
                reason: "late".to_string(),
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn close_rejects_empty_and_short_notes() {
        let alert = sample_alert("A2", AlertStatus::Investigating);
        for notes in ["", "short"] {
            let err = apply(
                &alert,
                &Command::Close {
                    notes: notes.to_string(),
                    actor: "op-1".to_string(),
                    false_positive: false,
                },
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::ValidationFailed(_)));
        }
    }

    #[test]
    fn close_from_investigating_scenario() {
        let alert = sample_alert("A2", AlertStatus::Investigating);
        let applied = apply(
            &alert,
            &Command::Close {
                notes: "Driver counselled; case closed.".to_string(),
                actor: "op-1".to_string(),
                false_positive: false,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Closed);
        assert!(applied.alert.closed_at.is_some());
        assert_eq!(applied.alert.notes.len(), 1);
        // Note first, closure second.
        assert_eq!(applied.new_history.len(), 2);
        assert_eq!(applied.new_history[0].action, HistoryAction::NoteAdded);
        assert_eq!(applied.new_history[1].action, HistoryAction::Closed);
    }

    #[test]
    fn close_directly_from_new_marks_false_positive() {
        let alert = sample_alert("A3", AlertStatus::New);
        let applied = apply(
            &alert,
            &Command::Close {
                notes: "False alert, camera glare.".to_string(),
                actor: "op-1".to_string(),
                false_positive: true,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Closed);
        assert!(applied.alert.false_positive);
    }

    #[test]
    fn reclose_is_a_no_op_and_never_overwrites_closed_at() {
        let alert = sample_alert("A2", AlertStatus::Investigating);
        let t1 = Utc::now();
        let closed = apply(
            &alert,
            &Command::Close {
                notes: "Driver counselled; case closed.".to_string(),
                actor: "op-1".to_string(),
                false_positive: false,
            },
            t1,
        )
        .unwrap();
        let again = apply(
            &closed.alert,
            &Command::Close {
                notes: "Closing once more for luck.".to_string(),
                actor: "op-2".to_string(),
                false_positive: false,
            },
            t1 + Duration::minutes(5),
        )
        .unwrap();
        assert!(again.no_op);
        assert_eq!(again.alert.closed_at, Some(t1));
        assert_eq!(again.alert.closed_by.as_deref(), Some("op-1"));
    }

    #[test]
    fn resolve_from_escalated() {
        let mut alert = sample_alert("A4", AlertStatus::Escalated);
        alert.escalated = true;
        let applied = apply(
            &alert,
            &Command::Resolve {
                notes: "Reviewed by manager, training assigned.".to_string(),
                actor: "mgr-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Resolved);
        assert!(applied.alert.resolved_at.is_some());
        // Moving past escalated does not reset the historical flag.
        assert!(applied.alert.escalated);
        assert_eq!(applied.new_history.len(), 2);
        assert_eq!(applied.new_history[1].action, HistoryAction::Resolved);
    }

    #[test]
    fn resolve_from_closed_is_invalid() {
        let alert = sample_alert("A4", AlertStatus::Closed);
        let err = apply(
            &alert,
            &Command::Resolve {
                notes: "Too late to resolve this.".to_string(),
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn set_status_records_old_and_new_value() {
        let alert = sample_alert("A5", AlertStatus::Acknowledged);
        let applied = apply(
            &alert,
            &Command::SetStatus {
                status: AlertStatus::Investigating,
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Investigating);
        let entry = &applied.new_history[0];
        assert_eq!(entry.action, HistoryAction::StatusChanged);
        assert_eq!(entry.old_value.as_deref(), Some("acknowledged"));
        assert_eq!(entry.new_value.as_deref(), Some("investigating"));
    }

    #[test]
    fn set_status_rejects_closure_and_resolution_without_notes() {
        let alert = sample_alert("A5", AlertStatus::Investigating);
        for target in [AlertStatus::Closed, AlertStatus::Resolved, AlertStatus::Escalated] {
            let err = apply(
                &alert,
                &Command::SetStatus {
                    status: target,
                    actor: "op-1".to_string(),
                },
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::ValidationFailed(_)));
        }
    }

    #[test]
    fn set_status_on_closed_alert_is_invalid() {
        let alert = sample_alert("A5", AlertStatus::Closed);
        let err = apply(
            &alert,
            &Command::SetStatus {
                status: AlertStatus::Investigating,
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn decline_resets_escalation_flag() {
        let mut alert = sample_alert("A6", AlertStatus::Escalated);
        alert.escalated = true;
        alert.escalated_to = Some("mgr-1".to_string());
        alert.escalated_at = Some(Utc::now());
        alert.escalation_reason = Some("urgent".to_string());
        let applied = apply(
            &alert,
            &Command::SetStatus {
                status: AlertStatus::Acknowledged,
                actor: "mgr-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Acknowledged);
        assert!(!applied.alert.escalated);
        assert!(applied.alert.escalated_to.is_none());
        assert!(applied.alert.escalation_reason.is_none());
    }

    #[test]
    fn add_note_works_on_closed_alerts() {
        let alert = sample_alert("A7", AlertStatus::Closed);
        let applied = apply(
            &alert,
            &Command::AddNote {
                content: "Insurance claim reference: 8841".to_string(),
                actor: "op-1".to_string(),
                internal: true,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.status, AlertStatus::Closed);
        assert_eq!(applied.alert.notes.len(), 1);
        assert!(applied.alert.notes[0].internal);
        assert_eq!(applied.new_history[0].action, HistoryAction::NoteAdded);
    }

    #[test]
    fn add_note_rejects_empty_content() {
        let alert = sample_alert("A7", AlertStatus::New);
        let err = apply(
            &alert,
            &Command::AddNote {
                content: "   ".to_string(),
                actor: "op-1".to_string(),
                internal: false,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed(_)));
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut alert = sample_alert("A8", AlertStatus::New);
        alert.updated_at = Utc::now() + Duration::minutes(5);
        let before = alert.updated_at;
        let applied = apply(
            &alert,
            &Command::Acknowledge {
                actor: "op-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(applied.alert.updated_at, before);
    }

    #[test]
    fn every_mutation_appends_history() {
        let alert = sample_alert("A9", AlertStatus::New);
        let now = Utc::now();
        let a = apply(
            &alert,
            &Command::Acknowledge {
                actor: "op-1".to_string(),
            },
            now,
        )
        .unwrap();
        let b = apply(
            &a.alert,
            &Command::SetStatus {
                status: AlertStatus::Investigating,
                actor: "op-1".to_string(),
            },
            now,
        )
        .unwrap();
        let c = apply(
            &b.alert,
            &Command::Resolve {
                notes: "Checked the footage, no risk.".to_string(),
                actor: "op-1".to_string(),
            },
            now,
        )
        .unwrap();
        // acknowledged + status_changed + note_added + resolved
        assert_eq!(c.alert.history.len(), 4);
        let actions: Vec<_> = c.alert.history.iter().map(|h| h.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Acknowledged,
                HistoryAction::StatusChanged,
                HistoryAction::NoteAdded,
                HistoryAction::Resolved,
            ]
        );
    }
}
