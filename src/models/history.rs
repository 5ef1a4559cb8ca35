use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Acknowledged,
    StatusChanged,
    NoteAdded,
    Escalated,
    Resolved,
    Closed,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Acknowledged => "acknowledged",
            HistoryAction::StatusChanged => "status_changed",
            HistoryAction::NoteAdded => "note_added",
            HistoryAction::Escalated => "escalated",
            HistoryAction::Resolved => "resolved",
            HistoryAction::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(HistoryAction::Created),
            "acknowledged" => Some(HistoryAction::Acknowledged),
            "status_changed" => Some(HistoryAction::StatusChanged),
            "note_added" => Some(HistoryAction::NoteAdded),
            "escalated" => Some(HistoryAction::Escalated),
            "resolved" => Some(HistoryAction::Resolved),
            "closed" => Some(HistoryAction::Closed),
            _ => None,
        }
    }
}

/// One immutable entry in an alert's append-only audit trail. Every mutating
/// operation on an alert produces at least one of these; they are never
/// deleted or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    pub id: Uuid,
    pub alert_id: String,
    pub action: HistoryAction,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AlertHistoryEntry {
    pub fn new(
        alert_id: &str,
        action: HistoryAction,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id: alert_id.to_string(),
            action,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            detail: None,
            timestamp,
        }
    }

    pub fn with_change(mut self, old_value: &str, new_value: &str) -> Self {
        self.old_value = Some(old_value.to_string());
        self.new_value = Some(new_value.to_string());
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
