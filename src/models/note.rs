use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A note on an alert. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNote {
    pub id: Uuid,
    pub alert_id: String,
    pub author: String,
    pub content: String,
    /// Internal notes are hidden from customer-facing exports.
    #[serde(default)]
    pub internal: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertNote {
    pub fn new(
        alert_id: &str,
        author: &str,
        content: &str,
        internal: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id: alert_id.to_string(),
            author: author.to_string(),
            content: content.to_string(),
            internal,
            created_at,
        }
    }
}
