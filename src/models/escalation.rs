use serde::{Deserialize, Serialize};

use super::alert::{AlertType, Severity};

/// An escalation rule, keyed by `(alert_type, severity)`. Rules are
/// configured outside the engine and read-only here; the scheduler matches
/// open alerts against them and escalates once the age threshold is crossed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub time_threshold_minutes: i64,
    /// Roles/users to route the escalation to. The first entry is used as
    /// the escalation target on the automatic path.
    pub notify: Vec<String>,
}

impl EscalationRule {
    pub fn key(&self) -> (AlertType, Severity) {
        (self.alert_type, self.severity)
    }
}
