use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::scheduler::is_unattended;
use crate::models::alert::{Alert, AlertStatus, AlertType, Severity};

/// Conjunctive filter over the in-memory alert set. Every predicate is
/// optional; an empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub statuses: Vec<AlertStatus>,
    #[serde(default)]
    pub severities: Vec<Severity>,
    #[serde(default)]
    pub alert_types: Vec<AlertType>,
    #[serde(default)]
    pub vehicle_ids: Vec<String>,
    #[serde(default)]
    pub driver_ids: Vec<String>,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// Status is `escalated` or the historical escalated flag is set.
    #[serde(default)]
    pub escalated_only: bool,
    #[serde(default)]
    pub requires_action_only: bool,
    /// Inclusive bounds on the triggering event timestamp.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match against title, vehicle registration,
    /// driver name and alert id.
    pub search: Option<String>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&alert.status) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&alert.severity) {
            return false;
        }
        if !self.alert_types.is_empty() && !self.alert_types.contains(&alert.alert_type) {
            return false;
        }
        if !self.vehicle_ids.is_empty() && !self.vehicle_ids.contains(&alert.vehicle_id) {
            return false;
        }
        if !self.driver_ids.is_empty() && !self.driver_ids.contains(&alert.driver_id) {
            return false;
        }
        if !self.assigned_to.is_empty() {
            match &alert.assigned_to {
                Some(assignee) if self.assigned_to.contains(assignee) => {}
                _ => return false,
            }
        }
        if self.escalated_only && alert.status != AlertStatus::Escalated && !alert.escalated {
            return false;
        }
        if self.requires_action_only && !alert.requires_action {
            return false;
        }
        if let Some(from) = self.from {
            if alert.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if alert.timestamp > to {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !needle.is_empty() {
                let hit = alert.title.to_lowercase().contains(&needle)
                    || alert.vehicle_registration.to_lowercase().contains(&needle)
                    || alert.driver_name.to_lowercase().contains(&needle)
                    || alert.id.to_lowercase().contains(&needle);
                if !hit {
                    return false;
                }
            }
        }
        true
    }
}

/// Statistics derived on demand from an alert set. Never cached across
/// mutations; callers recompute per query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertStatistics {
    /// Non-terminal alerts (anything not resolved/closed), all severities.
    pub total_alerts: usize,
    pub critical_alerts: usize,
    pub high_alerts: usize,
    pub medium_alerts: usize,
    pub low_alerts: usize,
    pub info_alerts: usize,
    pub escalated_alerts: usize,
    pub unattended_alerts: usize,
    /// Resolved/closed on the current local calendar day, not a rolling 24h.
    pub resolved_today: usize,
    pub closed_today: usize,
    /// Counts grouped by vehicle/driver, descending, ties broken by key.
    pub by_vehicle: Vec<(String, usize)>,
    pub by_driver: Vec<(String, usize)>,
}

impl AlertStatistics {
    pub fn derive(alerts: &[Alert], now: DateTime<Utc>, unattended_threshold_hours: i64) -> Self {
        let mut stats = AlertStatistics::default();
        let today = now.with_timezone(&Local).date_naive();
        let mut by_vehicle: HashMap<String, usize> = HashMap::new();
        let mut by_driver: HashMap<String, usize> = HashMap::new();

        for alert in alerts {
            *by_vehicle.entry(alert.vehicle_id.clone()).or_default() += 1;
            *by_driver.entry(alert.driver_id.clone()).or_default() += 1;

            if let Some(resolved_at) = alert.resolved_at {
                if resolved_at.with_timezone(&Local).date_naive() == today {
                    stats.resolved_today += 1;
                }
            }
            if let Some(closed_at) = alert.closed_at {
                if closed_at.with_timezone(&Local).date_naive() == today {
                    stats.closed_today += 1;
                }
            }

            if !alert.status.is_open() {
                continue;
            }
            stats.total_alerts += 1;
            match alert.severity {
                Severity::Critical => stats.critical_alerts += 1,
                Severity::High => stats.high_alerts += 1,
                Severity::Medium => stats.medium_alerts += 1,
                Severity::Low => stats.low_alerts += 1,
                Severity::Info => stats.info_alerts += 1,
            }
            if alert.status == AlertStatus::Escalated {
                stats.escalated_alerts += 1;
            }
            if is_unattended(now, alert, unattended_threshold_hours) {
                stats.unattended_alerts += 1;
            }
        }

        stats.by_vehicle = sorted_counts(by_vehicle);
        stats.by_driver = sorted_counts(by_driver);
        stats
    }
}

fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
