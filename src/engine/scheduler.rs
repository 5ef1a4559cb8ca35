use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{AlertEngine, SYSTEM_ACTOR};
use crate::models::alert::{Alert, AlertType, Severity};
use crate::models::escalation::EscalationRule;

/// Reason recorded on rule-driven escalations.
pub const AUTO_ESCALATION_REASON: &str = "automatic: threshold exceeded";

/// Whether an alert has sat open past the unattended threshold without
/// anyone escalating it. Pure in `(now, alert)`; recomputed on every query
/// rather than waiting for a scheduler tick. The boundary is inclusive.
pub fn is_unattended(now: DateTime<Utc>, alert: &Alert, threshold_hours: i64) -> bool {
    alert.status.is_open()
        && !alert.escalated
        && alert.age(now) >= chrono::Duration::hours(threshold_hours)
}

/// Periodically walks the open alerts and escalates those whose age crossed
/// the matching rule's threshold. Automatic and manual escalation converge
/// on the same engine operation, so the audit trail reads the same either
/// way.
pub struct EscalationScheduler {
    engine: Arc<AlertEngine>,
    rules: HashMap<(AlertType, Severity), EscalationRule>,
    check_interval: Duration,
}

impl EscalationScheduler {
    pub fn new(
        engine: Arc<AlertEngine>,
        rules: Vec<EscalationRule>,
        check_interval: Duration,
    ) -> Self {
        let rules = rules.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            engine,
            rules,
            check_interval,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let escalated = self.tick(Utc::now()).await;
            if !escalated.is_empty() {
                info!("auto-escalated {} alerts: {:?}", escalated.len(), escalated);
            }
        }
    }

    /// One evaluation pass. Returns the ids escalated on this pass. Store
    /// failures on individual alerts are logged and skipped; the next tick
    /// is a fresh attempt.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<String> {
        let snapshot = self.engine.alerts().await;
        let mut escalated = Vec::new();

        for alert in snapshot {
            if !alert.status.is_open() || alert.escalated {
                continue;
            }
            let rule = match self.rules.get(&(alert.alert_type, alert.severity)) {
                Some(rule) => rule,
                None => continue,
            };
            let age_minutes = alert.age(now).num_minutes();
            if age_minutes < rule.time_threshold_minutes {
                continue;
            }
            let target = match rule.notify.first() {
                Some(target) => target,
                None => continue,
            };
            match self
                .engine
                .escalate(&alert.id, target, AUTO_ESCALATION_REASON, SYSTEM_ACTOR)
                .await
            {
                Ok(_) => escalated.push(alert.id),
                Err(e) => warn!("auto-escalation of {} failed: {}", alert.id, e),
            }
        }
        escalated
    }
}
