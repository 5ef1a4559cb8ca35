use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use super::query::AlertFilter;
use super::AlertEngine;
use crate::error::EngineError;
use crate::models::alert::Alert;

/// Reconciles a locally-held and a remotely-fetched version of the same
/// alert. The newer `updated_at` wins; a tie goes to the remote side, which
/// is store-authoritative, so repeated deliveries converge. Append-only
/// collections never shrink: a store echo that lags locally-appended notes
/// or history keeps the longer local copy.
pub fn merge(local: &Alert, remote: Alert) -> Alert {
    if remote.updated_at < local.updated_at {
        return local.clone();
    }
    let mut merged = remote;
    if local.history.len() > merged.history.len() {
        merged.history = local.history.clone();
    }
    if local.notes.len() > merged.notes.len() {
        merged.notes = local.notes.clone();
    }
    merged
}

/// Folds one remote record into the set. Known ids merge in place; unknown
/// ids are prepended (newest-first presentation order) and counted unread.
pub(super) fn integrate(alerts: &mut Vec<Alert>, remote: Alert, unread: &mut u64) {
    match alerts.iter_mut().find(|a| a.id == remote.id) {
        Some(local) => *local = merge(local, remote),
        None => {
            alerts.insert(0, remote);
            *unread += 1;
        }
    }
}

/// Periodic full refresh from the Alert Store. Each tick is a fresh,
/// independent attempt; a failure keeps the last-known-good set and is
/// reported through the engine's error state.
pub struct SyncEngine {
    engine: Arc<AlertEngine>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl SyncEngine {
    pub fn new(engine: Arc<AlertEngine>, interval: Duration, fetch_timeout: Duration) -> Self {
        Self {
            engine,
            interval,
            fetch_timeout,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                warn!("alert refresh failed: {}", e);
            }
        }
    }

    pub async fn refresh_once(&self) -> Result<(), EngineError> {
        let repo = self.engine.repository();
        let fetched = match timeout(self.fetch_timeout, repo.list_alerts(&AlertFilter::default()))
            .await
        {
            Ok(Ok(alerts)) => alerts,
            Ok(Err(e)) => {
                self.engine.record_refresh_failure(&e).await;
                return Err(e);
            }
            Err(_) => {
                let e = EngineError::StoreUnavailable(format!(
                    "refresh timed out after {:?}",
                    self.fetch_timeout
                ));
                self.engine.record_refresh_failure(&e).await;
                return Err(e);
            }
        };
        self.engine.apply_refresh(fetched).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine_with, sample_alert};
    use crate::models::alert::{AlertStatus, AlertType, Severity};
    use crate::models::note::AlertNote;
    use chrono::{Duration as ChronoDuration, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn strictly_newer_remote_replaces_local_field_for_field() {
        let local = sample_alert("A1", AlertType::Speeding, Severity::High);
        let mut remote = local.clone();
        remote.status = AlertStatus::Acknowledged;
        remote.acknowledged_by = Some("op-9".to_string());
        remote.updated_at = local.updated_at + ChronoDuration::seconds(5);

        let merged = merge(&local, remote.clone());
        assert_eq!(merged, remote);
    }

    #[test]
    fn newer_local_survives_a_stale_echo() {
        let mut local = sample_alert("A1", AlertType::Speeding, Severity::High);
        local.status = AlertStatus::Acknowledged;
        local.updated_at = Utc::now();
        let mut stale = sample_alert("A1", AlertType::Speeding, Severity::High);
        stale.updated_at = local.updated_at - ChronoDuration::seconds(30);

        let merged = merge(&local, stale);
        assert_eq!(merged, local);
    }

    #[test]
    fn equal_timestamps_resolve_in_favor_of_the_remote() {
        let local = sample_alert("A1", AlertType::Speeding, Severity::High);
        let mut remote = local.clone();
        remote.assigned_to = Some("op-3".to_string());

        let merged = merge(&local, remote.clone());
        assert_eq!(merged.assigned_to, remote.assigned_to);
    }

    #[test]
    fn merge_never_shrinks_history_or_notes() {
        let mut local = sample_alert("A1", AlertType::Speeding, Severity::High);
        let now = Utc::now();
        local.notes.push(AlertNote::new("A1", "op-1", "looking into it", true, now));
        local
            .history
            .push(crate::models::history::AlertHistoryEntry::new(
                "A1",
                crate::models::history::HistoryAction::NoteAdded,
                "op-1",
                now,
            ));

        // Remote is newer but its echo lags the appended collections.
        let mut remote = sample_alert("A1", AlertType::Speeding, Severity::High);
        remote.updated_at = local.updated_at + ChronoDuration::seconds(1);
        remote.notes.clear();
        remote.history.clear();

        let merged = merge(&local, remote);
        assert_eq!(merged.history.len(), 1);
        assert_eq!(merged.notes.len(), 1);
    }

    #[tokio::test]
    async fn unknown_alerts_prepend_and_bump_the_unread_counter() {
        let (engine, _repo) = engine_with(Vec::new());
        let older = sample_alert("A1", AlertType::Speeding, Severity::High);
        let newer = sample_alert("A2", AlertType::Drowsiness, Severity::Critical);

        engine.apply_remote(older).await;
        engine.apply_remote(newer).await;

        let alerts = engine.alerts().await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, "A2");
        assert_eq!(engine.unread_count().await, 2);

        engine.mark_all_read().await;
        assert_eq!(engine.unread_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_push_delivery_is_idempotent() {
        let (engine, _repo) = engine_with(Vec::new());
        let alert = sample_alert("A1", AlertType::Speeding, Severity::High);

        engine.apply_remote(alert.clone()).await;
        engine.apply_remote(alert.clone()).await;
        engine.apply_remote(alert).await;

        assert_eq!(engine.alerts().await.len(), 1);
        assert_eq!(engine.unread_count().await, 1);
    }

    #[tokio::test]
    async fn out_of_order_delivery_converges_on_the_newest_version() {
        let (engine, _repo) = engine_with(Vec::new());
        let v1 = sample_alert("A1", AlertType::Speeding, Severity::High);
        let mut v2 = v1.clone();
        v2.status = AlertStatus::Acknowledged;
        v2.updated_at = v1.updated_at + ChronoDuration::seconds(10);

        // Newest first, stale second.
        engine.apply_remote(v2.clone()).await;
        engine.apply_remote(v1).await;

        let stored = engine.get("A1").await.unwrap();
        assert_eq!(stored.status, AlertStatus::Acknowledged);
        assert_eq!(stored.updated_at, v2.updated_at);
    }

    #[tokio::test]
    async fn local_command_result_is_authoritative_until_outdated() {
        let alert = sample_alert("A1", AlertType::Speeding, Severity::High);
        let (engine, _repo) = engine_with(vec![alert.clone()]);
        engine.apply_refresh(vec![alert.clone()]).await;

        let acked = engine.acknowledge("A1", "op-1").await.unwrap();

        // A periodic refresh echoing the pre-command version must not revert
        // the optimistic update.
        engine.apply_refresh(vec![alert]).await;
        let stored = engine.get("A1").await.unwrap();
        assert_eq!(stored.status, AlertStatus::Acknowledged);
        assert_eq!(stored.updated_at, acked.updated_at);
    }

    #[tokio::test]
    async fn failed_refresh_retains_last_known_good_set() {
        let alert = sample_alert("A1", AlertType::Speeding, Severity::High);
        let (engine, repo) = engine_with(vec![alert]);
        let sync = SyncEngine::new(
            engine.clone(),
            Duration::from_secs(30),
            Duration::from_secs(5),
        );

        sync.refresh_once().await.unwrap();
        assert_eq!(engine.alerts().await.len(), 1);
        assert!(engine.last_refresh_error().await.is_none());

        repo.set_fail(true);
        let err = sync.refresh_once().await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert_eq!(engine.alerts().await.len(), 1);
        assert!(engine.last_refresh_error().await.is_some());

        // Next tick is a fresh attempt; success clears the error state.
        repo.set_fail(false);
        sync.refresh_once().await.unwrap();
        assert!(engine.last_refresh_error().await.is_none());
    }
}
