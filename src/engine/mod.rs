use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::info;

use crate::db::repository::AlertRepository;
use crate::error::EngineError;
use crate::models::alert::{Alert, AlertStatus};

pub mod query;
pub mod scheduler;
pub mod sync;
pub mod transitions;

use query::{AlertFilter, AlertStatistics};
use transitions::{Applied, Command};

/// Actor recorded on automatically-triggered transitions.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Default)]
struct EngineState {
    /// Newest-first. Mutated only by command execution and the sync merge.
    alerts: Vec<Alert>,
    unread: u64,
    last_refresh_error: Option<String>,
    last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub alerts: Vec<Alert>,
    pub statistics: AlertStatistics,
}

/// Owns the in-memory alert set for one client session and exposes the
/// command API. Commands validate through the pure reducer, persist to the
/// store under a bounded timeout, and only then commit to the set, so a
/// failed or timed-out persist leaves the displayed state untouched.
pub struct AlertEngine {
    repo: Arc<dyn AlertRepository>,
    command_timeout: Duration,
    unattended_threshold_hours: i64,
    state: RwLock<EngineState>,
}

impl AlertEngine {
    pub fn new(
        repo: Arc<dyn AlertRepository>,
        command_timeout: Duration,
        unattended_threshold_hours: i64,
    ) -> Self {
        Self {
            repo,
            command_timeout,
            unattended_threshold_hours,
            state: RwLock::new(EngineState::default()),
        }
    }

    pub async fn acknowledge(&self, id: &str, actor: &str) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::Acknowledge {
                actor: actor.to_string(),
            },
        )
        .await
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: AlertStatus,
        actor: &str,
    ) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::SetStatus {
                status,
                actor: actor.to_string(),
            },
        )
        .await
    }

    pub async fn add_note(
        &self,
        id: &str,
        content: &str,
        actor: &str,
        internal: bool,
    ) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::AddNote {
                content: content.to_string(),
                actor: actor.to_string(),
                internal,
            },
        )
        .await
    }

    pub async fn escalate(
        &self,
        id: &str,
        target: &str,
        reason: &str,
        actor: &str,
    ) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::Escalate {
                target: target.to_string(),
                reason: reason.to_string(),
                actor: actor.to_string(),
            },
        )
        .await
    }

    pub async fn close(
        &self,
        id: &str,
        notes: &str,
        actor: &str,
        false_positive: bool,
    ) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::Close {
                notes: notes.to_string(),
                actor: actor.to_string(),
                false_positive,
            },
        )
        .await
    }

    pub async fn resolve(&self, id: &str, notes: &str, actor: &str) -> Result<Alert, EngineError> {
        self.execute(
            id,
            Command::Resolve {
                notes: notes.to_string(),
                actor: actor.to_string(),
            },
        )
        .await
    }

    /// Runs one command end to end: validate, persist, commit. Holds the
    /// write lock for the duration so a transition is atomic from every
    /// caller's point of view; the persist is bounded by the command timeout
    /// so periodic tasks are never blocked indefinitely.
    async fn execute(&self, id: &str, command: Command) -> Result<Alert, EngineError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let idx = state
            .alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let applied = transitions::apply(&state.alerts[idx], &command, now)?;
        if applied.no_op {
            return Ok(applied.alert);
        }

        self.persist(&applied).await?;
        state.alerts[idx] = applied.alert.clone();
        Ok(applied.alert)
    }

    async fn persist(&self, applied: &Applied) -> Result<(), EngineError> {
        let fut = self.repo.persist_transition(
            &applied.alert,
            &applied.new_history,
            applied.new_note.as_ref(),
        );
        match timeout(self.command_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::StoreUnavailable(format!(
                "persist timed out after {:?}",
                self.command_timeout
            ))),
        }
    }

    /// Filtered view plus statistics, both derived from the full in-memory
    /// set without mutation. Newest-first order is preserved.
    pub async fn query(&self, filter: &AlertFilter) -> QueryResult {
        let now = Utc::now();
        let state = self.state.read().await;
        let alerts: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        let statistics =
            AlertStatistics::derive(&state.alerts, now, self.unattended_threshold_hours);
        QueryResult { alerts, statistics }
    }

    pub async fn get(&self, id: &str) -> Result<Alert, EngineError> {
        let state = self.state.read().await;
        state
            .alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Open alerts whose age crossed the unattended threshold, for the
    /// manual escalation surface.
    pub async fn unattended(&self) -> Vec<Alert> {
        let now = Utc::now();
        let state = self.state.read().await;
        state
            .alerts
            .iter()
            .filter(|a| scheduler::is_unattended(now, a, self.unattended_threshold_hours))
            .cloned()
            .collect()
    }

    /// Snapshot of the full set, newest-first.
    pub async fn alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.clone()
    }

    pub async fn unread_count(&self) -> u64 {
        self.state.read().await.unread
    }

    pub async fn mark_all_read(&self) {
        self.state.write().await.unread = 0;
    }

    pub async fn last_refresh_error(&self) -> Option<String> {
        self.state.read().await.last_refresh_error.clone()
    }

    pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refreshed_at
    }

    /// Merges a single remote alert (push delivery or store echo) into the
    /// set. Safe against duplicates and reordering.
    pub async fn apply_remote(&self, remote: Alert) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        sync::integrate(&mut state.alerts, remote, &mut state.unread);
    }

    /// Commits a successful full refresh.
    pub async fn apply_refresh(&self, remote: Vec<Alert>) {
        let count = remote.len();
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        for alert in remote {
            sync::integrate(&mut state.alerts, alert, &mut state.unread);
        }
        state.last_refresh_error = None;
        state.last_refreshed_at = Some(Utc::now());
        info!("refreshed {} alerts from store", count);
    }

    /// Records a failed refresh. The last-known-good set is retained.
    pub async fn record_refresh_failure(&self, error: &EngineError) {
        let mut state = self.state.write().await;
        state.last_refresh_error = Some(error.to_string());
    }

    pub fn repository(&self) -> Arc<dyn AlertRepository> {
        Arc::clone(&self.repo)
    }
}
