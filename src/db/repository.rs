use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::queries;
use super::DbPool;
use crate::engine::query::AlertFilter;
use crate::error::EngineError;
use crate::models::alert::{
    Alert, AlertStatus, AlertType, Geolocation, Screenshot, Severity, VideoClip,
};
use crate::models::escalation::EscalationRule;
use crate::models::history::{AlertHistoryEntry, HistoryAction};
use crate::models::note::AlertNote;

/// The engine's only seam to the Alert Store. Every call is an I/O boundary
/// and may suspend; validation never happens here.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, EngineError>;
    async fn get_alert(&self, id: &str) -> Result<Alert, EngineError>;
    async fn get_history(&self, id: &str) -> Result<Vec<AlertHistoryEntry>, EngineError>;
    /// Persists an applied transition: the alert's workflow fields plus the
    /// history entries (and closing/resolution note, if any) it produced,
    /// atomically.
    async fn persist_transition(
        &self,
        alert: &Alert,
        new_history: &[AlertHistoryEntry],
        new_note: Option<&AlertNote>,
    ) -> Result<(), EngineError>;
    async fn append_note(&self, note: &AlertNote) -> Result<(), EngineError>;
    async fn list_escalation_rules(&self) -> Result<Vec<EscalationRule>, EngineError>;
}

pub struct PgAlertRepository {
    pool: DbPool,
}

impl PgAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AlertRow {
    id: String,
    alert_type: String,
    severity: String,
    status: String,
    title: String,
    vehicle_id: String,
    vehicle_registration: String,
    driver_id: String,
    driver_name: String,
    timestamp: DateTime<Utc>,
    lat: Option<f64>,
    lon: Option<f64>,
    address: Option<String>,
    screenshots: Option<Json<Value>>,
    video_clips: Option<Json<Value>>,
    assigned_to: Option<String>,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    closed_by: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    escalated: bool,
    escalated_to: Option<String>,
    escalated_at: Option<DateTime<Utc>>,
    escalation_reason: Option<String>,
    requires_action: bool,
    auto_resolved: bool,
    false_positive: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AlertRow {
    fn into_alert(
        self,
        notes: Vec<AlertNote>,
        history: Vec<AlertHistoryEntry>,
    ) -> Result<Alert, EngineError> {
        let alert_type = AlertType::parse(&self.alert_type)
            .ok_or_else(|| bad_row(&self.id, "alert_type", &self.alert_type))?;
        let severity = Severity::parse(&self.severity)
            .ok_or_else(|| bad_row(&self.id, "severity", &self.severity))?;
        let status = AlertStatus::parse(&self.status)
            .ok_or_else(|| bad_row(&self.id, "status", &self.status))?;

        let location = match (self.lat, self.lon) {
            (Some(latitude), Some(longitude)) => Some(Geolocation {
                latitude,
                longitude,
                address: self.address,
            }),
            _ => None,
        };
        let screenshots: Vec<Screenshot> = self
            .screenshots
            .map(|j| serde_json::from_value(j.0))
            .transpose()
            .map_err(|e| bad_row(&self.id, "screenshots", &e.to_string()))?
            .unwrap_or_default();
        let video_clips: Vec<VideoClip> = self
            .video_clips
            .map(|j| serde_json::from_value(j.0))
            .transpose()
            .map_err(|e| bad_row(&self.id, "video_clips", &e.to_string()))?
            .unwrap_or_default();

        Ok(Alert {
            id: self.id,
            alert_type,
            severity,
            status,
            title: self.title,
            vehicle_id: self.vehicle_id,
            vehicle_registration: self.vehicle_registration,
            driver_id: self.driver_id,
            driver_name: self.driver_name,
            timestamp: self.timestamp,
            location,
            screenshots,
            video_clips,
            assigned_to: self.assigned_to,
            acknowledged_by: self.acknowledged_by,
            acknowledged_at: self.acknowledged_at,
            resolved_by: self.resolved_by,
            resolved_at: self.resolved_at,
            closed_by: self.closed_by,
            closed_at: self.closed_at,
            escalated: self.escalated,
            escalated_to: self.escalated_to,
            escalated_at: self.escalated_at,
            escalation_reason: self.escalation_reason,
            notes,
            history,
            requires_action: self.requires_action,
            auto_resolved: self.auto_resolved,
            false_positive: self.false_positive,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct NoteRow {
    id: Uuid,
    alert_id: String,
    author: String,
    content: String,
    internal: bool,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for AlertNote {
    fn from(row: NoteRow) -> Self {
        AlertNote {
            id: row.id,
            alert_id: row.alert_id,
            author: row.author,
            content: row.content,
            internal: row.internal,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    alert_id: String,
    action: String,
    actor: String,
    old_value: Option<String>,
    new_value: Option<String>,
    detail: Option<String>,
    timestamp: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> Result<AlertHistoryEntry, EngineError> {
        let action = HistoryAction::parse(&self.action)
            .ok_or_else(|| bad_row(&self.alert_id, "action", &self.action))?;
        Ok(AlertHistoryEntry {
            id: self.id,
            alert_id: self.alert_id,
            action,
            actor: self.actor,
            old_value: self.old_value,
            new_value: self.new_value,
            detail: self.detail,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct RuleRow {
    alert_type: String,
    severity: String,
    time_threshold_minutes: i64,
    notify: Json<Vec<String>>,
}

fn bad_row(id: &str, column: &str, value: &str) -> EngineError {
    EngineError::StoreUnavailable(format!(
        "unreadable row for alert {}: {} = {:?}",
        id, column, value
    ))
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, EngineError> {
        let rows: Vec<AlertRow> = sqlx::query_as(queries::SELECT_ALERTS)
            .fetch_all(&self.pool)
            .await?;

        let note_rows: Vec<NoteRow> = sqlx::query_as(queries::SELECT_ALL_NOTES)
            .fetch_all(&self.pool)
            .await?;
        let history_rows: Vec<HistoryRow> = sqlx::query_as(queries::SELECT_ALL_HISTORY)
            .fetch_all(&self.pool)
            .await?;

        let mut notes_by_alert: HashMap<String, Vec<AlertNote>> = HashMap::new();
        for row in note_rows {
            notes_by_alert
                .entry(row.alert_id.clone())
                .or_default()
                .push(row.into());
        }
        let mut history_by_alert: HashMap<String, Vec<AlertHistoryEntry>> = HashMap::new();
        for row in history_rows {
            let entry = row.into_entry()?;
            history_by_alert
                .entry(entry.alert_id.clone())
                .or_default()
                .push(entry);
        }

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let notes = notes_by_alert.remove(&row.id).unwrap_or_default();
            let history = history_by_alert.remove(&row.id).unwrap_or_default();
            let alert = row.into_alert(notes, history)?;
            if filter.matches(&alert) {
                alerts.push(alert);
            }
        }
        Ok(alerts)
    }

    async fn get_alert(&self, id: &str) -> Result<Alert, EngineError> {
        let row: Option<AlertRow> = sqlx::query_as(queries::SELECT_ALERT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let row = row.ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let note_rows: Vec<NoteRow> = sqlx::query_as(queries::SELECT_NOTES_BY_ALERT)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        let history = self.get_history(id).await?;
        row.into_alert(note_rows.into_iter().map(Into::into).collect(), history)
    }

    async fn get_history(&self, id: &str) -> Result<Vec<AlertHistoryEntry>, EngineError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(queries::SELECT_HISTORY_BY_ALERT)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(HistoryRow::into_entry).collect()
    }

    async fn persist_transition(
        &self,
        alert: &Alert,
        new_history: &[AlertHistoryEntry],
        new_note: Option<&AlertNote>,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(queries::UPDATE_ALERT_TRANSITION)
            .bind(&alert.id)
            .bind(alert.status.as_str())
            .bind(&alert.assigned_to)
            .bind(&alert.acknowledged_by)
            .bind(alert.acknowledged_at)
            .bind(&alert.resolved_by)
            .bind(alert.resolved_at)
            .bind(&alert.closed_by)
            .bind(alert.closed_at)
            .bind(alert.escalated)
            .bind(&alert.escalated_to)
            .bind(alert.escalated_at)
            .bind(&alert.escalation_reason)
            .bind(alert.requires_action)
            .bind(alert.auto_resolved)
            .bind(alert.false_positive)
            .bind(alert.updated_at)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(EngineError::NotFound(alert.id.clone()));
        }

        for entry in new_history {
            sqlx::query(queries::INSERT_ALERT_HISTORY)
                .bind(entry.id)
                .bind(&entry.alert_id)
                .bind(entry.action.as_str())
                .bind(&entry.actor)
                .bind(&entry.old_value)
                .bind(&entry.new_value)
                .bind(&entry.detail)
                .bind(entry.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(note) = new_note {
            sqlx::query(queries::INSERT_ALERT_NOTE)
                .bind(note.id)
                .bind(&note.alert_id)
                .bind(&note.author)
                .bind(&note.content)
                .bind(note.internal)
                .bind(note.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_note(&self, note: &AlertNote) -> Result<(), EngineError> {
        sqlx::query(queries::INSERT_ALERT_NOTE)
            .bind(note.id)
            .bind(&note.alert_id)
            .bind(&note.author)
            .bind(&note.content)
            .bind(note.internal)
            .bind(note.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_escalation_rules(&self) -> Result<Vec<EscalationRule>, EngineError> {
        let rows: Vec<RuleRow> = sqlx::query_as(queries::SELECT_ESCALATION_RULES)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let alert_type = AlertType::parse(&row.alert_type).ok_or_else(|| {
                    bad_row("escalation_rule", "alert_type", &row.alert_type)
                })?;
                let severity = Severity::parse(&row.severity)
                    .ok_or_else(|| bad_row("escalation_rule", "severity", &row.severity))?;
                Ok(EscalationRule {
                    alert_type,
                    severity,
                    time_threshold_minutes: row.time_threshold_minutes,
                    notify: row.notify.0,
                })
            })
            .collect()
    }
}
