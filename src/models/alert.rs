use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::AlertHistoryEntry;
use super::note::AlertNote;

/// Closing and resolution notes must carry at least this many characters.
pub const MIN_CLOSING_NOTE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HarshBraking,
    Speeding,
    CollisionDetected,
    LaneDeparture,
    DriverDistraction,
    Drowsiness,
    UnauthorizedStop,
    GeofenceViolation,
    VehicleTamper,
    CameraOffline,
    SystemError,
    Custom,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HarshBraking => "harsh_braking",
            AlertType::Speeding => "speeding",
            AlertType::CollisionDetected => "collision_detected",
            AlertType::LaneDeparture => "lane_departure",
            AlertType::DriverDistraction => "driver_distraction",
            AlertType::Drowsiness => "drowsiness",
            AlertType::UnauthorizedStop => "unauthorized_stop",
            AlertType::GeofenceViolation => "geofence_violation",
            AlertType::VehicleTamper => "vehicle_tamper",
            AlertType::CameraOffline => "camera_offline",
            AlertType::SystemError => "system_error",
            AlertType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "harsh_braking" => Some(AlertType::HarshBraking),
            "speeding" => Some(AlertType::Speeding),
            "collision_detected" => Some(AlertType::CollisionDetected),
            "lane_departure" => Some(AlertType::LaneDeparture),
            "driver_distraction" => Some(AlertType::DriverDistraction),
            "drowsiness" => Some(AlertType::Drowsiness),
            "unauthorized_stop" => Some(AlertType::UnauthorizedStop),
            "geofence_violation" => Some(AlertType::GeofenceViolation),
            "vehicle_tamper" => Some(AlertType::VehicleTamper),
            "camera_offline" => Some(AlertType::CameraOffline),
            "system_error" => Some(AlertType::SystemError),
            "custom" => Some(AlertType::Custom),
            _ => None,
        }
    }
}

/// Severity, ordered so that `Critical > High > Medium > Low > Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Investigating,
    Escalated,
    Resolved,
    Closed,
}

impl AlertStatus {
    /// `Closed` is the only terminal state; everything else may still move.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Closed)
    }

    /// Open for scheduling purposes: neither resolved nor closed.
    pub fn is_open(&self) -> bool {
        !matches!(self, AlertStatus::Resolved | AlertStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Escalated => "escalated",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(AlertStatus::New),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "investigating" => Some(AlertStatus::Investigating),
            "escalated" => Some(AlertStatus::Escalated),
            "resolved" => Some(AlertStatus::Resolved),
            "closed" => Some(AlertStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub camera_id: String,
    pub url: String,
    /// Offset from the triggering event, in seconds.
    pub offset_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub camera_id: String,
    pub url: String,
    pub duration_secs: f64,
}

/// A detected safety/compliance event tied to a vehicle, driver, time and
/// location, tracked through the full lifecycle from `New` to `Closed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub title: String,

    pub vehicle_id: String,
    pub vehicle_registration: String,
    pub driver_id: String,
    pub driver_name: String,
    /// When the triggering event happened on the vehicle.
    pub timestamp: DateTime<Utc>,
    pub location: Option<Geolocation>,

    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
    #[serde(default)]
    pub video_clips: Vec<VideoClip>,

    pub assigned_to: Option<String>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,

    pub escalated: bool,
    pub escalated_to: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,

    #[serde(default)]
    pub notes: Vec<AlertNote>,
    #[serde(default)]
    pub history: Vec<AlertHistoryEntry>,

    pub requires_action: bool,
    pub auto_resolved: bool,
    pub false_positive: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Age of the triggering event relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}
