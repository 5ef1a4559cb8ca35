pub const SELECT_ALERTS: &str = r#"
SELECT id, alert_type, severity, status, title,
       vehicle_id, vehicle_registration, driver_id, driver_name,
       timestamp, lat, lon, address,
       screenshots, video_clips,
       assigned_to, acknowledged_by, acknowledged_at,
       resolved_by, resolved_at, closed_by, closed_at,
       escalated, escalated_to, escalated_at, escalation_reason,
       requires_action, auto_resolved, false_positive,
       created_at, updated_at
FROM alerts
ORDER BY timestamp DESC;
"#;

pub const SELECT_ALERT_BY_ID: &str = r#"
SELECT id, alert_type, severity, status, title,
       vehicle_id, vehicle_registration, driver_id, driver_name,
       timestamp, lat, lon, address,
       screenshots, video_clips,
       assigned_to, acknowledged_by, acknowledged_at,
       resolved_by, resolved_at, closed_by, closed_at,
       escalated, escalated_to, escalated_at, escalation_reason,
       requires_action, auto_resolved, false_positive,
       created_at, updated_at
FROM alerts
WHERE id = $1;
"#;

pub const SELECT_ALL_NOTES: &str = r#"
SELECT id, alert_id, author, content, internal, created_at
FROM alert_notes
ORDER BY created_at ASC, id ASC;
"#;

pub const SELECT_NOTES_BY_ALERT: &str = r#"
SELECT id, alert_id, author, content, internal, created_at
FROM alert_notes
WHERE alert_id = $1
ORDER BY created_at ASC, id ASC;
"#;

pub const SELECT_ALL_HISTORY: &str = r#"
SELECT id, alert_id, action, actor, old_value, new_value, detail, timestamp
FROM alert_history
ORDER BY timestamp ASC, id ASC;
"#;

pub const SELECT_HISTORY_BY_ALERT: &str = r#"
SELECT id, alert_id, action, actor, old_value, new_value, detail, timestamp
FROM alert_history
WHERE alert_id = $1
ORDER BY timestamp ASC, id ASC;
"#;

pub const UPDATE_ALERT_TRANSITION: &str = r#"
UPDATE alerts
SET status = $2,
    assigned_to = $3,
    acknowledged_by = $4,
    acknowledged_at = $5,
    resolved_by = $6,
    resolved_at = $7,
    closed_by = $8,
    closed_at = $9,
    escalated = $10,
    escalated_to = $11,
    escalated_at = $12,
    escalation_reason = $13,
    requires_action = $14,
    auto_resolved = $15,
    false_positive = $16,
    updated_at = $17
WHERE id = $1;
"#;

pub const INSERT_ALERT_NOTE: &str = r#"
INSERT INTO alert_notes (id, alert_id, author, content, internal, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (id) DO NOTHING;
"#;

pub const INSERT_ALERT_HISTORY: &str = r#"
INSERT INTO alert_history (id, alert_id, action, actor, old_value, new_value, detail, timestamp)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (id) DO NOTHING;
"#;

pub const SELECT_ESCALATION_RULES: &str = r#"
SELECT alert_type, severity, time_threshold_minutes, notify
FROM escalation_rules;
"#;
