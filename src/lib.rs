//! Fleet-operations alert lifecycle and escalation engine.
//!
//! Tracks safety/compliance alerts from creation through investigation,
//! escalation and closure, with an append-only audit trail, time-based
//! unattended/escalation detection, and continuous synchronization with the
//! remote Alert Store via periodic polling plus a Kafka push stream.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod push;
