//! Diesel row models for worker persistence.

use super::schema::workers;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row shape shared by reads and inserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = workers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkerRow {
    /// Internal worker identifier.
    pub id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Availability status.
    pub status: String,
    /// Bound task.
    pub current_task_id: Option<uuid::Uuid>,
    /// Run mode.
    pub mode: String,
    /// Telemetry JSON payload.
    pub telemetry: Value,
    /// Capability JSON payload.
    pub capabilities: Value,
    /// Heartbeat timestamp.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Columns rewritten by a conditional update.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = workers)]
#[diesel(treat_none_as_null = true)]
pub struct WorkerChangeset {
    /// Display name.
    pub name: String,
    /// Availability status.
    pub status: String,
    /// Bound task.
    pub current_task_id: Option<uuid::Uuid>,
    /// Run mode.
    pub mode: String,
    /// Telemetry JSON payload.
    pub telemetry: Value,
    /// Capability JSON payload.
    pub capabilities: Value,
    /// Heartbeat timestamp.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Columns rewritten when the scheduler claims or releases a worker.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = workers)]
#[diesel(treat_none_as_null = true)]
pub struct WorkerAssignmentChangeset {
    /// Availability status.
    pub status: String,
    /// Bound task.
    pub current_task_id: Option<uuid::Uuid>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
