//! Row types for the `event_store` and `task_store` tables (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(FromRow, Debug)]
pub struct EventStoreRow {
    pub id_event_store: Uuid,
    pub correlation_id: String,
    pub producer_app: String,
    pub created_at: DateTime<Utc>,
    pub headers: serde_json::Value,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "task_status", rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(FromRow, Debug)]
pub struct TaskStoreRow {
    pub id_task: Uuid,
    pub correlation_id: String,
    pub producer_app: String,
    pub created_at: DateTime<Utc>,
    pub task_name: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}
