//! Reminder records created by escalation and batch reminder operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::Actor;
use super::ids::{ReminderId, TaskId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Escalation,
    FollowUp,
    Deadline,
    Overdue,
}

/// Only `Pending` is ever written here; delivery flips the rest externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    pub task_id: Option<TaskId>,
    pub reminder_type: ReminderType,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub created_by: Actor,
}
