//! Task record and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{DepartmentId, TaskId, UserId};

/// Task status.
///
/// State transitions owned by the rules engine:
/// - Pending -> Ready (dependency cascade only)
/// - any -> Assigned (bulk assignment)
/// - any -> Completed (completion, stamps `completed_at`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Counts toward a user's workload.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Task priority, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// One escalation step: high becomes critical, critical stays, everything
    /// else jumps to high. Never lowers a priority.
    pub fn escalated(self) -> Priority {
        match self {
            Priority::Low | Priority::Medium => Priority::High,
            Priority::High | Priority::Critical => Priority::Critical,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A task as the store holds it.
///
/// `version` is owned by the store: it is bumped on every successful update
/// and compared on write (optimistic concurrency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub assignee: Option<UserId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Ordered prerequisite ids. Duplicates are kept as-is.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Task {
    /// New pending task with medium priority and no dependencies.
    pub fn new(id: TaskId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            assignee: None,
            department_id: None,
            due_at: None,
            dependencies: Vec::new(),
            created_at,
            completed_at: None,
            version: 0,
        }
    }

    pub fn depends_on(&self, other: TaskId) -> bool {
        self.dependencies.contains(&other)
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| due < now)
    }

    /// Mark as completed and stamp `completed_at`.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Dependency cascade: pending -> ready.
    pub fn mark_ready(&mut self) {
        self.status = TaskStatus::Ready;
        self.completed_at = None;
    }

    /// Hand the task to `user`.
    pub fn assign_to(&mut self, user: UserId) {
        self.assignee = Some(user);
        self.status = TaskStatus::Assigned;
        self.completed_at = None;
    }
}
