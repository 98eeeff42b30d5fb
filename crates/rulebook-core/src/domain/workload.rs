//! Workload score and classification.
//!
//! The weights and thresholds are fixed contract values:
//! `score = open + 2 * high + 3 * overdue`, underloaded below 5,
//! overloaded above 15, balanced in between (both bounds inclusive).

use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// Weight of every open task.
pub const OPEN_TASK_WEIGHT: u32 = 1;
/// Extra weight of an open `high` task (critical is not counted).
pub const HIGH_PRIORITY_WEIGHT: u32 = 2;
/// Extra weight of an open overdue task.
pub const OVERDUE_WEIGHT: u32 = 3;

/// Scores strictly below this are underloaded.
pub const UNDERLOADED_BELOW: u32 = 5;
/// Scores strictly above this are overloaded.
pub const OVERLOADED_ABOVE: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadClass {
    Underloaded,
    Balanced,
    Overloaded,
}

impl WorkloadClass {
    pub fn from_score(score: u32) -> Self {
        if score < UNDERLOADED_BELOW {
            WorkloadClass::Underloaded
        } else if score > OVERLOADED_ABOVE {
            WorkloadClass::Overloaded
        } else {
            WorkloadClass::Balanced
        }
    }
}

/// Weighted load score. Saturates instead of overflowing.
pub fn workload_score(open_tasks: u32, high_priority: u32, overdue: u32) -> u32 {
    open_tasks
        .saturating_mul(OPEN_TASK_WEIGHT)
        .saturating_add(high_priority.saturating_mul(HIGH_PRIORITY_WEIGHT))
        .saturating_add(overdue.saturating_mul(OVERDUE_WEIGHT))
}

/// Derived per-user load, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    pub user_id: UserId,
    pub user_name: String,
    pub open_tasks: u32,
    pub high_priority_tasks: u32,
    pub overdue_tasks: u32,
    pub score: u32,
    pub classification: WorkloadClass,
}

impl WorkloadSnapshot {
    pub fn new(
        user_id: UserId,
        user_name: impl Into<String>,
        open_tasks: u32,
        high_priority_tasks: u32,
        overdue_tasks: u32,
    ) -> Self {
        let score = workload_score(open_tasks, high_priority_tasks, overdue_tasks);
        Self {
            user_id,
            user_name: user_name.into(),
            open_tasks,
            high_priority_tasks,
            overdue_tasks,
            score,
            classification: WorkloadClass::from_score(score),
        }
    }
}
