//! Per-user workload snapshots.

use chrono::{DateTime, Utc};

use super::RulesContext;
use crate::domain::{Priority, RulesResult, Task, TaskStatus, User, WorkloadSnapshot};
use crate::ports::TaskFilter;

const OPEN_STATUSES: [TaskStatus; 2] = [TaskStatus::Assigned, TaskStatus::InProgress];

pub struct WorkloadScorer {
    ctx: RulesContext,
}

impl WorkloadScorer {
    pub fn new(ctx: RulesContext) -> Self {
        Self { ctx }
    }

    /// Snapshot of `user`'s open tasks at the context's current time.
    pub async fn compute_score(&self, user: &User) -> RulesResult<WorkloadSnapshot> {
        let open = self
            .ctx
            .store()
            .filter_tasks(&TaskFilter::new().assigned_to(user.id).with_statuses(&OPEN_STATUSES))
            .await?;
        Ok(snapshot_of(user, &open, self.ctx.now()))
    }
}

/// Pure part of the scoring: counts the given open tasks.
pub fn snapshot_of(user: &User, open_tasks: &[Task], now: DateTime<Utc>) -> WorkloadSnapshot {
    let high = open_tasks.iter().filter(|t| t.priority == Priority::High).count();
    let overdue = open_tasks.iter().filter(|t| t.is_overdue_at(now)).count();
    WorkloadSnapshot::new(
        user.id,
        user.name.clone(),
        saturating_count(open_tasks.len()),
        saturating_count(high),
        saturating_count(overdue),
    )
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
