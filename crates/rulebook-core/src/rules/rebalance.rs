//! Advisory rebalancing for one department.
//!
//! Nothing here writes to the store. Recommendations are applied, if at all,
//! through separate bulk assignment calls.

use std::cmp::Reverse;

use serde::Serialize;
use tracing::{debug, info};

use super::scoring::WorkloadScorer;
use super::{RulesContext, ScanBudget, StopReason};
use crate::domain::{
    DepartmentId, Priority, RulesResult, Task, TaskId, TaskStatus, UserId, WorkloadClass,
    WorkloadSnapshot,
};
use crate::ports::{TaskFilter, UserFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Give unassigned ready tasks to an underloaded user.
    AssignUnassigned,
    /// Move low-priority tasks off an overloaded user.
    Redistribute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user: Option<UserId>,
    pub to_user: UserId,
    pub task_ids: Vec<TaskId>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceSummary {
    pub total_users: usize,
    pub underloaded: usize,
    pub balanced: usize,
    pub overloaded: usize,
    pub average_score: f64,
    pub unassigned_candidates: usize,
}

impl RebalanceSummary {
    fn of(snapshots: &[WorkloadSnapshot], unassigned_candidates: usize) -> Self {
        let count = |class| snapshots.iter().filter(|s| s.classification == class).count();
        let total: u64 = snapshots.iter().map(|s| u64::from(s.score)).sum();
        let average_score = if snapshots.is_empty() {
            0.0
        } else {
            total as f64 / snapshots.len() as f64
        };
        Self {
            total_users: snapshots.len(),
            underloaded: count(WorkloadClass::Underloaded),
            balanced: count(WorkloadClass::Balanced),
            overloaded: count(WorkloadClass::Overloaded),
            average_score,
            unassigned_candidates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceReport {
    pub department_id: DepartmentId,
    /// Ascending by score.
    pub user_workloads: Vec<WorkloadSnapshot>,
    pub recommendations: Vec<Recommendation>,
    pub summary: RebalanceSummary,
    /// Set when the scan stopped early; recommendations are then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<StopReason>,
}

pub struct Rebalancer {
    ctx: RulesContext,
    scorer: WorkloadScorer,
}

impl Rebalancer {
    pub fn new(ctx: RulesContext) -> Self {
        let scorer = WorkloadScorer::new(ctx.clone());
        Self { ctx, scorer }
    }

    pub async fn recommend(&self, department_id: DepartmentId) -> RulesResult<RebalanceReport> {
        let store = self.ctx.store();
        let config = &self.ctx.config().rebalance;
        store.get_department(department_id).await?;

        let mut users = store
            .filter_users(&UserFilter::new().in_department(department_id).active_only())
            .await?;
        users.sort_by_key(|u| u.id);

        let budget = ScanBudget::new(usize::MAX, config.run_time_limit, self.ctx.stop_signal());
        let mut snapshots = Vec::with_capacity(users.len());
        let mut truncated = None;
        for (processed, user) in users.iter().enumerate() {
            if let Some(reason) = budget.check(processed) {
                debug!(department = %department_id, ?reason, "workload scan stopped early");
                truncated = Some(reason);
                break;
            }
            snapshots.push(self.scorer.compute_score(user).await?);
        }
        snapshots.sort_by_key(|s| (s.score, s.user_id));

        let candidates = self.unassigned_candidates(department_id).await?;
        let mut recommendations = Vec::new();
        if truncated.is_none() {
            recommendations = assign_unassigned(&snapshots, &candidates, config.tasks_per_user);
            recommendations.extend(self.redistribute(&snapshots).await?);
        }

        let summary = RebalanceSummary::of(&snapshots, candidates.len());
        info!(
            department = %department_id,
            users = summary.total_users,
            overloaded = summary.overloaded,
            underloaded = summary.underloaded,
            recommendations = recommendations.len(),
            "workload rebalance computed"
        );

        Ok(RebalanceReport {
            department_id,
            user_workloads: snapshots,
            recommendations,
            summary,
            truncated,
        })
    }

    /// Unassigned ready tasks: priority descending, then due date ascending
    /// (no due date last), capped.
    async fn unassigned_candidates(&self, department_id: DepartmentId) -> RulesResult<Vec<Task>> {
        let mut tasks = self
            .ctx
            .store()
            .filter_tasks(
                &TaskFilter::new()
                    .unassigned()
                    .with_statuses(&[TaskStatus::Ready])
                    .in_department(department_id),
            )
            .await?;
        tasks.sort_by_key(|t| (Reverse(t.priority), t.due_at.is_none(), t.due_at, t.id));
        tasks.truncate(self.ctx.config().rebalance.candidate_limit);
        Ok(tasks)
    }

    async fn redistribute(&self, snapshots: &[WorkloadSnapshot]) -> RulesResult<Vec<Recommendation>> {
        let config = &self.ctx.config().rebalance;
        let Some(least_loaded) = snapshots.first() else {
            return Ok(Vec::new());
        };

        let mut overloaded: Vec<&WorkloadSnapshot> = snapshots
            .iter()
            .filter(|s| s.classification == WorkloadClass::Overloaded)
            .collect();
        overloaded.sort_by_key(|s| (Reverse(s.score), s.user_id));

        let mut recommendations = Vec::new();
        for busy in overloaded.into_iter().take(config.overloaded_users) {
            if busy.user_id == least_loaded.user_id {
                continue;
            }
            let mut movable = self
                .ctx
                .store()
                .filter_tasks(
                    &TaskFilter::new()
                        .assigned_to(busy.user_id)
                        .with_statuses(&[TaskStatus::Assigned])
                        .with_priority(Priority::Low),
                )
                .await?;
            // Least urgent first; no due date is the least urgent of all.
            movable.sort_by_key(|t| (t.due_at.is_some(), Reverse(t.due_at), t.id));
            let task_ids: Vec<TaskId> = movable
                .iter()
                .take(config.tasks_per_user)
                .map(|t| t.id)
                .collect();
            if task_ids.is_empty() {
                continue;
            }
            recommendations.push(Recommendation {
                kind: RecommendationKind::Redistribute,
                from_user: Some(busy.user_id),
                to_user: least_loaded.user_id,
                reason: format!(
                    "{} is overloaded (score {}); move {} low-priority task(s) to {} (score {})",
                    busy.user_name,
                    busy.score,
                    task_ids.len(),
                    least_loaded.user_name,
                    least_loaded.score
                ),
                task_ids,
            });
        }
        Ok(recommendations)
    }
}

/// Hand out the candidates to underloaded users, lightest first.
fn assign_unassigned(
    snapshots: &[WorkloadSnapshot],
    candidates: &[Task],
    per_user: usize,
) -> Vec<Recommendation> {
    let mut remaining = candidates.iter();
    let mut recommendations = Vec::new();
    for snapshot in snapshots
        .iter()
        .filter(|s| s.classification == WorkloadClass::Underloaded)
    {
        let task_ids: Vec<TaskId> = remaining.by_ref().take(per_user).map(|t| t.id).collect();
        if task_ids.is_empty() {
            break;
        }
        recommendations.push(Recommendation {
            kind: RecommendationKind::AssignUnassigned,
            from_user: None,
            to_user: snapshot.user_id,
            reason: format!(
                "{} is underloaded (score {}); assign {} unassigned task(s)",
                snapshot.user_name,
                snapshot.score,
                task_ids.len()
            ),
            task_ids,
        });
    }
    recommendations
}
