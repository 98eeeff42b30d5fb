//! Bulk assignment of tasks to one user.
//!
//! Preconditions (id list, user, every task) are checked before the first
//! write, so a bad request changes nothing. After that, each task is written
//! with compare-and-swap and a lost race is reported per item.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::{ItemFailure, RulesContext, checked_task_ids};
use crate::domain::{
    Actor, AuditAction, AuditEntry, EntityKind, RulesError, RulesResult, TaskId, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkAssignment {
    pub assigned_tasks: usize,
    pub user_id: UserId,
    pub task_ids: Vec<TaskId>,
    pub failures: Vec<ItemFailure>,
}

pub struct BulkAssigner {
    ctx: RulesContext,
}

impl BulkAssigner {
    pub fn new(ctx: RulesContext) -> Self {
        Self { ctx }
    }

    pub async fn assign_many(
        &self,
        task_ids: &[TaskId],
        user_id: UserId,
        actor: Actor,
    ) -> RulesResult<BulkAssignment> {
        let ids = checked_task_ids(task_ids, self.ctx.config().bulk.max_task_ids)?;
        let store = self.ctx.store();

        let user = store.get_user(user_id).await?;
        if !user.active {
            return Err(RulesError::Inactive(user_id));
        }

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            tasks.push(store.get_task(id).await?);
        }

        let now = self.ctx.now();
        let mut assigned = Vec::with_capacity(tasks.len());
        let mut failures = Vec::new();
        for task in tasks {
            let task_id = task.id;
            let before = json!({ "assignee": task.assignee, "status": task.status });
            let mut next = task;
            next.assign_to(user_id);
            match store.update_task(next).await {
                Ok(stored) => {
                    self.ctx.audit(
                        AuditEntry::new(EntityKind::Task, task_id, AuditAction::Assign, actor, now)
                            .with_before(before)
                            .with_after(json!({ "assignee": stored.assignee, "status": stored.status })),
                    );
                    assigned.push(task_id);
                }
                Err(e) => {
                    warn!(task = %task_id, error = %e, "bulk assignment skipped task");
                    failures.push(ItemFailure::new(task_id, e));
                }
            }
        }

        info!(
            user = %user_id,
            assigned = assigned.len(),
            failed = failures.len(),
            "bulk assignment finished"
        );

        Ok(BulkAssignment {
            assigned_tasks: assigned.len(),
            user_id,
            task_ids: assigned,
            failures,
        })
    }
}
