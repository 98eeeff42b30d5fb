//! Cascade completion: complete a task, then unlock the pending tasks that
//! were waiting for it.
//!
//! Unlock rule: a pending dependent becomes `ready` when the number of
//! dependency-list entries that name a completed task equals the length of
//! the list. Entries are counted per element, so `[a, a]` is satisfied once
//! `a` is completed.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::RulesContext;
use crate::domain::{
    Actor, AuditAction, AuditEntry, EntityKind, RulesResult, Task, TaskId, TaskStatus,
};
use crate::ports::{StoreResult, TaskFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub completed_task: TaskId,
    pub unlocked_tasks: Vec<TaskId>,
}

pub struct DependencyResolver {
    ctx: RulesContext,
}

impl DependencyResolver {
    pub fn new(ctx: RulesContext) -> Self {
        Self { ctx }
    }

    /// Complete `task_id` and cascade.
    ///
    /// Completing an already-completed task is a no-op with no unlocks.
    pub async fn complete_task(&self, task_id: TaskId, actor: Actor) -> RulesResult<CompletionOutcome> {
        let store = self.ctx.store();
        let task = store.get_task(task_id).await?;

        if task.status == TaskStatus::Completed {
            debug!(task = %task_id, "task already completed, skipping cascade");
            return Ok(CompletionOutcome {
                completed_task: task_id,
                unlocked_tasks: Vec::new(),
            });
        }

        let now = self.ctx.now();
        let previous = task.status;
        let mut next = task;
        next.mark_completed(now);
        let stored = store.update_task(next).await?;

        self.ctx.audit(
            AuditEntry::new(EntityKind::Task, task_id, AuditAction::Complete, actor, now)
                .with_before(json!({ "status": previous }))
                .with_after(json!({ "status": stored.status, "completed_at": stored.completed_at })),
        );

        let mut candidates = store
            .filter_tasks(
                &TaskFilter::new()
                    .with_statuses(&[TaskStatus::Pending])
                    .depending_on(task_id),
            )
            .await?;
        candidates.sort_by_key(|t| t.id);

        let mut unlocked = Vec::new();
        for candidate in candidates {
            if !self.dependencies_satisfied(&candidate).await? {
                continue;
            }

            let dependent_id = candidate.id;
            let mut next = candidate;
            next.mark_ready();
            match store.update_task(next).await {
                Ok(_) => {
                    self.ctx.audit(
                        AuditEntry::new(EntityKind::Task, dependent_id, AuditAction::Unlock, actor, now)
                            .with_before(json!({ "status": TaskStatus::Pending }))
                            .with_after(json!({ "status": TaskStatus::Ready, "unlocked_by": task_id })),
                    );
                    unlocked.push(dependent_id);
                }
                // Someone else moved it since we read it.
                Err(e) if e.is_conflict() => {
                    debug!(task = %dependent_id, error = %e, "dependent changed concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            task = %task_id,
            unlocked = unlocked.len(),
            "task completed"
        );

        Ok(CompletionOutcome {
            completed_task: task_id,
            unlocked_tasks: unlocked,
        })
    }

    async fn dependencies_satisfied(&self, task: &Task) -> StoreResult<bool> {
        let completed = self
            .ctx
            .store()
            .filter_tasks(
                &TaskFilter::new()
                    .with_ids(task.dependencies.iter().copied())
                    .with_statuses(&[TaskStatus::Completed]),
            )
            .await?;
        let completed: HashSet<TaskId> = completed.into_iter().map(|t| t.id).collect();
        let satisfied = task
            .dependencies
            .iter()
            .filter(|dep| completed.contains(dep))
            .count();
        Ok(satisfied == task.dependencies.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Role};
    use crate::rules::RulesContext;
    use crate::test_support::{FailingAuditSink, Harness, task_id, user_id};
    use std::sync::Arc;

    fn resolver(h: &Harness) -> DependencyResolver {
        DependencyResolver::new(h.ctx.clone())
    }

    #[tokio::test]
    async fn completing_a_task_without_dependents_unlocks_nothing() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;

        let outcome = resolver(&h).complete_task(a, Actor::System).await.unwrap();

        assert_eq!(outcome.completed_task, a);
        assert!(outcome.unlocked_tasks.is_empty());
        let stored = h.task(a).await;
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.completed_at, Some(crate::test_support::now()));
    }

    #[tokio::test]
    async fn chain_unlocks_one_level_at_a_time() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;
        let b = h.add_task(2, |t| t.dependencies = vec![task_id(1)]).await;
        let c = h
            .add_task(3, |t| t.dependencies = vec![task_id(1), task_id(2)])
            .await;
        let r = resolver(&h);

        let outcome = r.complete_task(a, Actor::System).await.unwrap();
        assert_eq!(outcome.unlocked_tasks, vec![b]);
        assert_eq!(h.status(b).await, TaskStatus::Ready);
        assert_eq!(h.status(c).await, TaskStatus::Pending);

        let outcome = r.complete_task(b, Actor::System).await.unwrap();
        assert_eq!(outcome.unlocked_tasks, vec![c]);
        assert_eq!(h.status(c).await, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn duplicate_dependency_ids_are_counted_per_entry() {
        // Known quirk: [a, a] unlocks as soon as a is completed.
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;
        let d = h
            .add_task(4, |t| t.dependencies = vec![task_id(1), task_id(1)])
            .await;

        let outcome = resolver(&h).complete_task(a, Actor::System).await.unwrap();

        assert_eq!(outcome.unlocked_tasks, vec![d]);
        assert_eq!(h.status(d).await, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn only_pending_dependents_are_unlocked() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;
        let cancelled = h
            .add_task(2, |t| {
                t.dependencies = vec![task_id(1)];
                t.status = TaskStatus::Cancelled;
            })
            .await;

        let outcome = resolver(&h).complete_task(a, Actor::System).await.unwrap();

        assert!(outcome.unlocked_tasks.is_empty());
        assert_eq!(h.status(cancelled).await, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn cycle_members_stay_pending() {
        let h = Harness::new().await;
        let root = h.add_task(1, |_| {}).await;
        let x = h.add_task(2, |t| t.dependencies = vec![task_id(1), task_id(3)]).await;
        let y = h.add_task(3, |t| t.dependencies = vec![task_id(2)]).await;

        let outcome = resolver(&h).complete_task(root, Actor::System).await.unwrap();

        assert!(outcome.unlocked_tasks.is_empty());
        assert_eq!(h.status(x).await, TaskStatus::Pending);
        assert_eq!(h.status(y).await, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn second_completion_is_a_no_op() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;
        h.add_task(2, |t| t.dependencies = vec![task_id(1)]).await;
        let r = resolver(&h);

        r.complete_task(a, Actor::System).await.unwrap();
        let version = h.task(a).await.version;
        let audits = h.audit.entries().len();

        let outcome = r.complete_task(a, Actor::System).await.unwrap();

        assert!(outcome.unlocked_tasks.is_empty());
        assert_eq!(h.task(a).await.version, version);
        assert_eq!(h.audit.entries().len(), audits);
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let h = Harness::new().await;
        let err = resolver(&h)
            .complete_task(task_id(99), Actor::System)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn completion_and_unlock_are_audited() {
        let h = Harness::new().await;
        let actor = h.add_user(1, Role::Staff).await;
        let a = h.add_task(1, |_| {}).await;
        h.add_task(2, |t| t.dependencies = vec![task_id(1)]).await;

        resolver(&h).complete_task(a, Actor::User(actor)).await.unwrap();

        let entries = h.audit.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Complete);
        assert_eq!(entries[0].actor, Actor::User(user_id(1)));
        assert_eq!(entries[0].before.as_ref().unwrap()["status"], "pending");
        assert_eq!(entries[1].action, AuditAction::Unlock);
    }

    #[tokio::test]
    async fn audit_failures_do_not_fail_completion() {
        let h = Harness::new().await;
        let ctx = RulesContext::new(
            Arc::new(h.store.clone()),
            Arc::new(FailingAuditSink),
            h.clock.clone(),
            Default::default(),
        );
        let a = h.add_task(1, |_| {}).await;

        let outcome = DependencyResolver::new(ctx)
            .complete_task(a, Actor::System)
            .await
            .unwrap();
        assert_eq!(outcome.completed_task, a);
    }

    #[tokio::test]
    async fn concurrent_sibling_completions_unlock_exactly_once() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;
        let b = h.add_task(2, |_| {}).await;
        let d = h
            .add_task(3, |t| t.dependencies = vec![task_id(1), task_id(2)])
            .await;
        let r1 = resolver(&h);
        let r2 = resolver(&h);

        let (x, y) = tokio::join!(
            r1.complete_task(a, Actor::System),
            r2.complete_task(b, Actor::System)
        );
        let unlocked: Vec<TaskId> = x
            .unwrap()
            .unlocked_tasks
            .into_iter()
            .chain(y.unwrap().unlocked_tasks)
            .collect();

        assert_eq!(unlocked, vec![d]);
        assert_eq!(h.status(d).await, TaskStatus::Ready);
    }
}
