//! EscalationScanner - 期限超過タスクのエスカレーション
//!
//! 期限を `overdue_hours` 以上過ぎた open タスクの優先度を 1 段上げ、
//! 部署のマネージャーに escalation リマインダーを作成します。
//!
//! # 排他と予算
//! - 1 つの `RulesContext` で同時に走るスキャンは 1 つだけ（重複呼び出しは `Busy`）
//! - 件数上限・経過時間・停止シグナルのいずれかで途中終了し、`truncated` を立てる
//! - 個別タスクの失敗は `failures` に集めてバッチは継続

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{ItemFailure, RulesContext, ScanBudget, StopReason};
use crate::domain::{
    Actor, AuditAction, AuditEntry, DepartmentId, EntityKind, Priority, Reminder, ReminderStatus,
    ReminderType, Role, RulesError, RulesResult, Task, TaskId, TaskStatus, User, UserId,
};
use crate::ports::{StoreError, TaskFilter, UserFilter};

const OPEN_STATUSES: [TaskStatus; 2] = [TaskStatus::Assigned, TaskStatus::InProgress];
const MANAGER_ROLES: [Role; 2] = [Role::Manager, Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalatedTask {
    pub task_id: TaskId,
    pub previous_assignee: Option<UserId>,
    pub escalated_to_manager_id: UserId,
    pub hours_overdue: i64,
    pub new_priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: TaskId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    pub escalated_tasks: usize,
    pub tasks: Vec<EscalatedTask>,
    pub skipped: Vec<SkippedTask>,
    pub failures: Vec<ItemFailure>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

pub struct EscalationScanner {
    ctx: RulesContext,
}

impl EscalationScanner {
    pub fn new(ctx: RulesContext) -> Self {
        Self { ctx }
    }

    pub async fn escalate(
        &self,
        overdue_hours: u32,
        department_id: Option<DepartmentId>,
    ) -> RulesResult<EscalationReport> {
        let _running = self
            .ctx
            .escalation_guard()
            .try_lock()
            .map_err(|_| RulesError::Busy("escalation scan"))?;

        let config = &self.ctx.config().escalation;
        let now = self.ctx.now();
        let cutoff = now
            .checked_sub_signed(Duration::hours(i64::from(overdue_hours)))
            .ok_or_else(|| {
                RulesError::validation(format!("overdue_hours {overdue_hours} is out of range"))
            })?;

        let mut filter = TaskFilter::new()
            .with_statuses(&OPEN_STATUSES)
            .due_before(cutoff);
        if let Some(department) = department_id {
            filter = filter.in_department(department);
        }
        let mut overdue = self.ctx.store().filter_tasks(&filter).await?;
        overdue.sort_by_key(|t| (t.due_at, t.id));

        let budget = ScanBudget::new(
            config.max_tasks_per_run,
            config.run_time_limit,
            self.ctx.stop_signal(),
        );
        let mut managers: HashMap<DepartmentId, Option<User>> = HashMap::new();
        let mut report = EscalationReport {
            escalated_tasks: 0,
            tasks: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            truncated: false,
            stop_reason: None,
        };

        for (processed, task) in overdue.into_iter().enumerate() {
            if let Some(reason) = budget.check(processed) {
                warn!(processed, ?reason, "escalation scan stopped early");
                report.truncated = true;
                report.stop_reason = Some(reason);
                break;
            }

            let task_id = task.id;
            let Some(department) = task.department_id else {
                report.skipped.push(SkippedTask {
                    task_id,
                    reason: "task has no department".into(),
                });
                continue;
            };
            if !managers.contains_key(&department) {
                match self.manager_of(department).await {
                    Ok(found) => {
                        managers.insert(department, found);
                    }
                    Err(e) => {
                        report.failures.push(ItemFailure::new(task_id, &e));
                        continue;
                    }
                }
            }
            let Some(manager) = managers.get(&department).cloned().flatten() else {
                report.skipped.push(SkippedTask {
                    task_id,
                    reason: format!("no active manager in department {department}"),
                });
                continue;
            };

            match self.escalate_one(task, &manager, now).await {
                Ok(escalated) => report.tasks.push(escalated),
                Err(e) => {
                    debug!(task = %task_id, error = %e, "escalation failed");
                    report.failures.push(ItemFailure::new(task_id, &e));
                }
            }
        }

        report.escalated_tasks = report.tasks.len();
        info!(
            overdue_hours,
            escalated = report.escalated_tasks,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            truncated = report.truncated,
            "escalation scan finished"
        );
        Ok(report)
    }

    /// Lowest-id active manager or admin of the department.
    async fn manager_of(&self, department: DepartmentId) -> RulesResult<Option<User>> {
        let candidates = self
            .ctx
            .store()
            .filter_users(
                &UserFilter::new()
                    .in_department(department)
                    .active_only()
                    .with_roles(&MANAGER_ROLES),
            )
            .await?;
        Ok(candidates.into_iter().min_by_key(|u| u.id))
    }

    async fn escalate_one(
        &self,
        task: Task,
        manager: &User,
        now: DateTime<Utc>,
    ) -> RulesResult<EscalatedTask> {
        let store = self.ctx.store();
        let task_id = task.id;
        let previous_priority = task.priority;
        let new_priority = previous_priority.escalated();
        let hours_overdue = task.due_at.map_or(0, |due| (now - due).num_hours());

        let assignee_name = match task.assignee {
            Some(id) => match store.get_user(id).await {
                Ok(user) => user.name,
                Err(StoreError::NotFound { .. }) => id.to_string(),
                Err(e) => return Err(e.into()),
            },
            None => "nobody".to_string(),
        };

        let mut stored = task;
        if new_priority != previous_priority {
            stored.priority = new_priority;
            stored = store.update_task(stored).await?;
        }

        let reminder = Reminder {
            id: self.ctx.ids().generate_reminder_id(),
            user_id: manager.id,
            task_id: Some(task_id),
            reminder_type: ReminderType::Escalation,
            message: format!(
                "Task \"{}\" assigned to {} is {} hours overdue",
                stored.title, assignee_name, hours_overdue
            ),
            scheduled_for: now,
            status: ReminderStatus::Pending,
            created_by: Actor::System,
        };
        let reminder_id = reminder.id;

        // A changed priority is audited even if the reminder insert fails.
        self.ctx.audit(
            AuditEntry::new(EntityKind::Task, task_id, AuditAction::Escalate, Actor::System, now)
                .with_before(json!({ "priority": previous_priority }))
                .with_after(json!({
                    "priority": new_priority,
                    "escalated_to": manager.id,
                    "escalated_at": now,
                    "reminder_id": reminder_id,
                })),
        );
        store.insert_reminder(reminder).await?;

        Ok(EscalatedTask {
            task_id,
            previous_assignee: stored.assignee,
            escalated_to_manager_id: manager.id,
            hours_overdue,
            new_priority,
        })
    }
}
