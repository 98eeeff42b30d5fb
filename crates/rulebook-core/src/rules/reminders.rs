//! Batch reminder creation for task assignees.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::{ItemFailure, RulesContext, checked_task_ids};
use crate::domain::{
    Actor, AuditAction, AuditEntry, EntityKind, Reminder, ReminderStatus, ReminderType,
    RulesResult, Task, TaskId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderBatch {
    pub created_reminders: usize,
    pub tasks_with_reminders: Vec<TaskId>,
    pub failures: Vec<ItemFailure>,
}

pub struct ReminderBatcher {
    ctx: RulesContext,
}

impl ReminderBatcher {
    pub fn new(ctx: RulesContext) -> Self {
        Self { ctx }
    }

    /// One pending reminder per task, addressed to the task's assignee.
    ///
    /// Missing or unassigned tasks are reported in `failures`; the rest of
    /// the batch still goes through.
    pub async fn create_reminders(
        &self,
        task_ids: &[TaskId],
        reminder_type: ReminderType,
        scheduled_for: DateTime<Utc>,
        actor: Actor,
    ) -> RulesResult<ReminderBatch> {
        let ids = checked_task_ids(task_ids, self.ctx.config().bulk.max_task_ids)?;
        let store = self.ctx.store();
        let now = self.ctx.now();

        let mut created = Vec::new();
        let mut failures = Vec::new();
        for task_id in ids {
            let task = match store.get_task(task_id).await {
                Ok(task) => task,
                Err(e) => {
                    failures.push(ItemFailure::new(task_id, e));
                    continue;
                }
            };
            let Some(assignee) = task.assignee else {
                failures.push(ItemFailure::new(task_id, "task has no assignee"));
                continue;
            };

            let reminder = Reminder {
                id: self.ctx.ids().generate_reminder_id(),
                user_id: assignee,
                task_id: Some(task_id),
                reminder_type,
                message: message_for(reminder_type, &task),
                scheduled_for,
                status: ReminderStatus::Pending,
                created_by: actor,
            };
            let reminder_id = reminder.id;
            if let Err(e) = store.insert_reminder(reminder).await {
                debug!(task = %task_id, error = %e, "reminder insert failed");
                failures.push(ItemFailure::new(task_id, e));
                continue;
            }

            self.ctx.audit(
                AuditEntry::new(EntityKind::Reminder, reminder_id, AuditAction::CreateReminder, actor, now)
                    .with_after(json!({
                        "task_id": task_id,
                        "user_id": assignee,
                        "reminder_type": reminder_type,
                        "scheduled_for": scheduled_for,
                    })),
            );
            created.push(task_id);
        }

        info!(
            ?reminder_type,
            created = created.len(),
            failed = failures.len(),
            "reminder batch finished"
        );

        Ok(ReminderBatch {
            created_reminders: created.len(),
            tasks_with_reminders: created,
            failures,
        })
    }
}

fn message_for(reminder_type: ReminderType, task: &Task) -> String {
    match reminder_type {
        ReminderType::Escalation => format!("Task \"{}\" has been escalated", task.title),
        ReminderType::FollowUp => format!("Follow up on task \"{}\"", task.title),
        ReminderType::Deadline => match task.due_at {
            Some(due) => format!("Task \"{}\" is due at {}", task.title, due.to_rfc3339()),
            None => format!("Task \"{}\" has an upcoming deadline", task.title),
        },
        ReminderType::Overdue => format!("Task \"{}\" is overdue", task.title),
    }
}
