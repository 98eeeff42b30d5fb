//! Operation trait と 5 つの標準 operation
//!
//! 各 operation は params の型で、`NAME` がリクエストの `"operation"` と
//! 対応します。ルールのコンポーネント自身が `Handler<O>` を実装します。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::handler::Handler;
use crate::domain::{Actor, DepartmentId, ReminderType, RulesError, TaskId, UserId};
use crate::rules::{
    BulkAssigner, BulkAssignment, CompletionOutcome, DependencyResolver, EscalationReport,
    EscalationScanner, RebalanceReport, Rebalancer, ReminderBatch, ReminderBatcher,
};

/// Operation は operation 名と params / 結果の型を対応付ける
///
/// # Trait Bounds
/// - `DeserializeOwned`: リクエスト JSON から params を復元するため
/// - `Send + Sync + 'static`: type erasure して Arc に格納するため
pub trait Operation: DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
    type Output: Serialize + Send + 'static;

    /// Shape checks that need no store access.
    fn validate(&self) -> Result<(), RulesError> {
        Ok(())
    }
}

fn non_empty(task_ids: &[TaskId]) -> Result<(), RulesError> {
    if task_ids.is_empty() {
        return Err(RulesError::validation("task_ids must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkTaskAssignment {
    pub task_ids: Vec<TaskId>,
    pub user_id: UserId,
    pub assigned_by: UserId,
}

impl Operation for BulkTaskAssignment {
    const NAME: &'static str = "bulk_task_assignment";
    type Output = BulkAssignment;

    fn validate(&self) -> Result<(), RulesError> {
        non_empty(&self.task_ids)
    }
}

#[async_trait]
impl Handler<BulkTaskAssignment> for BulkAssigner {
    async fn handle(&self, op: BulkTaskAssignment) -> Result<BulkAssignment, RulesError> {
        self.assign_many(&op.task_ids, op.user_id, Actor::User(op.assigned_by))
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CascadeTaskCompletion {
    pub task_id: TaskId,
    pub completed_by: UserId,
}

impl Operation for CascadeTaskCompletion {
    const NAME: &'static str = "cascade_task_completion";
    type Output = CompletionOutcome;
}

#[async_trait]
impl Handler<CascadeTaskCompletion> for DependencyResolver {
    async fn handle(&self, op: CascadeTaskCompletion) -> Result<CompletionOutcome, RulesError> {
        self.complete_task(op.task_id, Actor::User(op.completed_by))
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserWorkloadBalancing {
    pub department_id: DepartmentId,
    pub requested_by: UserId,
}

impl Operation for UserWorkloadBalancing {
    const NAME: &'static str = "user_workload_balancing";
    type Output = RebalanceReport;
}

#[async_trait]
impl Handler<UserWorkloadBalancing> for Rebalancer {
    async fn handle(&self, op: UserWorkloadBalancing) -> Result<RebalanceReport, RulesError> {
        debug!(requested_by = %op.requested_by, department = %op.department_id, "rebalance requested");
        self.recommend(op.department_id).await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomatedTaskEscalation {
    pub overdue_hours: u32,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

impl Operation for AutomatedTaskEscalation {
    const NAME: &'static str = "automated_task_escalation";
    type Output = EscalationReport;
}

#[async_trait]
impl Handler<AutomatedTaskEscalation> for EscalationScanner {
    async fn handle(&self, op: AutomatedTaskEscalation) -> Result<EscalationReport, RulesError> {
        self.escalate(op.overdue_hours, op.department_id).await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchReminderCreation {
    pub task_ids: Vec<TaskId>,
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub created_by: UserId,
}

impl Operation for BatchReminderCreation {
    const NAME: &'static str = "batch_reminder_creation";
    type Output = ReminderBatch;

    fn validate(&self) -> Result<(), RulesError> {
        non_empty(&self.task_ids)
    }
}

#[async_trait]
impl Handler<BatchReminderCreation> for ReminderBatcher {
    async fn handle(&self, op: BatchReminderCreation) -> Result<ReminderBatch, RulesError> {
        self.create_reminders(
            &op.task_ids,
            op.reminder_type,
            op.scheduled_for,
            Actor::User(op.created_by),
        )
        .await
    }
}

/// Every operation a standard dispatcher must serve.
pub const STANDARD_OPERATIONS: [&str; 5] = [
    BulkTaskAssignment::NAME,
    CascadeTaskCompletion::NAME,
    UserWorkloadBalancing::NAME,
    AutomatedTaskEscalation::NAME,
    BatchReminderCreation::NAME,
];
