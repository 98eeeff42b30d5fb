//! Store port - エンティティ保存の正本（source of truth）
//!
//! Store は Task / User / Department / Reminder を id で管理します。
//! 永続化の詳細（SQL、インデックス、マイグレーション）はこの trait の外側です。
//!
//! # 楽観的並行制御
//! - `update_task` は引数の `version` と保存済みの `version` を比較し、
//!   一致した場合のみ書き込んで `version + 1` を保存する
//! - 不一致は `StoreError::Conflict`（呼び出し側が再読込・スキップを判断）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Department, DepartmentId, EntityKind, Priority, Reminder, ReminderType, Role, Task, TaskId,
    TaskStatus, User, UserId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity:?} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("{entity:?} already exists: {id}")]
    AlreadyExists { entity: EntityKind, id: String },

    #[error("version conflict on {entity:?} {id}: expected {expected}, found {actual}")]
    Conflict {
        entity: EntityKind,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Declarative task predicate. Every `Some` field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub ids: Option<Vec<TaskId>>,
    pub statuses: Option<Vec<TaskStatus>>,
    pub assignee: Option<UserId>,
    /// Only tasks with no assignee.
    pub unassigned: bool,
    pub department_id: Option<DepartmentId>,
    pub priority: Option<Priority>,
    /// Due date strictly before this instant (tasks without a due date never match).
    pub due_before: Option<DateTime<Utc>>,
    /// Dependency list contains this id.
    pub depends_on: Option<TaskId>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_statuses(mut self, statuses: &[TaskStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.assignee = Some(user);
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.unassigned = true;
        self
    }

    pub fn in_department(mut self, department: DepartmentId) -> Self {
        self.department_id = Some(department);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.due_before = Some(cutoff);
        self
    }

    pub fn depending_on(mut self, task: TaskId) -> Self {
        self.depends_on = Some(task);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&task.id) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(user) = self.assignee {
            if task.assignee != Some(user) {
                return false;
            }
        }
        if self.unassigned && task.assignee.is_some() {
            return false;
        }
        if let Some(department) = self.department_id {
            if task.department_id != Some(department) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(cutoff) = self.due_before {
            if !task.due_at.is_some_and(|due| due < cutoff) {
                return false;
            }
        }
        if let Some(prerequisite) = self.depends_on {
            if !task.depends_on(prerequisite) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub department_id: Option<DepartmentId>,
    pub active: Option<bool>,
    pub roles: Option<Vec<Role>>,
}

impl UserFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_department(mut self, department: DepartmentId) -> Self {
        self.department_id = Some(department);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active = Some(true);
        self
    }

    pub fn with_roles(mut self, roles: &[Role]) -> Self {
        self.roles = Some(roles.to_vec());
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        self.department_id.is_none_or(|d| user.department_id == d)
            && self.active.is_none_or(|a| user.active == a)
            && self.roles.as_ref().is_none_or(|roles| roles.contains(&user.role))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderFilter {
    pub user_id: Option<UserId>,
    pub task_id: Option<TaskId>,
    pub reminder_type: Option<ReminderType>,
}

impl ReminderFilter {
    pub fn matches(&self, reminder: &Reminder) -> bool {
        self.user_id.is_none_or(|u| reminder.user_id == u)
            && self.task_id.is_none_or(|t| reminder.task_id == Some(t))
            && self.reminder_type.is_none_or(|r| reminder.reminder_type == r)
    }
}

/// Store は Task / User / Department / Reminder の正本
///
/// `filter_*` の戻り値の順序は未規定。順序が必要な呼び出し側がソートする。
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_task(&self, id: TaskId) -> StoreResult<Task>;

    async fn filter_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    async fn insert_task(&self, task: Task) -> StoreResult<()>;

    /// Compare-and-swap on `task.version`; returns the stored record.
    async fn update_task(&self, task: Task) -> StoreResult<Task>;

    async fn get_user(&self, id: UserId) -> StoreResult<User>;

    async fn filter_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn insert_user(&self, user: User) -> StoreResult<()>;

    async fn get_department(&self, id: DepartmentId) -> StoreResult<Department>;

    async fn insert_department(&self, department: Department) -> StoreResult<()>;

    async fn insert_reminder(&self, reminder: Reminder) -> StoreResult<()>;

    async fn filter_reminders(&self, filter: &ReminderFilter) -> StoreResult<Vec<Reminder>>;
}
