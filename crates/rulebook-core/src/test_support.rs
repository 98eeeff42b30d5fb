//! Shared fixtures for the in-crate test suites.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ulid::Ulid;

use crate::config::RulesConfig;
use crate::domain::{
    AuditEntry, Department, DepartmentId, Priority, Role, Task, TaskId, TaskStatus, User, UserId,
};
use crate::impls::{InMemoryStore, MemoryAuditSink};
use crate::ports::{AuditError, AuditSink, FixedClock, Store};
use crate::rules::RulesContext;

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub(crate) fn hours_ago(hours: i64) -> DateTime<Utc> {
    now() - Duration::hours(hours)
}

pub(crate) fn task_id(n: u128) -> TaskId {
    TaskId::from_ulid(Ulid::from_parts(1, n))
}

pub(crate) fn user_id(n: u128) -> UserId {
    UserId::from_ulid(Ulid::from_parts(2, n))
}

pub(crate) fn dept_id(n: u128) -> DepartmentId {
    DepartmentId::from_ulid(Ulid::from_parts(3, n))
}

/// Always rejects entries.
pub(crate) struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Closed)
    }
}

pub(crate) struct Harness {
    pub store: InMemoryStore,
    pub audit: Arc<MemoryAuditSink>,
    pub clock: Arc<FixedClock>,
    pub ctx: RulesContext,
    /// Department 1, created up front.
    pub dept: DepartmentId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(RulesConfig::default()).await
    }

    pub async fn with_config(config: RulesConfig) -> Self {
        let store = InMemoryStore::new();
        let audit = Arc::new(MemoryAuditSink::new());
        let clock = Arc::new(FixedClock::new(now()));
        let ctx = RulesContext::new(
            Arc::new(store.clone()),
            audit.clone(),
            clock.clone(),
            config,
        );
        let dept = dept_id(1);
        store
            .insert_department(Department::new(dept, "Front Office"))
            .await
            .unwrap();
        Self {
            store,
            audit,
            clock,
            ctx,
            dept,
        }
    }

    pub async fn add_department(&self, n: u128) -> DepartmentId {
        let id = dept_id(n);
        self.store
            .insert_department(Department::new(id, format!("dept {n}")))
            .await
            .unwrap();
        id
    }

    pub async fn add_user(&self, n: u128, role: Role) -> UserId {
        self.add_user_in(n, role, self.dept).await
    }

    pub async fn add_user_in(&self, n: u128, role: Role, dept: DepartmentId) -> UserId {
        let id = user_id(n);
        self.store
            .insert_user(User::new(id, format!("user {n}"), dept, role))
            .await
            .unwrap();
        id
    }

    pub async fn add_inactive_user(&self, n: u128) -> UserId {
        let mut user = User::new(user_id(n), format!("user {n}"), self.dept, Role::Staff);
        user.active = false;
        let id = user.id;
        self.store.insert_user(user).await.unwrap();
        id
    }

    /// Pending, medium priority, in `self.dept`, created a day ago.
    pub async fn add_task(&self, n: u128, edit: impl FnOnce(&mut Task)) -> TaskId {
        let mut task = Task::new(task_id(n), format!("task {n}"), hours_ago(24));
        task.department_id = Some(self.dept);
        edit(&mut task);
        let id = task.id;
        self.store.insert_task(task).await.unwrap();
        id
    }

    /// Open task assigned to `user`.
    pub async fn add_open_task(
        &self,
        n: u128,
        user: UserId,
        priority: Priority,
        due_at: Option<DateTime<Utc>>,
    ) -> TaskId {
        self.add_task(n, |t| {
            t.assign_to(user);
            t.priority = priority;
            t.due_at = due_at;
        })
        .await
    }

    pub async fn store_user(&self, id: UserId) -> User {
        self.store.get_user(id).await.unwrap()
    }

    pub async fn task(&self, id: TaskId) -> Task {
        self.store.get_task(id).await.unwrap()
    }

    pub async fn status(&self, id: TaskId) -> TaskStatus {
        self.task(id).await.status
    }
}
