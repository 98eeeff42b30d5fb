//! In-memory store implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::domain::{
    Department, DepartmentId, EntityKind, Reminder, ReminderId, Task, TaskId, User, UserId,
};
use crate::ports::store::{
    ReminderFilter, Store, StoreError, StoreResult, TaskFilter, UserFilter,
};

/// Seed data for an `InMemoryStore` (CLI fixtures, demos).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// In-memory store state.
#[derive(Default)]
struct InMemoryStoreState {
    /// All task records (single source of truth for tasks).
    tasks: HashMap<TaskId, Task>,

    users: HashMap<UserId, User>,

    departments: HashMap<DepartmentId, Department>,

    reminders: HashMap<ReminderId, Reminder>,

    /// Tasks whose updates fail with a backend error (test hook).
    poisoned: HashSet<TaskId>,
}

impl InMemoryStoreState {
    fn update_task(&mut self, task: Task) -> StoreResult<Task> {
        if self.poisoned.contains(&task.id) {
            return Err(StoreError::Backend(format!("write rejected for {}", task.id)));
        }
        let Some(stored) = self.tasks.get_mut(&task.id) else {
            return Err(StoreError::not_found(EntityKind::Task, task.id));
        };
        if stored.version != task.version {
            return Err(StoreError::Conflict {
                entity: EntityKind::Task,
                id: task.id.to_string(),
                expected: task.version,
                actual: stored.version,
            });
        }
        let mut next = task;
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }
}

/// In-memory store.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_fixture(fixture: StoreFixture) -> StoreResult<Self> {
        let store = Self::new();
        for department in fixture.departments {
            store.insert_department(department).await?;
        }
        for user in fixture.users {
            store.insert_user(user).await?;
        }
        for task in fixture.tasks {
            store.insert_task(task).await?;
        }
        Ok(store)
    }

    /// All reminders, oldest schedule first.
    pub async fn reminders(&self) -> Vec<Reminder> {
        let state = self.state.lock().await;
        let mut reminders: Vec<Reminder> = state.reminders.values().cloned().collect();
        reminders.sort_by_key(|r| (r.scheduled_for, r.id));
        reminders
    }

    /// Make every later update of `task` fail (for testing)
    #[cfg(test)]
    pub async fn poison_task(&self, task: TaskId) {
        let mut state = self.state.lock().await;
        state.poisoned.insert(task);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_task(&self, id: TaskId) -> StoreResult<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Task, id))
    }

    async fn filter_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    async fn insert_task(&self, task: Task) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Task,
                id: task.id.to_string(),
            });
        }
        state.tasks.insert(task.id, task);
        Ok(())
    }

    async fn update_task(&self, task: Task) -> StoreResult<Task> {
        let mut state = self.state.lock().await;
        state.update_task(task)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::User, id))
    }

    async fn filter_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|user| filter.matches(user))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::User,
                id: user.id.to_string(),
            });
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    async fn get_department(&self, id: DepartmentId) -> StoreResult<Department> {
        let state = self.state.lock().await;
        state
            .departments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Department, id))
    }

    async fn insert_department(&self, department: Department) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.departments.contains_key(&department.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Department,
                id: department.id.to_string(),
            });
        }
        state.departments.insert(department.id, department);
        Ok(())
    }

    async fn insert_reminder(&self, reminder: Reminder) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.reminders.contains_key(&reminder.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Reminder,
                id: reminder.id.to_string(),
            });
        }
        state.reminders.insert(reminder.id, reminder);
        Ok(())
    }

    async fn filter_reminders(&self, filter: &ReminderFilter) -> StoreResult<Vec<Reminder>> {
        let state = self.state.lock().await;
        Ok(state
            .reminders
            .values()
            .filter(|reminder| filter.matches(reminder))
            .cloned()
            .collect())
    }
}
