//! Domain model (IDs, tasks, users, reminders, audit entries, workload).

pub mod audit;
pub mod errors;
pub mod ids;
pub mod reminder;
pub mod task;
pub mod user;
pub mod workload;

pub use self::audit::{Actor, AuditAction, AuditEntry, EntityKind};
pub use self::errors::{ErrorKind, RulesError, RulesResult};
pub use self::ids::{DepartmentId, ReminderId, TaskId, UserId};
pub use self::reminder::{Reminder, ReminderStatus, ReminderType};
pub use self::task::{Priority, Task, TaskStatus};
pub use self::user::{Department, Role, User};
pub use self::workload::{WorkloadClass, WorkloadSnapshot};
