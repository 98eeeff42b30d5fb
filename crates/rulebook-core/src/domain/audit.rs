//! Audit entries handed to the `AuditSink`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// Who caused a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Actor {
    User(UserId),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    User,
    Department,
    Reminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Complete,
    Unlock,
    Assign,
    Escalate,
    CreateReminder,
}

/// One mutation, recorded as before/after JSON snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity: EntityKind,
    pub entity_id: String,
    pub action: AuditAction,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity: EntityKind,
        entity_id: impl ToString,
        action: AuditAction,
        actor: Actor,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            entity_id: entity_id.to_string(),
            action,
            before: None,
            after: None,
            actor,
            recorded_at,
        }
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }
}
