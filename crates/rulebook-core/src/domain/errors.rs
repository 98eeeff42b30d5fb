//! Errors - エラー型と分類
//!
//! `RulesError` は 1 つの操作を失敗させるエラーです。
//! バッチ操作の個別失敗は結果の `failures` に集約し、ここには来ません。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::audit::EntityKind;
use super::ids::UserId;
use crate::ports::store::StoreError;

/// ErrorKind はレスポンスに載せる粗い分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Inactive,
    Validation,
    Store,
    Busy,
    Timeout,
    UnknownOperation,
    Internal,
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("{entity:?} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("user {0} is not active")]
    Inactive(UserId),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} is already running")]
    Busy(&'static str),

    #[error("operation {operation} exceeded {limit_ms}ms")]
    Timeout { operation: String, limit_ms: u128 },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Handler panicked or produced output that could not be encoded.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RulesError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        RulesError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RulesError::Validation(message.into())
    }

    /// Store-level "not found" is reported as a domain NotFound.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RulesError::NotFound { .. } => ErrorKind::NotFound,
            RulesError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            RulesError::Inactive(_) => ErrorKind::Inactive,
            RulesError::Validation(_) => ErrorKind::Validation,
            RulesError::Store(_) => ErrorKind::Store,
            RulesError::Busy(_) => ErrorKind::Busy,
            RulesError::Timeout { .. } => ErrorKind::Timeout,
            RulesError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            RulesError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type RulesResult<T> = Result<T, RulesError>;
