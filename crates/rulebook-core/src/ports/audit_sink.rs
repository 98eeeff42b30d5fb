//! AuditSink port - 変更履歴の記録
//!
//! # 設計原則
//! - `record` は同期・非ブロッキング（fire-and-forget）
//! - 失敗は呼び出し側でログに出して握りつぶす（業務操作を失敗させない）

use thiserror::Error;

use crate::domain::AuditEntry;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink is full")]
    Full,

    #[error("audit sink is closed")]
    Closed,

    #[error("audit sink error: {0}")]
    Other(String),
}

/// AuditSink は 1 件の変更を記録する
///
/// 実装は決してブロックしてはいけない。
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}
