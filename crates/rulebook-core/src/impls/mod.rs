//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryStore**: テスト・CLI 用の正本
//! - **ChannelAuditSink / TracingAuditSink / MemoryAuditSink**
//!
//! 本番の Store（PostgreSQL など）は別クレートに置く想定です。

pub mod audit;
pub mod memory_store;

pub use self::audit::{ChannelAuditSink, MemoryAuditSink, TracingAuditSink};
pub use self::memory_store::{InMemoryStore, StoreFixture};
