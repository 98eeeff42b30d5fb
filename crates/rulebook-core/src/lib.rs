//! rulebook-core
//!
//! Cross-entity business rules for hospitality task management.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, user, reminder, audit, workload, errors）
//! - **ports**: 抽象化レイヤー（Store, AuditSink, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryStore, audit sinks）
//! - **rules**: ビジネスルール（cascade completion, rebalancing, escalation, bulk operations）
//! - **dispatch**: operation 名による振り分け（Operation, Handler, Dispatcher）
//! - **config**: TOML 設定

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod rules;

#[cfg(test)]
mod test_support;

pub use self::config::{ConfigError, RulesConfig};
pub use self::dispatch::{Dispatcher, Response};
pub use self::domain::{ErrorKind, RulesError, RulesResult};
pub use self::rules::RulesContext;
