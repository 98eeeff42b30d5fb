//! Dispatch - operation 名で振り分ける入口
//!
//! # 二層構造
//! - **表層（Typed）**: `Operation` trait, `Handler<O>` trait - params / 結果が型で決まる
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, JSON in / JSON out
//!
//! `Dispatcher` は registry から handler を引き、timeout つきで実行して
//! 常に `Response` を返します。

pub mod dispatcher;
pub mod handler;
pub mod operation;
pub mod registry;

pub use self::dispatcher::{BuildError, Dispatcher, DispatcherBuilder, ErrorBody, Response};
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::operation::{
    AutomatedTaskEscalation, BatchReminderCreation, BulkTaskAssignment, CascadeTaskCompletion,
    Operation, STANDARD_OPERATIONS, UserWorkloadBalancing,
};
pub use self::registry::{OperationRegistry, RegistryError};
