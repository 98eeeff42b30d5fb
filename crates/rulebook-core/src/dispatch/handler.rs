//! Handler trait - Operation を実行する Handler の定義
//!
//! # 二層構造
//! - `Handler<O>`: 型付き。`O` 以外の params は受け取れない
//! - `DynHandler`: object-safe。JSON を受けて JSON を返す
//!
//! `TypedHandler<O, H>` が decode → validate → handle → encode を行い、
//! `Handler<O>` を `DynHandler` に変換します。

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::operation::Operation;
use crate::domain::RulesError;

/// Handler は Operation を実行して `O::Output` を返す
///
/// ```ignore
/// #[async_trait]
/// impl Handler<CascadeTaskCompletion> for DependencyResolver {
///     async fn handle(&self, op: CascadeTaskCompletion) -> Result<CompletionOutcome, RulesError> {
///         self.complete_task(op.task_id, Actor::User(op.completed_by)).await
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<O: Operation>: Send + Sync {
    async fn handle(&self, op: O) -> Result<O::Output, RulesError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// `HashMap<&'static str, Arc<dyn DynHandler>>` に格納するための trait です。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, params: Value) -> Result<Value, RulesError>;
    fn operation(&self) -> &'static str;
}

pub struct TypedHandler<O: Operation, H: Handler<O>> {
    handler: H,
    _marker: PhantomData<fn(O)>,
}

impl<O: Operation, H: Handler<O>> TypedHandler<O, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<O: Operation, H: Handler<O>> DynHandler for TypedHandler<O, H> {
    async fn handle_dyn(&self, params: Value) -> Result<Value, RulesError> {
        let op: O = serde_json::from_value(params)
            .map_err(|e| RulesError::validation(format!("invalid params for {}: {e}", O::NAME)))?;
        op.validate()?;
        let output = self.handler.handle(op).await?;
        serde_json::to_value(output)
            .map_err(|e| RulesError::Internal(format!("encode {} result: {e}", O::NAME)))
    }

    fn operation(&self) -> &'static str {
        O::NAME
    }
}
