//! Dispatcher - リクエスト JSON を operation に振り分ける
//!
//! # リクエスト
//! `{ "operation": "<name>", ...params }`。`operation` 以外のキーが params です。
//!
//! # レスポンス
//! 成否にかかわらず `Response` を返し、`Err` や panic は外に出しません。
//! - 成功: `{ "success": true, "operation": ..., "data": ... }`
//! - 失敗: `{ "success": false, "operation": ..., "error": { "kind", "message" } }`
//!
//! 各 handler は別タスクで実行し、`request_timeout` を超えたら中断します。

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::handler::Handler;
use super::operation::{
    AutomatedTaskEscalation, BatchReminderCreation, BulkTaskAssignment, CascadeTaskCompletion,
    Operation, STANDARD_OPERATIONS, UserWorkloadBalancing,
};
use super::registry::{OperationRegistry, RegistryError};
use crate::domain::{ErrorKind, RulesError};
use crate::rules::{
    BulkAssigner, DependencyResolver, EscalationScanner, Rebalancer, ReminderBatcher, RulesContext,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn success(operation: String, data: Value) -> Self {
        Self {
            success: true,
            operation: Some(operation),
            data: Some(data),
            error: None,
        }
    }

    fn failure(operation: Option<String>, error: &RulesError) -> Self {
        Self {
            success: false,
            operation,
            data: None,
            error: Some(ErrorBody {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no handler registered for: {}", .0.join(", "))]
    MissingOperations(Vec<&'static str>),
}

pub struct DispatcherBuilder {
    registry: OperationRegistry,
    expected: Vec<&'static str>,
    request_timeout: Duration,
}

impl DispatcherBuilder {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            registry: OperationRegistry::new(),
            expected: Vec::new(),
            request_timeout,
        }
    }

    pub fn register<O: Operation, H: Handler<O> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<&mut Self, BuildError> {
        self.registry.register::<O, H>(handler)?;
        Ok(self)
    }

    /// `build` fails unless every name here has a handler.
    pub fn expect_operations(&mut self, names: &[&'static str]) -> &mut Self {
        self.expected.extend_from_slice(names);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let missing: Vec<&'static str> = self
            .expected
            .iter()
            .copied()
            .filter(|name| !self.registry.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingOperations(missing));
        }
        Ok(Dispatcher {
            registry: self.registry,
            request_timeout: self.request_timeout,
        })
    }
}

pub struct Dispatcher {
    registry: OperationRegistry,
    request_timeout: Duration,
}

impl Dispatcher {
    /// All five rule operations, wired to components sharing `ctx`.
    pub fn standard(ctx: RulesContext) -> Result<Self, BuildError> {
        let mut builder = DispatcherBuilder::new(ctx.config().dispatch.request_timeout);
        builder
            .expect_operations(&STANDARD_OPERATIONS)
            .register::<BulkTaskAssignment, _>(BulkAssigner::new(ctx.clone()))?
            .register::<CascadeTaskCompletion, _>(DependencyResolver::new(ctx.clone()))?
            .register::<UserWorkloadBalancing, _>(Rebalancer::new(ctx.clone()))?
            .register::<AutomatedTaskEscalation, _>(EscalationScanner::new(ctx.clone()))?
            .register::<BatchReminderCreation, _>(ReminderBatcher::new(ctx))?;
        builder.build()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.registry.operations()
    }

    pub async fn dispatch(&self, request: Value) -> Response {
        let started = Instant::now();
        let (operation, params) = match split_request(request) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "rejected request");
                return Response::failure(None, &e);
            }
        };

        let Some(handler) = self.registry.get(&operation) else {
            warn!(%operation, "unknown operation");
            let error = RulesError::UnknownOperation(operation.clone());
            return Response::failure(Some(operation), &error);
        };

        let mut task = tokio::spawn(async move { handler.handle_dyn(params).await });
        let result = match tokio::time::timeout(self.request_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(RulesError::Internal(format!(
                "handler for {operation} did not finish: {join_error}"
            ))),
            Err(_) => {
                task.abort();
                Err(RulesError::Timeout {
                    operation: operation.clone(),
                    limit_ms: self.request_timeout.as_millis(),
                })
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(data) => {
                info!(%operation, elapsed_ms, "operation succeeded");
                Response::success(operation, data)
            }
            Err(e) => {
                warn!(%operation, elapsed_ms, kind = ?e.kind(), error = %e, "operation failed");
                Response::failure(Some(operation), &e)
            }
        }
    }
}

/// Splits `{ "operation": name, ...params }` into the name and the params object.
fn split_request(request: Value) -> Result<(String, Value), RulesError> {
    let Value::Object(mut fields) = request else {
        return Err(RulesError::validation("request must be a JSON object"));
    };
    match fields.remove("operation") {
        Some(Value::String(name)) => Ok((name, Value::Object(fields))),
        Some(_) => Err(RulesError::validation("\"operation\" must be a string")),
        None => Err(RulesError::validation("missing \"operation\"")),
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("registered", &self.registry.operations())
            .field("expected", &self.expected)
            .finish()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.registry.operations())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use crate::config::RulesConfig;
    use crate::domain::{Priority, Role, TaskStatus};
    use crate::test_support::{Harness, hours_ago, task_id};

    fn dispatcher(h: &Harness) -> Dispatcher {
        Dispatcher::standard(h.ctx.clone()).unwrap()
    }

    #[derive(Debug, Deserialize)]
    struct Sleep {
        millis: u64,
    }

    impl Operation for Sleep {
        const NAME: &'static str = "sleep";
        type Output = Value;
    }

    struct SleepHandler;

    #[async_trait]
    impl Handler<Sleep> for SleepHandler {
        async fn handle(&self, op: Sleep) -> Result<Value, RulesError> {
            tokio::time::sleep(Duration::from_millis(op.millis)).await;
            Ok(json!({ "slept": op.millis }))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Explode {}

    impl Operation for Explode {
        const NAME: &'static str = "explode";
        type Output = Value;
    }

    struct ExplodeHandler;

    #[async_trait]
    impl Handler<Explode> for ExplodeHandler {
        async fn handle(&self, _op: Explode) -> Result<Value, RulesError> {
            panic!("handler blew up");
        }
    }

    #[tokio::test]
    async fn standard_dispatcher_serves_all_operations() {
        let h = Harness::new().await;
        assert_eq!(
            dispatcher(&h).operations(),
            vec![
                "automated_task_escalation",
                "batch_reminder_creation",
                "bulk_task_assignment",
                "cascade_task_completion",
                "user_workload_balancing",
            ]
        );
    }

    #[tokio::test]
    async fn missing_expected_operation_fails_the_build() {
        let mut builder = DispatcherBuilder::new(Duration::from_secs(1));
        builder
            .expect_operations(&["sleep", "explode"])
            .register::<Sleep, _>(SleepHandler)
            .unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, BuildError::MissingOperations(ref names) if names == &["explode"]));
    }

    #[tokio::test]
    async fn duplicate_registration_fails_the_build() {
        let mut builder = DispatcherBuilder::new(Duration::from_secs(1));
        builder.register::<Sleep, _>(SleepHandler).unwrap();
        let err = builder.register::<Sleep, _>(SleepHandler).unwrap_err();
        assert!(matches!(err, BuildError::Registry(RegistryError::AlreadyRegistered("sleep"))));
    }

    #[tokio::test]
    async fn cascade_completion_through_the_dispatcher() {
        let h = Harness::new().await;
        let actor = h.add_user(1, Role::Staff).await;
        let a = h.add_task(1, |_| {}).await;
        let b = h.add_task(2, |t| t.dependencies = vec![task_id(1)]).await;

        let response = dispatcher(&h)
            .dispatch(json!({
                "operation": "cascade_task_completion",
                "task_id": a,
                "completed_by": actor,
            }))
            .await;

        assert!(response.success, "{response:?}");
        assert_eq!(response.operation.as_deref(), Some("cascade_task_completion"));
        let data = response.data.unwrap();
        assert_eq!(data["completed_task"], json!(a));
        assert_eq!(data["unlocked_tasks"], json!([b]));
        assert_eq!(h.status(b).await, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn escalation_through_the_dispatcher() {
        let h = Harness::new().await;
        h.add_user(1, Role::Manager).await;
        let staff = h.add_user(2, Role::Staff).await;
        h.add_open_task(1, staff, Priority::High, Some(hours_ago(30))).await;

        let response = dispatcher(&h)
            .dispatch(json!({ "operation": "automated_task_escalation", "overdue_hours": 24 }))
            .await;

        let data = response.data.unwrap();
        assert_eq!(data["escalated_tasks"], 1);
        assert_eq!(data["tasks"][0]["new_priority"], "critical");
        assert_eq!(data["truncated"], false);
    }

    #[tokio::test]
    async fn rebalance_result_has_the_three_sections() {
        let h = Harness::new().await;
        let requester = h.add_user(1, Role::Manager).await;

        let response = dispatcher(&h)
            .dispatch(json!({
                "operation": "user_workload_balancing",
                "department_id": h.dept,
                "requested_by": requester,
            }))
            .await;

        let data = response.data.unwrap();
        assert!(data["user_workloads"].is_array());
        assert!(data["recommendations"].is_array());
        assert_eq!(data["summary"]["total_users"], 1);
    }

    #[tokio::test]
    async fn operation_errors_become_structured_failures() {
        let h = Harness::new().await;
        let actor = h.add_user(1, Role::Staff).await;

        let response = dispatcher(&h)
            .dispatch(json!({
                "operation": "cascade_task_completion",
                "task_id": task_id(9),
                "completed_by": actor,
            }))
            .await;

        assert!(!response.success);
        assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn malformed_requests_are_validation_errors() {
        let h = Harness::new().await;
        let d = dispatcher(&h);

        for request in [
            json!("cascade_task_completion"),
            json!({ "task_id": task_id(1) }),
            json!({ "operation": 7 }),
            json!({ "operation": "bulk_task_assignment", "task_ids": "nope" }),
            json!({ "operation": "automated_task_escalation", "overdue_hours": -3 }),
            json!({ "operation": "automated_task_escalation", "overdue_hours": u32::MAX }),
        ] {
            let response = d.dispatch(request.clone()).await;
            assert_eq!(response.error_kind(), Some(ErrorKind::Validation), "{request}");
        }
    }

    #[tokio::test]
    async fn unknown_operation_invokes_nothing() {
        let h = Harness::new().await;
        let a = h.add_task(1, |_| {}).await;

        let response = dispatcher(&h)
            .dispatch(json!({ "operation": "delete_everything", "task_id": a }))
            .await;

        assert_eq!(response.error_kind(), Some(ErrorKind::UnknownOperation));
        assert_eq!(response.operation.as_deref(), Some("delete_everything"));
        assert_eq!(h.task(a).await.version, 0);
        assert!(h.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn slow_handlers_time_out() {
        let mut builder = DispatcherBuilder::new(Duration::from_millis(20));
        builder.register::<Sleep, _>(SleepHandler).unwrap();
        let d = builder.build().unwrap();

        let fast = d.dispatch(json!({ "operation": "sleep", "millis": 0 })).await;
        assert!(fast.success);

        let slow = d.dispatch(json!({ "operation": "sleep", "millis": 5_000 })).await;
        assert_eq!(slow.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let mut builder = DispatcherBuilder::new(Duration::from_secs(1));
        builder.register::<Explode, _>(ExplodeHandler).unwrap();
        let d = builder.build().unwrap();

        let response = d.dispatch(json!({ "operation": "explode" })).await;
        assert_eq!(response.error_kind(), Some(ErrorKind::Internal));
    }

    #[tokio::test]
    async fn request_timeout_comes_from_config() {
        let mut config = RulesConfig::default();
        config.dispatch.request_timeout = Duration::from_millis(1);
        let h = Harness::with_config(config).await;

        let d = dispatcher(&h);
        assert_eq!(d.request_timeout, Duration::from_millis(1));
    }

    #[test]
    fn failure_response_serializes_without_data() {
        let response = Response::failure(
            Some("bulk_task_assignment".into()),
            &RulesError::validation("task_ids must not be empty"),
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "operation": "bulk_task_assignment",
                "error": {
                    "kind": "validation",
                    "message": "invalid request: task_ids must not be empty",
                },
            })
        );
    }
}
