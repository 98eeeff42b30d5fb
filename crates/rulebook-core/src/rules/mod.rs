//! Rules - タスク横断のビジネスルール
//!
//! 各コンポーネントは `RulesContext`（ports + 設定）だけを持ち、
//! 呼び出しをまたいだ可変状態は持ちません。
//!
//! # コンポーネント
//! - **DependencyResolver**: 完了 + 依存タスクの ready 化（cascade）
//! - **WorkloadScorer**: ユーザーごとの負荷スコア
//! - **Rebalancer**: 再割り当ての推奨（副作用なし）
//! - **EscalationScanner**: 期限超過タスクの優先度引き上げ + マネージャー通知
//! - **BulkAssigner**: 一括割り当て
//! - **ReminderBatcher**: リマインダーの一括作成

pub mod budget;
pub mod bulk;
pub mod dependency;
pub mod escalation;
pub mod rebalance;
pub mod reminders;
pub mod scoring;

pub use self::budget::{ScanBudget, StopReason};
pub use self::bulk::{BulkAssigner, BulkAssignment};
pub use self::dependency::{CompletionOutcome, DependencyResolver};
pub use self::escalation::{EscalationReport, EscalationScanner, EscalatedTask, SkippedTask};
pub use self::rebalance::{
    RebalanceReport, RebalanceSummary, Rebalancer, Recommendation, RecommendationKind,
};
pub use self::reminders::{ReminderBatch, ReminderBatcher};
pub use self::scoring::WorkloadScorer;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::config::RulesConfig;
use crate::domain::{AuditEntry, RulesError, RulesResult, TaskId};
use crate::ports::{AuditSink, Clock, IdGenerator, Store, UlidGenerator};

/// One item of a batch that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

impl ItemFailure {
    pub fn new(id: impl ToString, error: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            error: error.to_string(),
        }
    }
}

/// Checks a batch id list before any store access and drops repeats,
/// keeping first-seen order.
pub(crate) fn checked_task_ids(task_ids: &[TaskId], max: usize) -> RulesResult<Vec<TaskId>> {
    if task_ids.is_empty() {
        return Err(RulesError::validation("task_ids must not be empty"));
    }
    if task_ids.len() > max {
        return Err(RulesError::validation(format!(
            "at most {max} task ids per request, got {}",
            task_ids.len()
        )));
    }
    let mut seen = HashSet::with_capacity(task_ids.len());
    Ok(task_ids.iter().copied().filter(|id| seen.insert(*id)).collect())
}

/// Ports, configuration and engine-wide coordination shared by all components.
///
/// Clones share the store, the stop signal and the escalation run guard.
#[derive(Clone)]
pub struct RulesContext {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: Arc<RulesConfig>,
    stop_tx: Arc<watch::Sender<bool>>,
    escalation_guard: Arc<Mutex<()>>,
}

impl RulesContext {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: RulesConfig,
    ) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let (stop_tx, _) = watch::channel(false);
        Self {
            store,
            audit,
            clock,
            ids,
            config: Arc::new(config),
            stop_tx: Arc::new(stop_tx),
            escalation_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fire-and-forget: sink failures are logged, never returned.
    pub fn audit(&self, entry: AuditEntry) {
        let entity_id = entry.entity_id.clone();
        let action = entry.action;
        if let Err(e) = self.audit.record(entry) {
            tracing::warn!(%entity_id, ?action, error = %e, "audit entry dropped");
        }
    }

    /// Ask long scans to stop at their next checkpoint. Sticky until `resume`.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.stop_tx.send_replace(false);
    }

    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub(crate) fn escalation_guard(&self) -> &Arc<Mutex<()>> {
        &self.escalation_guard
    }
}
