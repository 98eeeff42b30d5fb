//! AuditSink implementations.
//!
//! - **ChannelAuditSink**: 有界 mpsc に `try_send`（本番向け、書き込み側は別タスク）
//! - **TracingAuditSink**: tracing のイベントとして出すだけ
//! - **MemoryAuditSink**: テスト・CLI 用にメモリへ溜める

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::domain::AuditEntry;
use crate::ports::{AuditError, AuditSink};

/// Hands entries to a background writer through a bounded channel.
///
/// A full channel drops the entry with `AuditError::Full` rather than waiting.
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEntry>,
}

impl ChannelAuditSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEntry>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.tx.try_send(entry).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AuditError::Full,
            mpsc::error::TrySendError::Closed(_) => AuditError::Closed,
        })
    }
}

/// Emits every entry as an `info` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let before = entry.before.as_ref().map(|v| v.to_string());
        let after = entry.after.as_ref().map(|v| v.to_string());
        tracing::info!(
            target: "audit",
            entity = ?entry.entity,
            entity_id = %entry.entity_id,
            action = ?entry.action,
            actor = ?entry.actor,
            before = before.as_deref().unwrap_or("-"),
            after = after.as_deref().unwrap_or("-"),
            "audit"
        );
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AuditError::Other(e.to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, AuditAction, EntityKind};
    use chrono::{TimeZone, Utc};

    fn entry(n: u32) -> AuditEntry {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        AuditEntry::new(EntityKind::Task, format!("task-{n}"), AuditAction::Assign, Actor::System, at)
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelAuditSink::new(4);
        sink.record(entry(1)).unwrap();
        sink.record(entry(2)).unwrap();

        assert_eq!(rx.recv().await.unwrap().entity_id, "task-1");
        assert_eq!(rx.recv().await.unwrap().entity_id, "task-2");
    }

    #[test]
    fn channel_sink_reports_full_instead_of_blocking() {
        let (sink, _rx) = ChannelAuditSink::new(1);
        sink.record(entry(1)).unwrap();
        assert!(matches!(sink.record(entry(2)), Err(AuditError::Full)));
    }

    #[test]
    fn channel_sink_reports_closed() {
        let (sink, rx) = ChannelAuditSink::new(1);
        drop(rx);
        assert!(matches!(sink.record(entry(1)), Err(AuditError::Closed)));
    }

    #[test]
    fn memory_sink_keeps_entries() {
        let sink = MemoryAuditSink::new();
        sink.record(entry(1)).unwrap();
        sink.record(entry(2)).unwrap();
        assert_eq!(sink.entries().len(), 2);
    }

    #[test]
    fn tracing_sink_never_fails() {
        assert!(TracingAuditSink.record(entry(1)).is_ok());
    }
}
