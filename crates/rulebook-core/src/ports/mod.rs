//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。
//! ルールエンジンは外部システム（DB、監査ログ、時刻）にこの trait 越しにだけ触れます。

pub mod audit_sink;
pub mod clock;
pub mod id_generator;
pub mod store;

pub use self::audit_sink::{AuditError, AuditSink};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::store::{
    ReminderFilter, Store, StoreError, StoreResult, TaskFilter, UserFilter,
};
