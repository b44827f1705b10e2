//! # Vendora Dispatch
//! The delivery pipeline: dispatcher entry point, retry controller,
//! durable queue, queue worker and the best-effort ledger/analytics
//! recorder.

pub mod dispatcher;
pub mod queue;
pub mod recorder;
pub mod retry;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use queue::QueueDb;
pub use recorder::{NotificationRecord, Recorder, SqliteRecorder};
pub use retry::{RetryPolicy, send_with_retry};
pub use worker::{WorkerOptions, spawn_worker};
