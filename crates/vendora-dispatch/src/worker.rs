//! Queue worker — periodic sweep of due notifications.
//!
//! Each tick claims a bounded batch from the queue (the claim flips the
//! records to `sending`, so overlapping ticks never double-deliver) and
//! pushes every record through the dispatcher's immediate path.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use vendora_core::config::WorkerConfig;
use vendora_core::types::QueueStatus;

use crate::dispatcher::Dispatcher;

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub tick: Duration,
    pub batch_size: usize,
}

impl WorkerOptions {
    pub fn from_config(worker: &WorkerConfig) -> Self {
        Self {
            tick: Duration::from_secs(worker.tick_secs),
            batch_size: worker.batch_size,
        }
    }
}

/// One sweep: claim due records, deliver each, settle its queue status.
/// Returns how many records were processed.
pub async fn run_queue_sweep(dispatcher: &Dispatcher, batch_size: usize) -> usize {
    let queue = dispatcher.queue();
    let claimed = match queue.claim_due(batch_size) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Queue sweep failed to claim records: {e}");
            return 0;
        }
    };

    let mut processed = 0;
    for record in claimed {
        let req = record.to_request();
        let result = dispatcher.deliver_now(&req).await;

        let final_status = if result.success {
            QueueStatus::Sent
        } else {
            tracing::warn!(
                "Queued {} notification {} failed: {}",
                record.channel,
                record.queue_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
            QueueStatus::Failed
        };
        // Settling the status is best-effort; a stuck `sending` row is
        // recoverable, a lost delivery is not.
        if let Err(e) = queue.update_status(record.queue_id, final_status) {
            tracing::warn!("Failed to settle queue record {}: {e}", record.queue_id);
        }
        processed += 1;
    }
    processed
}

/// Spawn the sweep loop on its own task. Runs until the handle is aborted
/// or the runtime shuts down.
pub fn spawn_worker(dispatcher: Arc<Dispatcher>, options: WorkerOptions) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Queue worker started (tick {}s, batch {})",
            options.tick.as_secs(),
            options.batch_size
        );
        let mut interval = tokio::time::interval(options.tick);
        loop {
            interval.tick().await;
            let processed = run_queue_sweep(&dispatcher, options.batch_size).await;
            if processed > 0 {
                tracing::info!("Queue sweep delivered {processed} notification(s)");
            }
        }
    })
}
