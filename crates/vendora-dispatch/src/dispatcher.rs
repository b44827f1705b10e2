//! Dispatcher — the single entry point for sending a notification.
//!
//! Validates the request, decides between immediate delivery and queueing,
//! drives the retry loop, and records the outcome. Recording is
//! fire-and-forget: a broken ledger or analytics store never changes the
//! caller's result.

use std::sync::Arc;

use chrono::Utc;
use vendora_channels::Transport;
use vendora_channels::validate::validate_channel;
use vendora_core::config::NotifyConfig;
use vendora_core::types::{
    MessageContent, Metric, NotificationRequest, NotificationResult, NotificationStatus,
};

use crate::queue::QueueDb;
use crate::recorder::{NotificationRecord, Recorder};
use crate::retry::{RetryPolicy, send_with_retry};

pub struct Dispatcher {
    config: Arc<NotifyConfig>,
    transport: Arc<dyn Transport>,
    queue: Arc<QueueDb>,
    recorder: Arc<dyn Recorder>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<NotifyConfig>,
        transport: Arc<dyn Transport>,
        queue: Arc<QueueDb>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self { config, transport, queue, recorder }
    }

    pub fn queue(&self) -> Arc<QueueDb> {
        self.queue.clone()
    }

    /// Send one notification. Always resolves to a [`NotificationResult`];
    /// invalid input and exhausted retries come back as failed results,
    /// never panics or hangs.
    pub async fn send_notification(&self, req: &NotificationRequest) -> NotificationResult {
        if let Some(field) = first_missing_field(req) {
            return NotificationResult::failed(format!("{field} is required"), None);
        }

        let check = validate_channel(&self.config, req.channel);
        if !check.valid {
            let reason = check
                .reason
                .unwrap_or_else(|| format!("Channel {} is not usable", req.channel));
            return NotificationResult::failed(
                reason,
                Some(format!("enable and configure the {} channel", req.channel)),
            );
        }

        if let Some(at) = req.scheduled_for {
            if at > Utc::now() {
                return match self.queue.enqueue(req, at) {
                    Ok(queue_id) => {
                        tracing::info!(
                            "Queued {} notification {queue_id} for {at}",
                            req.channel
                        );
                        self.record_outcome(req, NotificationStatus::Scheduled, None, None);
                        NotificationResult::scheduled(at)
                    }
                    Err(e) => NotificationResult::failed(
                        format!("Failed to queue notification: {e}"),
                        None,
                    ),
                };
            }
        }

        self.deliver_now(req).await
    }

    /// Deliver immediately through the retry loop, then record. Also the
    /// path the queue worker takes for due records.
    pub async fn deliver_now(&self, req: &NotificationRequest) -> NotificationResult {
        let policy = RetryPolicy::from_config(&self.config.retry);
        let content = MessageContent::from_request(req);
        let transport = &self.transport;

        let outcome = send_with_retry(
            &policy,
            |_attempt| transport.deliver(req.channel, &req.recipient, &content),
            |attempt| {
                tracing::debug!(
                    "Attempt {} for {} to {}: {:?}",
                    attempt.attempt_number,
                    req.channel,
                    req.recipient,
                    attempt.outcome
                );
            },
        )
        .await;

        match outcome {
            Ok(sent) => {
                self.record_outcome(
                    req,
                    NotificationStatus::Sent,
                    Some(sent.provider_id.clone()),
                    None,
                );
                NotificationResult::sent(sent.provider_id)
            }
            Err(failure) => {
                self.record_outcome(
                    req,
                    NotificationStatus::Failed,
                    None,
                    Some(failure.error.clone()),
                );
                NotificationResult::failed(failure.error, failure.suggestion)
            }
        }
    }

    /// Best-effort ledger and analytics writes on independent tasks. A
    /// failure in either is logged and dropped.
    fn record_outcome(
        &self,
        req: &NotificationRequest,
        status: NotificationStatus,
        message_id: Option<String>,
        error: Option<String>,
    ) {
        let record = NotificationRecord {
            tenant_id: req.tenant_id.clone(),
            channel: req.channel,
            recipient: req.recipient.clone(),
            subject: req.subject.clone(),
            message: req.message.clone(),
            status,
            message_id: message_id.clone(),
            error,
        };
        let recorder = self.recorder.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.log_notification(&record).await {
                tracing::warn!("Failed to log notification: {e}");
            }
        });

        let metric = match status {
            NotificationStatus::Sent => Metric::Sent,
            NotificationStatus::Failed => Metric::Failed,
            NotificationStatus::Scheduled => return,
        };
        let recorder = self.recorder.clone();
        let tenant_id = req.tenant_id.clone();
        let channel = req.channel;
        let notification_id = message_id.unwrap_or_default();
        tokio::spawn(async move {
            if let Err(e) = recorder
                .track_analytics(&tenant_id, &notification_id, metric, channel)
                .await
            {
                tracing::warn!("Failed to track analytics: {e}");
            }
        });
    }
}

fn first_missing_field(req: &NotificationRequest) -> Option<&'static str> {
    if req.recipient.trim().is_empty() {
        Some("Recipient")
    } else if req.message.trim().is_empty() {
        Some("Message")
    } else if req.tenant_id.trim().is_empty() {
        Some("Tenant id")
    } else {
        None
    }
}
