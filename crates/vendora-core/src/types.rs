//! Data model for the notification delivery core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery channel. A closed set: adding a channel is a compile-time
/// checked change, never an open-ended string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Webhook,
}

impl Channel {
    /// Parse a channel name coming from the route layer.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("Unknown channel: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification priority. High drains from the queue first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Queue drain rank: lower drains first.
    pub fn rank(&self) -> i64 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Normal,
        }
    }
}

/// Sentinel tenant for system-initiated notifications. A null tenant is a
/// validation failure; anonymous sends must go through this.
pub const SYSTEM_TENANT: &str = "system";

/// Ephemeral input to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub channel: Channel,
    pub recipient: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    pub tenant_id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    pub fn new(channel: Channel, recipient: &str, message: &str, tenant_id: &str) -> Self {
        Self {
            channel,
            recipient: recipient.to_string(),
            subject: None,
            message: message.to_string(),
            tenant_id: tenant_id.to_string(),
            priority: Priority::Normal,
            scheduled_for: None,
        }
    }

    /// System-initiated notification, attributed to the sentinel tenant.
    pub fn system(channel: Channel, recipient: &str, message: &str) -> Self {
        Self::new(channel, recipient, message, SYSTEM_TENANT)
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }
}

/// Content handed to a channel sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    pub subject: Option<String>,
    pub body: String,
}

impl MessageContent {
    pub fn from_request(req: &NotificationRequest) -> Self {
        Self {
            subject: req.subject.clone(),
            body: req.message.clone(),
        }
    }
}

/// Successful channel send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Provider-assigned id (message SID, SMTP message id, or a local uuid).
    pub provider_id: String,
}

/// Failure classification: transient failures feed the retry loop,
/// permanent ones propagate immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Normalized channel send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub kind: FailureKind,
    pub error: String,
    pub suggestion: Option<String>,
}

impl SendFailure {
    pub fn transient(error: impl Into<String>) -> Self {
        Self { kind: FailureKind::Transient, error: error.into(), suggestion: None }
    }

    pub fn permanent(error: impl Into<String>) -> Self {
        Self { kind: FailureKind::Permanent, error: error.into(), suggestion: None }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Normalized outcome of one channel send.
pub type SendOutcome = Result<Sent, SendFailure>;

/// Transient record of one delivery try; folded into the final result,
/// never persisted individually.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    PermanentFailure,
}

/// Terminal state reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Scheduled,
    Failed,
}

/// Structured result returned to the caller. Exactly one of `message_id`
/// and `error` is populated for sent/failed results; scheduled results
/// carry neither and echo the timestamp instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NotificationResult {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            suggestion: None,
            status: NotificationStatus::Sent,
            scheduled_for: None,
        }
    }

    pub fn scheduled(at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            message_id: None,
            error: None,
            suggestion: None,
            status: NotificationStatus::Scheduled,
            scheduled_for: Some(at),
        }
    }

    pub fn failed(error: impl Into<String>, suggestion: Option<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            suggestion,
            status: NotificationStatus::Failed,
            scheduled_for: None,
        }
    }
}

/// Durable queue record status. Transitions are forward-only:
/// `Pending → Sending → Sent | Failed`. `Sending` is the worker's claim
/// state so overlapping sweeps never pick the same record twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "sending" => Self::Sending,
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    fn order(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Sending => 1,
            Self::Sent | Self::Failed => 2,
        }
    }

    /// A record's status never moves backward.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        next.order() > self.order()
    }
}

/// Durable record in the queue. Never deleted by this core; retention is
/// an external sweep's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedNotification {
    pub queue_id: i64,
    pub tenant_id: String,
    pub channel: Channel,
    pub recipient: String,
    /// Opaque payload blob: `{ "subject": ..., "message": ... }`.
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub status: QueueStatus,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl QueuedNotification {
    /// Rebuild the dispatch request this record was enqueued from.
    pub fn to_request(&self) -> NotificationRequest {
        NotificationRequest {
            channel: self.channel,
            recipient: self.recipient.clone(),
            subject: self.payload["subject"].as_str().map(String::from),
            message: self.payload["message"].as_str().unwrap_or_default().to_string(),
            tenant_id: self.tenant_id.clone(),
            priority: self.priority,
            scheduled_for: None,
        }
    }
}

/// Analytics metric bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sent,
    Delivered,
    Failed,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}
