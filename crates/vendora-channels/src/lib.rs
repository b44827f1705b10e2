//! # Vendora Channels
//! Channel senders behind one delivery contract.
//!
//! Four channels, a closed set: email (SMTP), sms (REST gateway), push
//! (FCM-style gateway) and webhook (plain HTTP POST). The dispatcher talks
//! to them through the [`Transport`] trait so tests can count and fake
//! deliveries without touching the network.

pub mod email;
pub mod push;
pub mod sms;
pub mod validate;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vendora_core::config::NotifyConfig;
use vendora_core::types::{Channel, MessageContent, SendFailure, SendOutcome};

use crate::validate::validate_channel;

/// The one contract every channel hides behind.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(
        &self,
        channel: Channel,
        recipient: &str,
        content: &MessageContent,
    ) -> SendOutcome;
}

/// Production transport: re-validates channel config, then dispatches via
/// exhaustive matching on the channel enum.
pub struct ChannelGateway {
    config: Arc<NotifyConfig>,
    client: reqwest::Client,
}

impl ChannelGateway {
    pub fn new(config: Arc<NotifyConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.config.retry.send_timeout_secs)
    }

    /// Webhook body: the caller-supplied payload verbatim when the message
    /// is a JSON object, otherwise a subject/message envelope.
    fn webhook_payload(content: &MessageContent) -> serde_json::Value {
        match serde_json::from_str::<serde_json::Value>(&content.body) {
            Ok(value) if value.is_object() => value,
            _ => serde_json::json!({
                "subject": content.subject,
                "message": content.body,
            }),
        }
    }
}

#[async_trait]
impl Transport for ChannelGateway {
    async fn deliver(
        &self,
        channel: Channel,
        recipient: &str,
        content: &MessageContent,
    ) -> SendOutcome {
        let check = validate_channel(&self.config, channel);
        if !check.valid {
            return Err(SendFailure::permanent(
                check.reason.unwrap_or_else(|| format!("Channel {channel} is not usable")),
            )
            .with_suggestion(format!("enable and configure the {channel} channel")));
        }

        let timeout = self.send_timeout();
        match channel {
            Channel::Email => {
                // validate_channel guarantees the section exists.
                let Some(cfg) = &self.config.email else {
                    return Err(SendFailure::permanent("Channel email is not enabled"));
                };
                match tokio::time::timeout(timeout, email::send_email(cfg, recipient, content))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(SendFailure::transient(format!(
                        "Network error: email send timed out after {}s",
                        timeout.as_secs()
                    ))),
                }
            }
            Channel::Sms => {
                let Some(cfg) = &self.config.sms else {
                    return Err(SendFailure::permanent("Channel sms is not enabled"));
                };
                sms::send_sms(&self.client, cfg, recipient, content, timeout).await
            }
            Channel::Push => {
                let Some(cfg) = &self.config.push else {
                    return Err(SendFailure::permanent("Channel push is not enabled"));
                };
                push::send_push(&self.client, cfg, recipient, content, timeout).await
            }
            Channel::Webhook => {
                let webhook_timeout = self
                    .config
                    .webhook
                    .as_ref()
                    .map(|w| Duration::from_secs(w.timeout_secs))
                    .unwrap_or(timeout);
                let payload = Self::webhook_payload(content);
                let outcome = webhook::send_webhook_notification(
                    &self.client,
                    recipient,
                    &payload,
                    webhook_timeout,
                )
                .await;
                webhook::into_send_outcome(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_refuses_unconfigured_channel() {
        let gateway = ChannelGateway::new(Arc::new(NotifyConfig::default()));
        let content = MessageContent { subject: None, body: "hello".into() };

        let err = gateway
            .deliver(Channel::Sms, "+14155552671", &content)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.error.contains("not enabled"));
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_webhook_payload_passthrough() {
        let content = MessageContent {
            subject: None,
            body: r#"{"event":"order.created","order_id":42}"#.into(),
        };
        let payload = ChannelGateway::webhook_payload(&content);
        assert_eq!(payload["event"], "order.created");
        assert_eq!(payload["order_id"], 42);
    }

    #[test]
    fn test_webhook_payload_envelope_for_plain_text() {
        let content = MessageContent {
            subject: Some("Order update".into()),
            body: "Your order shipped".into(),
        };
        let payload = ChannelGateway::webhook_payload(&content);
        assert_eq!(payload["message"], "Your order shipped");
        assert_eq!(payload["subject"], "Order update");
    }
}
