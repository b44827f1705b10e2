//! Push channel — FCM legacy HTTP gateway.
//!
//! Subject becomes the notification title, message the body. Auth is the
//! server key in an `Authorization: key=...` header.

use std::time::Duration;

use vendora_core::config::PushChannelConfig;
use vendora_core::types::{MessageContent, SendFailure, SendOutcome, Sent};

/// Send one push notification to a device token.
pub async fn send_push(
    client: &reqwest::Client,
    config: &PushChannelConfig,
    recipient: &str,
    content: &MessageContent,
    timeout: Duration,
) -> SendOutcome {
    if !is_token_shaped(recipient) {
        return Err(SendFailure::permanent(format!(
            "Invalid device token: {recipient}"
        )));
    }

    let body = serde_json::json!({
        "to": recipient,
        "notification": {
            "title": content.subject.as_deref().unwrap_or("Notification"),
            "body": content.body,
        },
    });

    let response = client
        .post(&config.api_url)
        .header("Authorization", format!("key={}", config.server_key))
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| SendFailure::transient(format!("Network error: {e}")))?;

    let status = response.status();
    if status.is_success() {
        let result: serde_json::Value = response.json().await.unwrap_or_default();
        let provider_id = result["multicast_id"]
            .as_i64()
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("push-{}", uuid::Uuid::new_v4()));
        tracing::debug!("Push sent: {provider_id}");
        return Ok(Sent { provider_id });
    }

    let text = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(SendFailure::permanent(format!(
            "Push gateway rejected credentials {status}: {text}"
        ))
        .with_suggestion("check the push gateway server key")),
        429 | 500..=599 => Err(SendFailure::transient(format!(
            "Push gateway error {status}: {text}"
        ))),
        _ => Err(SendFailure::permanent(format!(
            "Push gateway rejected {status}: {text}"
        ))),
    }
}

/// A device token: non-empty, no whitespace. Providers vary too much for
/// anything stricter.
fn is_token_shaped(recipient: &str) -> bool {
    !recipient.is_empty() && !recipient.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shapes() {
        assert!(is_token_shaped("dGVzdC10b2tlbi0xMjM0"));
        assert!(!is_token_shaped(""));
        assert!(!is_token_shaped("has spaces"));
    }

    #[tokio::test]
    async fn test_bad_token_fails_before_the_network() {
        let config = PushChannelConfig {
            enabled: true,
            server_key: "key".into(),
            api_url: "https://fcm.googleapis.com/fcm/send".into(),
        };
        let content = MessageContent {
            subject: Some("Order update".into()),
            body: "Out for delivery".into(),
        };
        let err = send_push(
            &reqwest::Client::new(),
            &config,
            "bad token",
            &content,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.error.contains("Invalid device token"));
    }
}
