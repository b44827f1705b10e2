//! SMS channel — Twilio-style REST gateway.
//!
//! One form POST per message, basic auth with the account SID and token.
//! The gateway's 4xx responses mean the request itself is wrong (bad
//! number, bad credentials) and are permanent; 429 and 5xx are transient.

use std::time::Duration;

use vendora_core::config::SmsChannelConfig;
use vendora_core::types::{MessageContent, SendFailure, SendOutcome, Sent};

/// Send one SMS. The recipient must be phone-shaped; subjects are ignored
/// by this channel.
pub async fn send_sms(
    client: &reqwest::Client,
    config: &SmsChannelConfig,
    recipient: &str,
    content: &MessageContent,
    timeout: Duration,
) -> SendOutcome {
    if !is_phone_shaped(recipient) {
        return Err(SendFailure::permanent(format!(
            "Invalid phone number: {recipient}"
        )));
    }

    let url = format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        config.api_base.trim_end_matches('/'),
        config.account_sid
    );

    let response = client
        .post(&url)
        .basic_auth(&config.account_sid, Some(&config.auth_token))
        .form(&[
            ("To", recipient),
            ("From", config.from_number.as_str()),
            ("Body", content.body.as_str()),
        ])
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| SendFailure::transient(format!("Network error: {e}")))?;

    let status = response.status();
    if status.is_success() {
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SendFailure::transient(format!("Invalid SMS gateway response: {e}")))?;
        let sid = body["sid"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!("SMS sent: {sid} -> {recipient}");
        return Ok(Sent { provider_id: sid });
    }

    let text = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 || status.is_server_error() {
        Err(SendFailure::transient(format!(
            "SMS gateway error {status}: {text}"
        )))
    } else {
        // 400/401/404: invalid number, credentials, or account. Retrying
        // cannot change the outcome.
        Err(SendFailure::permanent(format!("SMS gateway rejected {status}: {text}"))
            .with_suggestion("check the recipient number and SMS gateway credentials"))
    }
}

/// A phone-shaped string: optional leading `+`, then 7 to 15 digits,
/// ignoring separator punctuation.
fn is_phone_shaped(recipient: &str) -> bool {
    let trimmed = recipient.trim();
    let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    !digits.is_empty() && digits.len() >= 7 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_shapes() {
        assert!(is_phone_shaped("+14155552671"));
        assert!(is_phone_shaped("+1 (415) 555-2671"));
        assert!(is_phone_shaped("0712345678"));
        assert!(!is_phone_shaped("buyer@example.com"));
        assert!(!is_phone_shaped("+1"));
        assert!(!is_phone_shaped(""));
        assert!(!is_phone_shaped("+1415555267112345678"));
    }

    #[tokio::test]
    async fn test_bad_recipient_fails_before_the_network() {
        let config = SmsChannelConfig {
            enabled: true,
            account_sid: "AC123".into(),
            auth_token: "token".into(),
            from_number: "+15005550006".into(),
            api_base: "https://api.twilio.com".into(),
        };
        let content = MessageContent { subject: None, body: "Your order shipped".into() };
        let err = send_sms(
            &reqwest::Client::new(),
            &config,
            "not-a-phone",
            &content,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.error.contains("Invalid phone number"));
    }
}
