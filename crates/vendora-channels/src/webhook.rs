//! Webhook channel — outbound HTTP POST with a JSON body.
//!
//! Success is any 2xx status. Everything else is a transient failure: the
//! endpoint may come back, so the retry controller gets a chance.

use std::time::Duration;

use serde_json::Value;
use vendora_core::types::{SendFailure, SendOutcome, Sent};

/// Result of a webhook delivery, carrying the HTTP status when one was
/// received.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub suggestion: Option<String>,
}

/// POST `payload` to `url` as JSON. The only header beyond what reqwest
/// sets is `Content-Type: application/json` (implied by `.json()`).
pub async fn send_webhook_notification(
    client: &reqwest::Client,
    url: &str,
    payload: &Value,
    timeout: Duration,
) -> WebhookOutcome {
    let response = match client.post(url).json(payload).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            // DNS failure, refused connection, or timeout. Callers
            // pattern-match on the "Network error" prefix.
            return WebhookOutcome {
                success: false,
                status: None,
                error: Some(format!("Network error: {e}")),
                suggestion: Some("verify endpoint is reachable and returns 2xx".into()),
            };
        }
    };

    let status = response.status();
    if status.is_success() {
        tracing::debug!("Webhook delivered to {url}: {status}");
        return WebhookOutcome {
            success: true,
            status: Some(status.as_u16()),
            error: None,
            suggestion: None,
        };
    }

    let text = response.text().await.unwrap_or_default();
    WebhookOutcome {
        success: false,
        status: Some(status.as_u16()),
        error: Some(format!("Webhook failed with status {status}: {text}")),
        suggestion: Some("verify endpoint is reachable and returns 2xx".into()),
    }
}

/// Fold a webhook outcome into the common send contract.
pub fn into_send_outcome(outcome: WebhookOutcome) -> SendOutcome {
    if outcome.success {
        Ok(Sent {
            provider_id: format!("webhook-{}", outcome.status.unwrap_or(0)),
        })
    } else {
        let mut failure =
            SendFailure::transient(outcome.error.unwrap_or_else(|| "Webhook failed".into()));
        if let Some(suggestion) = outcome.suggestion {
            failure = failure.with_suggestion(suggestion);
        }
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve exactly one HTTP request on an ephemeral port and return the
    /// raw request bytes. Keeps webhook tests off the network.
    async fn one_shot_server(
        status_line: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hooks/orders", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                if let Some(head_end) = find_head_end(&buf) {
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
                    let content_length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });

        (url, handle)
    }

    fn find_head_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    #[tokio::test]
    async fn test_webhook_happy_path() {
        let (url, handle) = one_shot_server("200 OK").await;
        let client = reqwest::Client::new();

        let outcome = send_webhook_notification(
            &client,
            &url,
            &serde_json::json!({"test": "data"}),
            Duration::from_secs(5),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.error.is_none());

        // Exactly one POST, JSON content type, payload intact.
        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /hooks/orders"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#"{"test":"data"}"#));
    }

    #[tokio::test]
    async fn test_webhook_non_2xx_is_transient_with_suggestion() {
        let (url, handle) = one_shot_server("500 Internal Server Error").await;
        let client = reqwest::Client::new();

        let outcome = send_webhook_notification(
            &client,
            &url,
            &serde_json::json!({"event": "order.created"}),
            Duration::from_secs(5),
        )
        .await;
        handle.await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.status, Some(500));
        assert!(outcome.error.as_deref().unwrap().contains("Webhook failed"));
        assert!(!outcome.suggestion.as_deref().unwrap().is_empty());

        let folded = into_send_outcome(outcome);
        assert!(folded.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_webhook_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let client = reqwest::Client::new();
        let outcome = send_webhook_notification(
            &client,
            &url,
            &serde_json::json!({}),
            Duration::from_secs(2),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.status, None);
        assert!(outcome.error.as_deref().unwrap().contains("Network error"));
    }
}
