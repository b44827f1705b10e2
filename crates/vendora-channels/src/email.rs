//! Email channel — async SMTP sending via lettre.
//!
//! Delivery-only: the commerce platform never reads mail, it only pushes
//! order/billing updates out.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use vendora_core::config::EmailChannelConfig;
use vendora_core::types::{MessageContent, SendFailure, SendOutcome, Sent};

/// Send one transactional email. The recipient must be a syntactically
/// plausible address and the content must carry a subject.
pub async fn send_email(
    config: &EmailChannelConfig,
    recipient: &str,
    content: &MessageContent,
) -> SendOutcome {
    let Some(subject) = content.subject.as_deref() else {
        return Err(SendFailure::permanent("Subject is required for email"));
    };

    let to: Mailbox = recipient
        .parse()
        .map_err(|_| SendFailure::permanent(format!("Invalid recipient address: {recipient}")))?;

    let from_name = config.display_name.as_deref().unwrap_or("Vendora");
    let from: Mailbox = format!("{from_name} <{}>", config.from_address)
        .parse()
        .map_err(|e| SendFailure::permanent(format!("Invalid sender address: {e}")))?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(content.body.clone())
        .map_err(|e| SendFailure::permanent(format!("Build email: {e}")))?;

    let creds = Credentials::new(config.from_address.clone(), config.smtp_password.clone());
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        .map_err(|e| SendFailure::permanent(format!("SMTP relay: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    match mailer.send(email).await {
        Ok(response) => {
            let provider_id = response
                .message()
                .next()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("smtp-{}", uuid::Uuid::new_v4()));
            tracing::info!("Email sent to {recipient}");
            Ok(Sent { provider_id })
        }
        Err(e) => {
            // The provider told us outright this send can never succeed
            // (bad credentials, rejected recipient): retrying is pointless.
            if e.is_permanent() {
                Err(SendFailure::permanent(format!("SMTP rejected: {e}"))
                    .with_suggestion("check SMTP credentials and recipient address"))
            } else {
                Err(SendFailure::transient(format!("SMTP send: {e}")))
            }
        }
    }
}
