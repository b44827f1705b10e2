//! Channel configuration validator.
//!
//! Pure and synchronous: reads the immutable config, never the network.
//! Re-runnable at any time; the gateway re-checks before every send.

use vendora_core::config::NotifyConfig;
use vendora_core::types::Channel;

/// Outcome of a channel configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ChannelCheck {
    fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self { valid: false, reason: Some(reason.into()) }
    }
}

/// Validate a channel by name. Unparseable names report "Unknown channel".
pub fn validate_channel_name(config: &NotifyConfig, name: &str) -> ChannelCheck {
    match Channel::parse(name) {
        Ok(channel) => validate_channel(config, channel),
        Err(reason) => ChannelCheck::invalid(reason),
    }
}

/// Validate that a channel is enabled and fully configured.
pub fn validate_channel(config: &NotifyConfig, channel: Channel) -> ChannelCheck {
    match channel {
        Channel::Email => {
            let Some(email) = &config.email else {
                return ChannelCheck::invalid("Channel email is not enabled");
            };
            if !email.enabled {
                return ChannelCheck::invalid("Channel email is not enabled");
            }
            let mut missing = Vec::new();
            if email.smtp_host.is_empty() {
                missing.push("smtp_host");
            }
            if email.from_address.is_empty() {
                missing.push("from_address");
            }
            if email.smtp_password.is_empty() {
                missing.push("smtp_password");
            }
            missing_or_ok(channel, missing)
        }
        Channel::Sms => {
            let Some(sms) = &config.sms else {
                return ChannelCheck::invalid("Channel sms is not enabled");
            };
            if !sms.enabled {
                return ChannelCheck::invalid("Channel sms is not enabled");
            }
            let mut missing = Vec::new();
            if sms.account_sid.is_empty() {
                missing.push("account_sid");
            }
            if sms.auth_token.is_empty() {
                missing.push("auth_token");
            }
            if sms.from_number.is_empty() {
                missing.push("from_number");
            }
            missing_or_ok(channel, missing)
        }
        Channel::Push => {
            let Some(push) = &config.push else {
                return ChannelCheck::invalid("Channel push is not enabled");
            };
            if !push.enabled {
                return ChannelCheck::invalid("Channel push is not enabled");
            }
            let mut missing = Vec::new();
            if push.server_key.is_empty() {
                missing.push("server_key");
            }
            missing_or_ok(channel, missing)
        }
        Channel::Webhook => {
            // Target URL is per-notification; only the gate lives in config.
            match &config.webhook {
                Some(webhook) if webhook.enabled => ChannelCheck::ok(),
                _ => ChannelCheck::invalid("Channel webhook is not enabled"),
            }
        }
    }
}

fn missing_or_ok(channel: Channel, missing: Vec<&str>) -> ChannelCheck {
    if missing.is_empty() {
        ChannelCheck::ok()
    } else {
        ChannelCheck::invalid(format!(
            "Missing configuration for {channel}: {}",
            missing.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendora_core::config::{EmailChannelConfig, SmsChannelConfig, WebhookChannelConfig};

    fn email_config(enabled: bool, host: &str) -> NotifyConfig {
        NotifyConfig {
            email: Some(EmailChannelConfig {
                enabled,
                smtp_host: host.into(),
                smtp_port: 587,
                from_address: "orders@example.com".into(),
                smtp_password: "secret".into(),
                display_name: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_channel_name() {
        let check = validate_channel_name(&NotifyConfig::default(), "fax");
        assert!(!check.valid);
        assert!(check.reason.unwrap().contains("Unknown channel"));
    }

    #[test]
    fn test_unconfigured_channel_is_not_enabled() {
        let check = validate_channel(&NotifyConfig::default(), Channel::Sms);
        assert!(!check.valid);
        assert!(check.reason.unwrap().contains("not enabled"));
    }

    #[test]
    fn test_disabled_channel() {
        let check = validate_channel(&email_config(false, "smtp.example.com"), Channel::Email);
        assert!(!check.valid);
        assert!(check.reason.unwrap().contains("not enabled"));
    }

    #[test]
    fn test_missing_credentials_are_named() {
        let check = validate_channel(&email_config(true, ""), Channel::Email);
        assert!(!check.valid);
        let reason = check.reason.unwrap();
        assert!(reason.contains("Missing configuration"));
        assert!(reason.contains("smtp_host"));
    }

    #[test]
    fn test_fully_configured_channel() {
        let check = validate_channel(&email_config(true, "smtp.example.com"), Channel::Email);
        assert!(check.valid);
        assert!(check.reason.is_none());
    }

    #[test]
    fn test_sms_missing_multiple_fields() {
        let config = NotifyConfig {
            sms: Some(SmsChannelConfig {
                enabled: true,
                account_sid: "AC123".into(),
                auth_token: String::new(),
                from_number: String::new(),
                api_base: "https://api.twilio.com".into(),
            }),
            ..Default::default()
        };
        let reason = validate_channel(&config, Channel::Sms).reason.unwrap();
        assert!(reason.contains("auth_token"));
        assert!(reason.contains("from_number"));
        assert!(!reason.contains("account_sid"));
    }

    #[test]
    fn test_webhook_needs_only_the_gate() {
        let config = NotifyConfig {
            webhook: Some(WebhookChannelConfig { enabled: true, timeout_secs: 10 }),
            ..Default::default()
        };
        assert!(validate_channel(&config, Channel::Webhook).valid);
    }
}
