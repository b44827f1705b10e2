//! Vendora configuration system.
//!
//! Loaded once at process start and treated as read-only afterwards. The
//! config can come from a TOML file or from the environment; `from_env()`
//! exists so deployments that only speak env vars (and tests that simulate
//! reconfiguration) have an explicit reload entry point.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VendoraError};

/// Root notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub email: Option<EmailChannelConfig>,
    #[serde(default)]
    pub sms: Option<SmsChannelConfig>,
    #[serde(default)]
    pub push: Option<PushChannelConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookChannelConfig>,
}

impl NotifyConfig {
    /// Load config from the default path (~/.vendora/notify.toml), falling
    /// back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VendoraError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| VendoraError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build config from the environment variable surface:
    /// `<CHANNEL>_ENABLED` plus channel credentials, `NOTIFICATION_MAX_RETRIES`
    /// and `NOTIFICATION_RETRY_DELAY` (base backoff in ms).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(max) = env_parsed::<u32>("NOTIFICATION_MAX_RETRIES") {
            config.retry.max_attempts = max;
        }
        if let Some(delay) = env_parsed::<u64>("NOTIFICATION_RETRY_DELAY") {
            config.retry.base_delay_ms = delay;
        }

        if env_flag("EMAIL_ENABLED").is_some() || std::env::var("EMAIL_SMTP_HOST").is_ok() {
            config.email = Some(EmailChannelConfig {
                enabled: env_flag("EMAIL_ENABLED").unwrap_or(false),
                smtp_host: env_string("EMAIL_SMTP_HOST"),
                smtp_port: env_parsed("EMAIL_SMTP_PORT").unwrap_or_else(default_smtp_port),
                from_address: env_string("EMAIL_FROM_ADDRESS"),
                smtp_password: env_string("EMAIL_SMTP_PASSWORD"),
                display_name: std::env::var("EMAIL_DISPLAY_NAME").ok(),
            });
        }
        if env_flag("SMS_ENABLED").is_some() || std::env::var("SMS_ACCOUNT_SID").is_ok() {
            config.sms = Some(SmsChannelConfig {
                enabled: env_flag("SMS_ENABLED").unwrap_or(false),
                account_sid: env_string("SMS_ACCOUNT_SID"),
                auth_token: env_string("SMS_AUTH_TOKEN"),
                from_number: env_string("SMS_FROM_NUMBER"),
                api_base: std::env::var("SMS_API_BASE").unwrap_or_else(|_| default_sms_api_base()),
            });
        }
        if env_flag("PUSH_ENABLED").is_some() || std::env::var("PUSH_SERVER_KEY").is_ok() {
            config.push = Some(PushChannelConfig {
                enabled: env_flag("PUSH_ENABLED").unwrap_or(false),
                server_key: env_string("PUSH_SERVER_KEY"),
                api_url: std::env::var("PUSH_API_URL").unwrap_or_else(|_| default_push_api_url()),
            });
        }
        if let Some(enabled) = env_flag("WEBHOOK_ENABLED") {
            config.webhook = Some(WebhookChannelConfig {
                enabled,
                timeout_secs: env_parsed("WEBHOOK_TIMEOUT_SECS")
                    .unwrap_or_else(default_send_timeout),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate startup invariants. Retry bounds outside 0..=10 are a
    /// configuration error, never a runtime one.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts > 10 {
            return Err(VendoraError::Config(format!(
                "NOTIFICATION_MAX_RETRIES must be between 0 and 10, got {}",
                self.retry.max_attempts
            )));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(VendoraError::Config(
                "NOTIFICATION_RETRY_DELAY must be at least 1ms".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("notify.toml")
    }

    /// Get the Vendora data directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vendora")
    }
}

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Retry / backoff tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total sender invocations per notification (0 = no retry, fail fast).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Per-attempt send timeout in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay() -> u64 { 500 }
fn default_max_delay() -> u64 { 30_000 }
fn default_send_timeout() -> u64 { 10 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Queue worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between queue sweeps.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Max notifications claimed per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_tick_secs() -> u64 { 15 }
fn default_batch_size() -> usize { 50 }

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            batch_size: default_batch_size(),
        }
    }
}

/// Email (SMTP) channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_port() -> u16 { 587 }

/// SMS gateway (Twilio-style REST) channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
}

fn default_sms_api_base() -> String { "https://api.twilio.com".into() }

/// Push gateway (FCM legacy HTTP) channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub server_key: String,
    #[serde(default = "default_push_api_url")]
    pub api_url: String,
}

fn default_push_api_url() -> String { "https://fcm.googleapis.com/fcm/send".into() }

/// Webhook channel configuration. The target URL is per-notification (the
/// recipient field), so only the gate and timeout live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}
