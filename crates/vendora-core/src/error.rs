//! Vendora error type.

/// Errors raised by the notification core.
#[derive(Debug, thiserror::Error)]
pub enum VendoraError {
    /// Configuration problem (bad retry bounds, unparseable config file).
    #[error("Config error: {0}")]
    Config(String),

    /// Channel-level delivery problem.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Durable queue storage problem.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Ledger / analytics storage problem.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VendoraError>;
