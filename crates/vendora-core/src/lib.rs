//! # Vendora Core
//! Shared configuration, error type and data model for the notification
//! delivery core.

pub mod config;
pub mod error;
pub mod types;
