//! Notification ledger & analytics recorder.
//!
//! Best-effort by contract: the dispatcher fires these writes after a send
//! resolves and swallows any failure. A slow or broken store must never
//! flip a successful delivery into a failure.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use vendora_core::error::{Result, VendoraError};
use vendora_core::types::{Channel, Metric, NotificationStatus};

/// One row in the notifications ledger.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub tenant_id: String,
    pub channel: Channel,
    pub recipient: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: NotificationStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// Persistence seam for delivery records and counters.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Insert one ledger row for a resolved notification.
    async fn log_notification(&self, record: &NotificationRecord) -> Result<()>;

    /// Increment the `(tenant, date, metric, channel)` counter.
    async fn track_analytics(
        &self,
        tenant_id: &str,
        notification_id: &str,
        metric: Metric,
        channel: Channel,
    ) -> Result<()>;
}

/// Recorder backed by the relational store (embedded sqlite file, separate
/// from the queue database).
pub struct SqliteRecorder {
    conn: Mutex<Connection>,
}

impl SqliteRecorder {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| VendoraError::Storage(format!("DB open: {e}")))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| VendoraError::Storage(format!("DB pragma: {e}")))?;

        let recorder = Self { conn: Mutex::new(conn) };
        recorder.migrate()?;
        Ok(recorder)
    }

    pub fn default_path() -> std::path::PathBuf {
        vendora_core::config::NotifyConfig::home_dir().join("ledger.db")
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                recipient TEXT NOT NULL,
                subject TEXT,
                message TEXT NOT NULL,
                status TEXT NOT NULL,
                message_id TEXT,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analytics_counters (
                tenant_id TEXT NOT NULL,
                date TEXT NOT NULL,
                metric TEXT NOT NULL,
                channel TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (tenant_id, date, metric, channel)
            );
            ",
        )
        .map_err(|e| VendoraError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VendoraError::Storage(format!("Lock poisoned: {e}")))
    }

    /// Read a counter back (reporting, tests).
    pub fn counter(
        &self,
        tenant_id: &str,
        date: &str,
        metric: Metric,
        channel: Channel,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT count FROM analytics_counters
             WHERE tenant_id = ?1 AND date = ?2 AND metric = ?3 AND channel = ?4",
            rusqlite::params![tenant_id, date, metric.as_str(), channel.as_str()],
            |row| row.get(0),
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(0),
            other => Err(VendoraError::Storage(format!("Counter read: {other}"))),
        })
    }

    /// Recent ledger rows for a tenant, newest first.
    pub fn recent_notifications(&self, tenant_id: &str, limit: usize) -> Result<Vec<NotificationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT tenant_id, channel, recipient, subject, message, status, message_id, error
                 FROM notifications WHERE tenant_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| VendoraError::Storage(format!("Ledger read: {e}")))?;
        let rows = stmt
            .query_map(rusqlite::params![tenant_id, limit as i64], |row| {
                let channel: String = row.get(1)?;
                let status: String = row.get(5)?;
                Ok(NotificationRecord {
                    tenant_id: row.get(0)?,
                    channel: Channel::parse(&channel).unwrap_or(Channel::Webhook),
                    recipient: row.get(2)?,
                    subject: row.get(3)?,
                    message: row.get(4)?,
                    status: match status.as_str() {
                        "sent" => NotificationStatus::Sent,
                        "scheduled" => NotificationStatus::Scheduled,
                        _ => NotificationStatus::Failed,
                    },
                    message_id: row.get(6)?,
                    error: row.get(7)?,
                })
            })
            .map_err(|e| VendoraError::Storage(format!("Ledger scan: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[async_trait]
impl Recorder for SqliteRecorder {
    async fn log_notification(&self, record: &NotificationRecord) -> Result<()> {
        let status = match record.status {
            NotificationStatus::Sent => "sent",
            NotificationStatus::Scheduled => "scheduled",
            NotificationStatus::Failed => "failed",
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications
             (tenant_id, channel, recipient, subject, message, status, message_id, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.tenant_id,
                record.channel.as_str(),
                record.recipient,
                record.subject,
                record.message,
                status,
                record.message_id,
                record.error,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| VendoraError::Storage(format!("Ledger insert: {e}")))?;
        Ok(())
    }

    async fn track_analytics(
        &self,
        tenant_id: &str,
        _notification_id: &str,
        metric: Metric,
        channel: Channel,
    ) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let conn = self.lock()?;
        // Atomic per-key increment; no application-level read-modify-write.
        conn.execute(
            "INSERT INTO analytics_counters (tenant_id, date, metric, channel, count)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(tenant_id, date, metric, channel)
             DO UPDATE SET count = count + 1",
            rusqlite::params![tenant_id, date, metric.as_str(), channel.as_str()],
        )
        .map_err(|e| VendoraError::Storage(format!("Counter increment: {e}")))?;
        Ok(())
    }
}
