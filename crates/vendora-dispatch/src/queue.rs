//! Durable notification queue — embedded sqlite, independent of the
//! tenant relational store so undelivered work survives process restarts
//! even when that store is unreachable.
//!
//! Queue ids are sqlite AUTOINCREMENT: monotonically increasing, never
//! reused. Records are never deleted here; retention is an external sweep.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use vendora_core::error::{Result, VendoraError};
use vendora_core::types::{
    Channel, NotificationRequest, Priority, QueueStatus, QueuedNotification,
};

/// File-backed queue of pending/scheduled notifications.
pub struct QueueDb {
    conn: Mutex<Connection>,
}

const QUEUE_SELECT: &str = "SELECT queue_id, tenant_id, channel, recipient, payload, priority, \
     status, scheduled_for, created_at FROM notification_queue";

impl QueueDb {
    /// Open or create the queue database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| VendoraError::Queue(format!("DB open: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| VendoraError::Queue(format!("DB pragma: {e}")))?;

        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    /// Default queue location under the Vendora data directory.
    pub fn default_path() -> std::path::PathBuf {
        vendora_core::config::NotifyConfig::home_dir().join("queue.db")
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notification_queue (
                queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                recipient TEXT NOT NULL,
                payload TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'normal',
                status TEXT NOT NULL DEFAULT 'pending',
                scheduled_for TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_due
                ON notification_queue(status, scheduled_for);
            ",
        )
        .map_err(|e| VendoraError::Queue(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VendoraError::Queue(format!("Lock poisoned: {e}")))
    }

    /// Persist a notification for later delivery. Returns the assigned
    /// queue id.
    pub fn enqueue(&self, req: &NotificationRequest, scheduled_for: DateTime<Utc>) -> Result<i64> {
        let payload = serde_json::json!({
            "subject": req.subject,
            "message": req.message,
        });
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notification_queue
             (tenant_id, channel, recipient, payload, priority, status, scheduled_for, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
            rusqlite::params![
                req.tenant_id,
                req.channel.as_str(),
                req.recipient,
                payload.to_string(),
                req.priority.as_str(),
                scheduled_for.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| VendoraError::Queue(format!("Enqueue: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim up to `limit` due pending records, flipping them to `sending`
    /// in the same transaction so overlapping worker ticks never pick the
    /// same record twice. Returns them priority-then-time ordered.
    pub fn claim_due(&self, limit: usize) -> Result<Vec<QueuedNotification>> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| VendoraError::Queue(format!("Begin claim: {e}")))?;

        let mut claimed = {
            let mut stmt = tx
                .prepare(&format!(
                    "{QUEUE_SELECT}
                     WHERE status = 'pending' AND scheduled_for <= ?1
                     ORDER BY CASE priority
                         WHEN 'high' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END,
                       scheduled_for
                     LIMIT ?2"
                ))
                .map_err(|e| VendoraError::Queue(format!("Claim query: {e}")))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![Utc::now().to_rfc3339(), limit as i64],
                    row_to_record,
                )
                .map_err(|e| VendoraError::Queue(format!("Claim scan: {e}")))?;
            rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
        };

        for record in &mut claimed {
            tx.execute(
                "UPDATE notification_queue SET status = 'sending'
                 WHERE queue_id = ?1 AND status = 'pending'",
                [record.queue_id],
            )
            .map_err(|e| VendoraError::Queue(format!("Claim mark: {e}")))?;
            record.status = QueueStatus::Sending;
        }

        tx.commit()
            .map_err(|e| VendoraError::Queue(format!("Commit claim: {e}")))?;
        Ok(claimed)
    }

    /// Move a record's status forward. Transitions never go backward; a
    /// same-status update is a no-op so best-effort callers can repeat it.
    pub fn update_status(&self, queue_id: i64, status: QueueStatus) -> Result<()> {
        let conn = self.lock()?;
        let current: String = conn
            .query_row(
                "SELECT status FROM notification_queue WHERE queue_id = ?1",
                [queue_id],
                |row| row.get(0),
            )
            .map_err(|e| VendoraError::Queue(format!("Status lookup for {queue_id}: {e}")))?;
        let current = QueueStatus::parse(&current);

        if current == status {
            return Ok(());
        }
        if !current.can_transition_to(status) {
            return Err(VendoraError::Queue(format!(
                "Refusing backward status transition {current:?} -> {status:?} for queue id {queue_id}"
            )));
        }

        conn.execute(
            "UPDATE notification_queue SET status = ?1 WHERE queue_id = ?2",
            rusqlite::params![status.as_str(), queue_id],
        )
        .map_err(|e| VendoraError::Queue(format!("Status update: {e}")))?;
        Ok(())
    }

    /// Fetch one record by id.
    pub fn get(&self, queue_id: i64) -> Result<Option<QueuedNotification>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{QUEUE_SELECT} WHERE queue_id = ?1"))
            .map_err(|e| VendoraError::Queue(format!("Get: {e}")))?;
        let record = stmt
            .query_row([queue_id], row_to_record)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(VendoraError::Queue(format!("Get: {other}"))),
            })?;
        Ok(record)
    }

    /// Count records in a given status (operational visibility, tests).
    pub fn count_with_status(&self, status: QueueStatus) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM notification_queue WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| VendoraError::Queue(format!("Count: {e}")))
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<QueuedNotification> {
    let channel: String = row.get(2)?;
    let payload: String = row.get(4)?;
    let priority: String = row.get(5)?;
    let status: String = row.get(6)?;
    let scheduled_for: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(QueuedNotification {
        queue_id: row.get(0)?,
        tenant_id: row.get(1)?,
        channel: Channel::parse(&channel).unwrap_or(Channel::Webhook),
        recipient: row.get(3)?,
        payload: serde_json::from_str(&payload).unwrap_or_default(),
        priority: Priority::parse(&priority),
        status: QueueStatus::parse(&status),
        scheduled_for: parse_ts(&scheduled_for),
        created_at: parse_ts(&created_at),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vendora_core::types::Channel;

    fn temp_queue(name: &str) -> (QueueDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("vendora-queue-{name}-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (QueueDb::open(&dir.join("queue.db")).unwrap(), dir)
    }

    fn request(channel: Channel, recipient: &str) -> NotificationRequest {
        NotificationRequest::new(channel, recipient, "Your order shipped", "acme")
    }

    #[test]
    fn test_enqueue_assigns_monotonic_ids() {
        let (db, dir) = temp_queue("mono");
        let db = Arc::new(db);

        let mut handles = Vec::new();
        for i in 0..4 {
            let db = db.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for j in 0..10 {
                    let req = request(Channel::Email, &format!("buyer{i}-{j}@example.com"));
                    ids.push(db.enqueue(&req, Utc::now()).unwrap());
                }
                ids
            }));
        }

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 40);
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 40, "queue ids must never repeat");
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_claim_due_orders_by_priority_then_time() {
        let (db, dir) = temp_queue("order");
        let past = Utc::now() - chrono::Duration::minutes(10);
        let earlier = past - chrono::Duration::minutes(5);

        let low = request(Channel::Email, "low@example.com")
            .with_priority(Priority::Low);
        let high = request(Channel::Email, "high@example.com")
            .with_priority(Priority::High);
        let normal_early = request(Channel::Email, "early@example.com");

        db.enqueue(&low, earlier).unwrap();
        db.enqueue(&normal_early, earlier).unwrap();
        db.enqueue(&high, past).unwrap();

        let claimed = db.claim_due(10).unwrap();
        let recipients: Vec<&str> = claimed.iter().map(|r| r.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["high@example.com", "early@example.com", "low@example.com"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_claimed_records_are_not_reclaimed() {
        let (db, dir) = temp_queue("claim");
        let req = request(Channel::Sms, "+14155552671");
        db.enqueue(&req, Utc::now() - chrono::Duration::seconds(1)).unwrap();

        let first = db.claim_due(10).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, QueueStatus::Sending);

        // A second sweep before the first finishes must see nothing.
        assert!(db.claim_due(10).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_future_records_are_not_due() {
        let (db, dir) = temp_queue("future");
        let req = request(Channel::Push, "device-token-1234");
        db.enqueue(&req, Utc::now() + chrono::Duration::hours(1)).unwrap();
        assert!(db.claim_due(10).unwrap().is_empty());
        assert_eq!(db.count_with_status(QueueStatus::Pending).unwrap(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_status_moves_forward_only() {
        let (db, dir) = temp_queue("status");
        let req = request(Channel::Email, "buyer@example.com");
        let id = db.enqueue(&req, Utc::now()).unwrap();

        db.update_status(id, QueueStatus::Sending).unwrap();
        db.update_status(id, QueueStatus::Sent).unwrap();
        // Repeating the terminal status is a tolerated no-op.
        db.update_status(id, QueueStatus::Sent).unwrap();
        // Going backward is refused.
        assert!(db.update_status(id, QueueStatus::Pending).is_err());
        assert_eq!(db.get(id).unwrap().unwrap().status, QueueStatus::Sent);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_payload_round_trips_through_claim() {
        let (db, dir) = temp_queue("payload");
        let req = request(Channel::Email, "buyer@example.com")
            .with_subject("Order #42 shipped");
        db.enqueue(&req, Utc::now() - chrono::Duration::seconds(1)).unwrap();

        let claimed = db.claim_due(1).unwrap();
        let rebuilt = claimed[0].to_request();
        assert_eq!(rebuilt.subject.as_deref(), Some("Order #42 shipped"));
        assert_eq!(rebuilt.message, "Your order shipped");
        assert_eq!(rebuilt.tenant_id, "acme");
        std::fs::remove_dir_all(&dir).ok();
    }
}
