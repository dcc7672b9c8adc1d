//! # Mutation Queue Repository
//!
//! Durable, ordered record of pending writes not yet confirmed against the
//! remote store.
//!
//! ## The Offline Queue Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Queue Lifecycle                                      │
//! │                                                                         │
//! │  LOCAL WRITE PATH (any module)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue(module, action, payload)                                      │
//! │       │  fresh UUID, enqueued_at = now, durable immediately            │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      sync_queue                                 │   │
//! │  │                                                                 │   │
//! │  │  seq | id | module | action | payload | enqueued_at | attempts │   │
//! │  │  ────┼────┼────────┼────────┼─────────┼─────────────┼──────────│   │
//! │  │  1   │ …  │projects│ create │ {...}   │ t=100       │ 0        │   │
//! │  │  2   │ …  │projects│ update │ {...}   │ t=200       │ 1        │   │
//! │  └────────────────────────┬────────────────────────────────────────┘   │
//! │                           │                                             │
//! │                           ▼  list_ordered(): (enqueued_at, seq) ASC    │
//! │  SYNC COORDINATOR drains in order                                      │
//! │       • success  → remove(id)                                          │
//! │       • failure  → mark_failed(id) / dead_letter(id)                   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • A mutation is never lost: it leaves the queue only on confirmed     │
//! │    remote success or explicit dead-letter eviction                     │
//! │  • Replay order is total and deterministic (last-write-wins)           │
//! │  • A corrupt row never blocks the queue: it is moved to the            │
//! │    dead-letter log and logged at WARN                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use atelier_core::{DeadLetterEntry, MutationAction, QueueEntry};

use crate::error::{DbError, DbResult};

/// Repository for the mutation queue and its dead-letter log.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    pool: SqlitePool,
}

impl QueueRepository {
    /// Creates a new QueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QueueRepository { pool }
    }

    // =========================================================================
    // Queue operations
    // =========================================================================

    /// Appends a pending mutation to the queue.
    ///
    /// Generates a fresh UUID, stamps `enqueued_at = now`, and persists the
    /// entry durably before returning it.
    pub async fn enqueue(
        &self,
        module: &str,
        action: MutationAction,
        payload: &Value,
    ) -> DbResult<QueueEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload_text = serde_json::to_string(payload)?;

        debug!(module, action = %action, id = %id, "enqueuing mutation");

        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (id, module, action, payload, enqueued_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&id)
        .bind(module)
        .bind(action.as_str())
        .bind(&payload_text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(QueueEntry {
            id,
            seq: result.last_insert_rowid(),
            module: module.to_string(),
            action,
            payload: payload.clone(),
            enqueued_at: now,
            attempts: 0,
            last_error: None,
        })
    }

    /// Returns all pending entries in replay order: ascending `enqueued_at`,
    /// ties broken by insertion id.
    ///
    /// Rows that fail to decode are moved to the dead-letter log with the
    /// decode error as reason, so a poisoned row never blocks the entries
    /// behind it.
    pub async fn list_ordered(&self) -> DbResult<Vec<QueueEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, id, module, action, payload, enqueued_at, attempts, last_error
            FROM sync_queue
            ORDER BY enqueued_at ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut corrupt: Vec<(String, String)> = Vec::new();

        for row in &rows {
            let id: String = match row.try_get("id") {
                Ok(id) => id,
                Err(e) => {
                    // Without an id the row can't even be dead-lettered.
                    warn!(error = %e, "queue row has undecodable id, skipping");
                    continue;
                }
            };

            match decode_entry(row) {
                Ok(entry) => entries.push(entry),
                Err(reason) => corrupt.push((id, reason)),
            }
        }

        for (id, reason) in corrupt {
            warn!(id = %id, reason = %reason, "corrupt queue entry, dead-lettering");
            self.dead_letter(&id, &format!("corrupt entry: {reason}"))
                .await?;
        }

        Ok(entries)
    }

    /// Removes an entry after confirmed remote success. No-op if absent.
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(id = %id, removed = result.rows_affected(), "removed queue entry");

        Ok(())
    }

    /// Counts entries currently queued.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Records a drain failure against an entry.
    ///
    /// Returns the updated attempt count so the caller can apply its
    /// dead-letter threshold.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<i64> {
        sqlx::query(
            "UPDATE sync_queue SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        let attempts: Option<i64> =
            sqlx::query_scalar("SELECT attempts FROM sync_queue WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        attempts.ok_or_else(|| DbError::not_found("sync_queue", id))
    }

    // =========================================================================
    // Dead-letter operations
    // =========================================================================

    /// Atomically moves an entry from the queue to the dead-letter log.
    ///
    /// Column values are copied as raw text: this path must work for rows
    /// whose action or payload no longer decodes. No-op if the entry is
    /// already gone.
    pub async fn dead_letter(&self, id: &str, reason: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT module, action, payload, enqueued_at, attempts FROM sync_queue WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            debug!(id = %id, "dead_letter: entry already gone");
            return Ok(());
        };

        let module: String = row.try_get("module")?;
        let action: String = row.try_get("action")?;
        let payload: String = row.try_get("payload")?;
        let enqueued_at: String = row.try_get("enqueued_at")?;
        let attempts: i64 = row.try_get("attempts")?;

        sqlx::query(
            r#"
            INSERT INTO sync_dead_letter
                (id, module, action, payload, enqueued_at, attempts, reason, failed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(id)
        .bind(&module)
        .bind(&action)
        .bind(&payload)
        .bind(&enqueued_at)
        .bind(attempts)
        .bind(reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        warn!(id = %id, module = %module, reason = %reason, "entry dead-lettered");

        Ok(())
    }

    /// Returns every dead-lettered entry, oldest eviction first.
    pub async fn list_dead_letters(&self) -> DbResult<Vec<DeadLetterEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, module, action, payload, enqueued_at, attempts, reason, failed_at
            FROM sync_dead_letter
            ORDER BY failed_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeadLetterEntry {
                    id: row.try_get("id")?,
                    module: row.try_get("module")?,
                    action: row.try_get("action")?,
                    payload: row.try_get("payload")?,
                    enqueued_at: row.try_get("enqueued_at")?,
                    attempts: row.try_get("attempts")?,
                    reason: row.try_get("reason")?,
                    failed_at: row.try_get("failed_at")?,
                })
            })
            .collect()
    }

    /// Deletes dead letters older than `days_old` days.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_dead_letters(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query("DELETE FROM sync_dead_letter WHERE failed_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Decodes a queue row, reporting any failure as a human-readable reason
/// rather than an error type: the caller dead-letters on failure.
fn decode_entry(row: &SqliteRow) -> Result<QueueEntry, String> {
    let action_text: String = row.try_get("action").map_err(|e| e.to_string())?;
    let action: MutationAction = action_text.parse().map_err(|e: atelier_core::CoreError| e.to_string())?;

    let payload_text: String = row.try_get("payload").map_err(|e| e.to_string())?;
    let payload: Value = serde_json::from_str(&payload_text).map_err(|e| e.to_string())?;

    let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at").map_err(|e| e.to_string())?;

    Ok(QueueEntry {
        id: row.try_get("id").map_err(|e| e.to_string())?,
        seq: row.try_get("seq").map_err(|e| e.to_string())?,
        module: row.try_get("module").map_err(|e| e.to_string())?,
        action,
        payload,
        enqueued_at,
        attempts: row.try_get("attempts").map_err(|e| e.to_string())?,
        last_error: row.try_get("last_error").map_err(|e| e.to_string())?,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    async fn setup() -> (Database, QueueRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.queue();
        (db, queue)
    }

    #[tokio::test]
    async fn test_enqueue_assigns_ids_and_counts() {
        let (_db, queue) = setup().await;

        let a = queue
            .enqueue("projects", MutationAction::Create, &json!({"name": "A"}))
            .await
            .unwrap();
        let b = queue
            .enqueue("inventory", MutationAction::Delete, &json!("part-7"))
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.seq < b.seq);
        assert_eq!(queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_ordered_follows_enqueue_order() {
        let (_db, queue) = setup().await;

        for i in 0..5 {
            queue
                .enqueue("projects", MutationAction::Update, &json!({"rev": i}))
                .await
                .unwrap();
        }

        let entries = queue.list_ordered().await.unwrap();
        let revs: Vec<i64> = entries
            .iter()
            .map(|e| e.payload["rev"].as_i64().unwrap())
            .collect();
        assert_eq!(revs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_tie_break_by_insertion() {
        let (db, queue) = setup().await;

        let first = queue
            .enqueue("projects", MutationAction::Update, &json!({"n": 1}))
            .await
            .unwrap();
        let second = queue
            .enqueue("projects", MutationAction::Update, &json!({"n": 2}))
            .await
            .unwrap();

        // Force identical timestamps; only seq can order them now.
        sqlx::query("UPDATE sync_queue SET enqueued_at = ?1")
            .bind(first.enqueued_at)
            .execute(db.pool())
            .await
            .unwrap();

        let entries = queue.list_ordered().await.unwrap();
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_db, queue) = setup().await;

        let entry = queue
            .enqueue("projects", MutationAction::Create, &json!({}))
            .await
            .unwrap();

        queue.remove(&entry.id).await.unwrap();
        queue.remove(&entry.id).await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_failed_increments_attempts() {
        let (_db, queue) = setup().await;

        let entry = queue
            .enqueue("projects", MutationAction::Create, &json!({}))
            .await
            .unwrap();

        assert_eq!(queue.mark_failed(&entry.id, "timeout").await.unwrap(), 1);
        assert_eq!(queue.mark_failed(&entry.id, "timeout").await.unwrap(), 2);

        let entries = queue.list_ordered().await.unwrap();
        assert_eq!(entries[0].attempts, 2);
        assert_eq!(entries[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_mark_failed_missing_entry_errors() {
        let (_db, queue) = setup().await;

        let err = queue.mark_failed("ghost", "whatever").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_dead_letter_moves_entry() {
        let (_db, queue) = setup().await;

        let keep = queue
            .enqueue("projects", MutationAction::Create, &json!({"keep": true}))
            .await
            .unwrap();
        let evict = queue
            .enqueue("projects", MutationAction::Create, &json!({"keep": false}))
            .await
            .unwrap();

        queue.dead_letter(&evict.id, "remote rejects it").await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 1);
        assert_eq!(queue.list_ordered().await.unwrap()[0].id, keep.id);

        let dead = queue.list_dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, evict.id);
        assert_eq!(dead[0].reason, "remote rejects it");

        // Already moved: second call is a no-op.
        queue.dead_letter(&evict.id, "again").await.unwrap();
        assert_eq!(queue.list_dead_letters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_skipped_and_dead_lettered() {
        let (db, queue) = setup().await;

        queue
            .enqueue("projects", MutationAction::Create, &json!({"ok": true}))
            .await
            .unwrap();

        // Simulate a row written by a future or corrupted schema.
        sqlx::query(
            r#"
            INSERT INTO sync_queue (id, module, action, payload, enqueued_at)
            VALUES ('bad-row', 'projects', 'explode', '{}', ?1)
            "#,
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        let entries = queue.list_ordered().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].payload["ok"].as_bool().unwrap());

        let dead = queue.list_dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, "bad-row");
        assert!(dead[0].reason.starts_with("corrupt entry"));
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_dead_letters_by_age() {
        let (db, queue) = setup().await;

        let entry = queue
            .enqueue("projects", MutationAction::Create, &json!({}))
            .await
            .unwrap();
        queue.dead_letter(&entry.id, "stale").await.unwrap();

        // Fresh entries survive a purge.
        assert_eq!(queue.purge_dead_letters(30).await.unwrap(), 0);

        // Age the eviction artificially, then purge.
        let old = Utc::now() - Duration::days(60);
        sqlx::query("UPDATE sync_dead_letter SET failed_at = ?1")
            .bind(old)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(queue.purge_dead_letters(30).await.unwrap(), 1);
        assert!(queue.list_dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atelier.db");

        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            let queue = db.queue();
            for i in 0..3 {
                queue
                    .enqueue("projects", MutationAction::Update, &json!({"rev": i}))
                    .await
                    .unwrap();
            }
            db.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let entries = db.queue().list_ordered().await.unwrap();
        let revs: Vec<i64> = entries
            .iter()
            .map(|e| e.payload["rev"].as_i64().unwrap())
            .collect();
        assert_eq!(revs, vec![0, 1, 2]);
    }
}
