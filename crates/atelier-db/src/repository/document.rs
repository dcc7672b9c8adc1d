//! # Document Cache Repository
//!
//! Opaque cached copies of remote documents, one logical partition per
//! application module. Written by the application's read-through caching
//! paths; the sync core itself only reads and writes through this contract.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use atelier_core::{CachedDocument, CACHE_PARTITIONS};

use crate::error::{DbError, DbResult};

/// Repository for the document cache partitions.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Creates a new DocumentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Upserts a document into a partition, keyed by its own id.
    ///
    /// Durable once this returns: SQLite guarantees the row is fully
    /// written or not written at all.
    pub async fn put(&self, partition: &str, id: &str, body: &Value) -> DbResult<()> {
        check_partition(partition)?;

        let text = serde_json::to_string(body)?;
        let now = Utc::now();

        debug!(partition, id, "caching document");

        sqlx::query(
            r#"
            INSERT INTO documents (partition, id, body, cached_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (partition, id)
            DO UPDATE SET body = excluded.body, cached_at = excluded.cached_at
            "#,
        )
        .bind(partition)
        .bind(id)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns a cached document, or [`DbError::NotFound`].
    pub async fn get(&self, partition: &str, id: &str) -> DbResult<CachedDocument> {
        check_partition(partition)?;

        let row = sqlx::query(
            "SELECT partition, id, body, cached_at FROM documents WHERE partition = ?1 AND id = ?2",
        )
        .bind(partition)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => decode_row(&row),
            None => Err(DbError::not_found(partition, id)),
        }
    }

    /// Returns every document in a partition. Order unspecified.
    pub async fn get_all(&self, partition: &str) -> DbResult<Vec<CachedDocument>> {
        check_partition(partition)?;

        let rows =
            sqlx::query("SELECT partition, id, body, cached_at FROM documents WHERE partition = ?1")
                .bind(partition)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(decode_row).collect()
    }

    /// Removes a document. No-op (not an error) if absent.
    pub async fn delete(&self, partition: &str, id: &str) -> DbResult<()> {
        check_partition(partition)?;

        let result = sqlx::query("DELETE FROM documents WHERE partition = ?1 AND id = ?2")
            .bind(partition)
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(
            partition,
            id,
            removed = result.rows_affected(),
            "deleted cached document"
        );

        Ok(())
    }
}

/// Rejects partitions the store does not manage.
fn check_partition(partition: &str) -> DbResult<()> {
    if CACHE_PARTITIONS.contains(&partition) {
        Ok(())
    } else {
        Err(DbError::UnknownPartition(partition.to_string()))
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> DbResult<CachedDocument> {
    let body_text: String = row.try_get("body")?;
    let body: Value = serde_json::from_str(&body_text)?;
    let cached_at: DateTime<Utc> = row.try_get("cached_at")?;

    Ok(CachedDocument {
        partition: row.try_get("partition")?,
        id: row.try_get("id")?,
        body,
        cached_at,
    })
}

// =============================================================================
// Tests
// =============================================================================
