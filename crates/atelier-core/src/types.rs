//! # Domain Types
//!
//! Core types shared by the durable store and the sync coordinator.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   QueueEntry    │   │ MutationAction  │   │ CachedDocument  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  Create         │   │  partition      │       │
//! │  │  seq (i64)      │   │  Update         │   │  id             │       │
//! │  │  module         │   │  Delete         │   │  body (JSON)    │       │
//! │  │  action         │   └─────────────────┘   │  cached_at      │       │
//! │  │  payload (JSON) │                         └─────────────────┘       │
//! │  │  enqueued_at    │   ┌─────────────────┐                             │
//! │  │  attempts       │   │ DeadLetterEntry │                             │
//! │  │  last_error     │   │  evicted queue  │                             │
//! │  └─────────────────┘   │  rows + reason  │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every queue entry has:
//! - `id`: UUID v4 - opaque, stable, usable across process restarts
//! - `seq`: SQLite insertion id - monotonically increasing, the deterministic
//!   tie-breaker when two entries carry the same `enqueued_at` millisecond

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Mutation Action
// =============================================================================

/// The kind of write a queue entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// Insert a new document. Payload is the document body.
    Create,
    /// Overwrite an existing document. Payload is the document body.
    Update,
    /// Remove a document. Payload carries the target identifier.
    Delete,
}

impl MutationAction {
    /// Returns the canonical string form, as stored in the queue partition.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(MutationAction::Create),
            "update" => Ok(MutationAction::Update),
            "delete" => Ok(MutationAction::Delete),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

// =============================================================================
// Queue Entry
// =============================================================================

/// A single pending mutation awaiting remote confirmation.
///
/// Entries are immutable once created: the queue is mutated only by append
/// (enqueue) and remove (successful drain or dead-letter eviction). The
/// `attempts` / `last_error` fields are drain bookkeeping recorded against
/// the row, not edits of the mutation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Opaque unique identifier (UUID v4), generated at enqueue time.
    pub id: String,

    /// Insertion id. Strictly increasing; breaks `enqueued_at` ties so that
    /// replay order is deterministic.
    pub seq: i64,

    /// Logical partition the mutation targets ("projects", "inventory", ...).
    pub module: String,

    /// What to do at the remote store.
    pub action: MutationAction,

    /// Opaque payload: document body for create/update, target id for delete.
    pub payload: Value,

    /// Wall-clock timestamp at enqueue time. Drives last-write-wins ordering.
    pub enqueued_at: DateTime<Utc>,

    /// Number of failed drain attempts recorded against this entry.
    pub attempts: i64,

    /// Most recent drain failure, if any.
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Replay ordering key: ascending `enqueued_at`, ties broken by `seq`.
    ///
    /// Draining in this order guarantees the remote store's final state per
    /// logical document reflects the most recent local intent.
    pub fn sort_key(&self) -> (i64, i64) {
        (self.enqueued_at.timestamp_millis(), self.seq)
    }
}

// =============================================================================
// Dead Letter Entry
// =============================================================================

/// A queue entry evicted by the poisoned-entry policy.
///
/// `action`, `payload` and `enqueued_at` are kept as the raw stored text:
/// corrupt rows land here too, and re-decoding what failed to decode would
/// defeat the purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: String,
    pub module: String,
    pub action: String,
    pub payload: String,
    pub enqueued_at: String,
    /// Attempts recorded before eviction.
    pub attempts: i64,
    /// Why the entry was evicted.
    pub reason: String,
    /// When the entry was evicted.
    pub failed_at: DateTime<Utc>,
}

// =============================================================================
// Cached Document
// =============================================================================

/// An opaque cached copy of a remote document.
///
/// Written by read-through caching paths in the application; the sync core
/// only provides the storage contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDocument {
    /// Cache partition this document lives in.
    pub partition: String,

    /// The document's own identifier.
    pub id: String,

    /// Full document body as JSON.
    pub body: Value,

    /// When the local copy was last written.
    pub cached_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry(seq: i64, millis: i64) -> QueueEntry {
        QueueEntry {
            id: format!("entry-{seq}"),
            seq,
            module: "projects".to_string(),
            action: MutationAction::Update,
            payload: json!({"id": "doc-1"}),
            enqueued_at: Utc.timestamp_millis_opt(millis).unwrap(),
            attempts: 0,
            last_error: None,
        }
    }

    #[test]
    fn test_action_roundtrip() {
        for action in [
            MutationAction::Create,
            MutationAction::Update,
            MutationAction::Delete,
        ] {
            let parsed: MutationAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn test_action_rejects_unknown() {
        let err = "upsert".parse::<MutationAction>().unwrap_err();
        assert!(err.to_string().contains("upsert"));
    }

    #[test]
    fn test_action_serde_uses_snake_case() {
        let json = serde_json::to_string(&MutationAction::Create).unwrap();
        assert_eq!(json, "\"create\"");
    }

    #[test]
    fn test_sort_key_orders_by_timestamp_then_seq() {
        let early = entry(7, 100);
        let late = entry(1, 200);
        assert!(early.sort_key() < late.sort_key());

        // Same millisecond: insertion order decides.
        let first = entry(1, 100);
        let second = entry(2, 100);
        assert!(first.sort_key() < second.sort_key());
    }
}
