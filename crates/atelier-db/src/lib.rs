//! # atelier-db: Local Durable Store
//!
//! Crash-resistant key-value persistence for the Atelier sync core, backed
//! by SQLite with sqlx for async operations.
//!
//! ## Partition Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SQLite Database                                  │
//! │                                                                         │
//! │  documents          opaque cached remote documents, keyed by           │
//! │                     (partition, id); partitions: projects,             │
//! │                     inventory, engineering                             │
//! │                                                                         │
//! │  sync_queue         pending mutations, ordered by (enqueued_at, seq)   │
//! │                                                                         │
//! │  sync_dead_letter   entries evicted by the poisoned-entry policy       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (documents, queue)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atelier_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/atelier.db")).await?;
//!
//! let entry = db.queue().enqueue("projects", action, &payload).await?;
//! let pending = db.queue().count().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::document::DocumentRepository;
pub use repository::queue::QueueRepository;
