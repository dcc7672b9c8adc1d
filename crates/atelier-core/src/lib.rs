//! # atelier-core: Pure Domain Types for the Atelier Sync Core
//!
//! This crate is the leaf of the workspace. It defines the domain model the
//! rest of the sync core is built around, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atelier Sync Core                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layers (out of scope)                     │   │
//! │  │     dashboard ── kanban ── analytics ── settings ── market      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ enqueue / observe                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  atelier-sync (coordinator)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  atelier-db (durable store)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ atelier-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐              ┌───────────────┐             │   │
//! │  │   │    types      │              │  validation   │             │   │
//! │  │   │  QueueEntry   │              │  module name  │             │   │
//! │  │   │ MutationAction│              │  rules        │             │   │
//! │  │   └───────────────┘              └───────────────┘             │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (QueueEntry, MutationAction, CachedDocument)
//! - [`error`] - Domain error types
//! - [`validation`] - Module name validation rules

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::{CachedDocument, DeadLetterEntry, MutationAction, QueueEntry};
pub use validation::validate_module;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Document cache partition for project records.
pub const PARTITION_PROJECTS: &str = "projects";

/// Document cache partition for inventory records.
pub const PARTITION_INVENTORY: &str = "inventory";

/// Document cache partition for engineering records.
pub const PARTITION_ENGINEERING: &str = "engineering";

/// Every document cache partition the store creates at open time.
///
/// The sync queue and dead-letter log are separate partitions owned by
/// atelier-db; they are not listed here because nothing outside the store
/// writes to them directly.
pub const CACHE_PARTITIONS: [&str; 3] = [
    PARTITION_PROJECTS,
    PARTITION_INVENTORY,
    PARTITION_ENGINEERING,
];
