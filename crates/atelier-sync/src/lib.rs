//! # atelier-sync: Offline-First Sync Engine
//!
//! This crate provides the synchronization layer for Atelier, enabling
//! offline-first operation with background replay of queued mutations
//! against the remote document store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Engine Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                SyncCoordinator (state machine)                   │  │
//! │  │                                                                  │  │
//! │  │  Idle ──────────────────────────────► Draining                   │  │
//! │  │    ▲   manual / online / enqueue / timer   │                     │  │
//! │  │    └───────────────────────────────────────┘                     │  │
//! │  │              batch complete or aborted                           │  │
//! │  └───────┬──────────────────────┬───────────────────┬───────────────┘  │
//! │          │                      │                   │                   │
//! │          ▼                      ▼                   ▼                   │
//! │  ┌───────────────┐    ┌─────────────────┐  ┌─────────────────────┐     │
//! │  │ Connectivity  │    │  MutationQueue  │  │  AdapterRegistry    │     │
//! │  │ Monitor       │    │  (atelier-db)   │  │                     │     │
//! │  │               │    │                 │  │ module → adapter    │     │
//! │  │ TCP probe or  │    │ durable, LWW    │  │ opaque async RPC    │     │
//! │  │ manual source │    │ replay order    │  │ to the remote store │     │
//! │  └───────────────┘    └─────────────────┘  └─────────────────────┘     │
//! │                                                                         │
//! │  OBSERVERS (status page, toasts):                                      │
//! │  ────────────────────────────────                                      │
//! │  handle.subscribe() → watch::Receiver<SyncSnapshot>                    │
//! │  { is_online, is_syncing, pending_count, last_sync_at, last_error }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`coordinator`] - The `SyncCoordinator` state machine and `SyncHandle`
//! - [`connectivity`] - Online/offline detection with transition events
//! - [`adapter`] - Remote store adapter trait and per-module registry
//! - [`config`] - Sync configuration (TOML, platform config dir)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use atelier_db::{Database, DbConfig};
//! use atelier_sync::{
//!     AdapterRegistry, ConnectivityMonitor, SyncConfig, SyncCoordinator,
//! };
//!
//! let db = Database::new(DbConfig::new("atelier.db")).await?;
//! let config = SyncConfig::load_or_default(None)?;
//!
//! let connectivity = ConnectivityMonitor::tcp(&config.connectivity).await;
//! let registry = AdapterRegistry::new()
//!     .register("projects", Arc::new(projects_adapter))
//!     .register("inventory", Arc::new(inventory_adapter));
//!
//! let sync = SyncCoordinator::start(db, registry, connectivity, config).await?;
//!
//! // Write path, anywhere in the app:
//! sync.enqueue("projects", MutationAction::Create, &project).await?;
//!
//! // Status page:
//! let mut status = sync.subscribe();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod adapter;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

pub use adapter::{AdapterRegistry, RemoteAdapter};
pub use config::{ConnectivitySettings, DrainSettings, QueueSettings, SyncConfig};
pub use connectivity::{
    ConnectivityHandle, ConnectivityMonitor, ConnectivityProbe, ManualSource, TcpProbe,
};
pub use coordinator::{DrainState, DrainTrigger, SyncCoordinator, SyncHandle, SyncSnapshot};
pub use error::{SyncError, SyncResult};

// Re-export the action enum: every caller of enqueue needs it.
pub use atelier_core::MutationAction;
