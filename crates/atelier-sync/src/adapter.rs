//! # Remote Store Adapter Boundary
//!
//! The sync core never talks to the remote document store directly: every
//! queued mutation is handed to a module-specific adapter. Adapters are the
//! external collaborator boundary: opaque, possibly slow, possibly failing
//! RPCs. Retry behavior does NOT belong here; the coordinator re-drains the
//! remaining queue on its next trigger.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use atelier_core::{MutationAction, QueueEntry};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Adapter Trait
// =============================================================================

/// Applies one mutation to the remote store.
///
/// Implementations must be idempotent-safe for create/update/delete on the
/// same document id: an aborted batch replays from the front, so an adapter
/// may see a mutation it already applied.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Performs the remote write. Reject with [`SyncError::Adapter`] on any
    /// network, auth, or remote-validation error.
    async fn apply(&self, action: MutationAction, payload: &Value) -> SyncResult<()>;
}

// =============================================================================
// Registry
// =============================================================================

/// Maps module names to their remote adapters.
///
/// Built once at the application's composition root and handed to the
/// coordinator; the registry is immutable afterwards, which is what makes
/// "no adapter for this module" a non-retryable failure.
///
/// ## Example
/// ```rust,ignore
/// let registry = AdapterRegistry::new()
///     .register("projects", Arc::new(projects_adapter))
///     .register("inventory", Arc::new(inventory_adapter));
/// ```
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn RemoteAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        AdapterRegistry {
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter for a module, replacing any previous one.
    pub fn register(mut self, module: impl Into<String>, adapter: Arc<dyn RemoteAdapter>) -> Self {
        self.adapters.insert(module.into(), adapter);
        self
    }

    /// Returns true when a module has an adapter.
    pub fn is_registered(&self, module: &str) -> bool {
        self.adapters.contains_key(module)
    }

    /// Returns the registered module names, for diagnostics.
    pub fn modules(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// Dispatches a queue entry to its module's adapter.
    pub async fn dispatch(&self, entry: &QueueEntry) -> SyncResult<()> {
        let adapter = self
            .adapters
            .get(&entry.module)
            .ok_or_else(|| SyncError::UnknownModule(entry.module.clone()))?;

        debug!(
            id = %entry.id,
            module = %entry.module,
            action = %entry.action,
            "dispatching mutation to adapter"
        );

        adapter.apply(entry.action, &entry.payload).await
    }
}

// =============================================================================
// Tests
// =============================================================================
