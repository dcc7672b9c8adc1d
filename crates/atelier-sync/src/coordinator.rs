//! # Sync Coordinator
//!
//! The core state machine of the sync engine: enqueues new mutations,
//! drains the queue against the remote store when online, enforces
//! at-most-one-drain-in-flight, and reports progress to observers.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Coordinator States                                  │
//! │                                                                         │
//! │            manual request / online transition /                         │
//! │            post-enqueue / periodic timer                                │
//! │  ┌──────┐ ─────────────────────────────────────► ┌──────────┐          │
//! │  │ Idle │        guard: not already draining,    │ Draining │          │
//! │  │      │ ◄───── online                          │          │          │
//! │  └──────┘ ─────────────────────────────────────  └──────────┘          │
//! │            batch fully applied, or aborted on                           │
//! │            the first failing entry                                      │
//! │                                                                         │
//! │  DRAIN (one batch):                                                    │
//! │  1. Snapshot list_ordered(); enqueues arriving during the drain        │
//! │     wait for the next cycle                                            │
//! │  2. Per entry, in (enqueued_at, seq) order:                            │
//! │       adapter ok   → remove from queue                                 │
//! │       adapter err  → record failure, abort remaining batch             │
//! │  3. Publish snapshot to observers after every step                     │
//! │                                                                         │
//! │  An offline transition never aborts an in-flight batch; it only        │
//! │  prevents the next one from starting.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no module-level singleton here: the coordinator is constructed
//! at the application's composition root and everything reaches it through
//! a cloned [`SyncHandle`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use atelier_core::{validate_module, MutationAction};
use atelier_db::Database;

use crate::adapter::AdapterRegistry;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityHandle;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// State Types
// =============================================================================

/// Coordinator state: either waiting or working through a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// No drain in flight.
    Idle,
    /// A batch is being replayed against the remote store.
    Draining,
}

impl std::fmt::Display for DrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrainState::Idle => write!(f, "idle"),
            DrainState::Draining => write!(f, "draining"),
        }
    }
}

/// What asked for a drain. Logged with every transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// Explicit `request_sync()` call.
    Manual,
    /// Connectivity transition to online.
    Online,
    /// Successful enqueue while online.
    Enqueue,
    /// Periodic retry timer.
    Timer,
    /// Coordinator startup with a non-empty persisted queue.
    Startup,
}

impl std::fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrainTrigger::Manual => write!(f, "manual"),
            DrainTrigger::Online => write!(f, "online"),
            DrainTrigger::Enqueue => write!(f, "enqueue"),
            DrainTrigger::Timer => write!(f, "timer"),
            DrainTrigger::Startup => write!(f, "startup"),
        }
    }
}

/// Observer-facing snapshot of the sync engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    /// Most recent connectivity observation.
    pub is_online: bool,

    /// True only while a drain is actively executing.
    pub is_syncing: bool,

    /// Mutations currently queued. Mirrors the durable queue's cardinality;
    /// the user-visible proof that offline work is safely stored.
    pub pending_count: i64,

    /// When the last batch fully drained.
    pub last_sync_at: Option<DateTime<Utc>>,

    /// Why the last drain aborted, if it did. Cleared by a clean drain.
    pub last_error: Option<String>,
}

/// Internal mutable state. Derived/ephemeral: rebuilt from the durable
/// queue at startup, never persisted itself.
#[derive(Debug, Clone)]
struct SyncState {
    is_online: bool,
    drain_state: DrainState,
    pending_count: i64,
    last_sync_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl SyncState {
    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            is_online: self.is_online,
            is_syncing: self.drain_state == DrainState::Draining,
            pending_count: self.pending_count,
            last_sync_at: self.last_sync_at,
            last_error: self.last_error.clone(),
        }
    }
}

// =============================================================================
// State Publisher
// =============================================================================

/// Owns the state and the observer channel; every mutation publishes a
/// fresh snapshot, so subscribers never see a stale view.
struct StatePublisher {
    state: RwLock<SyncState>,
    tx: watch::Sender<SyncSnapshot>,
}

impl StatePublisher {
    fn new(initial: SyncState) -> (Arc<Self>, watch::Receiver<SyncSnapshot>) {
        let (tx, rx) = watch::channel(initial.snapshot());
        let publisher = Arc::new(StatePublisher {
            state: RwLock::new(initial),
            tx,
        });
        (publisher, rx)
    }

    async fn update(&self, apply: impl FnOnce(&mut SyncState)) {
        let mut state = self.state.write().await;
        apply(&mut state);
        // Published under the lock: snapshots reach observers in the same
        // order the state changed.
        self.tx.send_replace(state.snapshot());
    }

    async fn snapshot(&self) -> SyncSnapshot {
        self.state.read().await.snapshot()
    }
}

// =============================================================================
// Commands
// =============================================================================

enum Command {
    Drain(DrainTrigger),
    Shutdown,
}

// =============================================================================
// Sync Handle
// =============================================================================

/// Cloneable handle to a running coordinator.
///
/// This is the whole public surface: `enqueue` for every write path in the
/// application, `request_sync` for the manual sync button, `subscribe` for
/// status UI.
#[derive(Clone)]
pub struct SyncHandle {
    db: Database,
    registry: Arc<AdapterRegistry>,
    publisher: Arc<StatePublisher>,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SyncSnapshot>,
    auto_drain: bool,
}

impl SyncHandle {
    /// Queues a mutation for eventual replay against the remote store.
    ///
    /// The entry is durable once this returns; `pending_count` reflects it
    /// immediately. While online, a drain is triggered right away (unless
    /// disabled in config); while offline, the entry simply waits.
    ///
    /// ## Errors
    /// - [`SyncError::InvalidMutation`] for a malformed module name
    /// - [`SyncError::UnknownModule`] when no adapter is registered for the
    ///   module (failing fast here beats dead-lettering at drain time)
    /// - [`SyncError::Storage`] when the durable store rejects the write
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        module: &str,
        action: MutationAction,
        payload: &T,
    ) -> SyncResult<String> {
        validate_module(module)?;

        if !self.registry.is_registered(module) {
            return Err(SyncError::UnknownModule(module.to_string()));
        }

        let value = serde_json::to_value(payload)?;
        let entry = self.db.queue().enqueue(module, action, &value).await?;

        let pending = self.db.queue().count().await?;
        self.publisher.update(|s| s.pending_count = pending).await;

        debug!(id = %entry.id, module, pending, "mutation queued");

        if self.auto_drain {
            // Offline and mid-drain triggers are filtered by the run loop.
            let _ = self.cmd_tx.send(Command::Drain(DrainTrigger::Enqueue)).await;
        }

        Ok(entry.id)
    }

    /// Fire-and-forget drain trigger.
    ///
    /// Safe to call any time: a no-op while offline or while a drain is
    /// already in flight.
    pub async fn request_sync(&self) -> SyncResult<()> {
        self.cmd_tx
            .send(Command::Drain(DrainTrigger::Manual))
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Subscribes to state changes.
    ///
    /// The receiver's current value is always a valid snapshot, so
    /// observers render immediately and then wake on every change.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state_rx.clone()
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> SyncSnapshot {
        self.publisher.snapshot().await
    }

    /// Returns the number of queued mutations.
    pub async fn pending_count(&self) -> i64 {
        self.snapshot().await.pending_count
    }

    /// Stops the coordinator task. An in-flight batch completes or fails
    /// on its own; there is no cancellation of individual adapter calls.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }
}

// =============================================================================
// Sync Coordinator
// =============================================================================

/// Background task driving the Idle/Draining state machine.
pub struct SyncCoordinator {
    db: Database,
    registry: Arc<AdapterRegistry>,
    connectivity: ConnectivityHandle,
    config: Arc<SyncConfig>,
    publisher: Arc<StatePublisher>,
    /// The sole mutex-equivalent in the engine: claims the Draining state
    /// across every trigger source.
    is_syncing: Arc<AtomicBool>,
    cmd_rx: mpsc::Receiver<Command>,
}

impl SyncCoordinator {
    /// Validates config, reads the persisted queue size, spawns the
    /// coordinator task and returns its handle.
    ///
    /// Dependency-injected by design: the database, adapter registry and
    /// connectivity source all come from the composition root, which makes
    /// the whole engine testable with fakes.
    pub async fn start(
        db: Database,
        registry: AdapterRegistry,
        connectivity: ConnectivityHandle,
        config: SyncConfig,
    ) -> SyncResult<SyncHandle> {
        config.validate()?;

        let pending = db.queue().count().await?;
        let initial = SyncState {
            is_online: connectivity.is_online(),
            drain_state: DrainState::Idle,
            pending_count: pending,
            last_sync_at: None,
            last_error: None,
        };

        info!(
            pending,
            online = initial.is_online,
            "starting sync coordinator"
        );

        let (publisher, state_rx) = StatePublisher::new(initial);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let registry = Arc::new(registry);
        let config = Arc::new(config);
        let auto_drain = config.drain.auto_drain_on_enqueue;

        let coordinator = SyncCoordinator {
            db: db.clone(),
            registry: registry.clone(),
            connectivity,
            config,
            publisher: publisher.clone(),
            is_syncing: Arc::new(AtomicBool::new(false)),
            cmd_rx,
        };

        tokio::spawn(coordinator.run());

        Ok(SyncHandle {
            db,
            registry,
            publisher,
            cmd_tx,
            state_rx,
            auto_drain,
        })
    }

    /// Main coordinator loop: one `select!` over commands, connectivity
    /// transitions and the retry timer.
    async fn run(mut self) {
        info!("sync coordinator running");

        let mut online_rx = self.connectivity.subscribe();
        let mut watching = true;

        let mut poll =
            tokio::time::interval(Duration::from_secs(self.config.drain.poll_interval_secs));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup catch-up below
        // covers it.
        poll.tick().await;

        // Catch up on work persisted by a previous session.
        if self.publisher.snapshot().await.pending_count > 0 {
            self.try_drain(DrainTrigger::Startup).await;
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Drain(trigger)) => self.try_drain(trigger).await,
                    Some(Command::Shutdown) => {
                        info!("sync coordinator received shutdown");
                        break;
                    }
                    None => {
                        info!("all sync handles dropped, stopping coordinator");
                        break;
                    }
                },

                changed = online_rx.changed(), if watching => match changed {
                    Ok(()) => {
                        let online = *online_rx.borrow_and_update();
                        self.publisher.update(|s| s.is_online = online).await;

                        if online {
                            info!("connectivity restored, draining queue");
                            self.try_drain(DrainTrigger::Online).await;
                        } else {
                            // An in-flight batch is never aborted; going
                            // offline only prevents the next one.
                            info!("connectivity lost, mutations will queue locally");
                        }
                    }
                    Err(_) => {
                        warn!("connectivity source dropped, relying on manual and timer triggers");
                        watching = false;
                    }
                },

                _ = poll.tick() => self.try_drain(DrainTrigger::Timer).await,
            }
        }

        info!("sync coordinator stopped");
    }

    /// Attempts the `Idle -> Draining` transition.
    ///
    /// No-ops while offline and while another drain is in flight, whatever
    /// the trigger source. The actual batch runs as a spawned task so the
    /// run loop keeps absorbing (and dropping) concurrent triggers.
    async fn try_drain(&self, trigger: DrainTrigger) {
        if !self.connectivity.is_online() {
            debug!(%trigger, "drain skipped: offline");
            return;
        }

        if self.is_syncing.swap(true, Ordering::SeqCst) {
            debug!(%trigger, "drain skipped: already in flight");
            return;
        }

        debug!(%trigger, "drain starting");

        let db = self.db.clone();
        let registry = self.registry.clone();
        let publisher = self.publisher.clone();
        let is_syncing = self.is_syncing.clone();
        let max_attempts = i64::from(self.config.queue.max_attempts);

        tokio::spawn(async move {
            publisher
                .update(|s| s.drain_state = DrainState::Draining)
                .await;

            let result = drain_batch(&db, &registry, &publisher, max_attempts).await;

            publisher
                .update(|s| {
                    s.drain_state = DrainState::Idle;
                    match &result {
                        Ok(applied) => {
                            if *applied > 0 {
                                s.last_sync_at = Some(Utc::now());
                            }
                            s.last_error = None;
                        }
                        Err(e) => s.last_error = Some(e.to_string()),
                    }
                    // Released under the publisher lock: any observer that
                    // sees the Idle snapshot can immediately re-trigger.
                    is_syncing.store(false, Ordering::SeqCst);
                })
                .await;

            match result {
                Ok(applied) if applied > 0 => info!(applied, "drain complete"),
                Ok(_) => debug!("drain complete: queue empty"),
                Err(e) => warn!(error = %e, "drain aborted, entries remain queued"),
            }
        });
    }
}

// =============================================================================
// Drain Algorithm
// =============================================================================

/// Replays one snapshot of the queue in `(enqueued_at, seq)` order.
///
/// Returns the number of entries applied. On the first failure the rest of
/// the batch is abandoned: later entries may depend on earlier ones for the
/// same document, so skipping ahead would break last-write-wins. The next
/// trigger retries the whole remaining queue from the front.
async fn drain_batch(
    db: &Database,
    registry: &AdapterRegistry,
    publisher: &StatePublisher,
    max_attempts: i64,
) -> SyncResult<usize> {
    let batch = db.queue().list_ordered().await?;

    // list_ordered may have dead-lettered corrupt rows; republish the count.
    let pending = db.queue().count().await?;
    publisher.update(|s| s.pending_count = pending).await;

    if batch.is_empty() {
        return Ok(0);
    }

    info!(count = batch.len(), "draining mutation batch");

    let mut applied = 0usize;

    for entry in &batch {
        match registry.dispatch(entry).await {
            Ok(()) => {
                db.queue().remove(&entry.id).await?;
                applied += 1;

                let pending = db.queue().count().await?;
                publisher.update(|s| s.pending_count = pending).await;
            }
            Err(e) => {
                warn!(
                    id = %entry.id,
                    module = %entry.module,
                    error = %e,
                    "mutation rejected, aborting batch"
                );

                if !e.is_retryable() {
                    db.queue().dead_letter(&entry.id, &e.to_string()).await?;
                } else {
                    let attempts = db.queue().mark_failed(&entry.id, &e.to_string()).await?;
                    if attempts >= max_attempts {
                        db.queue()
                            .dead_letter(
                                &entry.id,
                                &format!("gave up after {attempts} attempts: {e}"),
                            )
                            .await?;
                    }
                }

                let pending = db.queue().count().await?;
                publisher.update(|s| s.pending_count = pending).await;

                return Err(e);
            }
        }
    }

    Ok(applied)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RemoteAdapter;
    use crate::connectivity::ConnectivityMonitor;
    use async_trait::async_trait;
    use atelier_db::DbConfig;
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;
    use tokio::time::{sleep, timeout};

    type Journal = Arc<StdMutex<Vec<(String, MutationAction, Value)>>>;

    /// Records every applied mutation; rejects payloads carrying
    /// `"fail": true`, which is how tests stage adapter failures.
    struct JournalAdapter {
        tag: &'static str,
        journal: Journal,
    }

    #[async_trait]
    impl RemoteAdapter for JournalAdapter {
        async fn apply(&self, action: MutationAction, payload: &Value) -> SyncResult<()> {
            if payload.get("fail") == Some(&json!(true)) {
                return Err(SyncError::Adapter {
                    module: self.tag.to_string(),
                    message: "remote rejected payload".to_string(),
                });
            }

            self.journal
                .lock()
                .unwrap()
                .push((self.tag.to_string(), action, payload.clone()));
            Ok(())
        }
    }

    /// Blocks inside `apply` until the test hands out permits.
    struct GatedAdapter {
        gate: Arc<Semaphore>,
        journal: Journal,
    }

    #[async_trait]
    impl RemoteAdapter for GatedAdapter {
        async fn apply(&self, action: MutationAction, payload: &Value) -> SyncResult<()> {
            self.gate.acquire().await.unwrap().forget();
            self.journal
                .lock()
                .unwrap()
                .push(("gated".to_string(), action, payload.clone()));
            Ok(())
        }
    }

    fn journal() -> Journal {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn journal_registry(journal: &Journal) -> AdapterRegistry {
        AdapterRegistry::new()
            .register(
                "projects",
                Arc::new(JournalAdapter {
                    tag: "projects",
                    journal: journal.clone(),
                }),
            )
            .register(
                "inventory",
                Arc::new(JournalAdapter {
                    tag: "inventory",
                    journal: journal.clone(),
                }),
            )
    }

    /// Quiet config: the retry timer is pushed out so tests only see the
    /// triggers they stage themselves.
    fn test_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.drain.poll_interval_secs = 3600;
        config
    }

    async fn start(
        online: bool,
        registry: AdapterRegistry,
        config: SyncConfig,
    ) -> (SyncHandle, crate::connectivity::ManualSource, Database) {
        // RUST_LOG=debug cargo test -- --nocapture shows the drain decisions.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (connectivity, source) = ConnectivityMonitor::manual(online);
        let handle = SyncCoordinator::start(db.clone(), registry, connectivity, config)
            .await
            .unwrap();
        (handle, source, db)
    }

    async fn wait_for(
        handle: &SyncHandle,
        what: &str,
        condition: impl Fn(&SyncSnapshot) -> bool,
    ) -> SyncSnapshot {
        let mut rx = handle.subscribe();
        timeout(Duration::from_secs(5), async move {
            loop {
                {
                    let snap = rx.borrow_and_update().clone();
                    if condition(&snap) {
                        return snap;
                    }
                }
                rx.changed().await.expect("coordinator gone");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for: {what}"))
    }

    #[test]
    fn test_drain_state_display() {
        assert_eq!(DrainState::Idle.to_string(), "idle");
        assert_eq!(DrainState::Draining.to_string(), "draining");
        assert_eq!(DrainTrigger::Online.to_string(), "online");
    }

    #[tokio::test]
    async fn test_subscribe_fires_immediately() {
        let journal = journal();
        let (handle, _source, _db) = start(false, journal_registry(&journal), test_config()).await;

        // No awaiting: the current value is already a full snapshot.
        let rx = handle.subscribe();
        let snap = rx.borrow().clone();
        assert!(!snap.is_online);
        assert!(!snap.is_syncing);
        assert_eq!(snap.pending_count, 0);
    }

    #[tokio::test]
    async fn test_offline_enqueue_queues_without_sending() {
        let journal = journal();
        let (handle, _source, _db) = start(false, journal_registry(&journal), test_config()).await;

        handle
            .enqueue("projects", MutationAction::Create, &json!({"name": "Test"}))
            .await
            .unwrap();

        assert_eq!(handle.pending_count().await, 1);

        // Manual sync while offline is a no-op.
        handle.request_sync().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(handle.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_online_transition_drains_queue() {
        let journal = journal();
        let (handle, source, _db) = start(false, journal_registry(&journal), test_config()).await;

        handle
            .enqueue("projects", MutationAction::Create, &json!({"name": "Test"}))
            .await
            .unwrap();

        source.set_online(true);

        let snap = wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        assert!(snap.last_sync_at.is_some());
        assert!(snap.last_error.is_none());
        let calls = journal.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, MutationAction::Create);
    }

    #[tokio::test]
    async fn test_drain_preserves_enqueue_order() {
        let journal = journal();
        let (handle, source, _db) = start(false, journal_registry(&journal), test_config()).await;

        // Two updates to the same logical document plus unrelated writes,
        // interleaved across modules.
        handle
            .enqueue("projects", MutationAction::Update, &json!({"id": "p-1", "rev": 1}))
            .await
            .unwrap();
        handle
            .enqueue("inventory", MutationAction::Create, &json!({"id": "i-1", "rev": 2}))
            .await
            .unwrap();
        handle
            .enqueue("projects", MutationAction::Update, &json!({"id": "p-1", "rev": 3}))
            .await
            .unwrap();
        handle
            .enqueue("projects", MutationAction::Delete, &json!({"id": "p-2", "rev": 4}))
            .await
            .unwrap();

        source.set_online(true);
        wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        let revs: Vec<i64> = journal
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, payload)| payload["rev"].as_i64().unwrap())
            .collect();
        assert_eq!(revs, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_remaining_queued() {
        let journal = journal();
        let (handle, source, db) = start(false, journal_registry(&journal), test_config()).await;

        handle
            .enqueue("projects", MutationAction::Update, &json!({"n": 1}))
            .await
            .unwrap();
        let failing = handle
            .enqueue("projects", MutationAction::Update, &json!({"n": 2, "fail": true}))
            .await
            .unwrap();
        handle
            .enqueue("projects", MutationAction::Update, &json!({"n": 3}))
            .await
            .unwrap();

        source.set_online(true);

        let snap = wait_for(&handle, "drain aborted", |s| {
            !s.is_syncing && s.last_error.is_some()
        })
        .await;

        // Exactly the entries before the failure were removed.
        assert_eq!(snap.pending_count, 2);
        let calls = journal.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2["n"], 1);
        drop(calls);

        // The failed entry is still at the front, bookkept, in order.
        let remaining = db.queue().list_ordered().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].id, failing);
        assert_eq!(remaining[0].attempts, 1);
        assert!(remaining[0].last_error.is_some());
        assert_eq!(remaining[1].payload["n"], 3);
    }

    #[tokio::test]
    async fn test_concurrent_sync_requests_drain_once() {
        let journal = journal();
        let gate = Arc::new(Semaphore::new(0));
        let registry = AdapterRegistry::new().register(
            "projects",
            Arc::new(GatedAdapter {
                gate: gate.clone(),
                journal: journal.clone(),
            }),
        );

        let mut config = test_config();
        config.drain.auto_drain_on_enqueue = false;

        let (handle, _source, _db) = start(true, registry, config).await;

        handle
            .enqueue("projects", MutationAction::Create, &json!({"name": "Test"}))
            .await
            .unwrap();

        // Two triggers in rapid succession; the first drain is still parked
        // inside the adapter when the second arrives.
        handle.request_sync().await.unwrap();
        handle.request_sync().await.unwrap();

        wait_for(&handle, "drain started", |s| s.is_syncing).await;
        gate.add_permits(16);

        wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        // A second concurrent drain would have re-applied the entry.
        assert_eq!(journal.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_while_online_auto_drains() {
        let journal = journal();
        let (handle, _source, _db) = start(true, journal_registry(&journal), test_config()).await;

        handle
            .enqueue("inventory", MutationAction::Create, &json!({"sku": "X-42"}))
            .await
            .unwrap();

        wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        assert_eq!(journal.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_drains_persisted_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atelier.db");

        // First session: queue three mutations offline, then stop.
        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            let journal = journal();
            let (connectivity, _source) = ConnectivityMonitor::manual(false);
            let handle = SyncCoordinator::start(
                db.clone(),
                journal_registry(&journal),
                connectivity,
                test_config(),
            )
            .await
            .unwrap();

            for rev in 1..=3 {
                handle
                    .enqueue("projects", MutationAction::Update, &json!({"rev": rev}))
                    .await
                    .unwrap();
            }
            assert_eq!(handle.pending_count().await, 3);

            handle.shutdown().await;
            db.close().await;
        }

        // Second session: starts online with the persisted queue and
        // catches up without any explicit trigger.
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let journal = journal();
        let (connectivity, _source) = ConnectivityMonitor::manual(true);
        let handle = SyncCoordinator::start(
            db.clone(),
            journal_registry(&journal),
            connectivity,
            test_config(),
        )
        .await
        .unwrap();

        wait_for(&handle, "persisted queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        let revs: Vec<i64> = journal
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, payload)| payload["rev"].as_i64().unwrap())
            .collect();
        assert_eq!(revs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_poisoned_entry_dead_letters_after_max_attempts() {
        let journal = journal();
        let mut config = test_config();
        config.queue.max_attempts = 2;
        config.drain.auto_drain_on_enqueue = false;

        let (handle, _source, db) = start(true, journal_registry(&journal), config).await;

        let poisoned = handle
            .enqueue("projects", MutationAction::Update, &json!({"fail": true}))
            .await
            .unwrap();
        handle
            .enqueue("inventory", MutationAction::Create, &json!({"sku": "OK-1"}))
            .await
            .unwrap();

        // First attempt: failure recorded, everything still queued.
        handle.request_sync().await.unwrap();
        wait_for(&handle, "first drain aborted", |s| {
            !s.is_syncing && s.last_error.is_some() && s.pending_count == 2
        })
        .await;

        // Second attempt: threshold reached, poisoned entry evicted.
        handle.request_sync().await.unwrap();
        wait_for(&handle, "poisoned entry evicted", |s| {
            !s.is_syncing && s.pending_count == 1
        })
        .await;

        let dead = db.queue().list_dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, poisoned);
        assert!(dead[0].reason.contains("gave up after 2 attempts"));

        // Third attempt: the entry behind the poison pill now syncs.
        handle.request_sync().await.unwrap();
        wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;

        let calls = journal.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "inventory");
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unknown_module() {
        let journal = journal();
        let (handle, _source, _db) = start(false, journal_registry(&journal), test_config()).await;

        let err = handle
            .enqueue("marketplace", MutationAction::Create, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownModule(_)));

        let err = handle
            .enqueue("Projects", MutationAction::Create, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidMutation(_)));

        assert_eq!(handle.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_offline_transition_does_not_lose_state() {
        let journal = journal();
        let (handle, source, _db) = start(true, journal_registry(&journal), test_config()).await;

        source.set_online(false);
        wait_for(&handle, "offline observed", |s| !s.is_online).await;

        handle
            .enqueue("projects", MutationAction::Create, &json!({"n": 1}))
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        // Queued, not sent.
        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(handle.pending_count().await, 1);

        source.set_online(true);
        wait_for(&handle, "queue drained", |s| {
            s.pending_count == 0 && !s.is_syncing
        })
        .await;
        assert_eq!(journal.lock().unwrap().len(), 1);
    }
}
