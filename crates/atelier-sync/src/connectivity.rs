//! # Connectivity Monitor
//!
//! Detects transitions between reachable and unreachable network states and
//! notifies subscribers exactly once per transition.
//!
//! ## Signal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Connectivity Monitor                                │
//! │                                                                         │
//! │  ┌──────────────┐   every interval   ┌──────────────────────────────┐  │
//! │  │ Connectivity │ ◄───────────────── │  monitor task                │  │
//! │  │ Probe        │                    │                              │  │
//! │  │ (TCP connect │ ────────────────►  │  compares against last       │  │
//! │  │  or manual)  │   online: bool     │  observation; publishes only │  │
//! │  └──────────────┘                    │  actual transitions          │  │
//! │                                      └──────────────┬───────────────┘  │
//! │                                                     │ watch channel     │
//! │                    ┌────────────────────────────────┼───────────────┐  │
//! │                    ▼                                ▼               │  │
//! │            SyncCoordinator                    status page UI        │  │
//! │            (drains on online)                 (indicator dot)       │  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subscriptions are scoped: dropping the `watch::Receiver` unsubscribes,
//! so no listener outlives its owner.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ConnectivitySettings;

// =============================================================================
// Probe
// =============================================================================

/// One reachability check against the platform's network.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true when the network is currently reachable.
    async fn check(&self) -> bool;
}

/// Default probe: a TCP connect with timeout.
///
/// A successful handshake to the configured endpoint is taken as "online";
/// refusal or timeout as "offline". This is the closest a headless process
/// gets to the browser's `navigator.onLine` signal.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe against `host:port` with the given timeout.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }

    /// Creates a probe from connectivity settings.
    pub fn from_settings(settings: &ConnectivitySettings) -> Self {
        TcpProbe::new(
            settings.probe_addr.clone(),
            Duration::from_secs(settings.probe_timeout_secs),
        )
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn check(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "probe connect failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "probe timed out");
                false
            }
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running connectivity source.
///
/// Cheap to clone. `is_online` reads the most recent observation;
/// `subscribe` yields a receiver that wakes once per transition.
#[derive(Clone)]
pub struct ConnectivityHandle {
    state_rx: watch::Receiver<bool>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ConnectivityHandle {
    /// Returns the current connectivity signal.
    pub fn is_online(&self) -> bool {
        *self.state_rx.borrow()
    }

    /// Subscribes to transitions. The receiver wakes exactly once per
    /// actual online/offline change; repeated identical observations are
    /// not published. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_rx.clone()
    }

    /// Stops the monitor task. Best-effort: a no-op for manual sources or
    /// an already-stopped monitor.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Manual Source
// =============================================================================

/// Publishes connectivity observations pushed by the embedder.
///
/// For hosts whose platform already surfaces an online/offline event stream
/// (a webview bridge, a mobile shell), and for tests.
pub struct ManualSource {
    state_tx: watch::Sender<bool>,
}

impl ManualSource {
    /// Pushes an observation. Only actual transitions reach subscribers.
    pub fn set_online(&self, online: bool) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                info!("connectivity source reports online");
            } else {
                warn!("connectivity source reports offline");
            }
        }
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Polls a probe on an interval and publishes transitions.
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Spawns a monitor over the given probe.
    ///
    /// The initial state is taken from one immediate probe, so
    /// `is_online()` is meaningful as soon as this returns.
    pub async fn spawn(
        probe: Arc<dyn ConnectivityProbe>,
        poll_interval: Duration,
    ) -> ConnectivityHandle {
        let initial = probe.check().await;
        let (state_tx, state_rx) = watch::channel(initial);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        info!(online = initial, "connectivity monitor starting");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial probe
            // already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let online = probe.check().await;
                        let changed = state_tx.send_if_modified(|current| {
                            if *current == online {
                                false
                            } else {
                                *current = online;
                                true
                            }
                        });

                        if changed {
                            if online {
                                info!("network reachable, going online");
                            } else {
                                warn!("network unreachable, going offline");
                            }
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        info!("connectivity monitor shutting down");
                        break;
                    }
                }
            }
        });

        ConnectivityHandle {
            state_rx,
            shutdown_tx,
        }
    }

    /// Spawns a monitor with the default TCP probe from settings.
    pub async fn tcp(settings: &ConnectivitySettings) -> ConnectivityHandle {
        let probe = Arc::new(TcpProbe::from_settings(settings));
        Self::spawn(probe, Duration::from_secs(settings.probe_interval_secs)).await
    }

    /// Creates a manually driven connectivity source.
    ///
    /// Returns the handle consumers subscribe to and the source the
    /// embedder pushes platform events into.
    pub fn manual(initial: bool) -> (ConnectivityHandle, ManualSource) {
        let (state_tx, state_rx) = watch::channel(initial);
        // No task to stop; the shutdown channel exists only so the handle
        // has one shape for both sources.
        let (shutdown_tx, _shutdown_rx) = mpsc::channel::<()>(1);

        (
            ConnectivityHandle {
                state_rx,
                shutdown_tx,
            },
            ManualSource { state_tx },
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_manual_source_transitions_once() {
        let (handle, source) = ConnectivityMonitor::manual(false);
        assert!(!handle.is_online());

        let mut rx = handle.subscribe();

        source.set_online(true);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(handle.is_online());

        // Same value again: no notification.
        source.set_online(true);
        assert!(!rx.has_changed().unwrap());

        source.set_online(false);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_tcp_probe_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.check().await);

        drop(listener);
        assert!(!probe.check().await);
    }

    #[tokio::test]
    async fn test_monitor_reports_offline_transition() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = Arc::new(TcpProbe::new(addr.to_string(), Duration::from_secs(1)));
        let handle = ConnectivityMonitor::spawn(probe, Duration::from_millis(20)).await;
        assert!(handle.is_online());

        drop(listener);

        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                rx.changed().await.unwrap();
                if !*rx.borrow() {
                    break;
                }
            }
        })
        .await
        .expect("offline transition not observed");

        assert!(!handle.is_online());
        handle.shutdown().await;
    }
}
