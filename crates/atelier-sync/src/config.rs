//! # Sync Configuration
//!
//! TOML-backed configuration for the sync engine, stored under the platform
//! config directory.
//!
//! ## Config File Layout
//! ```toml
//! [queue]
//! max_attempts = 10
//! purge_after_days = 30
//!
//! [drain]
//! poll_interval_secs = 300
//! auto_drain_on_enqueue = true
//!
//! [connectivity]
//! probe_addr = "1.1.1.1:443"
//! probe_interval_secs = 15
//! probe_timeout_secs = 5
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Settings Sections
// =============================================================================

/// Queue maintenance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Retryable failures tolerated per entry before it is dead-lettered.
    pub max_attempts: u32,

    /// Dead letters older than this many days are eligible for purge.
    pub purge_after_days: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            max_attempts: 10,
            purge_after_days: 30,
        }
    }
}

/// Drain trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainSettings {
    /// Interval between periodic drain attempts. A batch aborted by a
    /// failure is retried at the next tick without user action.
    pub poll_interval_secs: u64,

    /// Whether a successful enqueue while online triggers an immediate
    /// drain.
    pub auto_drain_on_enqueue: bool,
}

impl Default for DrainSettings {
    fn default() -> Self {
        DrainSettings {
            poll_interval_secs: 300,
            auto_drain_on_enqueue: true,
        }
    }
}

/// Connectivity probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    /// `host:port` the TCP probe connects to. A well-known anycast
    /// endpoint by default; deployments behind a proxy point this at
    /// their own backend.
    pub probe_addr: String,

    /// Seconds between reachability checks.
    pub probe_interval_secs: u64,

    /// Seconds before an unanswered probe counts as offline.
    pub probe_timeout_secs: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_addr: "1.1.1.1:443".to_string(),
            probe_interval_secs: 15,
            probe_timeout_secs: 5,
        }
    }
}

// =============================================================================
// Sync Configuration
// =============================================================================

/// Top-level sync engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub queue: QueueSettings,
    pub drain: DrainSettings,
    pub connectivity: ConnectivitySettings,
}

impl SyncConfig {
    /// Returns the default config file path under the platform config dir
    /// (e.g. `~/.config/atelier/sync.toml` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "atelier", "atelier")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Loads configuration from the given path, or from the default path,
    /// falling back to defaults when no file exists yet.
    pub fn load_or_default(path: Option<&Path>) -> SyncResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("no platform config dir, using default sync config");
                    return Ok(SyncConfig::default());
                }
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(SyncConfig::default());
        }

        Self::load(&path)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {e}", path.display())))?;

        let config: SyncConfig = toml::from_str(&text)?;
        config.validate()?;

        info!(path = %path.display(), "loaded sync config");
        Ok(config)
    }

    /// Saves configuration as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(format!("{}: {e}", parent.display())))?;
        }

        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)
            .map_err(|e| SyncError::ConfigSaveFailed(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), "saved sync config");
        Ok(())
    }

    /// Validates configuration values.
    pub fn validate(&self) -> SyncResult<()> {
        if self.queue.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "queue.max_attempts must be at least 1".into(),
            ));
        }

        if self.drain.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "drain.poll_interval_secs must be at least 1".into(),
            ));
        }

        if self.connectivity.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "connectivity.probe_interval_secs must be at least 1".into(),
            ));
        }

        if self.connectivity.probe_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "connectivity.probe_timeout_secs must be at least 1".into(),
            ));
        }

        if !self.connectivity.probe_addr.contains(':') {
            return Err(SyncError::InvalidConfig(format!(
                "connectivity.probe_addr must be host:port, got '{}'",
                self.connectivity.probe_addr
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
