//! Runtime configuration
//!
//! Read from `CAMPUS_SYNC_*` environment variables (after loading `.env`).
//! Every field has a default so an empty environment yields a working
//! local-development setup.

use realtime_mux::{HeartbeatConfig, MuxConfig, ReconnectConfig};
use serde::Deserialize;
use state_snapshot::SnapshotConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "CAMPUS_SYNC_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Real-time endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Base URL of the notification REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,

    #[serde(default = "default_true")]
    pub reconnect_jitter: bool,

    /// Zero disables the heartbeat
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default = "default_refresh_bus_capacity")]
    pub refresh_bus_capacity: usize,

    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,

    /// File backing the page-state slot
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default = "default_scroll_restore_delay_ms")]
    pub scroll_restore_delay_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_reconnect_initial_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval_secs() -> u64 {
    25
}

fn default_heartbeat_timeout_secs() -> u64 {
    60
}

fn default_refresh_bus_capacity() -> usize {
    256
}

fn default_snapshot_ttl_secs() -> u64 {
    60
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".campus-sync/page-state.json")
}

fn default_scroll_restore_delay_ms() -> u64 {
    100
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_base_url: default_api_base_url(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            reconnect_multiplier: default_reconnect_multiplier(),
            reconnect_jitter: true,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            refresh_bus_capacity: default_refresh_bus_capacity(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            snapshot_path: default_snapshot_path(),
            scroll_restore_delay_ms: default_scroll_restore_delay_ms(),
            log_format: LogFormat::default(),
        }
    }
}

impl SyncConfig {
    /// Load `.env` if present, then read the prefixed environment
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Read configuration from explicit `(name, value)` pairs
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        let initial = Duration::from_millis(self.reconnect_initial_ms.max(1));
        ReconnectConfig {
            initial_backoff: initial,
            max_backoff: Duration::from_millis(self.reconnect_max_ms).max(initial),
            backoff_multiplier: self.reconnect_multiplier.max(1.0),
            jitter: self.reconnect_jitter,
        }
    }

    pub fn heartbeat_config(&self) -> Option<HeartbeatConfig> {
        if self.heartbeat_interval_secs == 0 {
            return None;
        }
        let interval = Duration::from_secs(self.heartbeat_interval_secs);
        Some(HeartbeatConfig {
            interval,
            timeout: Duration::from_secs(self.heartbeat_timeout_secs).max(interval),
        })
    }

    pub fn mux_config(&self) -> MuxConfig {
        MuxConfig {
            reconnect: self.reconnect_config(),
            heartbeat: self.heartbeat_config(),
        }
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            ttl: Duration::from_secs(self.snapshot_ttl_secs),
            scroll_restore_delay: Duration::from_millis(self.scroll_restore_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = SyncConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config.ws_url, "ws://127.0.0.1:8080/ws");
        assert_eq!(config.refresh_bus_capacity, 256);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.snapshot_path,
            PathBuf::from(".campus-sync/page-state.json")
        );

        let reconnect = config.reconnect_config();
        assert_eq!(reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(reconnect.max_backoff, Duration::from_secs(30));
        assert!(reconnect.jitter);

        let heartbeat = config.heartbeat_config().unwrap();
        assert_eq!(heartbeat.interval, Duration::from_secs(25));
        assert_eq!(heartbeat.timeout, Duration::from_secs(60));

        assert_eq!(config.snapshot_config().ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = SyncConfig::from_vars(vars(&[
            ("CAMPUS_SYNC_WS_URL", "wss://campus.example/ws"),
            ("CAMPUS_SYNC_RECONNECT_JITTER", "false"),
            ("CAMPUS_SYNC_HEARTBEAT_INTERVAL_SECS", "0"),
            ("CAMPUS_SYNC_LOG_FORMAT", "json"),
            ("CAMPUS_SYNC_SCROLL_RESTORE_DELAY_MS", "0"),
            ("WS_URL", "ignored-without-prefix"),
        ]))
        .unwrap();

        assert_eq!(config.ws_url, "wss://campus.example/ws");
        assert!(!config.reconnect_config().jitter);
        assert!(config.heartbeat_config().is_none());
        assert!(config.mux_config().heartbeat.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.snapshot_config().scroll_restore_delay.is_zero());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = SyncConfig::from_vars(vars(&[("CAMPUS_SYNC_REFRESH_BUS_CAPACITY", "lots")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_nonsensical_backoff_is_clamped() {
        let config = SyncConfig {
            reconnect_initial_ms: 5000,
            reconnect_max_ms: 10,
            reconnect_multiplier: 0.5,
            ..Default::default()
        };
        let reconnect = config.reconnect_config();
        assert_eq!(reconnect.max_backoff, reconnect.initial_backoff);
        assert_eq!(reconnect.backoff_multiplier, 1.0);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("CAMPUS_SYNC_API_BASE_URL", "https://api.campus.example");
        std::env::set_var("CAMPUS_SYNC_SNAPSHOT_TTL_SECS", "120");

        let config = SyncConfig::from_env().unwrap();

        std::env::remove_var("CAMPUS_SYNC_API_BASE_URL");
        std::env::remove_var("CAMPUS_SYNC_SNAPSHOT_TTL_SECS");

        assert_eq!(config.api_base_url, "https://api.campus.example");
        assert_eq!(config.snapshot_config().ttl, Duration::from_secs(120));
    }
}
