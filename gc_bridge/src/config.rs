use std::{
    env, fs, io,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_BRIDGE_CONFIG: &str = include_str!("data/bridge_config.json");

/// Runtime settings for one bridge instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub controller_binary: PathBuf,
    pub suppress_controller_logs: bool,
    pub referee_group: Ipv4Addr,
    pub referee_interface: Ipv4Addr,
    pub use_conventional_port: bool,
    pub conventional_referee_port: u16,
    pub random_port_min: u16,
    pub port_range_max: u16,
    pub ci_port_search_start: u16,
    pub ci_host: Ipv4Addr,
    pub launch_delay_ms: u64,
    pub ci_receive_buffer_size: usize,
    /// Upper bound on CI send attempts; `None` retries until a reply parses.
    pub ci_max_attempts: Option<u32>,
    pub ci_read_timeout_ms: Option<u64>,
    pub override_capacity: usize,
    pub listener_poll_ms: u64,
    pub control_cycle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            controller_binary: PathBuf::from("/opt/tbotspython/gamecontroller"),
            suppress_controller_logs: false,
            referee_group: Ipv4Addr::new(224, 5, 23, 1),
            referee_interface: Ipv4Addr::LOCALHOST,
            use_conventional_port: false,
            conventional_referee_port: 10003,
            random_port_min: 1024,
            port_range_max: 65535,
            ci_port_search_start: 40000,
            ci_host: Ipv4Addr::LOCALHOST,
            launch_delay_ms: 300,
            ci_receive_buffer_size: 9000,
            ci_max_attempts: Some(20),
            ci_read_timeout_ms: None,
            override_capacity: 2,
            listener_poll_ms: 50,
            control_cycle_ms: 16,
        }
    }
}

impl BridgeConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_BRIDGE_CONFIG).expect("builtin bridge config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, BridgeConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| BridgeConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = BridgeConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }

    pub fn ci_read_timeout(&self) -> Option<Duration> {
        self.ci_read_timeout_ms.map(Duration::from_millis)
    }

    pub fn listener_poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener_poll_ms.max(1))
    }

    pub fn control_cycle(&self) -> Duration {
        Duration::from_millis(self.control_cycle_ms)
    }
}

#[derive(Debug, Error)]
pub enum BridgeConfigError {
    #[error("failed to parse bridge config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read bridge config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the config named by `GC_BRIDGE_CONFIG_PATH`, falling back to the
/// built-in defaults when the variable is unset or the file is unusable.
pub fn load_bridge_config_from_env() -> (BridgeConfig, Option<PathBuf>) {
    if let Some(path) = env::var("GC_BRIDGE_CONFIG_PATH").ok().map(PathBuf::from) {
        match BridgeConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "gc_bridge::config",
                    path = %path.display(),
                    "bridge_config.loaded=file"
                );
                return (config, Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "gc_bridge::config",
                    path = %path.display(),
                    error = %err,
                    "bridge_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "gc_bridge::config", "bridge_config.loaded=builtin");
    (BridgeConfig::builtin(), None)
}
