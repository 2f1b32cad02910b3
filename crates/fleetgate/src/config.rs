//! Gateway configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "sweep_interval_ms": 60000, "registry": { "host": "0.0.0.0", "port": 1099 } }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use fleetgate_sweep::SweepConfig;
use serde::{Deserialize, Serialize};

/// Where the gateway listens, and under which address it is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryAddress {
    pub host: String,
    pub port: u16,
}

impl Default for RegistryAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1099,
        }
    }
}

impl RegistryAddress {
    /// `"host:port"`, ready for binding.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Milliseconds between reaper sweeps. At least 1000; smaller values
    /// are raised to 1000 with a warning.
    pub sweep_interval_ms: u64,
    pub registry: RegistryAddress,
    /// Account data lives in `<home_dir>/data/accounts.json`.
    pub home_dir: PathBuf,
    /// How long a freshly accepted socket may take to complete the
    /// WebSocket handshake before it is dropped.
    pub handshake_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 5 * 60 * 1000,
            registry: RegistryAddress::default(),
            home_dir: PathBuf::from("."),
            handshake_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    /// The reaper's scheduler config, already clamped.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::with_interval_ms(self.sweep_interval_ms).validated()
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
