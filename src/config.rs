//! Bus configuration.
//!
//! Loaded from `superk.toml` and then overridden by environment variables
//! prefixed `SUPERK_`, with `__` separating nested keys
//! (`SUPERK_INTERBUS__TIMEOUT_MS=250`, `SUPERK_PORTS__FIANIUM=/dev/ttyUSB1`).
//!
//! ```toml
//! [interbus]
//! baud_rate = 115200
//! timeout_ms = 100
//! host_address = 0xA2
//! probe_addresses = [15, 16, 18]
//!
//! [ports]
//! fianium = "/dev/ttyUSB0"
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::nkt_connector::ModuleClass;

pub const DEFAULT_CONFIG_PATH: &str = "superk.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub interbus: InterbusSettings,
    #[serde(default)]
    pub ports: PortOverrides,
}

/// Serial parameters for talking Interbus directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterbusSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Time to wait for a complete reply telegram
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Source address the host puts in every request
    #[serde(default = "default_host_address")]
    pub host_address: u8,
    /// Module addresses queried when building a port's device-type table
    #[serde(default = "default_probe_addresses")]
    pub probe_addresses: Vec<u8>,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_host_address() -> u8 {
    0xA2
}

fn default_probe_addresses() -> Vec<u8> {
    vec![
        ModuleClass::FIANIUM.module_address,
        ModuleClass::RF_DRIVER.module_address,
        ModuleClass::SELECT.module_address,
    ]
}

impl Default for InterbusSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            host_address: default_host_address(),
            probe_addresses: default_probe_addresses(),
        }
    }
}

impl InterbusSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Explicit ports, skipping discovery for the modules that have one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOverrides {
    pub fianium: Option<String>,
    pub rf_driver: Option<String>,
    pub select: Option<String>,
}

impl PortOverrides {
    pub fn for_class(&self, class: &ModuleClass) -> Option<&str> {
        let port = if *class == ModuleClass::FIANIUM {
            &self.fianium
        } else if *class == ModuleClass::RF_DRIVER {
            &self.rf_driver
        } else if *class == ModuleClass::SELECT {
            &self.select
        } else {
            return None;
        };
        port.as_deref()
    }
}

impl LabConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a TOML file (missing file means defaults) plus `SUPERK_` variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SUPERK_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interbus = &self.interbus;
        if interbus.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".into()));
        }
        if interbus.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be non-zero".into()));
        }
        if interbus.host_address == 0 {
            return Err(ConfigError::Invalid("host_address must be non-zero".into()));
        }
        if interbus.probe_addresses.is_empty() {
            return Err(ConfigError::Invalid(
                "probe_addresses must list at least one module address".into(),
            ));
        }
        if interbus.probe_addresses.contains(&interbus.host_address) {
            return Err(ConfigError::Invalid(format!(
                "host_address 0x{:02X} collides with a probed module address",
                interbus.host_address
            )));
        }
        Ok(())
    }
}
