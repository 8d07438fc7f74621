use clap::ArgMatches;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::modbus::client::BAUD_RATE;
use crate::modbus::SerialSettings;
use crate::utils::error::ModbusError;

pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyO1";
pub const DEFAULT_PEER_FILE: &str = "/etc/modscan/peer_address";
pub const DEFAULT_PEER_PORT: u16 = 5020;

/// Runtime settings. Serial framing is fixed at 9600 8N1: `baud_rate` and
/// `parity` may be stated but any other value is rejected, as are unknown keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub parity: ParityConfig,

    // Monitoring settings
    pub update_interval_ms: u64,

    // Peer settings
    pub peer_file: String,
    pub peer_port: u16,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: BAUD_RATE,
            timeout_ms: 1000,
            parity: ParityConfig::None,
            update_interval_ms: 1000,
            peer_file: DEFAULT_PEER_FILE.to_string(),
            peer_port: DEFAULT_PEER_PORT,
            connect_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Defaults, then the `--config` file if given, then individual flags.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }
        if let Some(interval) = matches.get_one::<u64>("interval") {
            config.update_interval_ms = *interval;
        }
        if let Some(timeout) = matches.get_one::<u64>("timeout") {
            config.timeout_ms = *timeout;
        }
        if let Some(peer_file) = matches.get_one::<String>("peer-file") {
            config.peer_file = peer_file.clone();
        }
        if let Some(peer_port) = matches.get_one::<u16>("peer-port") {
            config.peer_port = *peer_port;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModbusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModbusError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("📋 Loaded settings from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.serial_port.trim().is_empty() {
            return Err(ModbusError::ConfigError("serial_port is empty".into()));
        }
        if self.baud_rate != BAUD_RATE {
            return Err(ModbusError::ConfigError(format!(
                "baud_rate {} is not supported, the line runs at {}",
                self.baud_rate, BAUD_RATE
            )));
        }
        if self.parity != ParityConfig::None {
            return Err(ModbusError::ConfigError(format!(
                "parity {:?} is not supported, the line runs 8N1",
                self.parity
            )));
        }
        if self.update_interval_ms == 0 {
            return Err(ModbusError::ConfigError("update_interval_ms must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ModbusError::ConfigError("timeout_ms must be positive".into()));
        }
        if self.peer_port == 0 {
            return Err(ModbusError::ConfigError("peer_port must be positive".into()));
        }
        Ok(())
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings::new(self.serial_port.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
