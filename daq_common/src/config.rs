//! Configuration loading for the DAQ host.
//!
//! Replaces the original firmware's compile-time pin and address constants
//! with one TOML-backed structure constructed at startup and passed by
//! reference into the components that need it.
//!
//! # TOML Example
//!
//! ```toml
//! [device]
//! daq_id = 2
//! max_period = 65535
//! default_period = 1
//!
//! [store]
//! capacity = 1048
//!
//! [[ports]]
//! kind = "temperature"
//!
//! [[ports]]
//! kind = "light"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    DEFAULT_DAQ_ID, DEFAULT_PERIOD_SECONDS, DEFAULT_STORE_CAPACITY, MAX_PERIOD_SECONDS, PORT_MAX,
};
use crate::records::{DATA_RECORD_SIZE, HEADER_REGION_SIZE};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Sensor class bound to a logical port.
///
/// The class doubles as the decode tag for stored readings — the 4-byte
/// bit pattern in a data record is only meaningful together with the
/// owning port's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Thermocouple amplifier channel [°C].
    Temperature,
    /// Photodiode channel [lux].
    Light,
}

/// One `[[ports]]` entry: the sensor class wired to that slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Sensor class of the port.
    pub kind: SensorKind,
}

/// `[device]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Identifier reported on every response line (one decimal digit).
    #[serde(default = "default_daq_id")]
    pub daq_id: u8,

    /// Largest accepted sampling period [s].
    #[serde(default = "default_max_period")]
    pub max_period: u32,

    /// Period armed at power-on [s].
    #[serde(default = "default_period")]
    pub default_period: u32,
}

/// `[store]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Capacity of the non-volatile store [bytes].
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Full device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaqConfig {
    /// Device-wide settings.
    pub device: DeviceConfig,
    /// Non-volatile store geometry.
    #[serde(default)]
    pub store: StoreConfig,
    /// Logical port table, in port order (entry 0 is port 1).
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

fn default_daq_id() -> u8 {
    DEFAULT_DAQ_ID
}

fn default_max_period() -> u32 {
    MAX_PERIOD_SECONDS
}

fn default_period() -> u32 {
    DEFAULT_PERIOD_SECONDS
}

fn default_capacity() -> usize {
    DEFAULT_STORE_CAPACITY
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            daq_id: default_daq_id(),
            max_period: default_max_period(),
            default_period: default_period(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for DaqConfig {
    /// The shipped port layout: five thermocouple channels and one
    /// photodiode.
    fn default() -> Self {
        let mut ports = vec![
            PortConfig {
                kind: SensorKind::Temperature,
            };
            5
        ];
        ports.push(PortConfig {
            kind: SensorKind::Light,
        });
        Self {
            device: DeviceConfig::default(),
            store: StoreConfig::default(),
            ports,
        }
    }
}

impl DaqConfig {
    /// Validate semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `daq_id` is not a single decimal digit (the response frame width
    ///   is fixed)
    /// - the period bounds are inconsistent or exceed the timer range
    /// - more than `PORT_MAX` ports are declared
    /// - the store cannot hold the header region plus at least two record
    ///   slots
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.daq_id > 9 {
            return Err(ConfigError::ValidationError(format!(
                "daq_id {} is not a single decimal digit",
                self.device.daq_id
            )));
        }
        if self.device.max_period == 0 || self.device.max_period > MAX_PERIOD_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "max_period {} outside 1..={}",
                self.device.max_period, MAX_PERIOD_SECONDS
            )));
        }
        if self.device.default_period == 0 || self.device.default_period > self.device.max_period {
            return Err(ConfigError::ValidationError(format!(
                "default_period {} outside 1..={}",
                self.device.default_period, self.device.max_period
            )));
        }
        if self.ports.len() > PORT_MAX {
            return Err(ConfigError::ValidationError(format!(
                "{} ports declared, at most {} supported",
                self.ports.len(),
                PORT_MAX
            )));
        }
        if self.store.capacity < HEADER_REGION_SIZE + 2 * DATA_RECORD_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "store capacity {} cannot hold the header region and a usable ring",
                self.store.capacity
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
