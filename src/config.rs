//! Acquisition configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `SEQ_DAQ_`
//!
//! # Example
//!
//! ```toml
//! module = "adc0"
//! sequencer = 1
//! trigger = "software_triggered"
//! channels = [1, 4, 9]
//! timeout_polls = 10000
//! log_level = "debug"
//! ```
//!
//! ```no_run
//! use daq_driver_sequencer::config::AcquisitionConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AcquisitionConfig::load()?;
//! config.validate()?;
//! println!("Sampling {:?} on {}", config.channels, config.sequencer_id());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::allocator::SequencerCapacity;
use crate::channel_set::{ChannelSet, REFERENCE_CHANNEL_COUNT};
use crate::conversion::REFERENCE_VOLTAGE;
use crate::error::{AllocationError, ConfigurationError};
use crate::hardware::{AdcModule, SequencerId, TriggerKind};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/acquisition.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SEQ_DAQ_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One sequencer acquisition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// ADC module
    #[serde(default = "default_module")]
    pub module: AdcModule,
    /// Sequencer number within the module
    #[serde(default)]
    pub sequencer: u8,
    /// Slot count; defaults to the reference capacity of the sequencer
    #[serde(default)]
    pub capacity: Option<u8>,
    /// Trigger source
    #[serde(default)]
    pub trigger: TriggerKind,
    /// Channels to sample
    #[serde(default)]
    pub channels: Vec<u8>,
    /// Completion poll budget per read
    #[serde(default = "default_timeout_polls")]
    pub timeout_polls: u32,
    /// Reference voltage in volts
    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f64,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_module() -> AdcModule {
    AdcModule::Adc0
}

fn default_timeout_polls() -> u32 {
    10_000
}

fn default_reference_voltage() -> f64 {
    REFERENCE_VOLTAGE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            sequencer: 0,
            capacity: None,
            trigger: TriggerKind::default(),
            channels: Vec::new(),
            timeout_polls: default_timeout_polls(),
            reference_voltage: default_reference_voltage(),
            log_level: default_log_level(),
        }
    }
}

impl AcquisitionConfig {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and the environment.
    ///
    /// Environment variables override file values, e.g.
    /// `SEQ_DAQ_TIMEOUT_POLLS=500`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, figment::Error> {
        Figment::from(Toml::string(toml)).extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigurationError::InvalidConfig {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.reference_voltage.is_finite() || self.reference_voltage <= 0.0 {
            return Err(ConfigurationError::InvalidConfig {
                message: format!(
                    "Invalid reference_voltage {}. Must be positive",
                    self.reference_voltage
                ),
            });
        }

        self.capacity()?;

        self.channel_set().map_err(|e| ConfigurationError::InvalidConfig {
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// Sequencer identity.
    pub fn sequencer_id(&self) -> SequencerId {
        SequencerId::new(self.module, self.sequencer)
    }

    /// Slot count, explicit or from the reference table.
    pub fn capacity(&self) -> Result<SequencerCapacity, ConfigurationError> {
        match self.capacity {
            Some(slots) => SequencerCapacity::new(slots),
            None => SequencerCapacity::reference(self.sequencer_id()).ok_or_else(|| {
                ConfigurationError::InvalidConfig {
                    message: format!(
                        "No reference capacity for {}; set `capacity` explicitly",
                        self.sequencer_id()
                    ),
                }
            }),
        }
    }

    /// Requested channels over the reference channel universe.
    ///
    /// An empty list is accepted here and rejected at allocation.
    pub fn channel_set(&self) -> Result<ChannelSet, AllocationError> {
        ChannelSet::from_channels(REFERENCE_CHANNEL_COUNT, &self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = AcquisitionConfig::from_toml_str(
            r#"
            module = "adc1"
            sequencer = 2
            capacity = 4
            trigger = "timer_triggered"
            channels = [9, 1, 4]
            timeout_polls = 250
            reference_voltage = 3.3
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.sequencer_id(), SequencerId::new(AdcModule::Adc1, 2));
        assert_eq!(config.trigger, TriggerKind::TimerTriggered);
        assert_eq!(config.capacity().unwrap().get(), 4);
        assert_eq!(
            config.channel_set().unwrap().ascending().collect::<Vec<_>>(),
            vec![1, 4, 9]
        );
        assert_eq!(config.timeout_polls, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = AcquisitionConfig::from_toml_str("channels = [0]").unwrap();
        assert_eq!(config.module, AdcModule::Adc0);
        assert_eq!(config.sequencer, 0);
        assert_eq!(config.trigger, TriggerKind::SoftwareTriggered);
        assert_eq!(config.capacity().unwrap().get(), 8);
        assert_eq!(config.reference_voltage, REFERENCE_VOLTAGE);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = AcquisitionConfig {
            log_level: "loud".to_string(),
            ..AcquisitionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_reference_voltage() {
        let config = AcquisitionConfig {
            reference_voltage: 0.0,
            ..AcquisitionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = AcquisitionConfig {
            capacity: Some(0),
            ..AcquisitionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidCapacity { capacity: 0 })
        );
    }

    #[test]
    fn test_unknown_sequencer_needs_explicit_capacity() {
        let config = AcquisitionConfig {
            sequencer: 7,
            ..AcquisitionConfig::default()
        };
        assert!(config.capacity().is_err());

        let config = AcquisitionConfig {
            sequencer: 7,
            capacity: Some(2),
            ..AcquisitionConfig::default()
        };
        assert_eq!(config.capacity().unwrap().get(), 2);
    }

    #[test]
    fn test_out_of_range_channel() {
        let config = AcquisitionConfig {
            channels: vec![3, 12],
            ..AcquisitionConfig::default()
        };
        assert_eq!(
            config.channel_set(),
            Err(AllocationError::ChannelOutOfRange {
                channel: 12,
                universe: 12
            })
        );
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sequencer = 1\nchannels = [2, 5]\ntimeout_polls = 100").unwrap();

        std::env::set_var("SEQ_DAQ_TIMEOUT_POLLS", "42");
        let result = AcquisitionConfig::load_from(file.path());
        std::env::remove_var("SEQ_DAQ_TIMEOUT_POLLS");

        let config = result.unwrap();
        assert_eq!(config.sequencer, 1);
        assert_eq!(config.channels, vec![2, 5]);
        assert_eq!(config.timeout_polls, 42);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AcquisitionConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AcquisitionConfig::default());
    }
}
