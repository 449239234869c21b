//! # Configuration Management Module
//!
//! TOML configuration for the rover core, loaded asynchronously and validated
//! before any worker starts.
//!
//! ## Configuration Structure
//!
//! - [`RoverConfig`] - vehicle addressing, AUTO mode number, force-arm
//! - [`HubConfig`] - per-channel capacity overrides, keyed by channel name
//! - [`DispatchConfig`] - retry count and the worker timeouts
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rovercore::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("rovercore.toml").await?;
//!     config.validate()?;
//!     println!("Target system: {}", config.rover.target_system);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [rover]
//! target_system = 1
//! target_component = 1
//! auto_mode = 10
//! force_arm = false
//! on_shutdown = "disarm"
//!
//! [hub.capacities]
//! logging = 2000
//!
//! [dispatch]
//! max_attempts = 5
//! ack_timeout_ms = 1000
//! poll_interval_ms = 100
//! join_timeout_ms = 1000
//!
//! [logging]
//! level = "info"
//! file = "rovercore.log"
//! ```
//!
//! An unknown channel name under `[hub.capacities]` is rejected by
//! [`Config::validate`]; the hub would otherwise silently ignore it.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;

use crate::hub::ChannelName;
use crate::protocol::command::ROVER_MODE_AUTO;
use crate::protocol::TargetIds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverConfig {
    pub target_system: u8,
    pub target_component: u8,
    /// Custom mode number used by `conduct_mission` (ArduPilot Rover AUTO = 10).
    #[serde(default = "default_auto_mode")]
    pub auto_mode: u32,
    /// Arm with the pre-arm check override.
    #[serde(default)]
    pub force_arm: bool,
    /// What `Rover::cleanup` asks of the vehicle before the workers stop.
    #[serde(default)]
    pub on_shutdown: ShutdownAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownAction {
    /// Leave the vehicle as it is.
    #[default]
    Keep,
    Disarm,
    ReturnToLaunch,
}

fn default_auto_mode() -> u32 {
    ROVER_MODE_AUTO
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            target_system: 1,
            target_component: 1,
            auto_mode: ROVER_MODE_AUTO,
            force_arm: false,
            on_shutdown: ShutdownAction::Keep,
        }
    }
}

impl RoverConfig {
    pub fn target(&self) -> TargetIds {
        TargetIds {
            system: self.target_system,
            component: self.target_component,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HubConfig {
    /// Capacity overrides by channel name, e.g. `logging = 2000`.
    #[serde(default)]
    pub capacities: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Caller-side wait on a sync result. Derived from the retry budget when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_timeout_ms: Option<u64>,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

fn default_max_attempts() -> u8 {
    5
}

fn default_ack_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_join_timeout_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            ack_timeout_ms: default_ack_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            result_timeout_ms: None,
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rover: RoverConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, capacity) in &self.hub.capacities {
            name.parse::<ChannelName>()
                .map_err(|e| anyhow!("[hub.capacities]: {}", e))?;
            if *capacity == 0 {
                bail!("[hub.capacities]: capacity for '{}' must be at least 1", name);
            }
        }
        if self.dispatch.max_attempts == 0 {
            bail!("[dispatch]: max_attempts must be at least 1");
        }
        if self.dispatch.ack_timeout_ms == 0 {
            bail!("[dispatch]: ack_timeout_ms must be at least 1");
        }
        if self.dispatch.poll_interval_ms == 0 {
            bail!("[dispatch]: poll_interval_ms must be at least 1");
        }
        if let Some(wait) = self.dispatch.result_timeout_ms {
            let budget = self.dispatch.ack_timeout_ms * (self.dispatch.max_attempts as u64 + 1);
            if wait < budget {
                bail!(
                    "[dispatch]: result_timeout_ms ({}) must cover every attempt: at least {} ms",
                    wait,
                    budget
                );
            }
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            bail!("[logging]: unknown level '{}'", self.logging.level);
        }
        Ok(())
    }
}
