// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Core Configuration
//
// YAML-loadable settings for the coordination core: bus capacity, health
// monitoring cadence, verification and expiry driver periods, and the
// protect() cipher timeout. Durations use humantime strings ("5s",
// "100ms"). Every field is defaulted so an empty document is a valid
// configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub expiry: ExpiryConfig,

    /// Budget for the cipher rounds inside protect(). A slow protect()
    /// wastes lifetime before the data is even secured, so this stays well
    /// under the shortest classification TTL.
    #[serde(with = "humantime_serde", default = "default_protect_timeout")]
    pub protect_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            health: HealthConfig::default(),
            verification: VerificationConfig::default(),
            expiry: ExpiryConfig::default(),
            protect_timeout: default_protect_timeout(),
        }
    }
}

impl CoreConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(with = "humantime_serde", default = "default_health_interval")]
    pub interval: Duration,

    #[serde(default = "default_missed_for_degraded")]
    pub missed_for_degraded: u32,

    #[serde(default = "default_missed_for_removed")]
    pub missed_for_removed: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: default_health_interval(),
            missed_for_degraded: default_missed_for_degraded(),
            missed_for_removed: default_missed_for_removed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(with = "humantime_serde", default = "default_verification_interval")]
    pub interval: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_verification_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    #[serde(with = "humantime_serde", default = "default_expiry_interval")]
    pub interval: Duration,

    /// Expiries later than this past the deadline are reported as
    /// SchedulerDelay incidents. Late expiry is tolerated; early expiry
    /// never happens.
    #[serde(with = "humantime_serde", default = "default_late_tolerance")]
    pub late_tolerance: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: default_expiry_interval(),
            late_tolerance: default_late_tolerance(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}
fn default_health_interval() -> Duration {
    Duration::from_secs(10)
}
fn default_missed_for_degraded() -> u32 {
    3
}
fn default_missed_for_removed() -> u32 {
    5
}
fn default_verification_interval() -> Duration {
    Duration::from_secs(5)
}
fn default_expiry_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_late_tolerance() -> Duration {
    Duration::from_secs(2)
}
fn default_protect_timeout() -> Duration {
    Duration::from_millis(100)
}
fn default_true() -> bool {
    true
}
