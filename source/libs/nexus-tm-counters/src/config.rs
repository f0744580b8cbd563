// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine tuning knobs, loadable from TOML.
//!
//! The tick period and the narrow/wide register split are configured
//! together: both decide whether a register can wrap twice between samples.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Runtime configuration of one device engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Refresh timer period in milliseconds.
    pub tick_period_ms: u64,
    /// Nodes visited per module per tick.
    pub max_nodes_per_tick: usize,
    /// Registers up to this width are sampled every tick.
    pub narrow_register_max_bits: u8,
    /// Sampling interval, in ticks, for registers wider than the narrow limit.
    pub wide_sample_interval: u64,
    /// Monitored nodes each module may hold.
    pub max_nodes_per_module: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            max_nodes_per_tick: 128,
            narrow_register_max_bits: 32,
            wide_sample_interval: 2,
            max_nodes_per_module: 8192,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| Error::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    /// Rejects values that would stall the scheduler or break wrap detection.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::InvalidConfig("tick_period_ms must be non-zero"));
        }
        if self.max_nodes_per_tick == 0 {
            return Err(Error::InvalidConfig("max_nodes_per_tick must be non-zero"));
        }
        if !(1..=64).contains(&self.narrow_register_max_bits) {
            return Err(Error::InvalidConfig("narrow_register_max_bits must be in 1..=64"));
        }
        if self.wide_sample_interval == 0 {
            return Err(Error::InvalidConfig("wide_sample_interval must be non-zero"));
        }
        if self.max_nodes_per_module == 0 || self.max_nodes_per_module > u32::MAX as usize {
            return Err(Error::InvalidConfig("max_nodes_per_module out of range"));
        }
        Ok(())
    }

    /// Timer period as a [`Duration`].
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Sampling interval, in ticks, for a register of `width_bits`.
    pub fn sample_interval_for(&self, width_bits: u8) -> u64 {
        if width_bits <= self.narrow_register_max_bits {
            1
        } else {
            self.wide_sample_interval
        }
    }
}
