// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned synchronously by the counter engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter was outside its accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The counter id is outside the module band or its relative slot is out of range.
    #[error("counter id outside module band")]
    InvalidCounter,
    /// The node handle was freed, is stale, or never belonged to this engine.
    #[error("unexpected node handle")]
    InvalidHandle,
    /// No storage left for another monitored node.
    #[error("node storage exhausted")]
    ResourceExhausted,
    /// The lifecycle state forbids this transition.
    #[error("engine in use")]
    InUse,
    /// The engine has not been initialized.
    #[error("engine not initialized")]
    NotInitialized,
    /// An engine is already attached for the device.
    #[error("device already attached")]
    DeviceExists,
    /// No engine is attached for the device.
    #[error("device not attached")]
    DeviceNotFound,
    /// The refresh timer thread could not be spawned.
    #[error("failed to spawn refresh timer: {0}")]
    TimerSpawn(#[source] std::io::Error),
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration document is not valid TOML for [`crate::EngineConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Outcome of one hardware register read.
pub type SampleResult = core::result::Result<u64, SampleError>;

/// Failure reported by a sampler while reading a hardware register.
///
/// Never surfaced to engine callers: the affected slot keeps its last good value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The register read failed.
    #[error("hardware read failed: {0}")]
    Hardware(String),
    /// The entity or device is not currently readable.
    #[error("counter source unavailable")]
    Unavailable,
}
