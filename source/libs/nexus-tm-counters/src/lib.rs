// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Cached hardware-counter engine for the traffic-manager driver
//! OWNERS: @drivers
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module; integration tests in `tests/`
//!
//! The ASIC exposes drop/usage counters as 36..47-bit registers that wrap
//! silently. A per-device background tick samples them through
//! caller-supplied [`Sampler`]s, folds each sample into a monotonic 64-bit
//! value, and callers read that value without touching hardware.
//!
//! INVARIANTS:
//! - At most 16 counter definitions per module; ids stay inside the module band.
//! - Per tick, each module services at most `max_nodes_per_tick` nodes and
//!   rotates them to the ring tail.
//! - Ticks only sample while the engine is running and its device is attached.

#![forbid(unsafe_code)]
#![deny(clippy::all)]

mod config;
mod devices;
mod engine;
mod error;
mod lifecycle;
mod registry;
mod ring;
mod scheduler;
mod timer;
mod types;
pub mod wrap;

pub use config::EngineConfig;
pub use devices::DeviceTable;
pub use engine::{CounterEngine, EngineStats, ModuleStats, TickReport};
pub use error::{Error, Result, SampleError, SampleResult};
pub use lifecycle::LifecycleState;
pub use registry::{CounterDefinition, Sampler};
pub use scheduler::PassStats;
pub use types::{
    CounterId, CounterKind, CounterModule, DeviceId, EntityKey, NodeHandle, COUNTERS_PER_MODULE,
    COUNTER_BAND_WIDTH,
};
