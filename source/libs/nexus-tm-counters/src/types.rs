// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Identifiers shared by the registry, the node store and the public API.

use core::fmt;

use crate::error::{Error, Result};

/// Number of counter slots reserved for each module.
pub const COUNTERS_PER_MODULE: usize = 16;

/// Width of the numeric band reserved for each module's counter ids.
pub const COUNTER_BAND_WIDTH: u32 = 0x1000;

/// Monitored-entity category. Each module owns an independent registry and ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterModule {
    /// Per-port counters.
    Port,
    /// Per priority-port-group counters.
    Ppg,
    /// Per-queue counters.
    Queue,
    /// Per-pipe counters.
    Pipe,
    /// Device-wide counters.
    Device,
}

impl CounterModule {
    /// Number of modules.
    pub const COUNT: usize = 5;

    /// Fixed order in which a tick services modules.
    pub const ALL: [CounterModule; Self::COUNT] =
        [Self::Port, Self::Ppg, Self::Queue, Self::Pipe, Self::Device];

    /// Dense index used to address per-module tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Port => 0,
            Self::Ppg => 1,
            Self::Queue => 2,
            Self::Pipe => 3,
            Self::Device => 4,
        }
    }

    /// First counter id of this module's reserved band.
    pub const fn counter_base(self) -> u32 {
        (self.index() as u32 + 1) * COUNTER_BAND_WIDTH
    }

    /// Returns the module owning `id`'s band, if any.
    pub fn of_counter(id: CounterId) -> Option<Self> {
        Self::ALL.into_iter().find(|module| {
            let base = module.counter_base();
            (base..base + COUNTER_BAND_WIDTH).contains(&id.0)
        })
    }
}

impl fmt::Display for CounterModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Port => "port",
            Self::Ppg => "ppg",
            Self::Queue => "queue",
            Self::Pipe => "pipe",
            Self::Device => "device",
        })
    }
}

/// Global counter identifier: module band base plus a relative slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CounterId(pub u32);

impl CounterId {
    /// Builds the id for `slot` within `module`'s band.
    pub fn new(module: CounterModule, slot: usize) -> Result<Self> {
        if slot >= COUNTERS_PER_MODULE {
            return Err(Error::InvalidCounter);
        }
        Ok(Self(module.counter_base() + slot as u32))
    }

    /// Relative slot of this id within `module`.
    ///
    /// Fails when the id lies outside the module's band or past the last slot.
    pub fn slot_in(self, module: CounterModule) -> Result<usize> {
        let base = module.counter_base();
        if !(base..base + COUNTER_BAND_WIDTH).contains(&self.0) {
            return Err(Error::InvalidCounter);
        }
        let slot = (self.0 - base) as usize;
        if slot >= COUNTERS_PER_MODULE {
            return Err(Error::InvalidCounter);
        }
        Ok(slot)
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Semantic tag of a counter definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Dropped packets.
    PacketDrop,
    /// Packet count.
    Packets,
    /// Byte count.
    Bytes,
    /// Error events.
    Error,
    /// Driver-internal bookkeeping counter.
    Internal,
}

/// Identifier of the device an engine is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Opaque key of a monitored entity. Unused coordinates stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    /// Pipe number.
    pub pipe: u16,
    /// Port number within the pipe.
    pub port: u16,
    /// Priority port group within the port.
    pub ppg: u16,
    /// Queue within the port.
    pub queue: u16,
}

impl EntityKey {
    /// Key of a whole device.
    pub const fn device() -> Self {
        Self { pipe: 0, port: 0, ppg: 0, queue: 0 }
    }

    /// Key of a pipe.
    pub const fn pipe(pipe: u16) -> Self {
        Self { pipe, port: 0, ppg: 0, queue: 0 }
    }

    /// Key of a port.
    pub const fn port(pipe: u16, port: u16) -> Self {
        Self { pipe, port, ppg: 0, queue: 0 }
    }

    /// Key of a priority port group.
    pub const fn ppg(pipe: u16, port: u16, ppg: u16) -> Self {
        Self { pipe, port, ppg, queue: 0 }
    }

    /// Key of a queue.
    pub const fn queue(pipe: u16, port: u16, queue: u16) -> Self {
        Self { pipe, port, ppg: 0, queue }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.pipe, self.port, self.ppg, self.queue)
    }
}

/// Opaque handle to a monitored node.
///
/// Handles are generational: once the node is freed the handle stays invalid
/// even if its storage is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) module: CounterModule,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeHandle {
    /// Module the node belongs to.
    pub fn module(&self) -> CounterModule {
        self.module
    }
}
