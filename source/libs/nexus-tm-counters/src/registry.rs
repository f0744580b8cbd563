// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-module table of tracked counter definitions.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Error, Result, SampleResult};
use crate::types::{CounterId, CounterKind, CounterModule, DeviceId, EntityKey, COUNTERS_PER_MODULE};
use crate::wrap::wrap_threshold;

/// Reads the raw value of one hardware register.
///
/// Called with the engine's device lock held: implementations must not call
/// back into the engine. Returns the raw register value, never a delta.
pub trait Sampler: Send + Sync {
    /// Samples `counter` for `entity` on `device`.
    fn sample(&self, counter: CounterId, entity: EntityKey, device: DeviceId) -> SampleResult;
}

impl<F> Sampler for F
where
    F: Fn(CounterId, EntityKey, DeviceId) -> SampleResult + Send + Sync,
{
    fn sample(&self, counter: CounterId, entity: EntityKey, device: DeviceId) -> SampleResult {
        self(counter, entity, device)
    }
}

/// One registered counter type.
#[derive(Clone)]
pub struct CounterDefinition {
    /// Global counter id.
    pub counter_id: CounterId,
    /// Semantic tag.
    pub kind: CounterKind,
    /// Hardware register width.
    pub register_width_bits: u8,
    /// `2^width - 1`.
    pub wrap_threshold: u64,
    /// Sample on ticks where `tick % sample_interval_ticks == 0`.
    pub sample_interval_ticks: u64,
    pub(crate) sampler: Arc<dyn Sampler>,
}

impl CounterDefinition {
    pub(crate) fn is_due(&self, tick: u64) -> bool {
        tick % self.sample_interval_ticks == 0
    }
}

impl fmt::Debug for CounterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterDefinition")
            .field("counter_id", &self.counter_id)
            .field("kind", &self.kind)
            .field("register_width_bits", &self.register_width_bits)
            .field("wrap_threshold", &self.wrap_threshold)
            .field("sample_interval_ticks", &self.sample_interval_ticks)
            .finish_non_exhaustive()
    }
}

/// Fixed-size slot table for one module.
pub(crate) struct CounterRegistry {
    module: CounterModule,
    slots: [Option<CounterDefinition>; COUNTERS_PER_MODULE],
    valid: usize,
}

impl CounterRegistry {
    pub(crate) fn new(module: CounterModule) -> Self {
        Self { module, slots: Default::default(), valid: 0 }
    }

    /// Registers a counter; a slot that is already valid is left untouched.
    ///
    /// Returns `true` when a new definition was installed.
    pub(crate) fn register(
        &mut self,
        config: &EngineConfig,
        counter_id: CounterId,
        kind: CounterKind,
        width_bits: u8,
        sampler: Arc<dyn Sampler>,
    ) -> Result<bool> {
        let slot = counter_id.slot_in(self.module)?;
        if self.slots[slot].is_some() {
            return Ok(false);
        }
        if width_bits == 0 || width_bits > 64 {
            return Err(Error::InvalidArgument("register width must be in 1..=64"));
        }
        self.slots[slot] = Some(CounterDefinition {
            counter_id,
            kind,
            register_width_bits: width_bits,
            wrap_threshold: wrap_threshold(width_bits),
            sample_interval_ticks: config.sample_interval_for(width_bits),
            sampler,
        });
        self.valid += 1;
        Ok(true)
    }

    /// Returns `true` when a definition was removed.
    pub(crate) fn unregister(&mut self, counter_id: CounterId) -> Result<bool> {
        let slot = counter_id.slot_in(self.module)?;
        if self.slots[slot].take().is_some() {
            self.valid -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn reset(&mut self) {
        self.slots = Default::default();
        self.valid = 0;
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&CounterDefinition> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub(crate) fn valid_count(&self) -> usize {
        self.valid
    }

    /// Valid definitions with their relative slots, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &CounterDefinition)> {
        self.slots.iter().enumerate().filter_map(|(slot, def)| def.as_ref().map(|def| (slot, def)))
    }
}
