// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-device counter engine (registries, node rings, lifecycle)
//!
//! All engine state sits behind one device-scoped mutex. Every public
//! operation and every tick holds it for the whole critical section, so a
//! node can never be freed while a tick is servicing it.

use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::devices::DeviceTable;
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleState, Step};
use crate::registry::{CounterDefinition, Sampler};
use crate::ring::AccumulatorState;
use crate::scheduler::{refresh_module, ModuleState, PassStats};
use crate::timer::{RefreshTimer, TickControl};
use crate::types::{CounterId, CounterKind, CounterModule, DeviceId, EntityKey, NodeHandle};

/// Outcome of one [`CounterEngine::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// `false` when the engine was not running and the tick was skipped.
    pub ran: bool,
    /// Tick number the pass sampled with.
    pub tick: u64,
    /// Work summed over all modules.
    pub work: PassStats,
}

/// Per-module figures reported by [`CounterEngine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleStats {
    /// Module described.
    pub module: CounterModule,
    /// Monitored nodes in the ring.
    pub nodes: usize,
    /// Registered counter definitions.
    pub counters: usize,
}

/// Point-in-time view of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Current lifecycle state.
    pub lifecycle: LifecycleState,
    /// Ticks that did work since init.
    pub tick_count: u64,
    /// Failed samples since init.
    pub sample_failures: u64,
    /// One entry per module; empty when uninitialized.
    pub modules: Vec<ModuleStats>,
}

struct EngineState {
    lifecycle: LifecycleState,
    tick_count: u64,
    sample_failures: u64,
    modules: Option<Box<[ModuleState; CounterModule::COUNT]>>,
}

impl EngineState {
    fn module_mut(&mut self, module: CounterModule) -> Result<&mut ModuleState> {
        if self.lifecycle == LifecycleState::Uninitialized {
            return Err(Error::NotInitialized);
        }
        let modules = self.modules.as_mut().ok_or(Error::NotInitialized)?;
        Ok(&mut modules[module.index()])
    }

    fn module(&self, module: CounterModule) -> Result<&ModuleState> {
        if self.lifecycle == LifecycleState::Uninitialized {
            return Err(Error::NotInitialized);
        }
        let modules = self.modules.as_ref().ok_or(Error::NotInitialized)?;
        Ok(&modules[module.index()])
    }

    fn accumulator_mut(&mut self, handle: NodeHandle, counter_id: CounterId) -> Result<&mut AccumulatorState> {
        let slot = counter_id.slot_in(handle.module)?;
        let node = self.module_mut(handle.module)?.nodes.get_mut(handle).ok_or(Error::InvalidHandle)?;
        Ok(&mut node.slots[slot])
    }
}

/// Cached hardware-counter engine of one device.
pub struct CounterEngine {
    this: Weak<CounterEngine>,
    device: DeviceId,
    config: EngineConfig,
    table: Weak<DeviceTable>,
    state: Mutex<EngineState>,
    timer: Mutex<Option<RefreshTimer>>,
}

impl fmt::Debug for CounterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterEngine")
            .field("device", &self.device)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl CounterEngine {
    pub(crate) fn new(device: DeviceId, config: EngineConfig, table: Weak<DeviceTable>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            device,
            config,
            table,
            state: Mutex::new(EngineState {
                lifecycle: LifecycleState::Uninitialized,
                tick_count: 0,
                sample_failures: 0,
                modules: None,
            }),
            timer: Mutex::new(None),
        })
    }

    /// Device this engine serves.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Configuration the engine was attached with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> LifecycleState {
        self.state.lock().lifecycle
    }

    fn is_attached(&self) -> bool {
        self.table.upgrade().is_some_and(|table| table.is_attached(self))
    }

    #[cfg(test)]
    pub(crate) fn force_lifecycle(&self, lifecycle: LifecycleState) {
        self.state.lock().lifecycle = lifecycle;
    }

    /// Allocates empty registries and rings. Does not arm the timer.
    ///
    /// Rings left behind by [`CounterEngine::teardown`] are reused, so handles
    /// from before the teardown stay stale.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.lifecycle.on_init()? == Step::Done {
            return Ok(());
        }
        if state.modules.is_none() {
            let capacity = self.config.max_nodes_per_module;
            state.modules = Some(Box::new(CounterModule::ALL.map(|module| ModuleState::new(module, capacity))));
        }
        state.tick_count = 0;
        state.sample_failures = 0;
        state.lifecycle = LifecycleState::Initialized;
        debug!("tm-counters: {} initialized", self.device);
        Ok(())
    }

    /// Arms the refresh timer. A no-op when already starting or running.
    ///
    /// Fails with [`Error::DeviceNotFound`] once the engine has been detached.
    pub fn start(&self) -> Result<()> {
        if !self.is_attached() {
            return Err(Error::DeviceNotFound);
        }
        {
            let mut state = self.state.lock();
            if state.lifecycle.on_start()? == Step::Done {
                return Ok(());
            }
            state.lifecycle = LifecycleState::Starting;
        }

        let table = Weak::clone(&self.table);
        let this = Weak::clone(&self.this);
        let device = self.device;
        let spawned = RefreshTimer::spawn(format!("tm-counters-{device}"), self.config.tick_period(), move || {
            let (Some(table), Some(engine)) = (table.upgrade(), this.upgrade()) else {
                return TickControl::Exit;
            };
            match table.with_attached(&engine, |engine| engine.tick()) {
                Some(_) => TickControl::Continue,
                None => {
                    warn!("tm-counters: {device} detached, refresh timer exiting");
                    TickControl::Exit
                }
            }
        });
        let timer = match spawned {
            Ok(timer) => timer,
            Err(err) => {
                self.state.lock().lifecycle = LifecycleState::Initialized;
                return Err(Error::TimerSpawn(err));
            }
        };
        *self.timer.lock() = Some(timer);
        self.state.lock().lifecycle = LifecycleState::Running;
        debug!("tm-counters: {} running, period {:?}", self.device, self.config.tick_period());
        Ok(())
    }

    /// Disarms the timer, waiting for an in-flight tick to finish.
    ///
    /// Must not be called from a [`Sampler`].
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.lifecycle.on_stop()? == Step::Done {
                return Ok(());
            }
            state.lifecycle = LifecycleState::Stopping;
        }
        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop();
        }
        self.state.lock().lifecycle = LifecycleState::Initialized;
        debug!("tm-counters: {} stopped", self.device);
        Ok(())
    }

    /// Frees every node and definition. Fails with [`Error::InUse`] unless stopped.
    pub fn teardown(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.lifecycle.on_teardown()? == Step::Done {
            return Ok(());
        }
        if let Some(modules) = state.modules.as_mut() {
            for module in modules.iter_mut() {
                module.registry.reset();
                module.nodes.clear();
            }
        }
        state.lifecycle = LifecycleState::Uninitialized;
        debug!("tm-counters: {} torn down", self.device);
        Ok(())
    }

    /// Starts tracking `counter_id`. Re-registering a valid slot is a silent no-op.
    pub fn register_counter(
        &self,
        module: CounterModule,
        counter_id: CounterId,
        kind: CounterKind,
        width_bits: u8,
        sampler: Arc<dyn Sampler>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let installed = state.module_mut(module)?.registry.register(&self.config, counter_id, kind, width_bits, sampler)?;
        if installed {
            debug!("tm-counters: {} {module} counter {counter_id} registered ({width_bits} bits)", self.device);
        }
        Ok(())
    }

    /// Stops tracking `counter_id`. Node accumulators keep their values.
    pub fn unregister_counter(&self, module: CounterModule, counter_id: CounterId) -> Result<()> {
        let mut state = self.state.lock();
        if state.module_mut(module)?.registry.unregister(counter_id)? {
            debug!("tm-counters: {} {module} counter {counter_id} unregistered", self.device);
        }
        Ok(())
    }

    /// Clears every counter definition of `module`.
    pub fn reset_module(&self, module: CounterModule) -> Result<()> {
        self.state.lock().module_mut(module)?.registry.reset();
        Ok(())
    }

    /// Registered definition for `counter_id`, if any.
    pub fn counter_definition(&self, module: CounterModule, counter_id: CounterId) -> Result<Option<CounterDefinition>> {
        let slot = counter_id.slot_in(module)?;
        let state = self.state.lock();
        Ok(state.module(module)?.registry.get(slot).cloned())
    }

    /// Starts monitoring `entity_key`; the node joins the tail of the module ring.
    pub fn allocate_node(&self, module: CounterModule, entity_key: EntityKey) -> Result<NodeHandle> {
        let mut state = self.state.lock();
        let handle = state.module_mut(module)?.nodes.insert(entity_key).ok_or(Error::ResourceExhausted)?;
        debug!("tm-counters: {} {module} node {entity_key} allocated", self.device);
        Ok(handle)
    }

    /// Stops monitoring and releases the node behind `handle`.
    pub fn free_node(&self, handle: NodeHandle) -> Result<()> {
        let mut state = self.state.lock();
        let node = state.module_mut(handle.module)?.nodes.remove(handle).ok_or(Error::InvalidHandle)?;
        debug!("tm-counters: {} {} node {} freed", self.device, handle.module, node.entity_key);
        Ok(())
    }

    /// Excludes a node from sampling without removing it from the ring.
    pub fn set_node_enabled(&self, handle: NodeHandle, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();
        let node = state.module_mut(handle.module)?.nodes.get_mut(handle).ok_or(Error::InvalidHandle)?;
        node.valid = enabled;
        Ok(())
    }

    /// Accumulated value of `counter_id` on the node; zero until first sampled.
    pub fn get_accumulated(&self, handle: NodeHandle, counter_id: CounterId) -> Result<u64> {
        let slot = counter_id.slot_in(handle.module)?;
        let state = self.state.lock();
        let node = state.module(handle.module)?.nodes.get(handle).ok_or(Error::InvalidHandle)?;
        Ok(node.slots[slot].accumulated_value)
    }

    /// Raw register value seen by the most recent successful sample.
    pub fn last_sample(&self, handle: NodeHandle, counter_id: CounterId) -> Result<u64> {
        let slot = counter_id.slot_in(handle.module)?;
        let state = self.state.lock();
        let node = state.module(handle.module)?.nodes.get(handle).ok_or(Error::InvalidHandle)?;
        Ok(node.slots[slot].last_fetched_raw)
    }

    /// Replaces the accumulated value and forgets the raw sample history.
    ///
    /// Pair with a hardware clear of the same register: the next sample is
    /// then accumulated from zero.
    pub fn override_accumulated(&self, handle: NodeHandle, counter_id: CounterId, value: u64) -> Result<()> {
        let mut state = self.state.lock();
        let acc = state.accumulator_mut(handle, counter_id)?;
        *acc = AccumulatorState { accumulated_value: value, last_raw_sample: 0, last_fetched_raw: 0 };
        Ok(())
    }

    /// Accumulated values of every registered counter of the node's module.
    pub fn snapshot(&self, handle: NodeHandle) -> Result<Vec<(CounterId, u64)>> {
        let state = self.state.lock();
        let module = state.module(handle.module)?;
        let node = module.nodes.get(handle).ok_or(Error::InvalidHandle)?;
        Ok(module
            .registry
            .iter()
            .map(|(slot, def)| (def.counter_id, node.slots[slot].accumulated_value))
            .collect())
    }

    /// Runs one refresh pass over every module. Skipped unless running.
    pub fn tick(&self) -> TickReport {
        let mut state = self.state.lock();
        if !state.lifecycle.is_running() {
            return TickReport { ran: false, tick: state.tick_count, work: PassStats::default() };
        }
        let tick = state.tick_count;
        let budget = self.config.max_nodes_per_tick;
        let mut work = PassStats::default();
        if let Some(modules) = state.modules.as_mut() {
            for module in modules.iter_mut() {
                work.merge(refresh_module(module, self.device, tick, budget));
            }
        }
        state.tick_count += 1;
        state.sample_failures += work.failures as u64;
        trace!(
            "tm-counters: {} tick {tick}: {} nodes, {} samples, {} failures",
            self.device,
            work.nodes_visited,
            work.samples,
            work.failures
        );
        TickReport { ran: true, tick, work }
    }

    /// Lifecycle, tick and per-module figures.
    pub fn stats(&self) -> EngineStats {
        let state = self.state.lock();
        let modules: Vec<ModuleStats> = state
            .modules
            .as_ref()
            .filter(|_| state.lifecycle != LifecycleState::Uninitialized)
            .map(|modules| {
                modules
                    .iter()
                    .map(|m| ModuleStats { module: m.module, nodes: m.nodes.len(), counters: m.registry.valid_count() })
                    .collect()
            })
            .unwrap_or_default();
        EngineStats {
            lifecycle: state.lifecycle,
            tick_count: state.tick_count,
            sample_failures: state.sample_failures,
            modules,
        }
    }
}
