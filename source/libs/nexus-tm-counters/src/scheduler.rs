// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Budget-bounded round-robin refresh of one module.
//!
//! INVARIANTS:
//! - At most `budget` nodes are visited per module per tick, disabled ones included.
//! - Every visited node is rotated to the ring tail; the first unvisited node
//!   becomes the next pass's starting point.
//! - A failed sample leaves the slot's accumulator untouched.

use log::warn;

use crate::registry::CounterRegistry;
use crate::ring::NodeRing;
use crate::types::{CounterModule, DeviceId};
use crate::wrap::accumulate;

/// Registry and node ring of one module.
pub(crate) struct ModuleState {
    pub(crate) module: CounterModule,
    pub(crate) registry: CounterRegistry,
    pub(crate) nodes: NodeRing,
}

impl ModuleState {
    pub(crate) fn new(module: CounterModule, capacity: usize) -> Self {
        Self { module, registry: CounterRegistry::new(module), nodes: NodeRing::new(module, capacity) }
    }
}

/// Work done by one module pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Nodes visited, disabled ones included.
    pub nodes_visited: usize,
    /// Successful register reads.
    pub samples: usize,
    /// Failed register reads.
    pub failures: usize,
}

impl PassStats {
    pub(crate) fn merge(&mut self, other: PassStats) {
        self.nodes_visited += other.nodes_visited;
        self.samples += other.samples;
        self.failures += other.failures;
    }
}

/// Services up to `budget` nodes of `state` for tick number `tick`.
pub(crate) fn refresh_module(state: &mut ModuleState, device: DeviceId, tick: u64, budget: usize) -> PassStats {
    let mut stats = PassStats::default();
    let valid_counters = state.registry.valid_count();
    if valid_counters == 0 || state.nodes.is_empty() {
        return stats;
    }

    let visits = budget.min(state.nodes.len());
    for _ in 0..visits {
        let Some(index) = state.nodes.head() else {
            break;
        };
        stats.nodes_visited += 1;
        if let Some(node) = state.nodes.node_at_mut(index) {
            if node.valid {
                let entity = node.entity_key;
                let mut seen = 0;
                for (slot, def) in state.registry.iter() {
                    seen += 1;
                    if def.is_due(tick) {
                        match def.sampler.sample(def.counter_id, entity, device) {
                            Ok(raw) => {
                                let acc = &mut node.slots[slot];
                                acc.last_fetched_raw = raw;
                                let increment = accumulate(acc.last_raw_sample, raw, def.wrap_threshold);
                                acc.accumulated_value = acc.accumulated_value.wrapping_add(increment);
                                acc.last_raw_sample = raw;
                                stats.samples += 1;
                            }
                            Err(err) => {
                                warn!(
                                    "tm-counters: {device} {} counter {} entity {entity}: sample failed: {err}",
                                    state.module, def.counter_id
                                );
                                stats.failures += 1;
                            }
                        }
                    }
                    if seen == valid_counters {
                        break;
                    }
                }
            }
        }
        state.nodes.rotate_to_tail(index);
    }
    stats
}
