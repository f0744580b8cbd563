// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scripted register file shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nexus_tm_counters::{
    CounterEngine, CounterId, CounterModule, DeviceId, DeviceTable, EngineConfig, EntityKey, SampleError,
    SampleResult, Sampler,
};
use parking_lot::Mutex;

/// Register values keyed by (counter, entity). Unset registers read zero.
#[derive(Default)]
pub struct ScriptedHw {
    values: Mutex<HashMap<(CounterId, EntityKey), u64>>,
    failing: Mutex<Vec<EntityKey>>,
    reads: Mutex<Vec<(CounterId, EntityKey)>>,
}

impl ScriptedHw {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, counter: CounterId, entity: EntityKey, raw: u64) {
        self.values.lock().insert((counter, entity), raw);
    }

    pub fn fail(&self, entity: EntityKey, failing: bool) {
        let mut list = self.failing.lock();
        list.retain(|e| *e != entity);
        if failing {
            list.push(entity);
        }
    }

    /// Drains the read log.
    pub fn take_reads(&self) -> Vec<(CounterId, EntityKey)> {
        std::mem::take(&mut *self.reads.lock())
    }
}

impl Sampler for ScriptedHw {
    fn sample(&self, counter: CounterId, entity: EntityKey, _device: DeviceId) -> SampleResult {
        self.reads.lock().push((counter, entity));
        if self.failing.lock().contains(&entity) {
            return Err(SampleError::Unavailable);
        }
        Ok(self.values.lock().get(&(counter, entity)).copied().unwrap_or(0))
    }
}

/// Config whose timer never fires during a test; ticks are driven by hand.
pub fn manual_config() -> EngineConfig {
    EngineConfig { tick_period_ms: 3_600_000, ..EngineConfig::default() }
}

/// Attached and initialized engine on a private table.
pub fn engine_with(config: EngineConfig) -> (Arc<DeviceTable>, Arc<CounterEngine>) {
    let table = DeviceTable::new();
    let engine = table.attach(DeviceId(0), config).expect("attach");
    engine.init().expect("init");
    (table, engine)
}

pub fn port_counter(slot: usize) -> CounterId {
    CounterId::new(CounterModule::Port, slot).expect("valid slot")
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
