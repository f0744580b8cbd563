// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide map of attached devices.
//!
//! The map's `RwLock` is the outer liveness lock: refresh ticks look their
//! engine up under the read lock and keep holding it while they run, and
//! [`DeviceTable::detach`] removes a device under the write lock before the
//! engine is stopped and torn down.

use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::engine::CounterEngine;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleState;
use crate::types::DeviceId;

static GLOBAL: Lazy<Arc<DeviceTable>> = Lazy::new(DeviceTable::new);

/// Devices with an attached counter engine.
#[derive(Default)]
pub struct DeviceTable {
    engines: RwLock<HashMap<DeviceId, Arc<CounterEngine>>>,
}

impl fmt::Debug for DeviceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTable").field("devices", &self.devices()).finish()
    }
}

impl DeviceTable {
    /// Creates an empty table.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Shared table used by drivers that do not manage their own.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Creates an uninitialized engine for `device`.
    pub fn attach(self: &Arc<Self>, device: DeviceId, config: EngineConfig) -> Result<Arc<CounterEngine>> {
        config.validate()?;
        let mut engines = self.engines.write();
        if engines.contains_key(&device) {
            return Err(Error::DeviceExists);
        }
        let engine = CounterEngine::new(device, config, Arc::downgrade(self));
        engines.insert(device, Arc::clone(&engine));
        debug!("tm-counters: {device} attached");
        Ok(engine)
    }

    /// Engine attached for `device`.
    pub fn get(&self, device: DeviceId) -> Option<Arc<CounterEngine>> {
        self.engines.read().get(&device).cloned()
    }

    /// Runs `f` on the device's engine while holding the liveness lock.
    ///
    /// Returns `None` when the device is not attached. `f` must not call
    /// lifecycle operations or [`DeviceTable::detach`].
    pub fn with_live<R>(&self, device: DeviceId, f: impl FnOnce(&CounterEngine) -> R) -> Option<R> {
        let engines = self.engines.read();
        engines.get(&device).map(|engine| f(engine))
    }

    /// Like [`DeviceTable::with_live`], but only runs `f` while `engine`
    /// itself is the one attached under its device id.
    pub(crate) fn with_attached<R>(&self, engine: &Arc<CounterEngine>, f: impl FnOnce(&CounterEngine) -> R) -> Option<R> {
        let engines = self.engines.read();
        engines.get(&engine.device()).filter(|live| Arc::ptr_eq(live, engine)).map(|live| f(live))
    }

    pub(crate) fn is_attached(&self, engine: &CounterEngine) -> bool {
        self.engines.read().get(&engine.device()).is_some_and(|live| ptr::eq(Arc::as_ptr(live), engine))
    }

    /// Removes the device, then stops and tears down its engine.
    ///
    /// Fails with [`Error::InUse`] while the engine is mid start or stop; the
    /// device then stays attached. Once this returns `Ok` no tick samples for
    /// the device again.
    pub fn detach(&self, device: DeviceId) -> Result<()> {
        let engine = {
            let mut engines = self.engines.write();
            let engine = engines.get(&device).ok_or(Error::DeviceNotFound)?;
            if matches!(engine.lifecycle(), LifecycleState::Starting | LifecycleState::Stopping) {
                return Err(Error::InUse);
            }
            engines.remove(&device).ok_or(Error::DeviceNotFound)?
        };
        if let Err(err) = engine.stop().and_then(|()| engine.teardown()) {
            warn!("tm-counters: {device} detach failed ({err}), keeping it attached");
            self.engines.write().entry(device).or_insert(engine);
            return Err(err);
        }
        debug!("tm-counters: {device} detached");
        Ok(())
    }

    /// Attached device ids, sorted.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.engines.read().keys().copied().collect();
        devices.sort_unstable();
        devices
    }
}
