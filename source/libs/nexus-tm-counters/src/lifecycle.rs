// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine lifecycle state machine.
//!
//! ```text
//! Uninitialized -init-> Initialized -start-> Starting -> Running
//! Running -stop-> Stopping -> Initialized -teardown-> Uninitialized
//! ```

use core::fmt;

use crate::error::{Error, Result};

/// Lifecycle state of one device engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No registries allocated.
    Uninitialized,
    /// Registries allocated, timer not armed.
    Initialized,
    /// Timer being armed.
    Starting,
    /// Timer armed; ticks do work.
    Running,
    /// Timer being disarmed; ticks are skipped.
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

/// What a lifecycle call has to do after inspecting the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Nothing to do; report success.
    Done,
    /// Perform the transition.
    Proceed,
}

impl LifecycleState {
    pub(crate) fn on_init(self) -> Result<Step> {
        match self {
            Self::Uninitialized => Ok(Step::Proceed),
            Self::Initialized => Ok(Step::Done),
            Self::Starting | Self::Running | Self::Stopping => Err(Error::InUse),
        }
    }

    pub(crate) fn on_start(self) -> Result<Step> {
        match self {
            Self::Initialized => Ok(Step::Proceed),
            Self::Starting | Self::Running => Ok(Step::Done),
            Self::Uninitialized | Self::Stopping => Err(Error::NotInitialized),
        }
    }

    pub(crate) fn on_stop(self) -> Result<Step> {
        match self {
            Self::Running => Ok(Step::Proceed),
            Self::Initialized | Self::Uninitialized => Ok(Step::Done),
            Self::Starting | Self::Stopping => Err(Error::InUse),
        }
    }

    pub(crate) fn on_teardown(self) -> Result<Step> {
        match self {
            Self::Initialized => Ok(Step::Proceed),
            Self::Uninitialized => Ok(Step::Done),
            Self::Starting | Self::Running | Self::Stopping => Err(Error::InUse),
        }
    }

    /// Whether a tick may sample in this state.
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}
