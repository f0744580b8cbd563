// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-period tick source: one dedicated thread per armed engine.
//!
//! Stopping sends on a channel and joins the thread, so an in-flight tick
//! always completes before [`RefreshTimer::stop`] returns.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::debug;

/// Returned by the tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickControl {
    Continue,
    /// The owner is gone; the timer thread exits.
    Exit,
}

pub(crate) struct RefreshTimer {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Arms a timer calling `on_tick` every `period`; the first call happens one period after arming.
    pub(crate) fn spawn<F>(name: String, period: Duration, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new().name(name).spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {
                    if on_tick() == TickControl::Exit {
                        debug!("tm-counters: timer owner gone, exiting");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;
        Ok(Self { stop_tx, thread: Some(thread) })
    }

    /// Disarms the timer and waits for the thread to finish.
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            let _ = thread.join();
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let timer = RefreshTimer::spawn("tick-test".into(), Duration::from_millis(2), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            TickControl::Continue
        })
        .expect("spawn");
        while count.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        timer.stop();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn exit_ends_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let timer = RefreshTimer::spawn("tick-exit".into(), Duration::from_millis(1), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            TickControl::Exit
        })
        .expect("spawn");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        timer.stop();
    }

    #[test]
    fn stop_before_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let timer = RefreshTimer::spawn("tick-idle".into(), Duration::from_secs(3600), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            TickControl::Continue
        })
        .expect("spawn");
        timer.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
