//! Playback timers
//!
//! The reducer only records and releases timer handles. Starting and
//! stopping the underlying recurring tick happens here.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rewind_tabs::TimerHandle;

/// Callback run on every tick with the handle of the timer that fired
pub type Tick = Box<dyn Fn(TimerHandle) + Send + Sync + 'static>;

pub trait TimerService: Send + Sync {
    /// Start a recurring timer; the first tick fires one period from now
    fn start(&self, period: Duration, tick: Tick) -> TimerHandle;

    /// Stop the timer behind `handle`. Unknown handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerControl {
    Run,
    Stop,
}

/// Tokio-backed timer service: one task per running timer.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Default)]
pub struct PlaybackRuntime {
    jobs: Arc<RwLock<HashMap<TimerHandle, tokio::sync::watch::Sender<TimerControl>>>>,
}

impl PlaybackRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers currently running
    pub fn active_timers(&self) -> usize {
        self.jobs.read().len()
    }
}

impl TimerService for PlaybackRuntime {
    fn start(&self, period: Duration, tick: Tick) -> TimerHandle {
        let handle = TimerHandle::new();
        let (tx, mut rx) = tokio::sync::watch::channel(TimerControl::Run);
        self.jobs.write().insert(handle, tx);

        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() == TimerControl::Stop {
                            break;
                        }
                    }
                    _ = interval.tick() => tick(handle),
                }
            }

            jobs.write().remove(&handle);
            tracing::debug!(timer = %handle, "Playback timer stopped");
        });

        tracing::debug!(timer = %handle, period_ms = period.as_millis() as u64, "Playback timer started");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(tx) = self.jobs.write().remove(&handle) {
            let _ = tx.send(TimerControl::Stop);
        }
    }
}
