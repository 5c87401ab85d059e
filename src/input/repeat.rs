//! Deferred Auto-Repeat Shutdown
//!
//! RDP clients generate their own key repeats, so local auto-repeat must
//! stay off. Some X clients poll the repeat control and misbehave when they
//! find it off after switching it on, so when a client enables it we leave
//! it on briefly and switch it off again after a short delay.
//!
//! Tasks are keyed by device: scheduling again for the same device replaces
//! the pending deadline. The queue is polled from the event thread; nothing
//! here spawns or blocks.

use crate::input::host::{DeviceId, DeviceRegistry, KeyboardHost};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Delay before auto-repeat is switched back off
pub const DEFAULT_REPEAT_OFF_DELAY: Duration = Duration::from_millis(100);

/// Pending auto-repeat-off tasks
#[derive(Debug, Clone)]
pub struct DeferredRepeatOff {
    delay: Duration,
    pending: HashMap<DeviceId, Instant>,
}

impl DeferredRepeatOff {
    /// Create an empty queue with the given delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Configured delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule auto-repeat-off for `device` at `now + delay`
    pub fn schedule(&mut self, device: DeviceId, now: Instant) -> Instant {
        let deadline = now + self.delay;
        if self.pending.insert(device, deadline).is_some() {
            debug!("Rescheduled auto-repeat off for {}", device);
        } else {
            debug!("Scheduled auto-repeat off for {} in {:?}", device, self.delay);
        }
        deadline
    }

    /// Cancel the pending task of `device`; returns whether one existed
    pub fn cancel(&mut self, device: DeviceId) -> bool {
        self.pending.remove(&device).is_some()
    }

    /// Cancel every pending task
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Whether `device` has a pending task
    pub fn is_pending(&self, device: DeviceId) -> bool {
        self.pending.contains_key(&device)
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// No pending tasks
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Fire every task due at `now`
    ///
    /// A device that was detached before its deadline is skipped. Returns the
    /// devices on which auto-repeat was switched off, in device order.
    pub fn run_due<H, R>(&mut self, now: Instant, host: &mut H, registry: &R) -> Vec<DeviceId>
    where
        H: KeyboardHost + ?Sized,
        R: DeviceRegistry + ?Sized,
    {
        let mut due: Vec<DeviceId> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(device, _)| *device)
            .collect();
        due.sort();

        let mut fired = Vec::with_capacity(due.len());
        for device in due {
            self.pending.remove(&device);
            if registry.is_live(device) {
                info!("Auto-repeat off for {}", device);
                host.set_auto_repeat(device, false);
                fired.push(device);
            } else {
                warn!("Auto-repeat timer fired for detached {}, ignoring", device);
            }
        }
        fired
    }
}

impl Default for DeferredRepeatOff {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_OFF_DELAY)
    }
}
