//! Single-slot buffer holding the newest published value.
//!
//! Writers overwrite whatever is stored. Readers either wait for a value they
//! have not seen yet ([`LatestSlot::next`]) or grab the newest value without
//! blocking ([`LatestSlot::latest`]), falling back to the last value read.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    fresh: bool,
}

#[derive(Debug)]
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    published: Condvar,
}

impl<T: Clone> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                fresh: false,
            }),
            published: Condvar::new(),
        }
    }

    /// Store `value`. Returns `true` when an unread value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let mut guard = self.state.lock().expect("latest slot mutex poisoned");
        let coalesced = guard.fresh;
        guard.value = Some(value);
        guard.fresh = true;
        drop(guard);
        self.published.notify_all();
        coalesced
    }

    /// Newest value without blocking, whether or not it was read before.
    pub fn latest(&self) -> Option<T> {
        let mut guard = self.state.lock().expect("latest slot mutex poisoned");
        guard.fresh = false;
        guard.value.clone()
    }

    /// Wait up to `timeout` for a value published since the last read.
    pub fn next(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().expect("latest slot mutex poisoned");
        while !guard.fresh {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next_guard, _) = self
                .published
                .wait_timeout(guard, remaining)
                .expect("latest slot mutex poisoned");
            guard = next_guard;
        }
        guard.fresh = false;
        guard.value.clone()
    }
}
