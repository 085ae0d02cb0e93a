//! Per-channel scan state shared with engine notification threads

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Plain view of the state, also the "reset" value via `Default`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub signal_present: bool,
    pub synced: bool,
    pub snr: f32,
    pub ensemble_id: u16,
    pub ensemble_label: String,
    pub detected_services: BTreeSet<u32>,
}

/// Result of [`ScanState::wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

/// Monitor over [`StateSnapshot`].
///
/// Setters are called from engine threads and only hold the lock for the
/// duration of a single field update. Signal presence and sync changes wake
/// the waiting scanner.
#[derive(Debug, Default)]
pub struct ScanState {
    inner: Mutex<StateSnapshot>,
    changed: Condvar,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking notification thread must not wedge the scan
    fn lock(&self) -> MutexGuard<'_, StateSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_snr(&self, snr: f32) {
        self.lock().snr = snr;
    }

    pub fn set_signal_present(&self, present: bool) {
        self.lock().signal_present = present;
        self.changed.notify_all();
    }

    pub fn set_synced(&self, synced: bool) {
        self.lock().synced = synced;
        self.changed.notify_all();
    }

    pub fn add_service(&self, sid: u32) {
        self.lock().detected_services.insert(sid);
    }

    pub fn set_ensemble_id(&self, eid: u16) {
        self.lock().ensemble_id = eid;
    }

    pub fn set_ensemble_label(&self, label: String) {
        self.lock().ensemble_label = label;
    }

    /// Clear every field back to its default
    pub fn reset(&self) {
        *self.lock() = StateSnapshot::default();
    }

    pub fn clear_synced(&self) {
        self.lock().synced = false;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().clone()
    }

    /// Block until `predicate` holds or `timeout` elapses.
    ///
    /// The predicate is evaluated under the lock, so a notification that
    /// lands right at the deadline is still observed.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> WaitOutcome
    where
        F: Fn(&StateSnapshot) -> bool,
    {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| !predicate(state))
            .unwrap_or_else(PoisonError::into_inner);

        if predicate(&guard) {
            WaitOutcome::Satisfied
        } else {
            WaitOutcome::TimedOut
        }
    }
}
