//! Software tuner for scripted scans

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::trace;

use crate::engine::Tuner;
use crate::error::DeviceError;

/// Tuner that only remembers where it is tuned
#[derive(Debug, Default)]
pub struct SimTuner {
    frequency: AtomicU32,
    retunes: AtomicU64,
    resets: AtomicU64,
    /// Frequency at which `set_frequency` reports a device fault
    fault_at: Option<u32>,
}

impl SimTuner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tuner that fails when asked to tune to `frequency_hz`
    #[cfg(test)]
    pub fn with_fault_at(frequency_hz: u32) -> Self {
        Self {
            fault_at: Some(frequency_hz),
            ..Self::default()
        }
    }

    pub fn retunes(&self) -> u64 {
        self.retunes.load(Ordering::Relaxed)
    }

    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }
}

impl Tuner for SimTuner {
    fn set_frequency(&self, frequency_hz: u32) -> Result<(), DeviceError> {
        if self.fault_at == Some(frequency_hz) {
            return Err(DeviceError::Tuner(format!(
                "PLL not locked at {frequency_hz} Hz"
            )));
        }
        trace!("Tuned to {} Hz", frequency_hz);
        self.frequency.store(frequency_hz, Ordering::SeqCst);
        self.retunes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn reset(&self) -> Result<(), DeviceError> {
        self.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.frequency.load(Ordering::SeqCst)
    }
}
