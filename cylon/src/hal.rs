//! What the sweep needs from its environment.

use std::time::{Duration, Instant};

use crate::error::IndicatorFault;

/// A fixed-size row of on/off outputs, addressed by position.
pub trait Indicators: Send + 'static {
    /// Number of indicators. Fixed for the lifetime of the array.
    fn count(&self) -> usize;

    /// Turns the indicator at `index` on or off.
    fn set(&mut self, index: usize, on: bool) -> Result<(), IndicatorFault>;
}

/// Time source of the sweep worker.
pub trait Clock: Send + 'static {
    fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Wall clock backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
