use std::time::{Duration, Instant};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Fixed-period pacing for the sampling loop.
///
/// Holds no state between iterations: every tick measures its own elapsed
/// time and sleeps for whatever is left of the period. An overrun yields a
/// zero delay, missed time is not made up later.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period: Duration,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick_start(&self) -> Instant {
        Instant::now()
    }

    pub fn remaining_delay(&self, start: Instant) -> Duration {
        remaining_delay(start, self.period)
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}

pub fn remaining_delay(start: Instant, nominal_period: Duration) -> Duration {
    delay_after(start.elapsed(), nominal_period)
}

pub fn delay_after(elapsed: Duration, nominal_period: Duration) -> Duration {
    nominal_period.saturating_sub(elapsed)
}
