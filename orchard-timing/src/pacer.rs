use crate::timer::Timer;
use std::time::Duration;

/// Keeps the control loop at a fixed tick rate.
///
/// Each call to [`TickPacer::finish_tick`] records how long the tick's work
/// took, then sleeps off the remainder of the period. A tick that overran
/// its period is reported and the next one starts immediately.
#[derive(Debug, Clone)]
pub struct TickPacer<T: Timer> {
    timer: T,
    period: Duration,
    tick_start: u64,
    overruns: u64,
}

impl<T: Timer> TickPacer<T> {
    pub fn new(timer: T, fps: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)));
        let tick_start = timer.now();
        Self {
            timer,
            period,
            tick_start,
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Ends the current tick and returns the time spent working in it.
    pub fn finish_tick(&mut self) -> Duration {
        let work = self.timer.elapsed(self.tick_start);
        if work < self.period {
            self.timer.sleep(self.period - work);
        } else {
            self.overruns += 1;
            tracing::debug!(
                work_ms = work.as_secs_f64() * 1e3,
                period_ms = self.period.as_secs_f64() * 1e3,
                "tick overran its period"
            );
        }
        let frame = self.timer.elapsed(self.tick_start);
        self.timer.record_frame(frame);
        self.tick_start = self.timer.now();
        work
    }
}
