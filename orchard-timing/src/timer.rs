use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic nanosecond clock driving the trial loop.
pub trait Timer: Clone + Send + Sync {
    /// Nanoseconds since the timer was created.
    fn now(&self) -> u64;
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn frame_count(&self) -> usize;
    fn calibration_stats(&self) -> CalibrationStats;
}

/// Statistics over recorded tick durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl CalibrationStats {
    pub fn from_frames<'a>(frames: impl IntoIterator<Item = &'a Duration>) -> Self {
        let times: Vec<f64> = frames.into_iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return Self::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

const MAX_FRAME_SAMPLES: usize = 1000;

fn push_frame(frames: &mut VecDeque<Duration>, d: Duration) {
    if frames.len() >= MAX_FRAME_SAMPLES {
        frames.pop_front();
    }
    frames.push_back(d);
}

/// Wall-clock timer with platform-specific precise sleeping.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
    frame_times: VecDeque<Duration>,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        push_frame(&mut self.frame_times, d);
    }
    fn frame_count(&self) -> usize {
        self.frame_times.len()
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: VecDeque::with_capacity(MAX_FRAME_SAMPLES),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and the remainder pointer may be null.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand-driven clock. Clones share the same time, so a simulated stream and
/// the session loop observe identical timestamps. `sleep` advances the clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frame_times: VecDeque<Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        push_frame(&mut self.frame_times, d);
    }
    fn frame_count(&self) -> usize {
        self.frame_times.len()
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_the_clock() {
        let timer = ManualTimer::new();
        let other = timer.clone();
        timer.advance(Duration::from_millis(5));
        assert_eq!(other.now(), 5_000_000);
        other.sleep(Duration::from_millis(1));
        assert_eq!(timer.now(), 6_000_000);
        assert_eq!(timer.elapsed(1_000_000), Duration::from_millis(5));
    }

    #[test]
    fn stats_over_frames() {
        let frames = [
            Duration::from_millis(30),
            Duration::from_millis(34),
            Duration::from_millis(32),
        ];
        let stats = CalibrationStats::from_frames(&frames);
        assert!((stats.average_frame_time_ns - 32e6).abs() < 1.0);
        assert_eq!(stats.min_frame_time_ns, 30e6);
        assert_eq!(stats.max_frame_time_ns, 34e6);
        assert!((stats.effective_fps - 31.25).abs() < 1e-6);
        assert!(stats.jitter_ns > 0.0);
    }

    #[test]
    fn frame_buffer_is_bounded() {
        let mut timer = ManualTimer::new();
        for _ in 0..(MAX_FRAME_SAMPLES + 10) {
            timer.record_frame(Duration::from_millis(1));
        }
        assert_eq!(timer.frame_count(), MAX_FRAME_SAMPLES);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(HighPrecisionTimer::new().calibration_stats(), CalibrationStats::default());
    }
}
