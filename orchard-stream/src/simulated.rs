use crate::error::{StreamError, StreamResult};
use crate::inlet::{Chunk, StreamInfo, StreamInlet, StreamResolver};
use orchard_core::ChannelLayout;
use orchard_timing::Timer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::time::Duration;

/// Shape of the synthetic signal and of the transport imperfections.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub sample_rate: f64,
    /// Amplitude of the 10 Hz rhythm, in volts.
    pub mu_amplitude: f64,
    /// Amplitude of the 50 Hz line component, in volts.
    pub line_amplitude: f64,
    /// Standard deviation of the broadband noise, in volts.
    pub noise_std: f64,
    /// Maximum timestamp jitter, in seconds.
    pub jitter_secs: f64,
    /// Probability that two consecutive samples arrive swapped.
    pub reorder_probability: f64,
    /// Stream clock minus local clock, in seconds.
    pub clock_offset_secs: f64,
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            sample_rate: 250.0,
            mu_amplitude: 10e-6,
            line_amplitude: 4e-6,
            noise_std: 2e-6,
            jitter_secs: 0.0005,
            reorder_probability: 0.01,
            clock_offset_secs: 1_000.0,
            seed: 7,
        }
    }
}

/// Synthetic EEG source paced by a [`Timer`]. Samples become available as
/// the timer advances, so pulls behave like a live device buffer.
pub struct SimulatedInlet<T: Timer> {
    info: StreamInfo,
    timer: T,
    options: SimulationOptions,
    rng: StdRng,
    emitted: u64,
    origin_ns: u64,
}

impl<T: Timer> SimulatedInlet<T> {
    pub fn new(name: &str, layout: ChannelLayout, timer: T, options: SimulationOptions) -> Self {
        let mut info = StreamInfo::new(name, layout.channel_count(), options.sample_rate);
        info.source_id = format!("orchard-sim-{name}");
        info.hostname = "localhost".to_string();
        let origin_ns = timer.now();
        Self {
            info,
            rng: StdRng::seed_from_u64(options.seed),
            timer,
            options,
            emitted: 0,
            origin_ns,
        }
    }

    fn due(&self) -> u64 {
        let elapsed = self.timer.now().saturating_sub(self.origin_ns) as f64 / 1e9;
        (elapsed * self.options.sample_rate).floor() as u64
    }

    fn generate(&mut self, index: u64) -> (Vec<f32>, f64) {
        let t = index as f64 / self.options.sample_rate;
        let channels = self.info.channel_count;
        let sample = (0..channels)
            .map(|ch| {
                let phase = ch as f64 / channels as f64 * TAU;
                let mu = self.options.mu_amplitude * (TAU * 10.0 * t + phase).sin();
                let line = self.options.line_amplitude * (TAU * 50.0 * t).sin();
                // Sum of uniforms is close enough to Gaussian for test data.
                let noise: f64 = (0..4).map(|_| self.rng.random_range(-1.0..1.0)).sum::<f64>()
                    * self.options.noise_std
                    * 0.866;
                (mu + line + noise) as f32
            })
            .collect();
        let jitter = if self.options.jitter_secs > 0.0 {
            self.rng
                .random_range(-self.options.jitter_secs..self.options.jitter_secs)
        } else {
            0.0
        };
        let local = self.origin_ns as f64 / 1e9 + t;
        (sample, local + self.options.clock_offset_secs + jitter)
    }
}

impl<T: Timer> StreamInlet for SimulatedInlet<T> {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(&mut self, max_samples: usize) -> StreamResult<Chunk> {
        let pending = self.due().saturating_sub(self.emitted) as usize;
        let n = pending.min(max_samples);
        let mut chunk = Chunk::default();
        for _ in 0..n {
            let (sample, ts) = self.generate(self.emitted);
            self.emitted += 1;
            chunk.samples.push(sample);
            chunk.timestamps.push(ts);
        }
        if self.options.reorder_probability > 0.0 {
            for i in 1..chunk.len() {
                if self.rng.random_bool(self.options.reorder_probability) {
                    chunk.samples.swap(i - 1, i);
                    chunk.timestamps.swap(i - 1, i);
                }
            }
        }
        Ok(chunk)
    }

    fn pull_sample(&mut self, timeout: Duration) -> StreamResult<Option<(Vec<f32>, f64)>> {
        let deadline = self.timer.now() + timeout.as_nanos() as u64;
        loop {
            let mut chunk = self.pull_chunk(1)?;
            if let (Some(sample), Some(ts)) = (chunk.samples.pop(), chunk.timestamps.pop()) {
                return Ok(Some((sample, ts)));
            }
            if self.timer.now() >= deadline {
                return Ok(None);
            }
            self.timer
                .sleep(Duration::from_secs_f64(1.0 / self.options.sample_rate));
        }
    }

    fn time_correction(&mut self) -> StreamResult<f64> {
        Ok(-self.options.clock_offset_secs)
    }
}

/// Resolves exactly one stream name to a simulated inlet.
pub struct SimulatedResolver<T: Timer> {
    name: String,
    layout: ChannelLayout,
    timer: T,
    options: SimulationOptions,
}

impl<T: Timer> SimulatedResolver<T> {
    pub fn new(name: &str, layout: ChannelLayout, timer: T, options: SimulationOptions) -> Self {
        Self {
            name: name.to_string(),
            layout,
            timer,
            options,
        }
    }
}

impl<T: Timer> StreamResolver for SimulatedResolver<T> {
    type Inlet = SimulatedInlet<T>;

    fn resolve(&self, name: &str, _timeout: Duration) -> StreamResult<Self::Inlet> {
        if name != self.name {
            return Err(StreamError::NoStreamsFound {
                name: name.to_string(),
            });
        }
        Ok(SimulatedInlet::new(
            name,
            self.layout,
            self.timer.clone(),
            self.options.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_timing::ManualTimer;

    #[test]
    fn samples_appear_as_time_passes() {
        let timer = ManualTimer::new();
        let mut inlet = SimulatedInlet::new(
            "sim",
            ChannelLayout::Eight,
            timer.clone(),
            SimulationOptions::default(),
        );
        assert!(inlet.pull_chunk(1000).unwrap().is_empty());

        timer.advance(Duration::from_secs(1));
        let chunk = inlet.pull_chunk(100).unwrap();
        assert_eq!(chunk.len(), 100);
        assert_eq!(chunk.samples[0].len(), 8);

        let rest = inlet.pull_chunk(10_000).unwrap();
        assert_eq!(rest.len(), 150);
    }

    #[test]
    fn resolver_only_knows_its_name() {
        let resolver = SimulatedResolver::new(
            "Explore_8547_ExG",
            ChannelLayout::Four,
            ManualTimer::new(),
            SimulationOptions::default(),
        );
        assert!(resolver.resolve("Explore_8547_ExG", Duration::ZERO).is_ok());
        assert!(matches!(
            resolver.resolve("other", Duration::ZERO),
            Err(StreamError::NoStreamsFound { .. })
        ));
    }

    #[test]
    fn pull_sample_waits_on_the_timer() {
        let timer = ManualTimer::new();
        let mut inlet = SimulatedInlet::new(
            "sim",
            ChannelLayout::Four,
            timer.clone(),
            SimulationOptions::default(),
        );
        let (sample, ts) = inlet.pull_sample(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(sample.len(), 4);
        assert!(ts > 999.0);
        assert!(timer.now() > 0);
    }
}
