use crate::correct::{correct_timestamps, CorrectionOptions};
use crate::error::{StreamError, StreamResult};
use crate::inlet::{StreamInfo, StreamInlet, StreamResolver};
use orchard_core::{ChannelLayout, SampleWindow};
use std::time::Duration;

const PRIME_TIMEOUT: Duration = Duration::from_secs(2);
const DRAIN_CHUNK: usize = 4096;

/// Owns the stream connection for the lifetime of a session.
///
/// There is exactly one reader; every pull, drain and clock alignment goes
/// through `&mut self`.
pub struct StreamIngestion<I: StreamInlet> {
    inlet: I,
    layout: ChannelLayout,
    sample_rate: f64,
    offset: f64,
    /// Set when priming saw no sample; the offset is taken from the first
    /// non-empty window instead.
    offset_pending: bool,
    primed: bool,
    correction: CorrectionOptions,
}

impl<I: StreamInlet> StreamIngestion<I> {
    /// Resolves `name` and validates what it advertises. A missing stream or
    /// an unsupported montage is fatal.
    pub fn open<R>(resolver: &R, name: &str, timeout: Duration) -> StreamResult<Self>
    where
        R: StreamResolver<Inlet = I>,
    {
        let inlet = resolver.resolve(name, timeout)?;
        Self::from_inlet(inlet)
    }

    pub fn from_inlet(inlet: I) -> StreamResult<Self> {
        let info = inlet.info();
        let layout = ChannelLayout::from_channel_count(info.channel_count).ok_or(
            StreamError::UnsupportedChannelCount {
                count: info.channel_count,
            },
        )?;
        if !info.nominal_srate.is_finite() || info.nominal_srate <= 0.0 {
            return Err(StreamError::InvalidInfo(format!(
                "stream '{}' has no nominal sampling rate",
                info.name
            )));
        }
        tracing::info!(
            name = %info.name,
            channels = info.channel_count,
            srate = info.nominal_srate,
            ?layout,
            "stream opened"
        );
        let sample_rate = info.nominal_srate;
        Ok(Self {
            inlet,
            layout,
            sample_rate,
            offset: 0.0,
            offset_pending: false,
            primed: false,
            correction: CorrectionOptions::default(),
        })
    }

    pub fn with_correction(mut self, correction: CorrectionOptions) -> Self {
        self.correction = correction;
        self
    }

    /// Throwaway read followed by the one-time clock offset estimate.
    /// Subsequent calls are no-ops.
    pub fn prime(&mut self) -> StreamResult<()> {
        if self.primed {
            return Ok(());
        }
        self.primed = true;
        if self.inlet.pull_sample(PRIME_TIMEOUT)?.is_none() {
            tracing::warn!(
                timeout_ms = PRIME_TIMEOUT.as_millis() as u64,
                "no sample arrived while priming; clock offset deferred to the first data"
            );
            self.offset_pending = true;
            return Ok(());
        }
        self.estimate_offset()
    }

    fn estimate_offset(&mut self) -> StreamResult<()> {
        self.offset = self.inlet.time_correction()?;
        self.offset_pending = false;
        tracing::debug!(offset = self.offset, "stream clock offset");
        Ok(())
    }

    /// Returns whatever is buffered, up to `duration × rate` samples.
    ///
    /// Never blocks. A short read is logged and returned as is.
    pub fn pull_window(&mut self, duration: Duration) -> StreamResult<SampleWindow> {
        let expected = (duration.as_secs_f64() * self.sample_rate).round() as usize;
        let chunk = self.inlet.pull_chunk(expected)?;
        if chunk.len() < expected {
            tracing::warn!(expected, actual = chunk.len(), "stream buffer under-run");
        }
        if self.offset_pending && !chunk.is_empty() {
            self.estimate_offset()?;
        }

        let channels = self.layout.channel_count();
        let mut data = vec![Vec::with_capacity(chunk.len()); channels];
        for sample in &chunk.samples {
            for (ch, column) in data.iter_mut().enumerate() {
                column.push(sample.get(ch).copied().map_or(0.0, f64::from));
            }
        }
        let timestamps = chunk.timestamps.iter().map(|t| t + self.offset).collect();
        let (data, timestamps) = correct_timestamps(data, timestamps, self.correction);

        Ok(SampleWindow {
            data,
            timestamps,
            sample_rate: self.sample_rate,
            layout: self.layout,
        })
    }

    /// Drops everything currently buffered. Returns the number of samples
    /// discarded.
    pub fn clear_buffer(&mut self) -> StreamResult<usize> {
        let mut dropped = 0;
        loop {
            let chunk = self.inlet.pull_chunk(DRAIN_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            dropped += chunk.len();
        }
        if dropped > 0 {
            tracing::trace!(dropped, "cleared stream buffer");
        }
        Ok(dropped)
    }

    pub fn info(&self) -> &StreamInfo {
        self.inlet.info()
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// True until a clock offset has been estimated after a silent prime.
    pub fn offset_pending(&self) -> bool {
        self.offset_pending
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn inlet_mut(&mut self) -> &mut I {
        &mut self.inlet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryInlet;

    fn inlet(channels: usize) -> MemoryInlet {
        MemoryInlet::new(StreamInfo::new("test", channels, 100.0)).with_offset(-5.0)
    }

    #[test]
    fn rejects_unsupported_montages() {
        assert!(matches!(
            StreamIngestion::from_inlet(inlet(16)),
            Err(StreamError::UnsupportedChannelCount { count: 16 })
        ));
        assert!(StreamIngestion::from_inlet(inlet(8)).is_ok());
    }

    #[test]
    fn prime_consumes_one_sample_and_caches_offset() {
        let mut source = inlet(4);
        source.push_ramp(10.0, 3, |_, i| i as f32);
        let mut ingest = StreamIngestion::from_inlet(source).unwrap();
        ingest.prime().unwrap();
        assert_eq!(ingest.offset(), -5.0);
        assert_eq!(ingest.inlet_mut().buffered(), 2);

        ingest.prime().unwrap();
        assert_eq!(ingest.inlet_mut().buffered(), 2);
    }

    #[test]
    fn silent_prime_defers_the_offset_to_the_first_data() {
        let mut ingest = StreamIngestion::from_inlet(inlet(4)).unwrap();
        ingest.prime().unwrap();
        assert!(ingest.is_primed());
        assert!(ingest.offset_pending());
        assert_eq!(ingest.offset(), 0.0);

        assert!(ingest.pull_window(Duration::from_secs(1)).unwrap().is_empty());
        assert!(ingest.offset_pending());

        ingest.inlet_mut().push_ramp(10.0, 5, |_, _| 1.0);
        let window = ingest.pull_window(Duration::from_secs(1)).unwrap();
        assert!(!ingest.offset_pending());
        assert_eq!(ingest.offset(), -5.0);
        assert!((window.timestamps[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn window_is_channel_major_and_capped() {
        let mut source = inlet(4);
        source.push_ramp(0.0, 150, |ch, i| (ch * 1000 + i) as f32);
        let mut ingest = StreamIngestion::from_inlet(source).unwrap();

        let window = ingest.pull_window(Duration::from_secs(1)).unwrap();
        assert_eq!(window.channel_count(), 4);
        assert_eq!(window.sample_count(), 100);
        assert_eq!(window.data[2][5], 2005.0);
        assert_eq!(window.timestamps[0], 0.0);
        assert_eq!(ingest.inlet_mut().buffered(), 50);
    }

    #[test]
    fn under_run_returns_partial_data() {
        let mut source = inlet(4);
        source.push_ramp(0.0, 20, |_, _| 1.0);
        let mut ingest = StreamIngestion::from_inlet(source).unwrap();
        let window = ingest.pull_window(Duration::from_secs(9)).unwrap();
        assert_eq!(window.sample_count(), 20);

        let empty = ingest.pull_window(Duration::from_secs(9)).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn clear_buffer_drains_everything() {
        let mut source = inlet(8);
        source.push_ramp(0.0, 10_000, |_, _| 0.0);
        let mut ingest = StreamIngestion::from_inlet(source).unwrap();
        assert_eq!(ingest.clear_buffer().unwrap(), 10_000);
        assert_eq!(ingest.clear_buffer().unwrap(), 0);
    }
}
