use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use voxpipe_audio::{AudioCodec, AudioProcessor};
use voxpipe_frontend::{SoftwareFrontend, SoftwareFrontendConfig};
use voxpipe_telemetry::PipelineMetrics;

use crate::config::AppConfig;

/// Stand-in codec for the demo: fixed geometry, samples generated in
/// software. A real deployment implements [`AudioCodec`] over the capture
/// hardware instead.
pub struct SyntheticCodec {
    sample_rate_hz: u32,
    channels: u16,
    refs: u16,
}

impl SyntheticCodec {
    pub fn new(sample_rate_hz: u32, with_echo_reference: bool) -> Self {
        Self {
            sample_rate_hz,
            channels: if with_echo_reference { 2 } else { 1 },
            refs: if with_echo_reference { 1 } else { 0 },
        }
    }
}

impl AudioCodec for SyntheticCodec {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn ref_channel_count(&self) -> u16 {
        self.refs
    }
}

/// Alternates silence and a 440 Hz tone so the demo exercises both VAD
/// transitions. The tone bursts outlast the debounce window.
struct ToneGenerator {
    sample_rate_hz: u32,
    channels: usize,
    position: u64,
    burst_samples: u64,
}

impl ToneGenerator {
    fn new(sample_rate_hz: u32, channels: usize) -> Self {
        Self {
            sample_rate_hz,
            channels,
            position: 0,
            // 4s speech / 4s silence alternation.
            burst_samples: sample_rate_hz as u64 * 4,
        }
    }

    fn next_frame(&mut self, samples_per_channel: usize) -> Vec<i16> {
        let mut frame = Vec::with_capacity(samples_per_channel * self.channels);
        for _ in 0..samples_per_channel {
            let in_tone = (self.position / self.burst_samples) % 2 == 1;
            let sample = if in_tone {
                let phase = 2.0 * std::f32::consts::PI * 440.0 * self.position as f32
                    / self.sample_rate_hz as f32;
                (phase.sin() * 12_000.0) as i16
            } else {
                0
            };
            frame.push(sample);
            // Echo reference channels stay silent in the demo.
            for _ in 1..self.channels {
                frame.push(0);
            }
            self.position += 1;
        }
        frame
    }
}

/// Handle to the running pipeline.
pub struct AppHandle {
    pub processor: Arc<AudioProcessor>,
    pub metrics: PipelineMetrics,
    feeder: JoinHandle<()>,
}

impl AppHandle {
    /// Stop the producer, then drain and join the worker.
    pub fn shutdown(self) {
        self.feeder.abort();
        self.processor.stop();
        info!(
            fed = self.metrics.feed_frames.load(std::sync::atomic::Ordering::Relaxed),
            delivered = self.metrics.output_frames.load(std::sync::atomic::Ordering::Relaxed),
            transitions = self.metrics.vad_transitions.load(std::sync::atomic::Ordering::Relaxed),
            "Pipeline shut down"
        );
    }
}

/// Wire codec → processor → callbacks and start feeding frames at the real
/// capture cadence.
pub fn start_pipeline(config: &AppConfig) -> anyhow::Result<AppHandle> {
    let metrics = PipelineMetrics::default();
    let engine = Arc::new(SoftwareFrontend::new(SoftwareFrontendConfig::default()));
    let processor = Arc::new(AudioProcessor::new(engine).with_metrics(metrics.clone()));

    let codec = SyntheticCodec::new(config.sample_rate_hz, config.device_aec);
    processor.init(&codec, config.frame_duration_ms)?;
    let feed_size = processor.feed_size()?;
    info!(feed_size, "Pipeline initialized");

    processor.on_output(|frame| {
        tracing::trace!(samples = frame.len(), "Processed frame");
    });
    processor.on_vad_state_change(|speaking| {
        info!(speaking, "Stable voice state changed");
    });

    processor.start()?;

    let channels = codec.channel_count() as usize;
    let samples_per_channel = feed_size / channels;
    let frame_duration = Duration::from_millis(config.frame_duration_ms as u64);
    let mut generator = ToneGenerator::new(config.sample_rate_hz, channels);

    let feed_proc = processor.clone();
    let feeder = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(frame_duration);
        loop {
            ticker.tick().await;
            let frame = generator.next_frame(samples_per_channel);
            if let Err(e) = feed_proc.feed(frame) {
                tracing::error!("Feed failed: {}", e);
                break;
            }
        }
    });

    Ok(AppHandle {
        processor,
        metrics,
        feeder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_generator_alternates_bursts() {
        let mut generator = ToneGenerator::new(16_000, 1);

        // First burst is silence.
        let frame = generator.next_frame(512);
        assert!(frame.iter().all(|&s| s == 0));

        // Skip into the second burst.
        generator.position = 16_000 * 4 + 1;
        let frame = generator.next_frame(512);
        assert!(frame.iter().any(|&s| s != 0));
    }

    #[test]
    fn synthetic_codec_reports_reference_channel_when_asked() {
        let codec = SyntheticCodec::new(16_000, true);
        assert_eq!(codec.channel_count(), 2);
        assert_eq!(codec.ref_channel_count(), 1);

        let codec = SyntheticCodec::new(16_000, false);
        assert_eq!(codec.ref_channel_count(), 0);
    }
}
