//! Pure-software reference implementation of the front-end contract.
//!
//! This engine exists so the pipeline is runnable and testable without a
//! vendor acoustic library: energy-based voice scoring, a noise gate, and
//! reference-channel subtraction when a device echo reference is present.
//! It makes no claim of acoustic quality.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::config::FrontendConfig;
use crate::energy::frame_dbfs;
use crate::engine::{Feature, FetchResult, FrontendEngine, FrontendError};

#[derive(Debug, Clone, Copy)]
pub struct SoftwareFrontendConfig {
    /// Raw frames buffered between feed and fetch before drops begin.
    pub queue_capacity: usize,
    /// Level above which a processed frame scores as speech.
    pub vad_threshold_dbfs: f32,
    /// Level below which the noise gate mutes the frame entirely.
    pub noise_gate_floor_dbfs: f32,
    /// Scale applied to the echo reference before subtraction.
    pub aec_leakage: f32,
}

impl Default for SoftwareFrontendConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            vad_threshold_dbfs: -40.0,
            noise_gate_floor_dbfs: -60.0,
            aec_leakage: 1.0,
        }
    }
}

#[derive(Default)]
struct EngineState {
    config: Option<FrontendConfig>,
    aec_active: bool,
}

pub struct SoftwareFrontend {
    opts: SoftwareFrontendConfig,
    state: Mutex<EngineState>,
    input_tx: Sender<Vec<i16>>,
    input_rx: Receiver<Vec<i16>>,
}

impl SoftwareFrontend {
    pub fn new(opts: SoftwareFrontendConfig) -> Self {
        let (input_tx, input_rx) = bounded(opts.queue_capacity);
        Self {
            opts,
            state: Mutex::new(EngineState::default()),
            input_tx,
            input_rx,
        }
    }

    fn drain_queue(&self) {
        while self.input_rx.try_recv().is_ok() {}
    }

    /// Collapse an interleaved frame into a processed mic signal per the
    /// configured layout, subtracting the echo reference when active.
    fn process_frame(&self, frame: &[i16], config: &FrontendConfig, aec_active: bool) -> Vec<i16> {
        let mic = config.layout.mic_channels as usize;
        let total = config.layout.total_channels() as usize;

        let mut out: Vec<i16> = frame
            .chunks_exact(total)
            .map(|group| {
                let mic_sum: i32 = group[..mic].iter().map(|&s| s as i32).sum();
                let mut sample = mic_sum / mic as i32;

                if aec_active {
                    let refs = &group[mic..];
                    let ref_sum: i32 = refs.iter().map(|&s| s as i32).sum();
                    let ref_avg = ref_sum / refs.len().max(1) as i32;
                    sample -= (ref_avg as f32 * self.opts.aec_leakage) as i32;
                }

                sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect();

        if config.noise_suppression
            && frame_dbfs(&out) < self.opts.noise_gate_floor_dbfs
        {
            out.fill(0);
        }

        out
    }
}

impl Default for SoftwareFrontend {
    fn default() -> Self {
        Self::new(SoftwareFrontendConfig::default())
    }
}

impl FrontendEngine for SoftwareFrontend {
    fn configure(&self, config: &FrontendConfig) -> Result<(), FrontendError> {
        if config.layout.mic_channels == 0 {
            return Err(FrontendError::InvalidLayout(
                "layout must carry at least one microphone channel",
            ));
        }
        if config.device_aec && !config.layout.has_echo_reference() {
            return Err(FrontendError::ReconfigureRequired(
                "device AEC needs an echo reference channel in the layout",
            ));
        }

        let mut state = self.state.lock();
        state.aec_active = config.device_aec;
        state.config = Some(*config);
        drop(state);

        // Frames queued under the old routing would be misinterpreted.
        self.drain_queue();

        tracing::debug!(
            sample_rate = config.layout.sample_rate_hz,
            mic = config.layout.mic_channels,
            refs = config.layout.ref_channels,
            aec = config.device_aec,
            "Software front-end configured"
        );
        Ok(())
    }

    fn feed(&self, frame: Vec<i16>) -> Result<(), FrontendError> {
        let total = {
            let state = self.state.lock();
            let config = state.config.as_ref().ok_or(FrontendError::NotConfigured)?;
            config.layout.total_channels() as usize
        };

        if frame.is_empty() || frame.len() % total != 0 {
            return Err(FrontendError::BadFrameLength {
                expected: total.max(frame.len() - frame.len() % total),
                got: frame.len(),
            });
        }

        match self.input_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Front-end input queue full, dropping frame");
                Err(FrontendError::QueueFull { dropped: 1 })
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(FrontendError::Fatal("input queue disconnected".into()))
            }
        }
    }

    fn fetch(&self, timeout: Duration) -> Result<Option<FetchResult>, FrontendError> {
        let frame = match self.input_rx.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err(FrontendError::Fatal("input queue disconnected".into()))
            }
        };

        let (config, aec_active) = {
            let state = self.state.lock();
            match state.config {
                Some(config) => (config, state.aec_active),
                None => return Err(FrontendError::NotConfigured),
            }
        };

        let samples = self.process_frame(&frame, &config, aec_active);
        let voice_active = frame_dbfs(&samples) >= self.opts.vad_threshold_dbfs;

        Ok(Some(FetchResult {
            samples,
            voice_active,
            timestamp: Instant::now(),
        }))
    }

    fn enable_feature(&self, feature: Feature, enabled: bool) -> Result<(), FrontendError> {
        match feature {
            Feature::DeviceAec => {
                let mut state = self.state.lock();
                let config = state.config.as_mut().ok_or(FrontendError::NotConfigured)?;

                if enabled && !config.layout.has_echo_reference() {
                    return Err(FrontendError::ReconfigureRequired(
                        "device AEC needs an echo reference channel in the layout",
                    ));
                }

                config.device_aec = enabled;
                state.aec_active = enabled;
                tracing::info!(enabled, "Device AEC toggled");
                Ok(())
            }
        }
    }

    fn reset(&self) {
        self.drain_queue();
    }
}
