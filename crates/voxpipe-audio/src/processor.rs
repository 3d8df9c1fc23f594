use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use voxpipe_foundation::{real_clock, SharedClock};
use voxpipe_frontend::{ChannelLayout, Feature, FrontendConfig, FrontendEngine, FrontendError};
use voxpipe_telemetry::PipelineMetrics;

use crate::codec::AudioCodec;
use crate::debounce::{VadDebouncer, VoiceState, DEFAULT_STABLE_WINDOW};

/// How long one fetch may block before the worker re-checks its shutdown
/// flag. Bounds the join performed by `stop`.
const FETCH_TIMEOUT: Duration = Duration::from_millis(100);

pub type OutputCallback = Box<dyn FnMut(Vec<i16>) + Send>;
pub type VadCallback = Box<dyn FnMut(bool) + Send>;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Processor has not been initialized")]
    NotInitialized,

    #[error("Processor is already initialized")]
    AlreadyInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feed size mismatch: expected {expected} samples, got {got}")]
    BadFeedSize { expected: usize, got: usize },

    #[error("Front-end engine error: {0}")]
    Frontend(#[from] FrontendError),

    #[error("Worker thread failed to spawn: {0}")]
    Spawn(String),
}

/// Geometry and feature state bound at `init`.
struct Session {
    feed_size: usize,
    layout: ChannelLayout,
    noise_suppression: bool,
    device_aec: bool,
}

struct WorkerHandle {
    join: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.join.join();
    }
}

/// Single owner of one front-end engine instance.
///
/// Mediates between an arbitrary-rate raw-sample producer (`feed`, called
/// from the capture context) and a dedicated worker thread that drains the
/// engine, dispatches processed frames, and debounces the per-frame voice
/// detector into a stable speaking signal. The worker walks
/// Stopped → Running → Stopping → Stopped; `stop` is a synchronous bounded
/// join.
pub struct AudioProcessor {
    engine: Arc<dyn FrontendEngine>,
    clock: SharedClock,
    metrics: PipelineMetrics,
    stable_window: Duration,
    session: Mutex<Option<Session>>,
    worker: Mutex<Option<WorkerHandle>>,
    running: Arc<AtomicBool>,
    voice_state: Arc<Mutex<Option<VoiceState>>>,
    output_cb: Arc<Mutex<Option<OutputCallback>>>,
    vad_cb: Arc<Mutex<Option<VadCallback>>>,
}

impl AudioProcessor {
    pub fn new(engine: Arc<dyn FrontendEngine>) -> Self {
        Self {
            engine,
            clock: real_clock(),
            metrics: PipelineMetrics::default(),
            stable_window: DEFAULT_STABLE_WINDOW,
            session: Mutex::new(None),
            worker: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            voice_state: Arc::new(Mutex::new(None)),
            output_cb: Arc::new(Mutex::new(None)),
            vad_cb: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_stable_window(mut self, window: Duration) -> Self {
        self.stable_window = window;
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Bind the codec geometry and configure the engine. Exactly once per
    /// processor; the feed size is fixed from here on.
    pub fn init(
        &self,
        codec: &dyn AudioCodec,
        frame_duration_ms: u32,
    ) -> Result<(), ProcessorError> {
        if frame_duration_ms == 0 {
            return Err(ProcessorError::InvalidConfig(
                "frame duration must be non-zero".into(),
            ));
        }

        let mut session = self.session.lock();
        if session.is_some() {
            return Err(ProcessorError::AlreadyInitialized);
        }

        let channels = codec.channel_count();
        let ref_channels = codec.ref_channel_count();
        if channels == 0 || ref_channels >= channels {
            return Err(ProcessorError::InvalidConfig(format!(
                "codec reports {} channels with {} references",
                channels, ref_channels
            )));
        }

        let layout = ChannelLayout {
            sample_rate_hz: codec.sample_rate_hz(),
            mic_channels: channels - ref_channels,
            ref_channels,
        };
        let feed_size = layout.sample_rate_hz as usize
            * channels as usize
            * frame_duration_ms as usize
            / 1000;

        // A device that exposes an echo reference gets AEC from the start.
        let config = FrontendConfig {
            layout,
            noise_suppression: true,
            device_aec: layout.has_echo_reference(),
        };
        self.engine.configure(&config)?;

        tracing::info!(
            sample_rate = layout.sample_rate_hz,
            channels,
            ref_channels,
            frame_duration_ms,
            feed_size,
            "Audio processor initialized"
        );

        *session = Some(Session {
            feed_size,
            layout,
            noise_suppression: config.noise_suppression,
            device_aec: config.device_aec,
        });
        Ok(())
    }

    /// Exact sample count per raw chunk; callers must chunk to this length.
    pub fn feed_size(&self) -> Result<usize, ProcessorError> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.feed_size)
            .ok_or(ProcessorError::NotInitialized)
    }

    /// Hand one raw frame to the engine. Ownership moves in; never blocks
    /// on front-end processing. A frame dropped by a full engine queue is
    /// absorbed here, wrong geometry is the caller's contract violation.
    pub fn feed(&self, data: Vec<i16>) -> Result<(), ProcessorError> {
        let expected = self.feed_size()?;
        if data.len() != expected {
            return Err(ProcessorError::BadFeedSize {
                expected,
                got: data.len(),
            });
        }

        self.metrics.update_audio_level(&data);

        match self.engine.feed(data) {
            Ok(()) => {
                self.metrics.increment_feed_frames();
                Ok(())
            }
            Err(FrontendError::QueueFull { .. }) => {
                self.metrics.increment_feed_drops();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Spawn the worker loop. Idempotent while running.
    pub fn start(&self) -> Result<(), ProcessorError> {
        if self.session.lock().is_none() {
            return Err(ProcessorError::NotInitialized);
        }

        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if self.running.load(Ordering::SeqCst) {
                *worker = Some(handle);
                return Ok(());
            }
            // A previous worker exited on an engine fault; reap it.
            handle.stop();
        }

        *worker = Some(self.spawn_worker()?);
        Ok(())
    }

    /// Signal the worker to exit and wait for it. Idempotent, safe from any
    /// thread, and bounded by the fetch timeout.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = worker.take() {
            handle.stop();
            self.engine.reset();
            tracing::info!("Audio processor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Debounced voice state as last published by the worker, if any
    /// transition has occurred since start.
    pub fn voice_state(&self) -> Option<VoiceState> {
        *self.voice_state.lock()
    }

    /// Toggle device-side echo cancellation at runtime. When the engine can
    /// re-route in place this is a plain feature flip; when it demands
    /// reconfiguration the worker is quiesced, the engine reconfigured, and
    /// the worker respawned — `is_running()` never observes a gap. An
    /// infeasible or failed toggle leaves the pipeline processing under its
    /// previous routing.
    pub fn set_device_aec(&self, enable: bool) -> Result<(), ProcessorError> {
        let mut session = self.session.lock();
        let state = session.as_mut().ok_or(ProcessorError::NotInitialized)?;
        if state.device_aec == enable {
            return Ok(());
        }

        // Without a codec echo reference there is nothing to route; refuse
        // before touching the worker.
        if enable && !state.layout.has_echo_reference() {
            return Err(ProcessorError::InvalidConfig(
                "codec provides no echo reference channel for device AEC".into(),
            ));
        }

        match self.engine.enable_feature(Feature::DeviceAec, enable) {
            Ok(()) => {
                state.device_aec = enable;
                Ok(())
            }
            Err(FrontendError::ReconfigureRequired(reason)) => {
                tracing::info!(enable, reason, "Restarting front-end for AEC change");

                let mut worker = self.worker.lock();
                let was_running = worker.take().map(|handle| handle.stop()).is_some();

                let config = FrontendConfig {
                    layout: state.layout,
                    noise_suppression: state.noise_suppression,
                    device_aec: enable,
                };
                if let Err(e) = self.engine.configure(&config) {
                    // Roll back to the previous routing so the pipeline
                    // keeps processing.
                    let previous = FrontendConfig {
                        layout: state.layout,
                        noise_suppression: state.noise_suppression,
                        device_aec: state.device_aec,
                    };
                    if let Err(restore) = self.engine.configure(&previous) {
                        // Only now is the engine actually unusable.
                        tracing::error!("Front-end rollback failed: {}", restore);
                        self.running.store(false, Ordering::SeqCst);
                        return Err(restore.into());
                    }
                    if was_running {
                        *worker = Some(self.spawn_worker()?);
                    }
                    return Err(e.into());
                }
                state.device_aec = enable;

                if was_running {
                    *worker = Some(self.spawn_worker()?);
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register the processed-audio consumer. Single slot, last writer
    /// wins; frames processed with no consumer registered are discarded.
    pub fn on_output(&self, callback: impl FnMut(Vec<i16>) + Send + 'static) {
        *self.output_cb.lock() = Some(Box::new(callback));
    }

    /// Register the stable voice-state consumer. Single slot, last writer
    /// wins; invoked from the worker thread on debounced transitions only.
    pub fn on_vad_state_change(&self, callback: impl FnMut(bool) + Send + 'static) {
        *self.vad_cb.lock() = Some(Box::new(callback));
    }

    fn spawn_worker(&self) -> Result<WorkerHandle, ProcessorError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            engine: self.engine.clone(),
            shutdown: shutdown.clone(),
            running: self.running.clone(),
            output_cb: self.output_cb.clone(),
            vad_cb: self.vad_cb.clone(),
            voice_state: self.voice_state.clone(),
            metrics: self.metrics.clone(),
            debouncer: VadDebouncer::new(self.clock.clone(), self.stable_window),
        };

        self.running.store(true, Ordering::SeqCst);
        let join = thread::Builder::new()
            .name("audio-frontend".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ProcessorError::Spawn(e.to_string())
            })?;

        Ok(WorkerHandle { join, shutdown })
    }
}

impl Drop for AudioProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    engine: Arc<dyn FrontendEngine>,
    shutdown: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    output_cb: Arc<Mutex<Option<OutputCallback>>>,
    vad_cb: Arc<Mutex<Option<VadCallback>>>,
    voice_state: Arc<Mutex<Option<VoiceState>>>,
    metrics: PipelineMetrics,
    debouncer: VadDebouncer,
}

impl Worker {
    fn run(mut self) {
        tracing::info!("Audio worker started");

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.engine.fetch(FETCH_TIMEOUT) {
                Ok(Some(result)) => {
                    self.metrics.increment_fetch_frames();
                    let voice_active = result.voice_active;

                    if let Some(cb) = self.output_cb.lock().as_mut() {
                        cb(result.samples);
                        self.metrics.increment_output_frames();
                    }

                    if let Some(stable) = self.debouncer.update(voice_active) {
                        tracing::debug!(speaking = stable, "Voice state changed");
                        *self.voice_state.lock() = Some(self.debouncer.state());
                        self.metrics.record_vad_transition(stable);
                        if let Some(cb) = self.vad_cb.lock().as_mut() {
                            cb(stable);
                        }
                    }
                }
                Ok(None) => {
                    // Fetch timed out; loop around to honor shutdown.
                }
                Err(FrontendError::Fatal(e)) => {
                    tracing::error!("Front-end fault, worker exiting: {}", e);
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
                Err(e) => {
                    self.metrics.increment_engine_errors();
                    tracing::warn!("Dropping bad fetch result: {}", e);
                }
            }
        }

        tracing::info!("Audio worker stopped");
    }
}
