use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::FrontendConfig;

/// Runtime-togglable engine capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Echo cancellation against a device-provided reference channel.
    DeviceAec,
}

/// One processed result pulled out of the engine.
///
/// `samples` carries the processed microphone audio only; its length may
/// differ from the fed frame length when the input layout carries reference
/// channels or the engine reframes internally.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub samples: Vec<i16>,
    pub voice_active: bool,
    pub timestamp: Instant,
}

#[derive(Error, Debug)]
pub enum FrontendError {
    #[error("Engine has not been configured")]
    NotConfigured,

    #[error("Input queue full, dropped {dropped} frame(s)")]
    QueueFull { dropped: usize },

    #[error("Frame length mismatch: expected {expected} samples, got {got}")]
    BadFrameLength { expected: usize, got: usize },

    #[error("Invalid channel layout: {0}")]
    InvalidLayout(&'static str),

    #[error("Feature change requires reconfiguration: {0}")]
    ReconfigureRequired(&'static str),

    #[error("Unrecoverable engine fault: {0}")]
    Fatal(String),
}

/// Contract for the opaque acoustic front-end (echo cancellation, noise
/// suppression, voice-activity scoring).
///
/// Implementations synchronize internally: `feed` is called from the capture
/// context while `fetch` is draining on a worker thread, and the two race by
/// design. `fetch` blocks for at most `timeout` and returns `Ok(None)` when
/// nothing became available, which is what makes the owning worker loop
/// interruptible.
pub trait FrontendEngine: Send + Sync {
    /// Configure channel layout and feature flags. May be called again to
    /// re-route channels; implementations discard queued input on
    /// reconfiguration.
    fn configure(&self, config: &FrontendConfig) -> Result<(), FrontendError>;

    /// Non-blocking enqueue of one raw interleaved frame.
    fn feed(&self, frame: Vec<i16>) -> Result<(), FrontendError>;

    /// Pull the next processed result, waiting up to `timeout`.
    fn fetch(&self, timeout: Duration) -> Result<Option<FetchResult>, FrontendError>;

    /// Toggle a feature at runtime. Returns `ReconfigureRequired` when the
    /// change cannot be applied against the current channel routing.
    fn enable_feature(&self, feature: Feature, enabled: bool) -> Result<(), FrontendError>;

    /// Drop all queued input and transient state.
    fn reset(&self);
}
