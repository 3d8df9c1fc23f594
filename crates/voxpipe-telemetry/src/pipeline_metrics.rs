use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-thread pipeline monitoring
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>,   // Peak sample value in current window
    pub audio_level_db: Arc<AtomicI16>, // Current level in dB * 10

    // Event counters
    pub feed_frames: Arc<AtomicU64>,   // Raw frames accepted by Feed
    pub feed_drops: Arc<AtomicU64>,    // Raw frames dropped on a full engine queue
    pub fetch_frames: Arc<AtomicU64>,  // Processed results pulled from the engine
    pub output_frames: Arc<AtomicU64>, // Frames delivered to the output callback
    pub engine_errors: Arc<AtomicU64>, // Transient fetch faults absorbed by the worker

    // Voice activity
    pub is_speaking: Arc<AtomicBool>, // Current stable VAD state
    pub vad_transitions: Arc<AtomicU64>,
    pub last_transition: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            feed_frames: Arc::new(AtomicU64::new(0)),
            feed_drops: Arc::new(AtomicU64::new(0)),
            fetch_frames: Arc::new(AtomicU64::new(0)),
            output_frames: Arc::new(AtomicU64::new(0)),
            engine_errors: Arc::new(AtomicU64::new(0)),

            is_speaking: Arc::new(AtomicBool::new(false)),
            vad_transitions: Arc::new(AtomicU64::new(0)),
            last_transition: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples.iter().map(|&s| s.saturating_abs()).max().unwrap_or(0);
        self.current_peak.store(peak, Ordering::Relaxed);

        let db = if peak > 0 {
            (20.0 * (peak as f64 / 32768.0).log10() * 10.0) as i16
        } else {
            -900
        };
        self.audio_level_db.store(db, Ordering::Relaxed);
    }

    pub fn increment_feed_frames(&self) {
        self.feed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_feed_drops(&self) {
        self.feed_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetch_frames(&self) {
        self.fetch_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_output_frames(&self) {
        self.output_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_engine_errors(&self) {
        self.engine_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vad_transition(&self, speaking: bool) {
        self.is_speaking.store(speaking, Ordering::Relaxed);
        self.vad_transitions.fetch_add(1, Ordering::Relaxed);
        *self.last_transition.write() = Some(Instant::now());
    }
}
