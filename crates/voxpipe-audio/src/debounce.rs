use std::time::{Duration, Instant};

use voxpipe_foundation::SharedClock;

/// How long the raw detector must hold a value before it becomes the
/// externally visible state. Single-sided: onset and release use the same
/// window.
pub const DEFAULT_STABLE_WINDOW: Duration = Duration::from_millis(1500);

/// Stable voice state as exposed to the host.
#[derive(Debug, Clone, Copy)]
pub struct VoiceState {
    pub speaking: bool,
    pub last_change: Instant,
}

/// Hysteresis filter over the noisy per-frame detector.
///
/// The window measures continuous hold of a single raw value: any flicker
/// back to the previous value restarts the timer. The raw value is never
/// exposed, only promotions of the stable state.
pub struct VadDebouncer {
    clock: SharedClock,
    window: Duration,
    last_raw: bool,
    last_raw_change: Instant,
    stable: bool,
    last_stable_change: Instant,
}

impl VadDebouncer {
    pub fn new(clock: SharedClock, window: Duration) -> Self {
        let now = clock.now();
        Self {
            clock,
            window,
            last_raw: false,
            last_raw_change: now,
            stable: false,
            last_stable_change: now,
        }
    }

    /// Feed one raw detector value. Returns the new stable value when the
    /// raw value has held long enough to promote, `None` otherwise.
    pub fn update(&mut self, raw: bool) -> Option<bool> {
        let now = self.clock.now();

        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_raw_change = now;
        }

        if raw == self.stable {
            return None;
        }

        if now.duration_since(self.last_raw_change) >= self.window {
            self.stable = raw;
            self.last_stable_change = now;
            return Some(raw);
        }

        None
    }

    pub fn state(&self) -> VoiceState {
        VoiceState {
            speaking: self.stable,
            last_change: self.last_stable_change,
        }
    }

    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.last_raw = false;
        self.last_raw_change = now;
        self.stable = false;
        self.last_stable_change = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voxpipe_foundation::TestClock;

    const FRAME: Duration = Duration::from_millis(32);

    fn debouncer() -> (Arc<TestClock>, VadDebouncer) {
        let clock = Arc::new(TestClock::new());
        let debouncer = VadDebouncer::new(clock.clone(), DEFAULT_STABLE_WINDOW);
        (clock, debouncer)
    }

    /// Drive `raw` frames at the real cadence, collecting promotions.
    fn run(
        clock: &TestClock,
        debouncer: &mut VadDebouncer,
        raw: bool,
        frames: usize,
    ) -> Vec<bool> {
        let mut events = Vec::new();
        for _ in 0..frames {
            clock.advance(FRAME);
            if let Some(stable) = debouncer.update(raw) {
                events.push(stable);
            }
        }
        events
    }

    #[test]
    fn starts_not_speaking() {
        let (_clock, debouncer) = debouncer();
        assert!(!debouncer.state().speaking);
    }

    #[test]
    fn sustained_speech_promotes_once_after_window() {
        let (clock, mut debouncer) = debouncer();

        // The hold timer starts at the first speech frame; 47 frames put
        // 1472ms of hold behind it, still inside the window.
        assert!(run(&clock, &mut debouncer, true, 47).is_empty());

        // The 48th frame crosses 1500ms of continuous hold.
        assert_eq!(run(&clock, &mut debouncer, true, 1), vec![true]);
        assert!(debouncer.state().speaking);

        // Holding speech emits nothing further.
        assert!(run(&clock, &mut debouncer, true, 100).is_empty());
    }

    #[test]
    fn interrupting_frame_resets_the_window() {
        let (clock, mut debouncer) = debouncer();

        // Speech almost up to the window, then a single non-speech frame.
        assert!(run(&clock, &mut debouncer, true, 47).is_empty());
        assert!(run(&clock, &mut debouncer, false, 1).is_empty());

        // The timer restarted: another near-window run must not promote.
        assert!(run(&clock, &mut debouncer, true, 47).is_empty());

        // A full uninterrupted window finally does, exactly once.
        assert_eq!(run(&clock, &mut debouncer, true, 1), vec![true]);
    }

    #[test]
    fn flicker_never_changes_stable_state() {
        let (clock, mut debouncer) = debouncer();

        for _ in 0..200 {
            clock.advance(FRAME);
            assert_eq!(debouncer.update(true), None);
            clock.advance(FRAME);
            assert_eq!(debouncer.update(false), None);
        }
        assert!(!debouncer.state().speaking);
    }

    #[test]
    fn release_uses_the_same_window() {
        let (clock, mut debouncer) = debouncer();

        assert_eq!(run(&clock, &mut debouncer, true, 48), vec![true]);

        assert!(run(&clock, &mut debouncer, false, 47).is_empty());
        assert_eq!(run(&clock, &mut debouncer, false, 1), vec![false]);
        assert!(!debouncer.state().speaking);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let (clock, mut debouncer) = debouncer();
        assert_eq!(run(&clock, &mut debouncer, true, 48), vec![true]);

        debouncer.reset();
        assert!(!debouncer.state().speaking);
        // Post-reset the window applies fresh.
        assert!(run(&clock, &mut debouncer, true, 47).is_empty());
    }
}
