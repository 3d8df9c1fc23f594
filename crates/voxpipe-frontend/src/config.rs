use serde::{Deserialize, Serialize};

/// Channel arrangement of the raw frames fed into the engine.
///
/// Samples are interleaved: the microphone channels first, then any
/// device-provided echo reference channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub sample_rate_hz: u32,
    pub mic_channels: u16,
    pub ref_channels: u16,
}

impl ChannelLayout {
    pub fn mono(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            mic_channels: 1,
            ref_channels: 0,
        }
    }

    pub fn total_channels(&self) -> u16 {
        self.mic_channels + self.ref_channels
    }

    pub fn has_echo_reference(&self) -> bool {
        self.ref_channels > 0
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::mono(16_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub layout: ChannelLayout,
    pub noise_suppression: bool,
    pub device_aec: bool,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            layout: ChannelLayout::default(),
            noise_suppression: true,
            device_aec: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_layout_has_no_reference() {
        let layout = ChannelLayout::mono(16_000);
        assert_eq!(layout.total_channels(), 1);
        assert!(!layout.has_echo_reference());
    }

    #[test]
    fn reference_channel_counts_toward_total() {
        let layout = ChannelLayout {
            sample_rate_hz: 16_000,
            mic_channels: 1,
            ref_channels: 1,
        };
        assert_eq!(layout.total_channels(), 2);
        assert!(layout.has_echo_reference());
    }
}
