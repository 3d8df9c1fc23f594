/// Boundary to the host's codec/capture hardware abstraction.
///
/// The processor only needs the stream geometry; sample delivery happens
/// through [`AudioProcessor::feed`](crate::AudioProcessor::feed) from
/// whatever context the codec captures in.
pub trait AudioCodec: Send + Sync {
    fn sample_rate_hz(&self) -> u32;

    /// Total interleaved channels per captured frame, echo reference
    /// channels included.
    fn channel_count(&self) -> u16;

    /// How many of the interleaved channels carry the device's echo
    /// reference signal. Zero when the device provides none.
    fn ref_channel_count(&self) -> u16 {
        0
    }
}
