pub mod codec;
pub mod debounce;
pub mod processor;

pub use codec::AudioCodec;
pub use debounce::{VadDebouncer, VoiceState, DEFAULT_STABLE_WINDOW};
pub use processor::{AudioProcessor, OutputCallback, ProcessorError, VadCallback};
