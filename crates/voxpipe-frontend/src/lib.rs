pub mod config;
pub mod energy;
pub mod engine;
pub mod software;

pub use config::{ChannelLayout, FrontendConfig};
pub use engine::{Feature, FetchResult, FrontendEngine, FrontendError};
pub use software::{SoftwareFrontend, SoftwareFrontendConfig};
