pub mod manager;
pub mod transport;

pub use manager::{Provisioner, ProvisioningCallbacks, ProvisioningError, ProvisioningOptions};
pub use transport::{FailureReason, ProvisioningTransport, TransportEvent};
