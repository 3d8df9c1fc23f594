use crossbeam_channel::Receiver;

use crate::manager::ProvisioningError;

/// Why a provisioning attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    AuthError,
    ApNotFound,
    Timeout,
    Other(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::AuthError => write!(f, "auth_error"),
            FailureReason::ApNotFound => write!(f, "ap_not_found"),
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Events emitted by a transport while advertising and exchanging
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Started,
    /// Credentials arrived; the device is now attempting to join `ssid`.
    CredentialsReceived { ssid: String },
    /// The device joined `ssid` with the received credentials.
    Connected { ssid: String },
    /// The attempt failed; the peer may retry, so the session stays open.
    Failed { reason: FailureReason },
    /// The peer closed the session.
    Ended,
}

/// Short-range wireless channel used to exchange network credentials.
///
/// Implementations synchronize internally; `stop` must be idempotent since
/// both the owning manager and its event thread may call it.
pub trait ProvisioningTransport: Send + Sync {
    /// Stable per-radio identifier appended to the advertised name
    /// (typically the MAC tail).
    fn device_suffix(&self) -> String;

    /// Begin advertising as `device_name` with proof-of-possession `pop`.
    /// Events arrive on the returned channel until `stop` or `Ended`.
    fn start(
        &self,
        device_name: &str,
        pop: &str,
    ) -> Result<Receiver<TransportEvent>, ProvisioningError>;

    fn stop(&self);
}
