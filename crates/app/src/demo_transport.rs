use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};

use voxpipe_provisioning::{ProvisioningError, ProvisioningTransport, TransportEvent};

/// Scripted stand-in for the radio: plays out a successful credential
/// exchange shortly after starting. Lets the demo walk the full
/// provisioning path without hardware.
pub struct LoopbackTransport {
    ssid: String,
}

impl LoopbackTransport {
    pub fn new(ssid: impl Into<String>) -> Self {
        Self { ssid: ssid.into() }
    }
}

impl ProvisioningTransport for LoopbackTransport {
    fn device_suffix(&self) -> String {
        "D3M0FF".into()
    }

    fn start(
        &self,
        device_name: &str,
        _pop: &str,
    ) -> Result<Receiver<TransportEvent>, ProvisioningError> {
        tracing::info!(%device_name, "Loopback transport advertising");
        let (tx, rx) = unbounded();
        let ssid = self.ssid.clone();

        thread::Builder::new()
            .name("loopback-transport".to_string())
            .spawn(move || {
                let _ = tx.send(TransportEvent::Started);
                thread::sleep(Duration::from_millis(200));
                let _ = tx.send(TransportEvent::CredentialsReceived { ssid: ssid.clone() });
                thread::sleep(Duration::from_millis(100));
                let _ = tx.send(TransportEvent::Connected { ssid });
                let _ = tx.send(TransportEvent::Ended);
            })
            .map_err(|e| ProvisioningError::Spawn(e.to_string()))?;

        Ok(rx)
    }

    fn stop(&self) {}
}
