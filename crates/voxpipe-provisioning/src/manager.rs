use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, Sender};
use parking_lot::Mutex;
use thiserror::Error;

use crate::transport::{FailureReason, ProvisioningTransport, TransportEvent};

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Worker thread failed to spawn: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone)]
pub struct ProvisioningOptions {
    /// Advertised name is this prefix plus the transport's device suffix.
    pub name_prefix: String,
    /// Proof-of-possession secret the peer must present.
    pub pop: String,
    /// Give up and report failure after this long; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            name_prefix: "VoxPipe-".into(),
            pop: "123456".into(),
            timeout: Some(Duration::from_secs(10 * 60)),
        }
    }
}

pub struct ProvisioningCallbacks {
    /// Credentials received, join attempt underway.
    pub on_connecting: Box<dyn FnMut(&str) + Send>,
    /// Joined the network named by the argument.
    pub on_success: Box<dyn FnMut(&str) + Send>,
    /// Attempt failed or timed out.
    pub on_failure: Box<dyn FnMut(FailureReason) + Send>,
}

struct WorkerHandle {
    join: JoinHandle<()>,
    stop_tx: Sender<()>,
}

/// Owns one provisioning transport and runs its event loop on a dedicated
/// thread. Explicitly constructed and passed to whoever needs it; there is
/// no shared global instance.
pub struct Provisioner<T: ProvisioningTransport + 'static> {
    transport: Arc<T>,
    worker: Mutex<Option<WorkerHandle>>,
    running: Arc<AtomicBool>,
}

impl<T: ProvisioningTransport + 'static> Provisioner<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            worker: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start advertising and dispatching events. Starting while already
    /// running is a no-op, matching the device's single-radio reality.
    pub fn start(
        &self,
        options: ProvisioningOptions,
        callbacks: ProvisioningCallbacks,
    ) -> Result<(), ProvisioningError> {
        let mut worker = self.worker.lock();
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("Provisioning already running");
            return Ok(());
        }
        if let Some(stale) = worker.take() {
            let _ = stale.join.join();
        }

        let device_name = format!("{}{}", options.name_prefix, self.transport.device_suffix());
        tracing::info!(%device_name, "Starting provisioning");

        let events = self.transport.start(&device_name, &options.pop)?;
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let transport = self.transport.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let join = thread::Builder::new()
            .name("provisioning".to_string())
            .spawn(move || {
                let mut callbacks = callbacks;
                let deadline = options.timeout.map(|t| Instant::now() + t);
                let timeout_rx = match deadline {
                    Some(at) => crossbeam_channel::at(at),
                    None => never(),
                };

                loop {
                    crossbeam_channel::select! {
                        recv(events) -> event => match event {
                            Ok(TransportEvent::Started) => {
                                tracing::info!("Provisioning session started");
                            }
                            Ok(TransportEvent::CredentialsReceived { ssid }) => {
                                tracing::info!(%ssid, "Credentials received");
                                (callbacks.on_connecting)(&ssid);
                            }
                            Ok(TransportEvent::Connected { ssid }) => {
                                tracing::info!(%ssid, "Provisioning succeeded");
                                (callbacks.on_success)(&ssid);
                            }
                            Ok(TransportEvent::Failed { reason }) => {
                                tracing::warn!(%reason, "Provisioning attempt failed");
                                (callbacks.on_failure)(reason);
                            }
                            Ok(TransportEvent::Ended) => {
                                tracing::info!("Provisioning session ended");
                                break;
                            }
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => break,
                        recv(timeout_rx) -> _ => {
                            tracing::warn!("Provisioning timeout");
                            (callbacks.on_failure)(FailureReason::Timeout);
                            break;
                        }
                    }
                }

                transport.stop();
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ProvisioningError::Spawn(e.to_string())
            })?;

        *worker = Some(WorkerHandle { join, stop_tx });
        Ok(())
    }

    /// Stop advertising and join the event thread. Idempotent.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.join();
            tracing::info!("Provisioning stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl<T: ProvisioningTransport + 'static> Drop for Provisioner<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::atomic::AtomicUsize;

    struct ScriptedTransport {
        events_tx: Sender<TransportEvent>,
        events_rx: Receiver<TransportEvent>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        last_name: Mutex<Option<String>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            let (events_tx, events_rx) = unbounded();
            Self {
                events_tx,
                events_rx,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                last_name: Mutex::new(None),
            }
        }
    }

    impl ProvisioningTransport for ScriptedTransport {
        fn device_suffix(&self) -> String {
            "A1B2C3".into()
        }

        fn start(
            &self,
            device_name: &str,
            _pop: &str,
        ) -> Result<Receiver<TransportEvent>, ProvisioningError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.last_name.lock() = Some(device_name.to_string());
            Ok(self.events_rx.clone())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn collecting_callbacks() -> (
        ProvisioningCallbacks,
        Arc<Mutex<Vec<String>>>,
        Arc<Mutex<Vec<String>>>,
        Arc<Mutex<Vec<FailureReason>>>,
    ) {
        let connecting = Arc::new(Mutex::new(Vec::new()));
        let success = Arc::new(Mutex::new(Vec::new()));
        let failure = Arc::new(Mutex::new(Vec::new()));

        let (c, s, f) = (connecting.clone(), success.clone(), failure.clone());
        let callbacks = ProvisioningCallbacks {
            on_connecting: Box::new(move |ssid| c.lock().push(ssid.to_string())),
            on_success: Box::new(move |ssid| s.lock().push(ssid.to_string())),
            on_failure: Box::new(move |reason| f.lock().push(reason)),
        };
        (callbacks, connecting, success, failure)
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn success_path_fires_connecting_then_success() {
        let transport = Arc::new(ScriptedTransport::new());
        let provisioner = Provisioner::new(transport.clone());
        let (callbacks, connecting, success, failure) = collecting_callbacks();

        provisioner
            .start(ProvisioningOptions::default(), callbacks)
            .unwrap();
        assert!(provisioner.is_running());
        assert_eq!(
            transport.last_name.lock().as_deref(),
            Some("VoxPipe-A1B2C3")
        );

        transport
            .events_tx
            .send(TransportEvent::CredentialsReceived {
                ssid: "HomeNet".into(),
            })
            .unwrap();
        transport
            .events_tx
            .send(TransportEvent::Connected {
                ssid: "HomeNet".into(),
            })
            .unwrap();
        transport.events_tx.send(TransportEvent::Ended).unwrap();

        assert!(wait_until(Duration::from_secs(1), || {
            !provisioner.is_running()
        }));
        assert_eq!(*connecting.lock(), vec!["HomeNet".to_string()]);
        assert_eq!(*success.lock(), vec!["HomeNet".to_string()]);
        assert!(failure.lock().is_empty());
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_keeps_the_session_open_for_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        let provisioner = Provisioner::new(transport.clone());
        let (callbacks, _connecting, success, failure) = collecting_callbacks();

        provisioner
            .start(ProvisioningOptions::default(), callbacks)
            .unwrap();

        transport
            .events_tx
            .send(TransportEvent::Failed {
                reason: FailureReason::AuthError,
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(1), || {
            !failure.lock().is_empty()
        }));
        // Still advertising: the peer may retry with new credentials.
        assert!(provisioner.is_running());

        transport
            .events_tx
            .send(TransportEvent::Connected {
                ssid: "HomeNet".into(),
            })
            .unwrap();
        assert!(wait_until(Duration::from_secs(1), || {
            !success.lock().is_empty()
        }));
        provisioner.stop();
        assert!(!provisioner.is_running());
    }

    #[test]
    fn timeout_reports_failure_and_stops() {
        let transport = Arc::new(ScriptedTransport::new());
        let provisioner = Provisioner::new(transport.clone());
        let (callbacks, _c, _s, failure) = collecting_callbacks();

        provisioner
            .start(
                ProvisioningOptions {
                    timeout: Some(Duration::from_millis(50)),
                    ..Default::default()
                },
                callbacks,
            )
            .unwrap();

        assert!(wait_until(Duration::from_secs(1), || {
            !provisioner.is_running()
        }));
        assert_eq!(*failure.lock(), vec![FailureReason::Timeout]);
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let transport = Arc::new(ScriptedTransport::new());
        let provisioner = Provisioner::new(transport.clone());

        let (callbacks, ..) = collecting_callbacks();
        provisioner
            .start(ProvisioningOptions::default(), callbacks)
            .unwrap();

        let (callbacks, ..) = collecting_callbacks();
        provisioner
            .start(ProvisioningOptions::default(), callbacks)
            .unwrap();

        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
        provisioner.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let provisioner = Provisioner::new(transport.clone());

        provisioner.stop();
        assert!(!provisioner.is_running());

        let (callbacks, ..) = collecting_callbacks();
        provisioner
            .start(ProvisioningOptions::default(), callbacks)
            .unwrap();
        provisioner.stop();
        provisioner.stop();
        assert!(!provisioner.is_running());
    }
}
