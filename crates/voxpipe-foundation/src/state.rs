use crate::error::PipelineError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Initializing,
    Provisioning,
    Running,
    Stopping,
    Stopped,
}

/// Validated application lifecycle with a subscription channel so other
/// components can observe transitions.
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: Sender<AppState>,
    state_rx: Receiver<AppState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(AppState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: AppState) -> Result<(), PipelineError> {
        let mut current = self.state.write();

        // A pre-provisioned device skips Provisioning entirely.
        let valid = matches!(
            (&*current, &new_state),
            (AppState::Initializing, AppState::Provisioning)
                | (AppState::Initializing, AppState::Running)
                | (AppState::Provisioning, AppState::Running)
                | (AppState::Provisioning, AppState::Stopping)
                | (AppState::Running, AppState::Stopping)
                | (AppState::Stopping, AppState::Stopped)
        );

        if !valid {
            return Err(PipelineError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<AppState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_is_valid() {
        let mgr = StateManager::new();
        mgr.transition(AppState::Provisioning).unwrap();
        mgr.transition(AppState::Running).unwrap();
        mgr.transition(AppState::Stopping).unwrap();
        mgr.transition(AppState::Stopped).unwrap();
        assert_eq!(mgr.current(), AppState::Stopped);
    }

    #[test]
    fn provisioning_can_be_skipped() {
        let mgr = StateManager::new();
        mgr.transition(AppState::Running).unwrap();
        assert_eq!(mgr.current(), AppState::Running);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mgr = StateManager::new();
        assert!(mgr.transition(AppState::Stopped).is_err());
        assert_eq!(mgr.current(), AppState::Initializing);
    }

    #[test]
    fn subscribers_observe_transitions() {
        let mgr = StateManager::new();
        let rx = mgr.subscribe();
        mgr.transition(AppState::Running).unwrap();
        assert_eq!(rx.try_recv().unwrap(), AppState::Running);
    }
}
