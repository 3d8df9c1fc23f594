use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Front-end engine error: {0}")]
    Frontend(String),

    #[error("Worker thread failed to spawn: {0}")]
    Spawn(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay: Duration },
    Ignore,
    Restart,
    Fatal,
}

impl PipelineError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            PipelineError::Transient(_) => RecoveryStrategy::Retry {
                max_attempts: 3,
                delay: Duration::from_millis(500),
            },
            PipelineError::Frontend(_) => RecoveryStrategy::Restart,
            PipelineError::Fatal(_) | PipelineError::ShutdownRequested => RecoveryStrategy::Fatal,
            PipelineError::Config(_) | PipelineError::Spawn(_) => RecoveryStrategy::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_retry() {
        let err = PipelineError::Transient("queue hiccup".into());
        assert!(matches!(
            err.recovery_strategy(),
            RecoveryStrategy::Retry { .. }
        ));
    }

    #[test]
    fn fatal_errors_do_not_retry() {
        let err = PipelineError::Fatal("engine gone".into());
        assert!(matches!(err.recovery_strategy(), RecoveryStrategy::Fatal));
    }
}
