//! Engine error types.
//!
//! [`EngineError`] covers everything that can fail inside the generation
//! engine. It converts into [`TopogenError`] so callers can propagate with
//! `?` across the crate boundary.
//!
//! Most engine failures are handled where they occur (logged, then skipped
//! or retried with backoff); only setup failures surface out of the public
//! API. See the error taxonomy on [`crate::generator::Generator`].

use topogen_core::error::{DockerError, TopogenError};

/// Domain-specific errors for the generation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Endpoint string could not be resolved
    #[error("bad endpoint: {0}")]
    Endpoint(String),

    /// Docker daemon connection failed
    #[error("docker connection error: {0}")]
    Connection(String),

    /// Docker API call failed
    #[error("docker api error: {0}")]
    Api(String),

    /// Event stream failed or was closed by the daemon
    #[error("event stream error: {0}")]
    EventStream(String),

    /// A referenced object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Signal handler could not be installed
    #[error("signal handler error: {0}")]
    Signal(String),
}

impl From<EngineError> for TopogenError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Endpoint(msg) => TopogenError::Docker(DockerError::Endpoint(msg)),
            EngineError::Connection(msg) => TopogenError::Docker(DockerError::Connection(msg)),
            EngineError::Api(msg) => TopogenError::Docker(DockerError::Api(msg)),
            EngineError::EventStream(msg) => TopogenError::Docker(DockerError::EventStream(msg)),
            EngineError::NotFound(msg) => TopogenError::Docker(DockerError::NotFound(msg)),
            EngineError::Signal(msg) => TopogenError::Signal(msg),
        }
    }
}
