//! Error types -- domain error definitions

/// Top-level topogen error type
#[derive(Debug, thiserror::Error)]
pub enum TopogenError {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Docker daemon interaction errors
    #[error("docker error: {0}")]
    Docker(#[from] DockerError),

    /// Signal handler installation errors
    #[error("signal error: {0}")]
    Signal(String),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be found
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config parsing failed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Docker daemon interaction errors
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// Endpoint string could not be resolved
    #[error("bad endpoint: {0}")]
    Endpoint(String),

    /// Connection to the daemon failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// A daemon API call failed
    #[error("api call failed: {0}")]
    Api(String),

    /// The event stream failed or was closed by the daemon
    #[error("event stream error: {0}")]
    EventStream(String),

    /// A referenced object does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "wait".to_owned(),
            reason: "max must be >= min".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wait"));
        assert!(msg.contains("max must be >= min"));
    }

    #[test]
    fn docker_error_display() {
        let err = DockerError::Endpoint("unsupported scheme 'ftp'".to_owned());
        assert!(err.to_string().contains("bad endpoint"));
    }

    #[test]
    fn config_error_converts_to_topogen_error() {
        let err = ConfigError::ParseFailed {
            reason: "unexpected token".to_owned(),
        };
        let top: TopogenError = err.into();
        assert!(matches!(top, TopogenError::Config(_)));
    }

    #[test]
    fn docker_error_converts_to_topogen_error() {
        let err = DockerError::Connection("socket not found".to_owned());
        let top: TopogenError = err.into();
        assert!(matches!(top, TopogenError::Docker(_)));
        assert!(top.to_string().contains("socket not found"));
    }

    #[test]
    fn io_error_converts_to_topogen_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let top: TopogenError = err.into();
        assert!(matches!(top, TopogenError::Io(_)));
    }
}
