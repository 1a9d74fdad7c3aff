//! Error types for frame-collector.

use thiserror::Error;

/// Main error type for all collector operations.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A collection session is already active on this controller.
    #[error("Collection already running")]
    AlreadyRunning,

    /// I/O error during connect, read or write on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote did not accept the connection in time.
    #[error("Connect to {addr} timed out")]
    ConnectTimeout { addr: String },

    /// A decoded frame could not be stored by the sink.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error (status and report output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectorError {
    /// True for failures of the underlying connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CollectorError::Io(_) | CollectorError::ConnectTimeout { .. }
        )
    }
}

/// Result type alias using CollectorError.
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let io = CollectorError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(io.is_transport());
        assert!(CollectorError::ConnectTimeout {
            addr: "127.0.0.1:1".into()
        }
        .is_transport());

        assert!(!CollectorError::AlreadyRunning.is_transport());
        assert!(!CollectorError::Persistence("disk full".into()).is_transport());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CollectorError::AlreadyRunning.to_string(),
            "Collection already running"
        );
        assert_eq!(
            CollectorError::Config("bad port".into()).to_string(),
            "Configuration error: bad port"
        );
    }
}
