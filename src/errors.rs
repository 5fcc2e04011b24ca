use thiserror::Error;

/// Network protocol a remote path belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Ftp,
    Smb,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Ftp => write!(f, "FTP"),
            Protocol::Smb => write!(f, "SMB"),
        }
    }
}

/// Errors surfaced by orchestration operations.
///
/// `AuthRequired` and `TransientListing` are state signals rather than
/// user-facing failures: the controller turns the first into a credential
/// prompt and the second into a climb-to-parent retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Backend(String),

    #[error("{protocol}: {message}")]
    Network { protocol: Protocol, message: String },

    #[error("Authentication required for {path}")]
    AuthRequired { path: String },

    #[error("Cannot list '{path}': {message}")]
    TransientListing { path: String, message: String },

    #[error("Cannot open '{path}': {message}")]
    Terminal { path: String, message: String },

    #[error("Another operation is still running")]
    Busy,
}

pub type OperationResult<T> = Result<T, OperationError>;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse settings: {0}")]
    SettingsParse(#[from] toml_edit::de::Error),

    #[error("Could not write settings: {0}")]
    SettingsWrite(#[from] toml_edit::ser::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_is_prefixed_with_protocol() {
        let err = OperationError::Network {
            protocol: Protocol::Ftp,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "FTP: connection refused");
    }

    #[test]
    fn test_backend_error_passes_message_verbatim() {
        let err = OperationError::Backend("Access is denied.".to_string());
        assert_eq!(err.to_string(), "Access is denied.");
    }
}
