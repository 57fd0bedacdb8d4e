use thiserror::Error;

/// Unified error type for pdf-assembler-core
///
/// Request-level failures fall into four kinds that the web layer turns
/// into status codes:
/// - invalid input (empty or malformed requests, non-PDF uploads)
/// - unknown identifiers
/// - bytes that do not parse as a PDF
/// - storage faults
///
/// Configuration errors only occur at startup.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Request Errors
    // ==========================================================================
    /// Empty or malformed request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Identifier does not resolve to a stored document
    #[error("document not found: {0}")]
    NotFound(String),

    /// Bytes could not be parsed or re-serialized as a PDF
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// I/O-level fault in the document store
    #[error("storage failure: {0}")]
    StorageFailure(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`], used at request boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    MalformedDocument,
    StorageFailure,
    Config,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MalformedDocument(_) => ErrorKind::MalformedDocument,
            Self::StorageFailure(_) | Self::Io(_) => ErrorKind::StorageFailure,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorKind::Config,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Self::MalformedDocument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_storage_failures() {
        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "document not found: abc");
    }
}
