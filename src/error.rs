//! Error types for the bucket-kv library
//!
//! Three layers of errors live here:
//! - [`Error`] is what every adapter operation returns. Each variant names the
//!   step that failed so a failure can be traced to open, write, read, decode
//!   or close without the adapter attempting any recovery.
//! - [`BackendError`] is what object-storage backends return.
//! - [`CodecError`] is what codecs return.

use thiserror::Error;

/// The main error type for adapter operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad construction input; fix the configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// Structurally invalid key or value; raised before any backend call
    #[error("Validation error: {operation}: {reason}")]
    Validation {
        /// Validation step that rejected the input
        operation: String,
        /// Why the input was rejected
        reason: String,
    },

    /// The codec could not encode the value
    #[error("Encoding error: {operation}: {source}")]
    Encoding {
        /// Codec step that failed
        operation: String,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// The codec could not decode the stored object
    #[error("Decoding error: {operation}: {source}")]
    Decoding {
        /// Codec step that failed
        operation: String,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// The backend client could not be opened
    #[error("Backend init error: {operation}: {source}")]
    BackendInit {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },

    /// Opening an object for reading failed for a reason other than absence
    #[error("Backend error: {operation}: {source}")]
    Backend {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },

    /// Opening, writing or closing a write stream failed
    #[error("Write error: {operation}: {source}")]
    Write {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },

    /// Reading or closing a read stream failed after a successful open
    #[error("Read error: {operation}: {source}")]
    Read {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },

    /// The backend refused to delete an object
    #[error("Delete error: {operation}: {source}")]
    Delete {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },

    /// Releasing the backend client failed
    #[error("Close error: {operation}: {source}")]
    Close {
        /// Backend step that failed
        operation: String,
        /// Underlying backend failure
        #[source]
        source: BackendError,
    },
}

impl Error {
    /// Whether an object existed at the requested path when this error was raised.
    ///
    /// Only retrieval distinguishes presence: a read or decode failure means
    /// the object was there but unreadable or corrupt. Every other error
    /// reports `false`.
    pub fn object_found(&self) -> bool {
        matches!(self, Error::Read { .. } | Error::Decoding { .. })
    }

    /// The step that produced this error
    pub fn operation(&self) -> &str {
        match self {
            Error::Configuration { .. } => "configure",
            Error::Validation { operation, .. }
            | Error::Encoding { operation, .. }
            | Error::Decoding { operation, .. }
            | Error::BackendInit { operation, .. }
            | Error::Backend { operation, .. }
            | Error::Write { operation, .. }
            | Error::Read { operation, .. }
            | Error::Delete { operation, .. }
            | Error::Close { operation, .. } => operation,
        }
    }

    /// The underlying backend failure, if this error wraps one
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Error::BackendInit { source, .. }
            | Error::Backend { source, .. }
            | Error::Write { source, .. }
            | Error::Read { source, .. }
            | Error::Delete { source, .. }
            | Error::Close { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors reported by object-storage backends
#[derive(Error, Debug)]
pub enum BackendError {
    /// No object exists at the path
    #[error("Object not found: {path}")]
    NotFound {
        /// Path that was looked up
        path: String,
    },

    /// Permission denied
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// Bucket, object or file the access was refused on
        resource: String,
    },

    /// Authentication failed or no credentials were found
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Why credentials were rejected or unavailable
        reason: String,
    },

    /// Connection error
    #[error("Connection error: {reason}")]
    ConnectionError {
        /// Transport-level failure description
        reason: String,
    },

    /// The object path cannot be represented by this backend
    #[error("Invalid object path: {path}: {reason}")]
    InvalidPath {
        /// Offending bucket or object path
        path: String,
        /// Why the path cannot be used
        reason: String,
    },

    /// Backend operation failed
    #[error("Backend operation failed: {operation}: {reason}")]
    OperationFailed {
        /// Backend operation that failed
        operation: String,
        /// Failure description
        reason: String,
    },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether this error reports an absent object
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound { .. } => true,
            BackendError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Codec-specific error types
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON encoding or decoding failed
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode encoding failed
    #[error("Bincode encode error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Bincode decoding failed
    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Input left over after a complete value was decoded
    #[error("Trailing data: {remaining} bytes after value")]
    TrailingData {
        /// Number of undecoded bytes
        remaining: usize,
    },
}

/// Convenience type alias for adapter Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for backend Results
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Convenience type alias for codec Results
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_step() {
        let error = Error::Write {
            operation: "writer.close".to_string(),
            source: BackendError::ConnectionError {
                reason: "reset by peer".to_string(),
            },
        };
        let message = error.to_string();
        assert!(message.contains("Write error"));
        assert!(message.contains("writer.close"));
        assert!(message.contains("reset by peer"));
        assert_eq!(error.operation(), "writer.close");
    }

    #[test]
    fn test_object_found_only_for_read_and_decode() {
        let read = Error::Read {
            operation: "reader.read".to_string(),
            source: BackendError::Io(std::io::Error::other("boom")),
        };
        let decode = Error::Decoding {
            operation: "codec.decode".to_string(),
            source: CodecError::TrailingData { remaining: 3 },
        };
        let backend = Error::Backend {
            operation: "reader.open".to_string(),
            source: BackendError::PermissionDenied {
                resource: "bucket/key".to_string(),
            },
        };
        assert!(read.object_found());
        assert!(decode.object_found());
        assert!(!backend.object_found());
        assert!(backend.backend_error().is_some());
        assert!(decode.backend_error().is_none());
    }

    #[test]
    fn test_backend_not_found_detection() {
        assert!(BackendError::NotFound {
            path: "a".to_string()
        }
        .is_not_found());
        assert!(BackendError::Io(std::io::ErrorKind::NotFound.into()).is_not_found());
        assert!(!BackendError::ConnectionError {
            reason: "x".to_string()
        }
        .is_not_found());
    }
}
