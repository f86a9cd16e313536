//! Object-storage backend API
//!
//! This module defines the contract the adapter relies on: a flat
//! bucket/object namespace with atomic per-object read, write and delete.
//! Reads and writes are streams that must be closed explicitly; closing a
//! write stream is what makes the object visible.

use crate::error::BackendResult;
use std::io::{Read, Write};

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process memory
    Memory,
    /// Local filesystem storage
    Local,
    /// AWS S3 or an S3-compatible service
    S3,
    /// Google Cloud Storage
    Gcs,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
        };
        f.write_str(name)
    }
}

/// Write stream to a single object
pub trait ObjectWriter: Write + Send {
    /// Finish the upload and release the stream.
    ///
    /// A writer dropped without being closed must not publish its content,
    /// and neither may a writer closed after one of its writes failed: such
    /// a close discards the upload and returns an error.
    fn close(self: Box<Self>) -> BackendResult<()>;
}

/// Read stream from a single object
pub trait ObjectReader: Read + Send {
    /// Release the stream
    fn close(self: Box<Self>) -> BackendResult<()>;
}

/// Object-storage backend client
///
/// Implementations must be safe to use from several threads at once; the
/// adapter performs no locking of its own.
pub trait ObjectBackend: Send + Sync + Sized {
    /// Backend-specific connection settings
    type Config;

    /// Open a client
    fn connect(config: Self::Config) -> BackendResult<Self>;

    /// Get storage backend type
    fn backend_type(&self) -> BackendKind;

    /// Open a write stream that creates or replaces the object at `path`
    fn open_writer(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectWriter>>;

    /// Open a read stream for the object at `path`.
    ///
    /// An absent object is reported as [`crate::error::BackendError::NotFound`].
    fn open_reader(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectReader>>;

    /// Delete the object at `path`
    fn delete(&self, bucket: &str, path: &str) -> BackendResult<()>;

    /// Release the client
    fn close(self) -> BackendResult<()>;
}
