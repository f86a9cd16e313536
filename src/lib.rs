//! # bucket-kv
//!
//! A key-value store adapter for object storage. Each key becomes one object
//! in a bucket, under an optional base path, holding the codec-encoded value.
//!
//! ## Features
//!
//! - **Storage Module**: The [`storage::Store`] contract, the bucket adapter,
//!   and memory, local filesystem, S3 and Google Cloud Storage backends
//! - **Codec Module**: Pluggable value encoding (JSON by default, bincode)
//! - **Error Module**: One error type naming the failing step of every operation
//!
//! ## Optional Features
//!
//! - `s3`: AWS S3 (and S3-compatible) storage backend
//! - `gcs`: Google Cloud Storage backend
//!
//! ## Example
//!
//! ```rust
//! use bucket_kv::prelude::*;
//!
//! let store: ObjectStoreAdapter<MemoryBackend> =
//!     ObjectStoreAdapter::new(StoreOptions::new("my-bucket"), MemoryBackend::new())?;
//!
//! store.set("greeting", &"hello")?;
//! let greeting: Option<String> = store.get("greeting")?;
//! assert_eq!(greeting.as_deref(), Some("hello"));
//!
//! // Absent keys are not errors
//! assert_eq!(store.get::<String>("missing")?, None);
//! # Ok::<(), bucket_kv::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod error;
pub mod codec;
pub mod storage;

// Utility modules
mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::codec::{BincodeCodec, Codec, JsonCodec};
    pub use crate::error::{BackendError, Error, Result};
    pub use crate::storage::{
        LocalBackend, LocalConfig, MemoryBackend, ObjectBackend, ObjectStoreAdapter, Store,
        StoreOptions,
    };

    #[cfg(feature = "s3")]
    pub use crate::storage::{S3Backend, S3Config};

    #[cfg(feature = "gcs")]
    pub use crate::storage::{GcsBackend, GcsConfig};
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "bucket-kv");
    }
}
