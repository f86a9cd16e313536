//! Storage module for key-value persistence on object storage
//!
//! This module provides the key-value adapter and the object-storage backends
//! it runs on:
//! - **Memory backend** - In-process objects, for tests and embedding
//! - **Local filesystem backend** - One directory per bucket
//! - **AWS S3 backend** - S3 and S3-compatible services (optional, requires `s3` feature)
//! - **Google Cloud Storage backend** - application default credentials (optional, requires `gcs` feature)
//!
//! The adapter only relies on the [`ObjectBackend`] trait, so backends are
//! interchangeable and application code only sees the [`Store`] trait.
//!
//! # Examples
//!
//! ## Memory backend
//!
//! ```rust
//! use bucket_kv::storage::{MemoryBackend, ObjectStoreAdapter, Store, StoreOptions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Foo {
//!     bar: String,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store: ObjectStoreAdapter<MemoryBackend> =
//!     ObjectStoreAdapter::new(StoreOptions::new("my-bucket"), MemoryBackend::new())?;
//!
//! store.set("foo123", &Foo { bar: "baz".to_string() })?;
//! let retrieved: Option<Foo> = store.get("foo123")?;
//! assert_eq!(retrieved, Some(Foo { bar: "baz".to_string() }));
//!
//! store.delete("foo123")?;
//! assert_eq!(store.get::<Foo>("foo123")?, None);
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## S3 backend (requires `s3` feature)
//!
//! ```rust,ignore
//! use bucket_kv::storage::{ObjectStoreAdapter, S3Backend, S3Config, Store, StoreOptions};
//!
//! let options = StoreOptions::new("my-bucket").with_base_path("sessions");
//! let store: ObjectStoreAdapter<S3Backend> =
//!     ObjectStoreAdapter::new(options, S3Config::default())?;
//! store.set("user-1", &"logged-in")?;
//! ```

pub mod adapter;
pub mod storage_api;
pub mod storage_memory;
pub mod storage_local;
pub mod storage_validation;

#[cfg(feature = "s3")]
pub mod storage_s3;

#[cfg(feature = "gcs")]
pub mod storage_gcs;

// Re-export main types for convenience
pub use adapter::{ObjectStoreAdapter, Store, StoreOptions};
pub use storage_api::{BackendKind, ObjectBackend, ObjectReader, ObjectWriter};
pub use storage_memory::MemoryBackend;
pub use storage_local::{LocalBackend, LocalConfig};
pub use storage_validation::{KeyValueValidator, Validator};

#[cfg(feature = "s3")]
pub use storage_s3::{S3Backend, S3Config};

#[cfg(feature = "gcs")]
pub use storage_gcs::{GcsBackend, GcsConfig};

/// Storage constants
pub mod constants {
    //! Limits applied by the default validator

    /// Maximum storage key length
    pub const MAX_KEY_LENGTH: usize = 1024;

    /// Maximum object path length, base path included (S3 and GCS object name limit)
    pub const MAX_OBJECT_PATH_LENGTH: usize = 1024;

    /// Maximum storage value size (1GB)
    pub const MAX_VALUE_SIZE: usize = 1024 * 1024 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(constants::MAX_KEY_LENGTH, 1024);
        assert_eq!(constants::MAX_OBJECT_PATH_LENGTH, 1024);
        assert_eq!(constants::MAX_VALUE_SIZE, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Memory.to_string(), "memory");
        assert_eq!(BackendKind::Local.to_string(), "local");
        assert_eq!(BackendKind::S3.to_string(), "s3");
        assert_eq!(BackendKind::Gcs.to_string(), "gcs");
    }
}
