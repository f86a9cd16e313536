//! Key-value adapter over an object-storage backend
//!
//! [`ObjectStoreAdapter`] maps the [`Store`] contract onto one bucket: each
//! key is one object at `join(base_path, key)` whose body is exactly the
//! codec output for the value. There is no index object; a key exists when
//! its object exists.

use crate::codec::{Codec, JsonCodec};
use crate::error::{BackendError, Error, Result};
use crate::storage::storage_api::ObjectBackend;
use crate::storage::storage_validation::{KeyValueValidator, Validator};
use crate::utils::{join_path, stays_below_prefix};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage-agnostic key-value contract
///
/// Application code written against `S: Store` runs unchanged on any backend.
pub trait Store {
    /// Store a value under `key`, replacing any previous value
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()>;

    /// Retrieve the value under `key`.
    ///
    /// `Ok(None)` means no value is stored; it is not an error. When the
    /// stored object exists but cannot be read or decoded, the error reports
    /// [`Error::object_found`] as `true`.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// Delete the value under `key`. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Retrieve into an existing value, returning whether the key was found.
    ///
    /// `value` is overwritten only when retrieval fully succeeds.
    fn get_into<T: DeserializeOwned>(&self, key: &str, value: &mut T) -> Result<bool> {
        match self.get(key)? {
            Some(found) => {
                *value = found;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Adapter construction options
#[derive(Debug, Clone)]
pub struct StoreOptions<C = JsonCodec> {
    /// Bucket holding the objects; must not be empty
    pub bucket_name: String,
    /// Prefix joined in front of every key
    pub base_path: String,
    /// Codec for object bodies; `None` selects the codec's default
    pub codec: Option<Arc<C>>,
}

impl<C> Default for StoreOptions<C> {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            base_path: String::new(),
            codec: None,
        }
    }
}

impl<C> StoreOptions<C> {
    /// Options for `bucket` with an empty base path and the default codec
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            ..Default::default()
        }
    }

    /// Set the base path
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the codec
    pub fn with_codec(mut self, codec: C) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    fn check(&self) -> Result<()> {
        if self.bucket_name.is_empty() {
            return Err(Error::Configuration {
                message: "The bucket name in the options must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Key-value store backed by one bucket of an object-storage backend
pub struct ObjectStoreAdapter<B: ObjectBackend, C: Codec = JsonCodec> {
    backend: B,
    bucket: String,
    base_path: String,
    codec: Arc<C>,
    validator: Arc<dyn Validator>,
}

impl<B: ObjectBackend, C: Codec + Default> ObjectStoreAdapter<B, C> {
    /// Validate the options, then open a backend client from `config`.
    ///
    /// The bucket name is checked before the backend is contacted.
    pub fn new(options: StoreOptions<C>, config: B::Config) -> Result<Self> {
        options.check()?;
        let backend = B::connect(config).map_err(|source| Error::BackendInit {
            operation: "backend.connect".to_string(),
            source,
        })?;
        Ok(Self::assemble(options, backend))
    }

    /// Build an adapter around an already opened backend client
    pub fn with_backend(options: StoreOptions<C>, backend: B) -> Result<Self> {
        options.check()?;
        Ok(Self::assemble(options, backend))
    }

    fn assemble(options: StoreOptions<C>, backend: B) -> Self {
        let codec = options.codec.unwrap_or_else(|| Arc::new(C::default()));
        info!(
            backend = %backend.backend_type(),
            bucket = %options.bucket_name,
            base_path = %options.base_path,
            codec = codec.name(),
            "opened key-value store"
        );
        Self {
            backend,
            bucket: options.bucket_name,
            base_path: options.base_path,
            codec,
            validator: Arc::new(KeyValueValidator::default()),
        }
    }
}

impl<B: ObjectBackend, C: Codec> ObjectStoreAdapter<B, C> {
    /// Replace the key/value validator
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Base path prefix
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Shared codec
    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    /// Backend client
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Object path a key is stored at
    pub fn object_path(&self, key: &str) -> String {
        join_path(&self.base_path, key)
    }

    /// Release the backend client
    pub fn close(self) -> Result<()> {
        let ObjectStoreAdapter {
            backend, bucket, ..
        } = self;
        backend.close().map_err(|source| Error::Close {
            operation: "backend.close".to_string(),
            source,
        })?;
        info!(bucket = %bucket, "closed key-value store");
        Ok(())
    }

    /// Validate a key and compute its object path
    fn resolve(&self, key: &str) -> Result<String> {
        self.validator
            .check_key(key)
            .map_err(|reason| Error::Validation {
                operation: "check_key".to_string(),
                reason,
            })?;

        if !stays_below_prefix(key) {
            return Err(Error::Validation {
                operation: "check_key".to_string(),
                reason: format!("Key {:?} resolves outside the base path", key),
            });
        }

        let path = self.object_path(key);
        self.validator
            .check_path(&path)
            .map_err(|reason| Error::Validation {
                operation: "check_path".to_string(),
                reason,
            })?;
        Ok(path)
    }
}

fn write_error(operation: &str, source: BackendError) -> Error {
    Error::Write {
        operation: operation.to_string(),
        source,
    }
}

fn read_error(operation: &str, source: BackendError) -> Error {
    Error::Read {
        operation: operation.to_string(),
        source,
    }
}

impl<B: ObjectBackend, C: Codec> Store for ObjectStoreAdapter<B, C> {
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.resolve(key)?;

        let data = self.codec.encode(value).map_err(|source| Error::Encoding {
            operation: "codec.encode".to_string(),
            source,
        })?;

        self.validator
            .check_value(&data)
            .map_err(|reason| Error::Validation {
                operation: "check_value".to_string(),
                reason,
            })?;

        let mut writer = self
            .backend
            .open_writer(&self.bucket, &path)
            .map_err(|source| write_error("writer.open", source))?;

        // The stream is closed whatever the write outcome
        let written = writer.write_all(&data);
        let closed = writer.close();

        match (written, closed) {
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(bucket = %self.bucket, path = %path, error = %close_err, "writer close failed after write error");
                }
                Err(write_error("writer.write", e.into()))
            }
            (Ok(()), Err(e)) => Err(write_error("writer.close", e)),
            (Ok(()), Ok(())) => {
                debug!(bucket = %self.bucket, path = %path, bytes = data.len(), "stored object");
                Ok(())
            }
        }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.resolve(key)?;

        let mut reader = match self.backend.open_reader(&self.bucket, &path) {
            Ok(reader) => reader,
            Err(e) if e.is_not_found() => {
                debug!(bucket = %self.bucket, path = %path, "object not found");
                return Ok(None);
            }
            Err(source) => {
                return Err(Error::Backend {
                    operation: "reader.open".to_string(),
                    source,
                })
            }
        };

        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data);
        let closed = reader.close();

        match (read, closed) {
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(bucket = %self.bucket, path = %path, error = %close_err, "reader close failed after read error");
                }
                return Err(read_error("reader.read", e.into()));
            }
            (Ok(_), Err(e)) => return Err(read_error("reader.close", e)),
            (Ok(_), Ok(())) => {}
        }

        let value = self.codec.decode(&data).map_err(|source| Error::Decoding {
            operation: "codec.decode".to_string(),
            source,
        })?;

        debug!(bucket = %self.bucket, path = %path, bytes = data.len(), "loaded object");
        Ok(Some(value))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;

        match self.backend.delete(&self.bucket, &path) {
            Ok(()) => {
                debug!(bucket = %self.bucket, path = %path, "deleted object");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(bucket = %self.bucket, path = %path, "object already absent");
                Ok(())
            }
            Err(source) => Err(Error::Delete {
                operation: "backend.delete".to_string(),
                source,
            }),
        }
    }
}

impl<B: ObjectBackend, C: Codec> std::fmt::Debug for ObjectStoreAdapter<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreAdapter")
            .field("backend", &self.backend.backend_type())
            .field("bucket", &self.bucket)
            .field("base_path", &self.base_path)
            .field("codec", &self.codec.name())
            .finish()
    }
}
