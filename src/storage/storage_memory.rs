//! In-memory storage backend
//!
//! Objects live in a shared map keyed by bucket and object path. Cloning a
//! [`MemoryBackend`] shares the namespace, which lets several adapters (or a
//! test and an adapter) observe the same buckets.

use crate::error::{BackendError, BackendResult};
use crate::storage::storage_api::{BackendKind, ObjectBackend, ObjectReader, ObjectWriter};
use bytes::{Buf, Bytes};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, RwLock};

type ObjectMap = HashMap<(String, String), Bytes>;

/// In-memory storage backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<ObjectMap>>,
}

impl MemoryBackend {
    /// Create a new, empty memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the object body at `path`, if present
    pub fn object(&self, bucket: &str, path: &str) -> Option<Bytes> {
        let objects = self.objects.read().ok()?;
        objects.get(&(bucket.to_string(), path.to_string())).cloned()
    }

    /// Object paths stored in `bucket`, sorted
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = match self.objects.read() {
            Ok(objects) => objects
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, path)| path.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();
        paths
    }

    /// Total number of objects across all buckets
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    /// Whether no objects are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(operation: &str) -> BackendError {
    BackendError::OperationFailed {
        operation: operation.to_string(),
        reason: "object map lock poisoned".to_string(),
    }
}

impl ObjectBackend for MemoryBackend {
    /// A memory backend is its own configuration; pass a clone to share objects.
    type Config = MemoryBackend;

    fn connect(config: Self::Config) -> BackendResult<Self> {
        Ok(config)
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn open_writer(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(MemoryWriter {
            objects: Arc::clone(&self.objects),
            key: (bucket.to_string(), path.to_string()),
            buffer: Vec::new(),
        }))
    }

    fn open_reader(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectReader>> {
        let objects = self.objects.read().map_err(|_| poisoned("open_reader"))?;
        let data = objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                path: format!("{}/{}", bucket, path),
            })?;
        Ok(Box::new(MemoryReader {
            inner: data.reader(),
        }))
    }

    fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned("delete"))?;
        objects.remove(&(bucket.to_string(), path.to_string()));
        Ok(())
    }

    fn close(self) -> BackendResult<()> {
        Ok(())
    }
}

/// Buffers writes and publishes the object on close
struct MemoryWriter {
    objects: Arc<RwLock<ObjectMap>>,
    key: (String, String),
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for MemoryWriter {
    fn close(self: Box<Self>) -> BackendResult<()> {
        let MemoryWriter {
            objects,
            key,
            buffer,
        } = *self;
        let mut objects = objects.write().map_err(|_| poisoned("close_writer"))?;
        objects.insert(key, Bytes::from(buffer));
        Ok(())
    }
}

struct MemoryReader {
    inner: bytes::buf::Reader<Bytes>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ObjectReader for MemoryReader {
    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}
