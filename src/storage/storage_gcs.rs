//! Google Cloud Storage backend implementation
//!
//! Authenticates with application default credentials, the same way other
//! Google clients do: `GOOGLE_APPLICATION_CREDENTIALS` (or `SERVICE_ACCOUNT`)
//! names a service account key file, or `GOOGLE_APPLICATION_CREDENTIALS_JSON`
//! (or `SERVICE_ACCOUNT_JSON`) holds the key itself.
//!
//! The `cloud-storage` client is async; this backend owns a tokio runtime and
//! blocks on it, so its methods must not be called from inside another async
//! runtime.

use cloud_storage::Client;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

use crate::error::{BackendError, BackendResult};
use crate::storage::storage_api::{BackendKind, ObjectBackend, ObjectReader, ObjectWriter};

const KEY_JSON_VARS: [&str; 2] = ["GOOGLE_APPLICATION_CREDENTIALS_JSON", "SERVICE_ACCOUNT_JSON"];
const KEY_FILE_VARS: [&str; 2] = ["GOOGLE_APPLICATION_CREDENTIALS", "SERVICE_ACCOUNT"];

/// GCS storage configuration
#[derive(Debug, Clone)]
pub struct GcsConfig {
    /// Content type recorded on written objects
    pub content_type: String,
    /// Fail at connect time when no service account credentials are configured
    pub require_credentials: bool,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            require_credentials: true,
        }
    }
}

/// Google Cloud Storage backend
pub struct GcsBackend {
    client: Arc<Client>,
    runtime: Runtime,
    config: GcsConfig,
}

/// Check that application default credentials are configured.
///
/// `lookup` reads an environment variable.
fn verify_credentials(lookup: impl Fn(&str) -> Option<String>) -> BackendResult<()> {
    if KEY_JSON_VARS
        .iter()
        .any(|var| lookup(*var).is_some_and(|value| !value.trim().is_empty()))
    {
        return Ok(());
    }

    for var in KEY_FILE_VARS {
        if let Some(path) = lookup(var) {
            if Path::new(&path).is_file() {
                return Ok(());
            }
            return Err(BackendError::AuthenticationFailed {
                reason: format!("{} points to a missing key file: {}", var, path),
            });
        }
    }

    Err(BackendError::AuthenticationFailed {
        reason: "no service account credentials found; set GOOGLE_APPLICATION_CREDENTIALS"
            .to_string(),
    })
}

/// Classify a `cloud-storage` error by its message
fn classify_error(operation: &str, path: &str, message: String) -> BackendError {
    if message.contains("404") || message.contains("No such object") {
        BackendError::NotFound {
            path: path.to_string(),
        }
    } else if message.contains("403") {
        BackendError::PermissionDenied {
            resource: path.to_string(),
        }
    } else if message.contains("401") {
        BackendError::AuthenticationFailed { reason: message }
    } else if message.contains("error sending request") {
        BackendError::ConnectionError { reason: message }
    } else {
        BackendError::OperationFailed {
            operation: operation.to_string(),
            reason: message,
        }
    }
}

fn map_gcs_error(operation: &str, path: &str, e: cloud_storage::Error) -> BackendError {
    classify_error(operation, path, e.to_string())
}

impl ObjectBackend for GcsBackend {
    type Config = GcsConfig;

    fn connect(config: GcsConfig) -> BackendResult<Self> {
        if config.require_credentials {
            verify_credentials(|var| std::env::var(var).ok())?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("bucket-kv-gcs")
            .build()
            .map_err(|e| BackendError::ConnectionError {
                reason: format!("Failed to start GCS runtime: {}", e),
            })?;

        let client = {
            let _guard = runtime.enter();
            Arc::new(Client::default())
        };

        info!(content_type = %config.content_type, "opened GCS storage backend");
        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::Gcs
    }

    fn open_writer(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(GcsWriter {
            client: Arc::clone(&self.client),
            handle: self.runtime.handle().clone(),
            bucket: bucket.to_string(),
            path: path.to_string(),
            content_type: self.config.content_type.clone(),
            buffer: Vec::new(),
        }))
    }

    fn open_reader(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectReader>> {
        let data = self
            .runtime
            .block_on(self.client.object().download(bucket, path))
            .map_err(|e| map_gcs_error("download", &format!("{}/{}", bucket, path), e))?;

        debug!(bucket = %bucket, path = %path, bytes = data.len(), "downloaded object");
        Ok(Box::new(GcsReader {
            inner: Cursor::new(data),
        }))
    }

    fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        self.runtime
            .block_on(self.client.object().delete(bucket, path))
            .map_err(|e| map_gcs_error("delete", &format!("{}/{}", bucket, path), e))
    }

    fn close(self) -> BackendResult<()> {
        drop(self.client);
        self.runtime.shutdown_timeout(Duration::from_secs(10));
        info!("closed GCS storage backend");
        Ok(())
    }
}

/// Buffers the object body and uploads it on close
struct GcsWriter {
    client: Arc<Client>,
    handle: Handle,
    bucket: String,
    path: String,
    content_type: String,
    buffer: Vec<u8>,
}

impl Write for GcsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for GcsWriter {
    fn close(mut self: Box<Self>) -> BackendResult<()> {
        let data = std::mem::take(&mut self.buffer);
        debug!(bucket = %self.bucket, path = %self.path, bytes = data.len(), "uploading object");

        self.handle
            .block_on(self.client.object().create(
                &self.bucket,
                data,
                &self.path,
                &self.content_type,
            ))
            .map_err(|e| map_gcs_error("create", &self.path, e))?;
        Ok(())
    }
}

struct GcsReader {
    inner: Cursor<Vec<u8>>,
}

impl Read for GcsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ObjectReader for GcsReader {
    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_gcs_config_default() {
        let config = GcsConfig::default();
        assert_eq!(config.content_type, "application/octet-stream");
        assert!(config.require_credentials);
    }

    #[test]
    fn test_credentials_from_inline_key() {
        let inline = env(&[("SERVICE_ACCOUNT_JSON", r#"{"type":"service_account"}"#)]);
        assert!(verify_credentials(inline).is_ok());

        let blank = env(&[("GOOGLE_APPLICATION_CREDENTIALS_JSON", "  ")]);
        assert!(verify_credentials(blank).is_err());
    }

    #[test]
    fn test_credentials_from_key_file() {
        let key_file = tempfile::NamedTempFile::new().unwrap();
        let path = key_file.path().to_string_lossy().to_string();
        assert!(verify_credentials(env(&[("GOOGLE_APPLICATION_CREDENTIALS", path.as_str())])).is_ok());

        let missing = verify_credentials(env(&[(
            "GOOGLE_APPLICATION_CREDENTIALS",
            "/nonexistent/key.json",
        )]));
        assert!(matches!(missing, Err(BackendError::AuthenticationFailed { .. })));
    }

    #[test]
    fn test_missing_credentials() {
        let result = verify_credentials(env(&[]));
        assert!(matches!(result, Err(BackendError::AuthenticationFailed { .. })));
    }

    #[test]
    fn test_error_classification() {
        let not_found = classify_error("download", "b/k", "No such object: b/k".to_string());
        assert!(not_found.is_not_found());
        assert!(classify_error("delete", "b/k", "code: 404".to_string()).is_not_found());
        assert!(matches!(
            classify_error("create", "b/k", "code: 403, Forbidden".to_string()),
            BackendError::PermissionDenied { .. }
        ));
        assert!(matches!(
            classify_error("create", "b/k", "error sending request for url".to_string()),
            BackendError::ConnectionError { .. }
        ));
        assert!(matches!(
            classify_error("create", "b/k", "quota exceeded".to_string()),
            BackendError::OperationFailed { .. }
        ));
    }

    // Requires real credentials and a bucket named by BUCKET_KV_GCS_TEST_BUCKET.
    // Run with: cargo test --features gcs -- --ignored
    #[test]
    #[ignore]
    fn test_gcs_round_trip() {
        let bucket = std::env::var("BUCKET_KV_GCS_TEST_BUCKET").unwrap();
        let backend = GcsBackend::connect(GcsConfig::default()).unwrap();

        let mut writer = backend.open_writer(&bucket, "bucket-kv/test/hello").unwrap();
        writer.write_all(b"Hello, GCS!").unwrap();
        writer.close().unwrap();

        let mut reader = backend.open_reader(&bucket, "bucket-kv/test/hello").unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        reader.close().unwrap();
        assert_eq!(data, b"Hello, GCS!");

        backend.delete(&bucket, "bucket-kv/test/hello").unwrap();
        let missing = backend.open_reader(&bucket, "bucket-kv/test/hello");
        assert!(matches!(missing, Err(BackendError::NotFound { .. })));
        backend.close().unwrap();
    }
}
