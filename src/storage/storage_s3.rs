//! AWS S3 storage backend implementation
//!
//! Works with AWS S3 and S3-compatible services (MinIO, Ceph) by pointing
//! [`S3Config::endpoint_url`] at the service.
//!
//! The SDK is async; this backend owns a tokio runtime and blocks on it, so
//! its methods must not be called from inside another async runtime. Wrap
//! calls in `spawn_blocking` there.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::ProvideCredentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ServerSideEncryption};
use aws_sdk_s3::Client as S3Client;
use bytes::{Buf, Bytes};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

use crate::error::{BackendError, BackendResult};
use crate::storage::storage_api::{BackendKind, ObjectBackend, ObjectReader, ObjectWriter};

/// S3 storage configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region
    pub region: String,
    /// AWS access key ID (optional, can use IAM roles)
    pub access_key_id: Option<String>,
    /// AWS secret access key (optional, can use IAM roles)
    pub secret_access_key: Option<String>,
    /// S3 endpoint URL (for S3-compatible services)
    pub endpoint_url: Option<String>,
    /// Enable path-style addressing
    pub path_style: bool,
    /// Request server-side encryption for written objects
    pub server_side_encryption: bool,
    /// Multipart upload threshold (bytes)
    pub multipart_threshold: u64,
    /// Multipart chunk size (bytes)
    pub multipart_chunk_size: u64,
    /// Fail at connect time when no credentials can be resolved
    pub require_credentials: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            path_style: false,
            server_side_encryption: false,
            multipart_threshold: 100 * 1024 * 1024, // 100MB
            multipart_chunk_size: 10 * 1024 * 1024,  // 10MB
            require_credentials: true,
        }
    }
}

/// S3 storage backend
pub struct S3Backend {
    client: S3Client,
    runtime: Runtime,
    config: S3Config,
}

impl S3Backend {
    /// Build AWS configuration
    async fn build_aws_config(config: &S3Config) -> aws_config::SdkConfig {
        let mut builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        // Set credentials if provided
        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "bucket-kv",
            ));
        }

        // Set custom endpoint if provided
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        builder.load().await
    }

    /// Resolve credentials once so a missing setup fails at connect time
    async fn verify_credentials(sdk_config: &aws_config::SdkConfig) -> BackendResult<()> {
        let provider = sdk_config
            .credentials_provider()
            .ok_or_else(|| BackendError::AuthenticationFailed {
                reason: "no credentials provider configured".to_string(),
            })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| BackendError::AuthenticationFailed {
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

fn map_sdk_error<E>(operation: &str, path: &str, e: SdkError<E, HttpResponse>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = e.raw_response().map(|response| response.status().as_u16());
    match status {
        Some(404) => BackendError::NotFound {
            path: path.to_string(),
        },
        Some(403) => BackendError::PermissionDenied {
            resource: path.to_string(),
        },
        Some(401) => BackendError::AuthenticationFailed {
            reason: DisplayErrorContext(&e).to_string(),
        },
        _ => match e {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                BackendError::ConnectionError {
                    reason: DisplayErrorContext(&e).to_string(),
                }
            }
            _ => BackendError::OperationFailed {
                operation: operation.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            },
        },
    }
}

impl ObjectBackend for S3Backend {
    type Config = S3Config;

    fn connect(config: S3Config) -> BackendResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("bucket-kv-s3")
            .build()
            .map_err(|e| BackendError::ConnectionError {
                reason: format!("Failed to start S3 runtime: {}", e),
            })?;

        let sdk_config = runtime.block_on(Self::build_aws_config(&config));
        if config.require_credentials {
            runtime.block_on(Self::verify_credentials(&sdk_config))?;
        }

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();
        let client = S3Client::from_conf(s3_config);

        info!(
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "opened S3 storage backend"
        );
        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::S3
    }

    fn open_writer(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(S3Writer {
            client: self.client.clone(),
            handle: self.runtime.handle().clone(),
            bucket: bucket.to_string(),
            key: path.to_string(),
            buffer: Vec::new(),
            server_side_encryption: self.config.server_side_encryption,
            multipart_threshold: self.config.multipart_threshold,
            multipart_chunk_size: self.config.multipart_chunk_size,
        }))
    }

    fn open_reader(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectReader>> {
        let response = self
            .runtime
            .block_on(self.client.get_object().bucket(bucket).key(path).send())
            .map_err(|e| match e {
                SdkError::ServiceError(ref service_err) if service_err.err().is_no_such_key() => {
                    BackendError::NotFound {
                        path: format!("{}/{}", bucket, path),
                    }
                }
                _ => map_sdk_error("get_object", path, e),
            })?;

        Ok(Box::new(S3Reader {
            handle: self.runtime.handle().clone(),
            body: Some(response.body),
            data: None,
        }))
    }

    fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        self.runtime
            .block_on(self.client.delete_object().bucket(bucket).key(path).send())
            .map_err(|e| map_sdk_error("delete_object", path, e))?;
        Ok(())
    }

    fn close(self) -> BackendResult<()> {
        drop(self.client);
        self.runtime.shutdown_timeout(Duration::from_secs(10));
        info!("closed S3 storage backend");
        Ok(())
    }
}

/// Buffers the object body and uploads it on close
struct S3Writer {
    client: S3Client,
    handle: Handle,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
    server_side_encryption: bool,
    multipart_threshold: u64,
    multipart_chunk_size: u64,
}

impl S3Writer {
    fn encryption(&self) -> Option<ServerSideEncryption> {
        self.server_side_encryption
            .then_some(ServerSideEncryption::Aes256)
    }

    async fn put_object(&self, data: Bytes) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_server_side_encryption(self.encryption())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error("put_object", &self.key, e))?;
        Ok(())
    }

    /// Perform multipart upload for large objects
    async fn multipart_upload(&self, data: Bytes) -> BackendResult<()> {
        let create_output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_server_side_encryption(self.encryption())
            .send()
            .await
            .map_err(|e| map_sdk_error("create_multipart_upload", &self.key, e))?;

        let upload_id = create_output
            .upload_id
            .ok_or_else(|| BackendError::OperationFailed {
                operation: "create_multipart_upload".to_string(),
                reason: "No upload ID returned".to_string(),
            })?;

        match self.upload_parts(&upload_id, data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key = %self.key,
                        error = %DisplayErrorContext(&abort_err),
                        "failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(&self, upload_id: &str, data: Bytes) -> BackendResult<()> {
        let mut completed_parts = Vec::new();
        let chunk_size = self.multipart_chunk_size.max(1) as usize;

        for (index, chunk) in data.chunks(chunk_size).enumerate() {
            let part_number = (index + 1) as i32;

            let upload_part_output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data.slice_ref(chunk)))
                .send()
                .await
                .map_err(|e| map_sdk_error("upload_part", &self.key, e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(upload_part_output.e_tag)
                    .build(),
            );
        }

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| map_sdk_error("complete_multipart_upload", &self.key, e))?;

        Ok(())
    }
}

impl Write for S3Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for S3Writer {
    fn close(mut self: Box<Self>) -> BackendResult<()> {
        let data = Bytes::from(std::mem::take(&mut self.buffer));
        debug!(bucket = %self.bucket, key = %self.key, bytes = data.len(), "uploading object");

        let handle = self.handle.clone();
        if data.len() as u64 > self.multipart_threshold {
            handle.block_on(self.multipart_upload(data))
        } else {
            handle.block_on(self.put_object(data))
        }
    }
}

/// Collects the response body on first read
struct S3Reader {
    handle: Handle,
    body: Option<ByteStream>,
    data: Option<bytes::buf::Reader<Bytes>>,
}

impl Read for S3Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_none() {
            let body = self
                .body
                .take()
                .ok_or_else(|| io::Error::other("response body already consumed"))?;
            let collected = self
                .handle
                .block_on(body.collect())
                .map_err(io::Error::other)?;
            self.data = Some(collected.into_bytes().reader());
        }

        match self.data.as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl ObjectReader for S3Reader {
    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_config_default() {
        let config = S3Config::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.multipart_threshold, 100 * 1024 * 1024);
        assert_eq!(config.multipart_chunk_size, 10 * 1024 * 1024);
        assert!(!config.server_side_encryption);
        assert!(config.require_credentials);
    }

    #[test]
    fn test_connect_with_static_credentials() {
        let config = S3Config {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            endpoint_url: Some("http://127.0.0.1:9000".to_string()),
            path_style: true,
            ..Default::default()
        };

        // No request is sent until an object is touched
        let backend = S3Backend::connect(config).unwrap();
        assert_eq!(backend.backend_type(), BackendKind::S3);
        backend.close().unwrap();
    }
}
