//! Local filesystem storage backend
//!
//! Each bucket is a directory under [`LocalConfig::root`] and each object is a
//! file at its object path inside that directory. Writes go to a uniquely
//! named temporary file that is renamed over the target on close, so readers
//! see either the old or the new body, never a partial one. A writer that saw
//! a failed write discards its temporary file on close.
//!
//! A file cannot also be a directory, so an object cannot be stored at a path
//! that is a prefix of another object's path (`a` and `a/b`). Reads and
//! deletes of such a path report the object as absent; writes are rejected
//! with [`BackendError::InvalidPath`].

use crate::error::{BackendError, BackendResult};
use crate::storage::storage_api::{BackendKind, ObjectBackend, ObjectReader, ObjectWriter};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Local storage configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Directory holding one subdirectory per bucket
    pub root: PathBuf,
    /// Create directories if they don't exist
    pub create_dirs: bool,
    /// Use atomic writes (write to temp file, then rename)
    pub atomic_writes: bool,
    /// File permissions (Unix only)
    pub file_permissions: Option<u32>,
    /// Directory permissions (Unix only)
    pub dir_permissions: Option<u32>,
    /// Maximum object size (bytes)
    pub max_file_size: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage"),
            create_dirs: true,
            atomic_writes: true,
            file_permissions: Some(0o644),
            dir_permissions: Some(0o755),
            max_file_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    config: LocalConfig,
}

impl LocalBackend {
    /// Root directory of this backend
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn bucket_dir(&self, bucket: &str) -> BackendResult<PathBuf> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.config.root.join(bucket)),
            _ => Err(BackendError::InvalidPath {
                path: bucket.to_string(),
                reason: "bucket must be a single path component".to_string(),
            }),
        }
    }

    /// Get the file path for an object, refusing paths that leave the bucket
    fn object_file(&self, bucket: &str, path: &str) -> BackendResult<(PathBuf, PathBuf)> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let relative = path.trim_start_matches('/');
        let invalid = |reason: &str| BackendError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if relative.is_empty() {
            return Err(invalid("empty object path"));
        }
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(invalid("object path must be clean and stay inside the bucket"));
            }
        }

        let file = bucket_dir.join(relative);
        Ok((bucket_dir, file))
    }

    /// Ensure parent directory exists
    fn ensure_parent_dir(&self, path: &Path) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() && self.config.create_dirs {
                fs::create_dir_all(parent).map_err(|e| BackendError::OperationFailed {
                    operation: "create_parent_directory".to_string(),
                    reason: format!("Failed to create parent directory: {}", e),
                })?;

                // Set directory permissions on Unix
                #[cfg(unix)]
                if let Some(perms) = self.config.dir_permissions {
                    use std::os::unix::fs::PermissionsExt;
                    let permissions = fs::Permissions::from_mode(perms);
                    fs::set_permissions(parent, permissions).map_err(|e| {
                        BackendError::OperationFailed {
                            operation: "set_directory_permissions".to_string(),
                            reason: format!("Failed to set directory permissions: {}", e),
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Whether a file sits at some ancestor of `file` below the bucket directory
    fn has_file_ancestor(bucket_dir: &Path, file: &Path) -> bool {
        file.ancestors()
            .skip(1)
            .take_while(|dir| *dir != bucket_dir && dir.starts_with(bucket_dir))
            .any(|dir| dir.is_file())
    }

    /// Map a stat/remove failure, treating a path shadowed by a file as absent
    fn lookup_error(operation: &str, bucket_dir: &Path, file: &Path, e: io::Error) -> BackendError {
        if e.kind() != io::ErrorKind::NotFound && Self::has_file_ancestor(bucket_dir, file) {
            return BackendError::NotFound {
                path: file.to_string_lossy().to_string(),
            };
        }
        map_io(operation, file, e)
    }

    /// Remove directories left empty by a delete, up to the bucket directory
    fn prune_empty_parents(bucket_dir: &Path, file: &Path) {
        let mut current = file.parent();
        while let Some(dir) = current {
            if dir == bucket_dir || !dir.starts_with(bucket_dir) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn map_io(operation: &str, path: &Path, e: io::Error) -> BackendError {
    match e.kind() {
        io::ErrorKind::NotFound => BackendError::NotFound {
            path: path.to_string_lossy().to_string(),
        },
        io::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
            resource: path.to_string_lossy().to_string(),
        },
        _ => BackendError::OperationFailed {
            operation: operation.to_string(),
            reason: e.to_string(),
        },
    }
}

impl ObjectBackend for LocalBackend {
    type Config = LocalConfig;

    fn connect(config: LocalConfig) -> BackendResult<Self> {
        // Create root directory if it doesn't exist
        if config.create_dirs && !config.root.exists() {
            fs::create_dir_all(&config.root).map_err(|e| BackendError::OperationFailed {
                operation: "create_root_directory".to_string(),
                reason: format!("Failed to create root directory: {}", e),
            })?;
        }

        if !config.root.exists() {
            return Err(BackendError::OperationFailed {
                operation: "verify_root_directory".to_string(),
                reason: "Root directory does not exist and create_dirs is disabled".to_string(),
            });
        }

        if !config.root.is_dir() {
            return Err(BackendError::OperationFailed {
                operation: "verify_root_directory".to_string(),
                reason: "Root path exists but is not a directory".to_string(),
            });
        }

        info!(root = %config.root.display(), "opened local storage backend");
        Ok(Self { config })
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::Local
    }

    fn open_writer(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectWriter>> {
        let (bucket_dir, target) = self.object_file(bucket, path)?;
        if Self::has_file_ancestor(&bucket_dir, &target) {
            return Err(BackendError::InvalidPath {
                path: path.to_string(),
                reason: "an object already exists at a parent path".to_string(),
            });
        }
        if target.is_dir() {
            return Err(BackendError::InvalidPath {
                path: path.to_string(),
                reason: "nested objects already exist below this path".to_string(),
            });
        }
        self.ensure_parent_dir(&target)?;

        let temp_path = if self.config.atomic_writes {
            let file_name = target
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            Some(target.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4())))
        } else {
            None
        };

        let open_path = temp_path.as_deref().unwrap_or(&target);
        let file = File::create(open_path).map_err(|e| map_io("create_file", open_path, e))?;

        Ok(Box::new(LocalWriter {
            file: Some(BufWriter::new(file)),
            temp_path,
            target,
            written: 0,
            failed: false,
            max_file_size: self.config.max_file_size,
            file_permissions: self.config.file_permissions,
        }))
    }

    fn open_reader(&self, bucket: &str, path: &str) -> BackendResult<Box<dyn ObjectReader>> {
        let (bucket_dir, file_path) = self.object_file(bucket, path)?;

        // Directories are implicit prefixes, not objects
        let metadata = fs::metadata(&file_path)
            .map_err(|e| Self::lookup_error("stat_file", &bucket_dir, &file_path, e))?;
        if !metadata.is_file() {
            return Err(BackendError::NotFound {
                path: file_path.to_string_lossy().to_string(),
            });
        }

        let file = File::open(&file_path).map_err(|e| map_io("open_file", &file_path, e))?;
        Ok(Box::new(LocalReader {
            inner: BufReader::new(file),
        }))
    }

    fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        let (bucket_dir, file_path) = self.object_file(bucket, path)?;

        if file_path.is_dir() {
            return Err(BackendError::NotFound {
                path: file_path.to_string_lossy().to_string(),
            });
        }

        fs::remove_file(&file_path)
            .map_err(|e| Self::lookup_error("delete_file", &bucket_dir, &file_path, e))?;
        Self::prune_empty_parents(&bucket_dir, &file_path);
        Ok(())
    }

    fn close(self) -> BackendResult<()> {
        debug!(root = %self.config.root.display(), "closed local storage backend");
        Ok(())
    }
}

struct LocalWriter {
    file: Option<BufWriter<File>>,
    temp_path: Option<PathBuf>,
    target: PathBuf,
    written: u64,
    /// Set by the first failed write; the object is then never published
    failed: bool,
    max_file_size: u64,
    file_permissions: Option<u32>,
}

impl LocalWriter {
    fn write_inner(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.max_file_size {
            return Err(io::Error::other(format!(
                "object size exceeds maximum {}",
                self.max_file_size
            )));
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("writer already closed"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.write_inner(buf);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl ObjectWriter for LocalWriter {
    fn close(mut self: Box<Self>) -> BackendResult<()> {
        let written_path = self.temp_path.clone().unwrap_or_else(|| self.target.clone());

        if self.failed {
            // Drop impl removes the temporary file
            return Err(BackendError::OperationFailed {
                operation: "close_file".to_string(),
                reason: format!(
                    "discarding {} after a failed write",
                    self.target.display()
                ),
            });
        }

        if let Some(file) = self.file.take() {
            let file = file
                .into_inner()
                .map_err(|e| map_io("flush_file", &written_path, e.into_error()))?;
            file.sync_all()
                .map_err(|e| map_io("sync_file", &written_path, e))?;
        }

        // Set file permissions on Unix
        #[cfg(unix)]
        if let Some(perms) = self.file_permissions {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&written_path, fs::Permissions::from_mode(perms))
                .map_err(|e| map_io("set_file_permissions", &written_path, e))?;
        }

        if let Some(temp_path) = self.temp_path.take() {
            // Atomic rename
            fs::rename(&temp_path, &self.target).map_err(|e| {
                // Leave nothing behind when the rename fails
                let _ = fs::remove_file(&temp_path);
                map_io("atomic_rename", &self.target, e)
            })?;
        }
        Ok(())
    }
}

impl Drop for LocalWriter {
    fn drop(&mut self) {
        // Abandoned before close: discard the temporary file
        if let Some(temp_path) = self.temp_path.take() {
            self.file.take();
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %e, "failed to remove abandoned temp file");
            }
        }
    }
}

struct LocalReader {
    inner: BufReader<File>,
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ObjectReader for LocalReader {
    fn close(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (LocalBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = LocalConfig {
            root: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let backend = LocalBackend::connect(config).unwrap();
        (backend, temp_dir)
    }

    fn put(backend: &LocalBackend, path: &str, data: &[u8]) {
        let mut writer = backend.open_writer("bucket", path).unwrap();
        writer.write_all(data).unwrap();
        writer.close().unwrap();
    }

    fn read(backend: &LocalBackend, path: &str) -> BackendResult<Vec<u8>> {
        let mut reader = backend.open_reader("bucket", path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        reader.close()?;
        Ok(data)
    }

    #[test]
    fn test_local_config_default() {
        let config = LocalConfig::default();
        assert_eq!(config.root, PathBuf::from("./storage"));
        assert!(config.create_dirs);
        assert!(config.atomic_writes);
        assert_eq!(config.max_file_size, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_write_and_read() {
        let (backend, temp_dir) = create_test_backend();
        put(&backend, "test/file.json", b"{\"a\":1}");

        assert_eq!(read(&backend, "test/file.json").unwrap(), b"{\"a\":1}");
        assert!(temp_dir.path().join("bucket/test/file.json").is_file());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let (backend, _temp_dir) = create_test_backend();
        put(&backend, "key", b"first");
        put(&backend, "key", b"second");
        assert_eq!(read(&backend, "key").unwrap(), b"second");
    }

    #[test]
    fn test_abandoned_writer_leaves_no_object() {
        let (backend, temp_dir) = create_test_backend();
        {
            let mut writer = backend.open_writer("bucket", "dir/key").unwrap();
            writer.write_all(b"partial").unwrap();
        }
        assert!(matches!(read(&backend, "dir/key"), Err(BackendError::NotFound { .. })));

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path().join("bucket/dir"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_object_and_directory_prefix_are_not_found() {
        let (backend, _temp_dir) = create_test_backend();
        assert!(matches!(read(&backend, "nope"), Err(BackendError::NotFound { .. })));

        put(&backend, "a/b", b"x");
        assert!(matches!(read(&backend, "a"), Err(BackendError::NotFound { .. })));
    }

    #[test]
    fn test_delete_prunes_empty_directories() {
        let (backend, temp_dir) = create_test_backend();
        put(&backend, "x/y/z", b"data");
        backend.delete("bucket", "x/y/z").unwrap();

        assert!(!temp_dir.path().join("bucket/x").exists());
        assert!(temp_dir.path().join("bucket").is_dir());
        assert!(matches!(
            backend.delete("bucket", "x/y/z"),
            Err(BackendError::NotFound { .. })
        ));
    }

    #[test]
    fn test_paths_outside_bucket_are_rejected() {
        let (backend, _temp_dir) = create_test_backend();
        assert!(matches!(
            backend.open_writer("bucket", "../escape"),
            Err(BackendError::InvalidPath { .. })
        ));
        assert!(matches!(
            backend.open_reader("../bucket", "key"),
            Err(BackendError::InvalidPath { .. })
        ));
        assert!(matches!(
            backend.delete("bucket", ""),
            Err(BackendError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_max_file_size_is_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let config = LocalConfig {
            root: temp_dir.path().to_path_buf(),
            max_file_size: 4,
            ..Default::default()
        };
        let backend = LocalBackend::connect(config).unwrap();
        let mut writer = backend.open_writer("bucket", "big").unwrap();
        assert!(writer.write_all(b"too large").is_err());
    }

    #[test]
    fn test_failed_write_keeps_previous_object() {
        let temp_dir = TempDir::new().unwrap();
        let config = LocalConfig {
            root: temp_dir.path().to_path_buf(),
            max_file_size: 8,
            ..Default::default()
        };
        let backend = LocalBackend::connect(config).unwrap();
        put(&backend, "key", b"old");

        let mut writer = backend.open_writer("bucket", "key").unwrap();
        assert!(writer.write_all(b"much too large").is_err());
        assert!(matches!(
            writer.close(),
            Err(BackendError::OperationFailed { .. })
        ));

        assert_eq!(read(&backend, "key").unwrap(), b"old");
        let entries: Vec<_> = fs::read_dir(temp_dir.path().join("bucket"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_path_below_existing_object_is_absent() {
        let (backend, _temp_dir) = create_test_backend();
        put(&backend, "a", b"leaf");

        assert!(matches!(read(&backend, "a/b"), Err(BackendError::NotFound { .. })));
        assert!(matches!(read(&backend, "a/b/c"), Err(BackendError::NotFound { .. })));
        assert!(matches!(
            backend.delete("bucket", "a/b"),
            Err(BackendError::NotFound { .. })
        ));
        assert_eq!(read(&backend, "a").unwrap(), b"leaf");
    }

    #[test]
    fn test_prefix_collisions_are_rejected_on_write() {
        let (backend, _temp_dir) = create_test_backend();
        put(&backend, "a", b"leaf");
        put(&backend, "x/y", b"nested");

        assert!(matches!(
            backend.open_writer("bucket", "a/b"),
            Err(BackendError::InvalidPath { .. })
        ));
        assert!(matches!(
            backend.open_writer("bucket", "x"),
            Err(BackendError::InvalidPath { .. })
        ));
        assert_eq!(read(&backend, "x/y").unwrap(), b"nested");
    }

    #[test]
    fn test_connect_without_create_dirs_requires_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = LocalConfig {
            root: temp_dir.path().join("missing"),
            create_dirs: false,
            ..Default::default()
        };
        assert!(LocalBackend::connect(config).is_err());
    }
}
