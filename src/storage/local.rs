//! Directory-tree storage provider for mirrors and offline use.
//!
//! Each bucket is a subdirectory of the root; object keys are paths relative
//! to the bucket joined with `/`.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use super::{ObjectReader, StorageError, StorageFuture, StorageProvider};

/// Identifier apps use to select this provider.
pub const LOCAL_PROVIDER_ID: &str = "local";

/// Serves objects from a directory tree on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: Utf8PathBuf,
}

impl LocalStorage {
    /// Creates a provider rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the buckets.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<Dir, StorageError> {
        let root = Dir::open_ambient_dir(&self.root, ambient_authority())
            .map_err(|err| io_error(&self.root, &err))?;
        root.open_dir(bucket)
            .map_err(|err| io_error(&self.root.join(bucket), &err))
    }

    fn list_sync(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        let mut keys = Vec::new();
        collect_keys(&dir, &self.root.join(bucket), "", &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn open_sync(&self, bucket: &str, key: &str) -> Result<ObjectReader, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        let file = dir.open(key).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                }
            } else {
                io_error(&self.root.join(bucket).join(key), &err)
            }
        })?;
        Ok(Box::new(file.into_std()))
    }
}

impl StorageProvider for LocalStorage {
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: &'a str) -> StorageFuture<'a, Vec<String>> {
        Box::pin(async move { self.list_sync(bucket, prefix) })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, ObjectReader> {
        Box::pin(async move { self.open_sync(bucket, key) })
    }
}

fn collect_keys(
    dir: &Dir,
    display_path: &Utf8Path,
    relative: &str,
    keys: &mut Vec<String>,
) -> Result<(), StorageError> {
    let entries = dir.entries().map_err(|err| io_error(display_path, &err))?;
    for item in entries {
        let entry = item.map_err(|err| io_error(display_path, &err))?;
        let name = entry.file_name().map_err(|err| io_error(display_path, &err))?;
        let key = if relative.is_empty() {
            name.clone()
        } else {
            format!("{relative}/{name}")
        };
        let file_type = entry.file_type().map_err(|err| io_error(display_path, &err))?;
        if file_type.is_dir() {
            let child = entry.open_dir().map_err(|err| io_error(display_path, &err))?;
            collect_keys(&child, &display_path.join(&name), &key, keys)?;
        } else if file_type.is_file() {
            keys.push(key);
        }
    }
    Ok(())
}

fn io_error(path: &Utf8Path, err: &std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_string(),
        message: err.to_string(),
    }
}
