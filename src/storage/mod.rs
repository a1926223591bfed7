//! Object storage providers hosting uploaded build archives.
//!
//! Providers are registered under explicit identifiers in a
//! [`StorageRegistry`]; apps name the provider they upload to and the
//! registry resolves it at lookup time.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::Read;
use std::pin::Pin;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

mod gcs;
mod local;

pub use gcs::{DEFAULT_GCS_API_URL, GCS_PROVIDER_ID, GcsStorage};
pub use local::{LOCAL_PROVIDER_ID, LocalStorage};

/// Readable body of a fetched object. Dropping the reader closes it.
pub type ObjectReader = Box<dyn Read + Send>;

/// Future returned by storage operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Errors raised by storage providers and the registry.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised when no provider is registered under the requested id.
    #[error("unknown storage provider {provider}")]
    UnknownProvider {
        /// Requested provider identifier.
        provider: String,
    },
    /// Raised when a request cannot be built or sent.
    #[error("{operation} on {provider} failed: {message}")]
    Request {
        /// Provider identifier.
        provider: String,
        /// Operation being attempted.
        operation: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the provider answers with a non-success status.
    #[error("{operation} on {provider} returned HTTP {status}")]
    Status {
        /// Provider identifier.
        provider: String,
        /// Operation being attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
    },
    /// Raised when a listing response cannot be decoded.
    #[error("failed to decode {provider} response: {message}")]
    Decode {
        /// Provider identifier.
        provider: String,
        /// Decoder error message.
        message: String,
    },
    /// Raised when a requested object does not exist.
    #[error("object {key} not found in bucket {bucket}")]
    ObjectNotFound {
        /// Bucket searched.
        bucket: String,
        /// Missing key.
        key: String,
    },
    /// Raised when local storage cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Operating system error string.
        message: String,
    },
}

impl Classify for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownProvider { .. } | Self::ObjectNotFound { .. } => ErrorKind::NotFound,
            Self::Request { .. } | Self::Status { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Decode { .. } => ErrorKind::Internal,
        }
    }
}

/// Object storage backend exposing prefix listing and retrieval.
pub trait StorageProvider: Send + Sync {
    /// Lists every object key in `bucket` starting with `prefix`, sorted.
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: &'a str) -> StorageFuture<'a, Vec<String>>;

    /// Opens the object stored under `key`.
    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, ObjectReader>;
}

/// Storage providers keyed by the identifier apps refer to.
#[derive(Default)]
pub struct StorageRegistry {
    providers: BTreeMap<String, Box<dyn StorageProvider>>,
}

impl StorageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under `id`, replacing any previous entry.
    #[must_use]
    pub fn with_provider(
        mut self,
        id: impl Into<String>,
        provider: impl StorageProvider + 'static,
    ) -> Self {
        self.providers.insert(id.into(), Box::new(provider));
        self
    }

    /// Resolves the provider registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownProvider`] when nothing is registered.
    pub fn get(&self, id: &str) -> Result<&dyn StorageProvider, StorageError> {
        self.providers
            .get(id)
            .map(|provider| provider.as_ref())
            .ok_or_else(|| StorageError::UnknownProvider {
                provider: id.to_owned(),
            })
    }

    /// Identifiers of every registered provider.
    #[must_use]
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StorageRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
