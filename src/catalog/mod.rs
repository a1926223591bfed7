//! App catalog file parsing.
//!
//! The catalog is a TOML file with one `[[ios]]` or `[[desktop]]` table per
//! app:
//!
//! ```toml
//! [[ios]]
//! name = "shop"
//! registry = "acme"
//! branch = "main"
//! repo = "acme/shop-ios"
//! bundle_id = "com.acme.shop"
//! device_type = "iphone"
//! storage = { provider = "gcs", bucket = "acme-ios-builds" }
//!
//! [ios.env]
//! API_URL = "http://localhost:8080"
//! ```

use std::collections::BTreeMap;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;

use crate::app::{App, AppRegistry, AppType, RegistryError, StorageLocation};
use crate::error::{Classify, ErrorKind};
use crate::simulator::DeviceType;

/// Errors raised while loading the app catalog.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CatalogError {
    /// Raised when the catalog file cannot be read.
    #[error("failed to read app catalog {path}: {message}")]
    Io {
        /// Catalog path.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the catalog is not valid TOML or has the wrong shape.
    #[error("failed to parse app catalog {path}: {message}")]
    Parse {
        /// Catalog path.
        path: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when an entry is missing a value or has an unusable one.
    #[error("invalid {app_type} app entry #{index} ({name}): {message}")]
    InvalidEntry {
        /// Section the entry belongs to.
        app_type: AppType,
        /// One-based position within its section.
        index: usize,
        /// Entry name, or `<unnamed>`.
        name: String,
        /// What is wrong with it.
        message: String,
    },
    /// Raised when the registry rejects the entries.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl Classify for CatalogError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } | Self::InvalidEntry { .. } => ErrorKind::Invalid,
            Self::Registry(err) => err.kind(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    ios: Vec<AppEntry>,
    #[serde(default)]
    desktop: Vec<AppEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    registry: String,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    repo: String,
    bundle_id: Option<String>,
    device_type: Option<String>,
    storage: StorageEntry,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageEntry {
    provider: String,
    bucket: String,
}

/// The iOS and desktop registries built from the catalog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppCatalog {
    ios: AppRegistry,
    desktop: AppRegistry,
}

impl Default for AppCatalog {
    fn default() -> Self {
        Self {
            ios: AppRegistry::empty(AppType::Ios),
            desktop: AppRegistry::empty(AppType::Desktop),
        }
    }
}

impl AppCatalog {
    /// Combines already built registries.
    #[must_use]
    pub const fn new(ios: AppRegistry, desktop: AppRegistry) -> Self {
        Self { ios, desktop }
    }

    /// Registry of iOS apps.
    #[must_use]
    pub const fn ios(&self) -> &AppRegistry {
        &self.ios
    }

    /// Registry of desktop apps.
    #[must_use]
    pub const fn desktop(&self) -> &AppRegistry {
        &self.desktop
    }

    /// Reads and parses the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the file cannot be read and the
    /// other variants when its contents are rejected.
    pub fn load(path: &Utf8Path) -> Result<Self, CatalogError> {
        let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| CatalogError::Io {
            path: path.to_string(),
            message: String::from("catalog path is missing a filename"),
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
            CatalogError::Io {
                path: path.to_string(),
                message: err.to_string(),
            }
        })?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| CatalogError::Io {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        tracing::debug!(path = %path, "loaded app catalog");
        Self::parse(path.as_str(), &contents)
    }

    /// Parses catalog `contents`; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed TOML,
    /// [`CatalogError::InvalidEntry`] for unusable entries, and
    /// [`CatalogError::Registry`] for duplicate apps.
    pub fn parse(origin: &str, contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(contents).map_err(|err| CatalogError::Parse {
            path: origin.to_owned(),
            message: err.to_string(),
        })?;

        let ios = build_registry(AppType::Ios, file.ios)?;
        let desktop = build_registry(AppType::Desktop, file.desktop)?;
        Ok(Self { ios, desktop })
    }
}

fn build_registry(app_type: AppType, entries: Vec<AppEntry>) -> Result<AppRegistry, CatalogError> {
    let apps = entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| into_app(app_type, position + 1, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AppRegistry::new(app_type, apps)?)
}

fn into_app(app_type: AppType, index: usize, entry: AppEntry) -> Result<App, CatalogError> {
    let invalid = |message: &str| CatalogError::InvalidEntry {
        app_type,
        index,
        name: if entry.name.is_empty() {
            String::from("<unnamed>")
        } else {
            entry.name.clone()
        },
        message: message.to_owned(),
    };

    let required = [
        ("name", &entry.name),
        ("registry", &entry.registry),
        ("branch", &entry.branch),
        ("repo", &entry.repo),
        ("storage.provider", &entry.storage.provider),
        ("storage.bucket", &entry.storage.bucket),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(invalid(&format!("{field} must not be empty")));
        }
    }
    if entry.name.contains('/') || entry.registry.contains('/') {
        return Err(invalid("name and registry must not contain '/'"));
    }

    let bundle_id = entry
        .bundle_id
        .clone()
        .filter(|value| !value.trim().is_empty());
    let device_type = match app_type {
        AppType::Ios => {
            if bundle_id.is_none() {
                return Err(invalid("iOS apps need a bundle_id"));
            }
            entry
                .device_type
                .as_deref()
                .map(str::parse::<DeviceType>)
                .transpose()
                .map_err(|err| invalid(&err.to_string()))?
        }
        AppType::Desktop => {
            if entry.device_type.is_some() {
                return Err(invalid("device_type only applies to iOS apps"));
            }
            None
        }
    };

    Ok(App {
        name: entry.name,
        registry: entry.registry,
        branch: entry.branch,
        bundle_id,
        repo: entry.repo,
        env: entry.env,
        storage: StorageLocation {
            provider: entry.storage.provider,
            bucket: entry.storage.bucket,
        },
        device_type,
    })
}

#[cfg(test)]
mod tests;
