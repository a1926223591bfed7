//! Configured build targets and the registry that owns them.
//!
//! Registries are built once from the app catalog and never hand out
//! mutable access. Per-run adjustments such as a branch override act on a
//! clone obtained through [`App::with_branch`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::simulator::DeviceType;

/// Platform a build targets. Selects the cache subdirectory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AppType {
    /// Built for the iOS simulator.
    Ios,
    /// Built for the desktop host.
    Desktop,
}

impl AppType {
    /// Name of the cache subdirectory for this app type.
    #[must_use]
    pub const fn cache_dir_name(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ios => formatter.write_str("iOS"),
            Self::Desktop => formatter.write_str("desktop"),
        }
    }
}

/// Where the builds of an app are uploaded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageLocation {
    /// Identifier of the storage provider (for example `gcs`).
    pub provider: String,
    /// Bucket holding the build archives.
    pub bucket: String,
}

/// A configured iOS or desktop build target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct App {
    /// Short app name; also the first component of the remote prefix.
    pub name: String,
    /// Registry the app was declared in. Qualifies the display name.
    pub registry: String,
    /// Branch whose build is run when no override is given.
    pub branch: String,
    /// Bundle identifier used to install and launch iOS builds.
    pub bundle_id: Option<String>,
    /// Source repository in `owner/repo` form.
    pub repo: String,
    /// Environment variables applied before launching.
    pub env: BTreeMap<String, String>,
    /// Storage location of the uploaded builds.
    pub storage: StorageLocation,
    /// Device type the app requires, if any (iOS only).
    pub device_type: Option<DeviceType>,
}

impl App {
    /// Qualified display name, `registry/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.registry, self.name)
    }

    /// Remote listing prefix for the current branch, `name/branch`.
    #[must_use]
    pub fn remote_prefix(&self) -> String {
        format!("{}/{}", self.name, self.branch)
    }

    /// Returns a copy of the app pointing at `branch`.
    #[must_use]
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..self.clone()
        }
    }
}

/// Errors raised by registry construction and lookups.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// Raised when no app matches the requested name.
    #[error("no {app_type} app named {name}")]
    NotFound {
        /// Type of registry searched.
        app_type: AppType,
        /// Requested name.
        name: String,
    },
    /// Raised when a bare name matches apps from several registries.
    #[error("{app_type} app name {name} is ambiguous, use one of: {}", .candidates.join(", "))]
    Ambiguous {
        /// Type of registry searched.
        app_type: AppType,
        /// Requested name.
        name: String,
        /// Full names of every match.
        candidates: Vec<String>,
    },
    /// Raised when two apps share a full name.
    #[error("{app_type} app {full_name} is declared more than once")]
    Duplicate {
        /// Type of registry being built.
        app_type: AppType,
        /// Offending full name.
        full_name: String,
    },
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ambiguous { .. } | Self::Duplicate { .. } => ErrorKind::Invalid,
        }
    }
}

/// Immutable collection of apps of one type keyed by full name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppRegistry {
    app_type: AppType,
    apps: BTreeMap<String, App>,
}

impl AppRegistry {
    /// Builds a registry, rejecting duplicate full names.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when two apps share a full name.
    pub fn new(
        app_type: AppType,
        apps: impl IntoIterator<Item = App>,
    ) -> Result<Self, RegistryError> {
        let mut by_name = BTreeMap::new();
        for app in apps {
            let full_name = app.full_name();
            if by_name.contains_key(&full_name) {
                return Err(RegistryError::Duplicate {
                    app_type,
                    full_name,
                });
            }
            by_name.insert(full_name, app);
        }
        Ok(Self {
            app_type,
            apps: by_name,
        })
    }

    /// Creates a registry without apps.
    #[must_use]
    pub const fn empty(app_type: AppType) -> Self {
        Self {
            app_type,
            apps: BTreeMap::new(),
        }
    }

    /// Type of the apps held by this registry.
    #[must_use]
    pub const fn app_type(&self) -> AppType {
        self.app_type
    }

    /// Looks up an app by full name or, failing that, by bare name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when nothing matches and
    /// [`RegistryError::Ambiguous`] when a bare name matches several apps.
    pub fn get(&self, name: &str) -> Result<&App, RegistryError> {
        if let Some(app) = self.apps.get(name) {
            return Ok(app);
        }

        let mut matches = self.apps.values().filter(|app| app.name == name);
        let Some(first) = matches.next() else {
            return Err(RegistryError::NotFound {
                app_type: self.app_type,
                name: name.to_owned(),
            });
        };
        let rest: Vec<&App> = matches.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let candidates = std::iter::once(first)
            .chain(rest)
            .map(App::full_name)
            .collect();
        Err(RegistryError::Ambiguous {
            app_type: self.app_type,
            name: name.to_owned(),
            candidates,
        })
    }

    /// Number of registered apps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns `true` when no apps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Iterates over the apps in alphabetical order of full name.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &App> {
        self.apps.values()
    }
}
