//! Build acquisition: reuse a cached extraction or download a fresh one.
//!
//! Uploaded builds live under `{name}/{branch}` in the app's storage
//! bucket, exactly one object per branch. The object's basename starts with
//! the commit id it was built from. Extracted builds are cached under
//! `{workdir}/{ios|desktop}/{registry}/{name}/{branch}/` and carry the same
//! commit id in their filename, which is what decides whether the cache is
//! still current.
//!
//! Replacement is not atomic. The branch directory is removed before the
//! new archive is fetched, so a failed download leaves no cached build and
//! the next resolution starts over.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;

use crate::app::{App, AppType};
use crate::error::{Classify, ErrorKind};
use crate::revision::{RevisionError, RevisionProvider};
use crate::storage::{StorageError, StorageProvider, StorageRegistry};

pub mod archive;

use archive::{base_name, content_id, strip_archive_extension};

/// Errors raised while resolving a build.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BuildError {
    /// Raised when nothing has been uploaded for the branch.
    #[error("no builds found for {prefix}")]
    NoRemoteBuilds {
        /// Remote prefix searched.
        prefix: String,
    },
    /// Raised when the branch holds more than one uploaded build.
    #[error("expected a single build under {prefix} but found {}: {}", .keys.len(), .keys.join(", "))]
    MultipleRemoteBuilds {
        /// Remote prefix searched.
        prefix: String,
        /// Every key found under the prefix.
        keys: Vec<String>,
    },
    /// Raised when listing or fetching from storage fails.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Raised when the branch head cannot be looked up while validating a
    /// cached build.
    #[error("failed getting branch head sha: {0}")]
    Revision(#[from] RevisionError),
    /// Raised when the cache glob pattern cannot be compiled.
    #[error("invalid cache pattern {pattern}: {message}")]
    Pattern {
        /// Pattern that failed to compile.
        pattern: String,
        /// Compiler error message.
        message: String,
    },
    /// Raised when a cache entry cannot be inspected.
    #[error("failed to scan cached builds: {message}")]
    Scan {
        /// Underlying error message.
        message: String,
    },
    /// Raised when a cached path is not valid UTF-8.
    #[error("cached build path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
    /// Raised when the cache directory cannot be prepared or cleared.
    #[error("failed to prepare cache directory {path}: {message}")]
    Cache {
        /// Directory being prepared.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the downloaded archive cannot be extracted.
    #[error("failed to unpack {key} into {path}: {message}")]
    Unpack {
        /// Object being extracted.
        key: String,
        /// Destination directory.
        path: String,
        /// Extraction error message.
        message: String,
    },
}

impl Classify for BuildError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRemoteBuilds { .. } | Self::MultipleRemoteBuilds { .. } => ErrorKind::Invalid,
            Self::Storage(err) => err.kind(),
            Self::Revision(err) => err.kind(),
            Self::Pattern { .. } | Self::NonUtf8Path { .. } => ErrorKind::Internal,
            Self::Scan { .. } | Self::Cache { .. } | Self::Unpack { .. } => ErrorKind::Io,
        }
    }
}

/// How a resolved build was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildSource {
    /// The cached extraction matched the uploaded build.
    Cached,
    /// The uploaded build was fetched and extracted.
    Downloaded,
}

/// A build ready to install or launch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedBuild {
    /// Path of the extracted bundle.
    pub path: Utf8PathBuf,
    /// Commit id encoded in the bundle name.
    pub content_id: String,
    /// Whether the build came from the cache.
    pub source: BuildSource,
}

/// Decides between the cached build and a fresh download.
pub struct BuildResolver {
    workdir: Utf8PathBuf,
    storage: StorageRegistry,
    revisions: Box<dyn RevisionProvider>,
}

impl std::fmt::Debug for BuildResolver {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BuildResolver")
            .field("workdir", &self.workdir)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl BuildResolver {
    /// Creates a resolver caching builds under `workdir`.
    #[must_use]
    pub fn new(
        workdir: impl Into<Utf8PathBuf>,
        storage: StorageRegistry,
        revisions: impl RevisionProvider + 'static,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            storage,
            revisions: Box::new(revisions),
        }
    }

    /// Root of the build cache.
    #[must_use]
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Cache directory, relative to the workdir, for the app's branch.
    #[must_use]
    pub fn branch_dir(app: &App, app_type: AppType) -> Utf8PathBuf {
        Utf8PathBuf::from(app_type.cache_dir_name())
            .join(app.full_name())
            .join(&app.branch)
    }

    /// Returns a local build of `app` at its current branch, downloading it
    /// only when the cache is missing, ambiguous, or outdated.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoRemoteBuilds`] or
    /// [`BuildError::MultipleRemoteBuilds`] when the branch does not hold
    /// exactly one upload, and other variants when listing, fetching, or
    /// extracting fails.
    pub async fn resolve(&self, app: &App, app_type: AppType) -> Result<ResolvedBuild, BuildError> {
        let provider = self.storage.get(&app.storage.provider)?;
        let remote_key = self.remote_key(provider, app).await?;
        let remote_name = base_name(&remote_key);

        let relative_dir = Self::branch_dir(app, app_type);
        let branch_dir = self.workdir.join(&relative_dir);
        let local_builds = find_local_builds(&branch_dir)?;

        match local_builds.as_slice() {
            [] => tracing::debug!(app = %app.full_name(), branch = %app.branch, "no cached build"),
            [local] => {
                let local_name = local.file_name().unwrap_or_default();
                self.check_head(app, remote_name).await?;
                if content_id(local_name) == content_id(remote_name) {
                    tracing::debug!(path = %local, "cached build is current");
                    return Ok(ResolvedBuild {
                        path: local.clone(),
                        content_id: content_id(local_name).to_owned(),
                        source: BuildSource::Cached,
                    });
                }
                tracing::debug!(
                    cached = content_id(local_name),
                    remote = content_id(remote_name),
                    "cached build is outdated"
                );
            }
            several => tracing::warn!(
                count = several.len(),
                dir = %branch_dir,
                "found several cached builds, discarding cache"
            ),
        }

        self.download(provider, app, &remote_key, &relative_dir)
            .await
    }

    async fn remote_key(
        &self,
        provider: &dyn StorageProvider,
        app: &App,
    ) -> Result<String, BuildError> {
        let prefix = app.remote_prefix();
        let keys = provider
            .list_keys(&app.storage.bucket, &prefix)
            .await?
            .into_iter()
            // Only keys directly under `name/branch/` belong to the branch.
            // A raw prefix match would also count sibling branches such as
            // `main-hotfix` and report them as several uploads.
            .filter(|key| {
                key.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .collect::<Vec<_>>();

        match <[String; 1]>::try_from(keys) {
            Ok([key]) => Ok(key),
            Err(keys) if keys.is_empty() => Err(BuildError::NoRemoteBuilds { prefix }),
            Err(keys) => Err(BuildError::MultipleRemoteBuilds { prefix, keys }),
        }
    }

    /// Looks up the branch head and warns when the uploaded build was not
    /// built from it. A failed lookup is an error.
    async fn check_head(&self, app: &App, remote_name: &str) -> Result<(), BuildError> {
        let head = self
            .revisions
            .branch_head_sha(&app.repo, &app.branch)
            .await?;
        if !remote_name.starts_with(head.as_str()) {
            tracing::warn!(
                app = %app.full_name(),
                branch = %app.branch,
                head = %head,
                build = remote_name,
                "uploaded build does not match the branch head"
            );
        }
        Ok(())
    }

    async fn download(
        &self,
        provider: &dyn StorageProvider,
        app: &App,
        remote_key: &str,
        relative_dir: &Utf8Path,
    ) -> Result<ResolvedBuild, BuildError> {
        let branch_dir = self.workdir.join(relative_dir);
        let workdir = Dir::create_ambient_dir_all(&self.workdir, ambient_authority())
            .and_then(|()| Dir::open_ambient_dir(&self.workdir, ambient_authority()))
            .map_err(|err| cache_error(&self.workdir, &err))?;
        match workdir.remove_dir_all(relative_dir) {
            Ok(()) => tracing::debug!(dir = %branch_dir, "removed cached builds"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(cache_error(&branch_dir, &err)),
        }

        tracing::info!(app = %app.full_name(), key = remote_key, "downloading build");
        let reader = provider
            .get_object(&app.storage.bucket, remote_key)
            .await?;
        workdir
            .create_dir_all(relative_dir)
            .map_err(|err| cache_error(&branch_dir, &err))?;
        archive::unpack(reader, &branch_dir).map_err(|err| BuildError::Unpack {
            key: remote_key.to_owned(),
            path: branch_dir.to_string(),
            message: err.to_string(),
        })?;

        let remote_name = base_name(remote_key);
        let path = branch_dir.join(strip_archive_extension(remote_name));
        tracing::debug!(path = %path, "extracted build");
        Ok(ResolvedBuild {
            path,
            content_id: content_id(remote_name).to_owned(),
            source: BuildSource::Downloaded,
        })
    }
}

/// Lists the extracted `*.app` bundles in `branch_dir`, sorted.
///
/// # Errors
///
/// Returns [`BuildError::Pattern`] when the escaped directory does not form
/// a valid pattern and [`BuildError::Scan`] when an entry cannot be read.
pub fn find_local_builds(branch_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, BuildError> {
    let pattern = format!("{}/*.app", glob::Pattern::escape(branch_dir.as_str()));
    let entries = glob::glob(&pattern).map_err(|err| BuildError::Pattern {
        pattern: pattern.clone(),
        message: err.to_string(),
    })?;

    let mut builds = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| BuildError::Scan {
            message: err.to_string(),
        })?;
        let utf8 = Utf8PathBuf::from_path_buf(path).map_err(|raw| BuildError::NonUtf8Path {
            path: raw.display().to_string(),
        })?;
        builds.push(utf8);
    }
    builds.sort();
    Ok(builds)
}

fn cache_error(path: &Utf8Path, err: &std::io::Error) -> BuildError {
    BuildError::Cache {
        path: path.to_string(),
        message: err.to_string(),
    }
}
