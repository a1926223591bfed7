//! Shared fixtures for build cache BDD scenarios.

use std::sync::Arc;

use buildbay::test_support::{FakeRevisions, FakeStorage, sample_app, tarball};
use buildbay::{App, AppType, BuildResolver, ErrorKind, ResolvedBuild, StorageRegistry};
use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;
use thiserror::Error;

pub const PROVIDER: &str = "fake";

#[derive(Clone, Debug)]
pub struct BuildCacheContext {
    pub storage: FakeStorage,
    pub revisions: FakeRevisions,
    pub app: App,
    pub workdir: Utf8PathBuf,
    pub outcomes: Vec<BuildResult>,
    pub(crate) workdir_tmp: Arc<TempDir>,
}

#[derive(Clone, Debug)]
pub enum BuildResult {
    Resolved(ResolvedBuild),
    Failure { kind: ErrorKind, message: String },
}

#[derive(Clone, Debug, Error)]
pub enum BuildCacheTestError {
    #[error("failed to create workdir: {0}")]
    Workdir(String),
}

impl BuildCacheContext {
    pub fn resolver(&self) -> BuildResolver {
        BuildResolver::new(
            self.workdir.clone(),
            StorageRegistry::new().with_provider(PROVIDER, self.storage.clone()),
            self.revisions.clone(),
        )
    }

    pub fn upload(&self, file_name: &str) {
        let bundle = buildbay::build::archive::strip_archive_extension(file_name);
        let entry = format!("{bundle}/Info.plist");
        let key = format!("{}/{file_name}", self.app.remote_prefix());
        self.storage.put(
            &self.app.storage.bucket,
            &key,
            tarball(&[(entry.as_str(), b"plist".as_slice())], true),
        );
    }

    pub fn cached_builds(&self) -> Vec<Utf8PathBuf> {
        let dir = self
            .workdir
            .join(BuildResolver::branch_dir(&self.app, AppType::Ios));
        buildbay::build::find_local_builds(&dir)
            .unwrap_or_else(|err| panic!("cache should be listable: {err}"))
    }
}

#[fixture]
pub fn build_cache_context_result() -> Result<BuildCacheContext, BuildCacheTestError> {
    build_context()
}

#[fixture]
pub fn build_cache_context(
    build_cache_context_result: Result<BuildCacheContext, BuildCacheTestError>,
) -> BuildCacheContext {
    build_cache_context_result
        .unwrap_or_else(|err| panic!("build cache fixture should initialise: {err}"))
}

fn build_context() -> Result<BuildCacheContext, BuildCacheTestError> {
    let tmp_dir =
        TempDir::new().map_err(|err| BuildCacheTestError::Workdir(format!("tempdir: {err}")))?;
    let workdir = Utf8PathBuf::from_path_buf(tmp_dir.path().join("work")).map_err(|path| {
        BuildCacheTestError::Workdir(format!("non-utf8 tempdir path: {}", path.display()))
    })?;

    Ok(BuildCacheContext {
        storage: FakeStorage::new(),
        revisions: FakeRevisions::new(),
        app: sample_app("shop", "main"),
        workdir,
        outcomes: Vec::new(),
        workdir_tmp: Arc::new(tmp_dir),
    })
}
