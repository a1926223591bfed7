//! Shared fixtures for app run BDD scenarios.

use std::sync::Arc;

use buildbay::test_support::{
    FakeCatalog, FakeRevisions, FakeStorage, RecordingDesktopHost, RecordingSimulator,
    sample_app, sample_device, tarball,
};
use buildbay::{
    App, AppCatalog, AppRegistry, AppRunner, AppType, BuildResolver, DeviceResolver, DeviceType,
    StorageRegistry,
};
use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;
use thiserror::Error;

pub type TestRunner = AppRunner<FakeCatalog, RecordingSimulator, RecordingDesktopHost>;

#[derive(Clone, Debug)]
pub struct AppRunContext {
    pub storage: FakeStorage,
    pub simulator: RecordingSimulator,
    pub host: RecordingDesktopHost,
    pub app: App,
    pub app_type: AppType,
    pub root: Utf8PathBuf,
    pub outcome: Option<RunResult>,
    pub(crate) root_tmp: Arc<TempDir>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunResult {
    Success { build_path: Utf8PathBuf },
    Failure { step: String, message: String },
}

#[derive(Clone, Debug, Error)]
pub enum AppRunTestError {
    #[error("failed to create workspace: {0}")]
    Workspace(String),
    #[error("invalid app run fixture: {0}")]
    Fixture(String),
}

impl AppRunContext {
    pub fn upload(&self, file_name: &str) {
        let bundle = buildbay::build::archive::strip_archive_extension(file_name);
        let entry = format!("{bundle}/Info.plist");
        let key = format!("{}/{file_name}", self.app.remote_prefix());
        let gzip = file_name.ends_with(".gz");
        self.storage.put(
            &self.app.storage.bucket,
            &key,
            tarball(&[(entry.as_str(), b"plist".as_slice())], gzip),
        );
    }

    pub fn runner(&self) -> Result<TestRunner, AppRunTestError> {
        let registry = |app_type: AppType| {
            let apps = (self.app_type == app_type).then(|| self.app.clone());
            AppRegistry::new(app_type, apps)
                .map_err(|err| AppRunTestError::Fixture(err.to_string()))
        };
        let catalog = AppCatalog::new(registry(AppType::Ios)?, registry(AppType::Desktop)?);
        let builds = BuildResolver::new(
            self.root.join("work"),
            StorageRegistry::new().with_provider("fake", self.storage.clone()),
            FakeRevisions::new(),
        );
        let devices = DeviceResolver::new(FakeCatalog::new(vec![
            sample_device("iPhone 15", "17.2", DeviceType::Iphone),
            sample_device("iPad Air", "17.2", DeviceType::Ipad),
        ]));
        Ok(AppRunner::new(
            catalog,
            builds,
            devices,
            self.simulator.clone(),
            self.host.clone(),
        ))
    }
}

#[fixture]
pub fn app_run_context_result() -> Result<AppRunContext, AppRunTestError> {
    build_app_run_context()
}

#[fixture]
pub fn app_run_context(
    app_run_context_result: Result<AppRunContext, AppRunTestError>,
) -> AppRunContext {
    app_run_context_result
        .unwrap_or_else(|err| panic!("app run fixture should initialise: {err}"))
}

fn build_app_run_context() -> Result<AppRunContext, AppRunTestError> {
    let tmp_dir =
        TempDir::new().map_err(|err| AppRunTestError::Workspace(format!("tempdir: {err}")))?;
    let root = Utf8PathBuf::from_path_buf(tmp_dir.path().to_path_buf()).map_err(|path| {
        AppRunTestError::Workspace(format!("non-utf8 tempdir path: {}", path.display()))
    })?;

    Ok(AppRunContext {
        storage: FakeStorage::new(),
        simulator: RecordingSimulator::new(root.join("containers")),
        host: RecordingDesktopHost::new(),
        app: sample_app("shop", "main"),
        app_type: AppType::Ios,
        root,
        outcome: None,
        root_tmp: Arc::new(tmp_dir),
    })
}
