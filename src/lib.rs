//! Core library for the `buildbay` build launcher.
//!
//! The crate fetches uploaded iOS simulator and desktop builds from object
//! storage, keeps one extracted build per app branch in a local cache, and
//! runs them: iOS builds on a simulator controlled through `xcrun simctl`,
//! desktop builds through the host's `open` command.
//!
//! Every external system sits behind a trait so the run pipelines can be
//! exercised with the scripted doubles in [`test_support`].

pub mod app;
pub mod build;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
mod http;
pub mod process;
pub mod revision;
pub mod runner;
pub mod simulator;
pub mod storage;
pub mod test_support;

pub use app::{App, AppRegistry, AppType, RegistryError, StorageLocation};
pub use build::{BuildError, BuildResolver, BuildSource, ResolvedBuild};
pub use catalog::{AppCatalog, CatalogError};
pub use config::{BuildbayConfig, ConfigError};
pub use device::{DeviceError, DeviceListing, DeviceResolver};
pub use error::{Classify, ErrorKind};
pub use process::{CommandOutput, CommandRunner, ProcessCommandRunner, ProcessError};
pub use revision::{GitHubRevisions, RevisionError, RevisionProvider};
pub use runner::{
    AppListOptions, AppListing, AppRunner, DesktopHost, DesktopRunOptions, DesktopRunOutcome,
    IosRunOptions, IosRunOutcome, MissingBundleIdError, ProcessDesktopHost, RunError,
};
pub use simulator::{Device, DeviceCatalog, DeviceType, SimctlClient, Simulator, SimulatorError};
pub use storage::{
    GCS_PROVIDER_ID, GcsStorage, LOCAL_PROVIDER_ID, LocalStorage, StorageError, StorageProvider,
    StorageRegistry,
};
