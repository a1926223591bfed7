//! Run pipelines for iOS simulator and desktop builds.
//!
//! Each pipeline is a fixed sequence of fallible steps. The first failure
//! stops the run and is reported as a [`RunError`] naming the step; work
//! already done is left in place so it can be inspected.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use crate::app::{App, AppRegistry, AppType, RegistryError};
use crate::build::{BuildResolver, ResolvedBuild};
use crate::catalog::AppCatalog;
use crate::device::DeviceResolver;
use crate::error::Classify;
use crate::simulator::{Device, DeviceCatalog, Simulator};

mod desktop;
mod error;

pub use desktop::{DesktopError, DesktopHost, HostPlatform, ProcessDesktopHost};
pub use error::{
    DataInjectionError, DesktopStep, IosStep, MissingBundleIdError, RunError, RunStep,
};

/// Options for [`AppRunner::run_ios`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IosRunOptions {
    /// OS version of the simulator; empty selects the latest installed.
    pub ios_version: String,
    /// Name of the simulator device. Required.
    pub device_name: String,
    /// Directory whose contents are copied into the app's data container.
    pub data_path: Option<Utf8PathBuf>,
    /// Branch to run instead of the app's configured branch.
    pub branch: Option<String>,
}

/// Outcome of a successful iOS run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IosRunOutcome {
    /// Full name of the app that was launched.
    pub app: String,
    /// Branch whose build was launched.
    pub branch: String,
    /// Simulator the app runs on.
    pub device: Device,
    /// Build that was installed.
    pub build: ResolvedBuild,
    /// Data container of the installed app.
    pub data_path: Utf8PathBuf,
}

/// Options for [`AppRunner::run_desktop`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DesktopRunOptions {
    /// Branch to run instead of the app's configured branch.
    pub branch: Option<String>,
}

/// Outcome of a successful desktop run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DesktopRunOutcome {
    /// Full name of the app that was launched.
    pub app: String,
    /// Branch whose build was launched.
    pub branch: String,
    /// Build that was opened.
    pub build: ResolvedBuild,
}

/// Which app types [`AppRunner::list_apps`] reports.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AppListOptions {
    /// Include iOS apps.
    pub ios: bool,
    /// Include desktop apps.
    pub desktop: bool,
}

/// Full names of the configured apps, alphabetically.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppListing {
    /// iOS apps, empty unless requested.
    pub ios: Vec<String>,
    /// Desktop apps, empty unless requested.
    pub desktop: Vec<String>,
}

/// Runs configured apps on a simulator or the desktop host.
#[derive(Debug)]
pub struct AppRunner<C, S, H> {
    apps: AppCatalog,
    builds: BuildResolver,
    devices: DeviceResolver<C>,
    simulator: S,
    desktop: H,
}

impl<C, S, H> AppRunner<C, S, H>
where
    C: DeviceCatalog,
    S: Simulator,
    H: DesktopHost,
{
    /// Wires the runner to its collaborators.
    #[must_use]
    pub const fn new(
        apps: AppCatalog,
        builds: BuildResolver,
        devices: DeviceResolver<C>,
        simulator: S,
        desktop: H,
    ) -> Self {
        Self {
            apps,
            builds,
            devices,
            simulator,
            desktop,
        }
    }

    /// Configured apps.
    #[must_use]
    pub const fn apps(&self) -> &AppCatalog {
        &self.apps
    }

    /// Device resolver used by iOS runs.
    #[must_use]
    pub const fn devices(&self) -> &DeviceResolver<C> {
        &self.devices
    }

    /// Installs and launches an iOS app on a simulator.
    ///
    /// Steps run in the order of [`IosStep`]. The device is resolved and
    /// checked against the app before any build is downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] naming the first step that failed.
    pub async fn run_ios(
        &self,
        name: &str,
        options: &IosRunOptions,
    ) -> Result<IosRunOutcome, RunError> {
        let app = resolve_app(self.apps.ios(), name, options.branch.as_deref())
            .map_err(|err| ios_error(IosStep::ResolveApp, "unable to resolve iOS app", err))?;
        let full_name = app.full_name();
        let bundle_id = app.bundle_id.clone().ok_or_else(|| {
            ios_error(
                IosStep::ResolveApp,
                "unable to resolve iOS app",
                MissingBundleIdError {
                    app: full_name.clone(),
                },
            )
        })?;

        let device = self
            .devices
            .resolve_device(&options.ios_version, &options.device_name, app.device_type)
            .map_err(|err| {
                ios_error(
                    IosStep::ResolveDevice,
                    format!("device {} is not usable for {full_name}", options.device_name),
                    err,
                )
            })?;
        tracing::debug!(udid = %device.udid, version = %device.os_version, "resolved device");

        let build = self
            .builds
            .resolve(&app, AppType::Ios)
            .await
            .map_err(|err| {
                ios_error(
                    IosStep::AcquireBuild,
                    format!("failed to download iOS app {full_name}"),
                    err,
                )
            })?;

        tracing::info!(device = %device.name, "booting simulator");
        self.simulator.boot(&device).map_err(|err| {
            ios_error(
                IosStep::BootSimulator,
                format!("failed to boot simulator {}", device.name),
                err,
            )
        })?;
        self.simulator
            .open(&device)
            .map_err(|err| ios_error(IosStep::OpenSimulator, "failed to launch simulator", err))?;

        tracing::info!(path = %build.path, "installing app on simulator");
        self.simulator
            .install_app(&device, &build.path)
            .map_err(|err| {
                ios_error(
                    IosStep::InstallBuild,
                    format!("failed to install app {full_name} on simulator"),
                    err,
                )
            })?;
        let data_path = self
            .simulator
            .app_data_path(&device, &bundle_id)
            .map_err(|err| {
                ios_error(
                    IosStep::ReadAppDataPath,
                    format!("failed to find data directory of {full_name}"),
                    err,
                )
            })?;

        if let Some(source) = options.data_path.as_deref() {
            tracing::info!(from = %source, to = %data_path, "injecting app data");
            inject_data(source, &data_path).map_err(|err| {
                ios_error(IosStep::InjectData, "failed to inject data into simulator", err)
            })?;
        }

        for (key, value) in &app.env {
            self.simulator.setenv(&device, key, value).map_err(|err| {
                ios_error(
                    IosStep::SetEnvVars,
                    format!("failed to set environment variable {key} on simulator"),
                    err,
                )
            })?;
        }

        tracing::info!(app = %full_name, "launching app");
        self.simulator
            .launch_app(&device, &bundle_id)
            .map_err(|err| {
                ios_error(
                    IosStep::LaunchApp,
                    format!("failed to launch app {full_name} on simulator"),
                    err,
                )
            })?;

        Ok(IosRunOutcome {
            app: full_name,
            branch: app.branch,
            device,
            build,
            data_path,
        })
    }

    /// Opens a desktop app on the host.
    ///
    /// Whether the host can open apps at all is only known at launch, so the
    /// build is acquired and the environment applied even on hosts that end
    /// up refusing.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] naming the first step that failed.
    pub async fn run_desktop(
        &self,
        name: &str,
        options: &DesktopRunOptions,
    ) -> Result<DesktopRunOutcome, RunError> {
        let app = resolve_app(self.apps.desktop(), name, options.branch.as_deref())
            .map_err(|err| {
                desktop_error(DesktopStep::ResolveApp, "unable to resolve desktop app", err)
            })?;
        let full_name = app.full_name();

        let build = self
            .builds
            .resolve(&app, AppType::Desktop)
            .await
            .map_err(|err| {
                desktop_error(
                    DesktopStep::AcquireBuild,
                    format!("failed to download desktop app {full_name}"),
                    err,
                )
            })?;

        for (key, value) in &app.env {
            self.desktop.set_env(key, value).map_err(|err| {
                desktop_error(
                    DesktopStep::SetEnvVars,
                    format!("failed to set environment variable {key}"),
                    err,
                )
            })?;
        }

        self.desktop.open_app(&build.path).map_err(|err| {
            desktop_error(
                DesktopStep::Launch,
                format!("failed to run desktop app {full_name}"),
                err,
            )
        })?;

        Ok(DesktopRunOutcome {
            app: full_name,
            branch: app.branch,
            build,
        })
    }

    /// Lists the full names of the requested app types, alphabetically.
    #[must_use]
    pub fn list_apps(&self, options: AppListOptions) -> AppListing {
        let names = |registry: &AppRegistry| registry.iter().map(App::full_name).collect();
        AppListing {
            ios: if options.ios {
                names(self.apps.ios())
            } else {
                Vec::new()
            },
            desktop: if options.desktop {
                names(self.apps.desktop())
            } else {
                Vec::new()
            },
        }
    }
}

/// Looks an app up and applies a branch override to a copy of it.
fn resolve_app(
    registry: &AppRegistry,
    name: &str,
    branch: Option<&str>,
) -> Result<App, RegistryError> {
    let stored = registry.get(name)?;
    Ok(branch.map_or_else(
        || stored.clone(),
        |override_branch| {
            tracing::debug!(app = %stored.full_name(), branch = override_branch, "overriding branch");
            stored.with_branch(override_branch)
        },
    ))
}

fn ios_error<E>(step: IosStep, reason: impl Into<String>, cause: E) -> RunError
where
    E: Classify + std::error::Error + Send + Sync + 'static,
{
    RunError::new(RunStep::Ios(step), reason, cause)
}

fn desktop_error<E>(step: DesktopStep, reason: impl Into<String>, cause: E) -> RunError
where
    E: Classify + std::error::Error + Send + Sync + 'static,
{
    RunError::new(RunStep::Desktop(step), reason, cause)
}

/// Copies the contents of `from` into the directory `to`, recursively.
///
/// Existing files in `to` with the same relative path are overwritten.
///
/// # Errors
///
/// Returns [`DataInjectionError`] when either directory cannot be opened or
/// an entry cannot be copied.
pub fn inject_data(from: &Utf8Path, to: &Utf8Path) -> Result<(), DataInjectionError> {
    let fail = |err: std::io::Error| DataInjectionError {
        from: from.to_string(),
        to: to.to_string(),
        message: err.to_string(),
    };
    let source = Dir::open_ambient_dir(from, ambient_authority()).map_err(fail)?;
    Dir::create_ambient_dir_all(to, ambient_authority()).map_err(fail)?;
    let destination = Dir::open_ambient_dir(to, ambient_authority()).map_err(fail)?;
    copy_dir_contents(&source, &destination).map_err(fail)
}

fn copy_dir_contents(source: &Dir, destination: &Dir) -> std::io::Result<()> {
    for item in source.entries()? {
        let entry = item?;
        let name = entry.file_name()?;
        if entry.file_type()?.is_dir() {
            destination.create_dir_all(&name)?;
            let child_source = entry.open_dir()?;
            let child_destination = destination.open_dir(&name)?;
            copy_dir_contents(&child_source, &child_destination)?;
        } else {
            source.copy(&name, destination, &name)?;
        }
    }
    Ok(())
}
