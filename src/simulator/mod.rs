//! Simulator devices, the catalog that lists them, and per-device control.
//!
//! [`DeviceCatalog`] and [`Simulator`] are the seams the run pipeline talks
//! to. [`SimctlClient`] implements both on top of `xcrun simctl`.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::process::ProcessError;

mod simctl;
mod types;

pub use simctl::{DEFAULT_OPEN_BIN, DEFAULT_XCRUN_BIN, SimctlClient, compare_versions};

/// Device classification used for app compatibility checks.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DeviceType {
    /// iPhone simulators.
    Iphone,
    /// iPad simulators.
    Ipad,
    /// Anything the catalog could not classify.
    Unknown,
}

impl DeviceType {
    /// Classifies a simctl device type identifier such as
    /// `com.apple.CoreSimulator.SimDeviceType.iPad-Air-5th-generation`.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        let last = identifier.rsplit('.').next().unwrap_or(identifier);
        if last.starts_with("iPad") {
            Self::Ipad
        } else if last.starts_with("iPhone") {
            Self::Iphone
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Iphone => "iPhone",
            Self::Ipad => "iPad",
            Self::Unknown => "unknown",
        };
        formatter.write_str(label)
    }
}

/// Raised when a configured device type cannot be parsed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown device type {0:?}, expected iphone or ipad")]
pub struct ParseDeviceTypeError(pub String);

impl FromStr for DeviceType {
    type Err = ParseDeviceTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "iphone" => Ok(Self::Iphone),
            "ipad" => Ok(Self::Ipad),
            _ => Err(ParseDeviceTypeError(value.to_owned())),
        }
    }
}

/// A simulator device reported by the catalog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Device {
    /// Display name, for example `iPhone 15`.
    pub name: String,
    /// Unique device identifier.
    pub udid: String,
    /// Device classification.
    pub device_type: DeviceType,
    /// Directory holding the device logs.
    pub log_path: Utf8PathBuf,
    /// OS version of the runtime the device belongs to.
    pub os_version: String,
}

/// Errors raised by device catalogs and simulator controllers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SimulatorError {
    /// Raised when no device matches the requested name and version.
    #[error("no simulator named {name} available for iOS {version}")]
    DeviceNotFound {
        /// Requested OS version.
        version: String,
        /// Requested device name.
        name: String,
    },
    /// Raised when the catalog reports no iOS runtime at all.
    #[error("no iOS simulator runtimes are installed")]
    NoRuntimes,
    /// Raised when an external tool exits with a non-zero status.
    #[error("{action} failed: {program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Operation being attempted.
        action: String,
        /// Program that failed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Captured stderr.
        stderr: String,
    },
    /// Raised when tool output cannot be interpreted.
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// Output being parsed.
        what: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the tool cannot be started.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl Classify for SimulatorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::DeviceNotFound { .. } | Self::NoRuntimes => ErrorKind::NotFound,
            Self::CommandFailure { .. } | Self::Parse { .. } | Self::Process(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Enumerates the simulator devices available on the host.
pub trait DeviceCatalog {
    /// Lists devices of the given OS version, optionally restricted to a
    /// device type.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when the catalog cannot be read.
    fn list_devices(
        &self,
        version: &str,
        device_type: Option<DeviceType>,
    ) -> Result<Vec<Device>, SimulatorError>;

    /// Returns the newest installed OS version.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::NoRuntimes`] when nothing is installed.
    fn latest_version(&self) -> Result<String, SimulatorError>;

    /// Finds a device by exact OS version and name.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::DeviceNotFound`] when nothing matches.
    fn device(&self, version: &str, name: &str) -> Result<Device, SimulatorError>;
}

/// Per-device simulator operations used by the iOS run pipeline.
pub trait Simulator {
    /// Boots the device. Already booted devices are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when booting fails.
    fn boot(&self, device: &Device) -> Result<(), SimulatorError>;

    /// Brings the simulator UI to the foreground on the device.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when the UI cannot be opened.
    fn open(&self, device: &Device) -> Result<(), SimulatorError>;

    /// Installs the build at `app_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when installation fails.
    fn install_app(&self, device: &Device, app_path: &Utf8Path) -> Result<(), SimulatorError>;

    /// Returns the data container directory of an installed app.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when the app is not installed.
    fn app_data_path(&self, device: &Device, bundle_id: &str)
    -> Result<Utf8PathBuf, SimulatorError>;

    /// Sets an environment variable in the booted device.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when the variable cannot be set.
    fn setenv(&self, device: &Device, key: &str, value: &str) -> Result<(), SimulatorError>;

    /// Launches an installed app.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError`] when the launch fails.
    fn launch_app(&self, device: &Device, bundle_id: &str) -> Result<(), SimulatorError>;
}
