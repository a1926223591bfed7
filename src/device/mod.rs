//! Turns a version and name query into a concrete simulator device.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::app::App;
use crate::error::{Classify, ErrorKind};
use crate::simulator::{Device, DeviceCatalog, DeviceType, SimulatorError};

/// File inside a device's log directory holding the system log.
pub const SYSTEM_LOG_FILE: &str = "system.log";

/// Errors raised while resolving a device.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeviceError {
    /// Raised when no device name was given.
    #[error("a device name is required")]
    MissingName,
    /// Raised when the device type does not suit the app.
    #[error("{device} is an {actual} but the app requires an {required}")]
    IncompatibleDevice {
        /// Device name.
        device: String,
        /// Type of the resolved device.
        actual: DeviceType,
        /// Type the app requires.
        required: DeviceType,
    },
    /// Raised when the catalog lookup fails.
    #[error(transparent)]
    Catalog(#[from] SimulatorError),
}

impl Classify for DeviceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingName | Self::IncompatibleDevice { .. } => ErrorKind::Invalid,
            Self::Catalog(err) => err.kind(),
        }
    }
}

/// Device names available for a resolved OS version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceListing {
    /// OS version the names belong to.
    pub version: String,
    /// Device names in catalog order.
    pub names: Vec<String>,
}

/// Resolves OS versions and devices against a [`DeviceCatalog`].
#[derive(Clone, Debug)]
pub struct DeviceResolver<C> {
    catalog: C,
}

impl<C: DeviceCatalog> DeviceResolver<C> {
    /// Creates a resolver backed by `catalog`.
    #[must_use]
    pub const fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Returns the underlying catalog.
    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns `requested` unchanged, or the newest installed version when
    /// it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Catalog`] when the latest version is needed
    /// and cannot be determined.
    pub fn resolve_version(&self, requested: &str) -> Result<String, DeviceError> {
        if !requested.is_empty() {
            return Ok(requested.to_owned());
        }
        let latest = self.catalog.latest_version()?;
        tracing::info!(version = %latest, "no iOS version given, using the latest installed");
        Ok(latest)
    }

    /// Finds the named device on `version` and checks it against the app's
    /// device type requirement.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::MissingName`] for an empty name,
    /// [`DeviceError::IncompatibleDevice`] when `required` is set and does
    /// not match, and [`DeviceError::Catalog`] when the lookup fails.
    pub fn resolve_device(
        &self,
        version: &str,
        name: &str,
        required: Option<DeviceType>,
    ) -> Result<Device, DeviceError> {
        if name.is_empty() {
            return Err(DeviceError::MissingName);
        }
        let resolved_version = self.resolve_version(version)?;
        let device = self.catalog.device(&resolved_version, name)?;
        if let Some(wanted) = required
            && wanted != device.device_type
        {
            return Err(DeviceError::IncompatibleDevice {
                device: device.name,
                actual: device.device_type,
                required: wanted,
            });
        }
        Ok(device)
    }

    /// Lists the device names available on `version`, restricted to the
    /// device type `app` requires when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Catalog`] when the catalog cannot be read.
    pub fn list_devices(
        &self,
        app: Option<&App>,
        version: &str,
    ) -> Result<DeviceListing, DeviceError> {
        let resolved_version = self.resolve_version(version)?;
        let device_type = app.and_then(|candidate| candidate.device_type);
        let names = self
            .catalog
            .list_devices(&resolved_version, device_type)?
            .into_iter()
            .map(|device| device.name)
            .collect();
        Ok(DeviceListing {
            version: resolved_version,
            names,
        })
    }

    /// Path of the named device's system log.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when the device cannot be resolved.
    pub fn logs_path(&self, version: &str, name: &str) -> Result<Utf8PathBuf, DeviceError> {
        let device = self.resolve_device(version, name, None)?;
        Ok(device.log_path.join(SYSTEM_LOG_FILE))
    }
}
