//! `xcrun simctl` backed device catalog and simulator controller.

use std::cmp::Ordering;
use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};

use super::types::{SimctlDevice, SimctlDeviceList};
use super::{Device, DeviceCatalog, DeviceType, Simulator, SimulatorError};
use crate::process::{CommandOutput, CommandRunner, ProcessCommandRunner};

/// Default `xcrun` binary.
pub const DEFAULT_XCRUN_BIN: &str = "xcrun";

/// Default macOS application opener.
pub const DEFAULT_OPEN_BIN: &str = "open";

const IOS_RUNTIME_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.iOS-";
const ALREADY_BOOTED_MARKER: &str = "current state: Booted";

/// Talks to CoreSimulator through `xcrun simctl`.
#[derive(Clone, Debug)]
pub struct SimctlClient<R: CommandRunner> {
    xcrun_bin: String,
    open_bin: String,
    runner: R,
}

impl SimctlClient<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(xcrun_bin: impl Into<String>, open_bin: impl Into<String>) -> Self {
        Self::new(xcrun_bin, open_bin, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SimctlClient<R> {
    /// Creates a client using the provided runner.
    #[must_use]
    pub fn new(xcrun_bin: impl Into<String>, open_bin: impl Into<String>, runner: R) -> Self {
        Self {
            xcrun_bin: xcrun_bin.into(),
            open_bin: open_bin.into(),
            runner,
        }
    }

    fn simctl(&self, action: &str, args: &[&str]) -> Result<CommandOutput, SimulatorError> {
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(OsString::from("simctl"));
        full_args.extend(args.iter().map(OsString::from));
        let output = self.runner.run(&self.xcrun_bin, &full_args)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(command_failure(action, &self.xcrun_bin, &output))
    }

    fn runtimes(&self) -> Result<Vec<(String, Vec<SimctlDevice>)>, SimulatorError> {
        let output = self.simctl("list devices", &["list", "devices", "--json"])?;
        let list: SimctlDeviceList =
            serde_json::from_str(&output.stdout).map_err(|err| SimulatorError::Parse {
                what: String::from("simctl device list"),
                message: err.to_string(),
            })?;

        Ok(list
            .devices
            .into_iter()
            .filter_map(|(runtime, devices)| {
                runtime_version(&runtime).map(|version| (version, devices))
            })
            .collect())
    }
}

impl<R: CommandRunner> DeviceCatalog for SimctlClient<R> {
    fn list_devices(
        &self,
        version: &str,
        device_type: Option<DeviceType>,
    ) -> Result<Vec<Device>, SimulatorError> {
        let mut devices = Vec::new();
        for (runtime_version, entries) in self.runtimes()? {
            if runtime_version != version {
                continue;
            }
            devices.extend(
                entries
                    .into_iter()
                    .filter(|entry| entry.is_available)
                    .map(|entry| to_device(entry, &runtime_version))
                    .filter(|device| device_type.is_none_or(|wanted| wanted == device.device_type)),
            );
        }
        Ok(devices)
    }

    fn latest_version(&self) -> Result<String, SimulatorError> {
        self.runtimes()?
            .into_iter()
            .filter(|(_, devices)| devices.iter().any(|device| device.is_available))
            .map(|(version, _)| version)
            .max_by(|left, right| compare_versions(left, right))
            .ok_or(SimulatorError::NoRuntimes)
    }

    fn device(&self, version: &str, name: &str) -> Result<Device, SimulatorError> {
        self.list_devices(version, None)?
            .into_iter()
            .find(|device| device.name == name)
            .ok_or_else(|| SimulatorError::DeviceNotFound {
                version: version.to_owned(),
                name: name.to_owned(),
            })
    }
}

impl<R: CommandRunner> Simulator for SimctlClient<R> {
    fn boot(&self, device: &Device) -> Result<(), SimulatorError> {
        match self.simctl("boot simulator", &["boot", device.udid.as_str()]) {
            Ok(_) => Ok(()),
            Err(SimulatorError::CommandFailure { ref stderr, .. })
                if stderr.contains(ALREADY_BOOTED_MARKER) =>
            {
                tracing::debug!(udid = %device.udid, "simulator already booted");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn open(&self, device: &Device) -> Result<(), SimulatorError> {
        let args = [
            OsString::from("-a"),
            OsString::from("Simulator"),
            OsString::from("--args"),
            OsString::from("-CurrentDeviceUDID"),
            OsString::from(&device.udid),
        ];
        let output = self.runner.run(&self.open_bin, &args)?;
        if output.is_success() {
            return Ok(());
        }
        Err(command_failure("open simulator", &self.open_bin, &output))
    }

    fn install_app(&self, device: &Device, app_path: &Utf8Path) -> Result<(), SimulatorError> {
        self.simctl("install app", &["install", device.udid.as_str(), app_path.as_str()])
            .map(drop)
    }

    fn app_data_path(
        &self,
        device: &Device,
        bundle_id: &str,
    ) -> Result<Utf8PathBuf, SimulatorError> {
        let output = self.simctl(
            "read app data path",
            &["get_app_container", device.udid.as_str(), bundle_id, "data"],
        )?;
        let path = output.stdout.trim();
        if path.is_empty() {
            return Err(SimulatorError::Parse {
                what: String::from("app container path"),
                message: format!("simctl returned no path for {bundle_id}"),
            });
        }
        Ok(Utf8PathBuf::from(path))
    }

    fn setenv(&self, device: &Device, key: &str, value: &str) -> Result<(), SimulatorError> {
        self.simctl(
            "set environment variable",
            &["spawn", device.udid.as_str(), "launchctl", "setenv", key, value],
        )
        .map(drop)
    }

    fn launch_app(&self, device: &Device, bundle_id: &str) -> Result<(), SimulatorError> {
        self.simctl("launch app", &["launch", device.udid.as_str(), bundle_id])
            .map(drop)
    }
}

fn command_failure(action: &str, program: &str, output: &CommandOutput) -> SimulatorError {
    SimulatorError::CommandFailure {
        action: action.to_owned(),
        program: program.to_owned(),
        status_text: output.status_text(),
        stderr: output.stderr.trim().to_owned(),
    }
}

fn to_device(entry: SimctlDevice, version: &str) -> Device {
    Device {
        device_type: DeviceType::from_identifier(&entry.device_type_identifier),
        name: entry.name,
        udid: entry.udid,
        log_path: Utf8PathBuf::from(entry.log_path),
        os_version: version.to_owned(),
    }
}

/// Extracts `17.2` from `com.apple.CoreSimulator.SimRuntime.iOS-17-2`.
pub(super) fn runtime_version(runtime: &str) -> Option<String> {
    runtime
        .strip_prefix(IOS_RUNTIME_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.replace('-', "."))
}

/// Orders dotted versions numerically, component by component.
#[must_use]
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| -> Vec<u32> {
        value
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    parse(left).cmp(&parse(right))
}
