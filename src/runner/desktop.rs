//! Launching desktop builds on the host.

use std::cell::RefCell;
use std::ffi::OsString;

use camino::Utf8Path;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::process::{CommandRunner, ProcessCommandRunner, ProcessError};

/// Operating system family of the host, as far as launching cares.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostPlatform {
    /// macOS, where `open` can launch app bundles.
    MacOs,
    /// Any other platform, named as reported by the standard library.
    Other(String),
}

impl HostPlatform {
    /// Platform the binary was built for.
    #[must_use]
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Classifies an OS name such as `macos` or `linux`.
    #[must_use]
    pub fn from_os(os: &str) -> Self {
        if os == "macos" {
            Self::MacOs
        } else {
            Self::Other(os.to_owned())
        }
    }
}

/// Errors raised by desktop hosts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DesktopError {
    /// Raised when the host cannot launch app bundles.
    #[error("running desktop apps is not supported on {platform}")]
    UnsupportedPlatform {
        /// Platform name.
        platform: String,
    },
    /// Raised when the opener exits with a non-zero status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    LaunchFailed {
        /// Program that failed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Captured stderr.
        stderr: String,
    },
    /// Raised when the opener cannot be started.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl Classify for DesktopError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPlatform { .. } => ErrorKind::Invalid,
            Self::LaunchFailed { .. } | Self::Process(_) => ErrorKind::Internal,
        }
    }
}

/// Host side of the desktop run pipeline.
pub trait DesktopHost {
    /// Records an environment variable for the app about to be launched.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError`] when the variable cannot be applied.
    fn set_env(&self, key: &str, value: &str) -> Result<(), DesktopError>;

    /// Opens the app bundle at `app_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::UnsupportedPlatform`] on hosts that cannot
    /// open bundles and other variants when the opener fails.
    fn open_app(&self, app_path: &Utf8Path) -> Result<(), DesktopError>;
}

/// Launches bundles with `open`, passing collected variables with `--env`.
#[derive(Debug)]
pub struct ProcessDesktopHost<R: CommandRunner> {
    open_bin: String,
    platform: HostPlatform,
    runner: R,
    env: RefCell<Vec<(String, String)>>,
}

impl ProcessDesktopHost<ProcessCommandRunner> {
    /// Creates a host for the current platform using the real runner.
    #[must_use]
    pub fn with_process_runner(open_bin: impl Into<String>) -> Self {
        Self::new(open_bin, HostPlatform::current(), ProcessCommandRunner)
    }
}

impl<R: CommandRunner> ProcessDesktopHost<R> {
    /// Creates a host for `platform` using the provided runner.
    #[must_use]
    pub fn new(open_bin: impl Into<String>, platform: HostPlatform, runner: R) -> Self {
        Self {
            open_bin: open_bin.into(),
            platform,
            runner,
            env: RefCell::new(Vec::new()),
        }
    }

    /// Variables collected for the next launch, in the order they were set.
    #[must_use]
    pub fn pending_env(&self) -> Vec<(String, String)> {
        self.env.borrow().clone()
    }
}

impl<R: CommandRunner> DesktopHost for ProcessDesktopHost<R> {
    fn set_env(&self, key: &str, value: &str) -> Result<(), DesktopError> {
        let mut env = self.env.borrow_mut();
        env.retain(|(existing, _)| existing != key);
        env.push((key.to_owned(), value.to_owned()));
        Ok(())
    }

    fn open_app(&self, app_path: &Utf8Path) -> Result<(), DesktopError> {
        // Variables apply to this launch only.
        let env = self.env.take();
        if let HostPlatform::Other(platform) = &self.platform {
            return Err(DesktopError::UnsupportedPlatform {
                platform: platform.clone(),
            });
        }

        let mut args = Vec::with_capacity(env.len() * 2 + 1);
        for (key, value) in &env {
            args.push(OsString::from("--env"));
            args.push(OsString::from(format!("{key}={value}")));
        }
        args.push(OsString::from(app_path.as_str()));

        tracing::info!(path = %app_path, "opening desktop app");
        let output = self.runner.run_with_env(&self.open_bin, &args, &env)?;
        if output.is_success() {
            return Ok(());
        }
        Err(DesktopError::LaunchFailed {
            program: self.open_bin.clone(),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }
}
