//! Run pipeline steps and the error that names the one that failed.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// Steps of the iOS run pipeline, in execution order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IosStep {
    /// Look the app up in the iOS registry.
    ResolveApp,
    /// Resolve the simulator and check it suits the app.
    ResolveDevice,
    /// Reuse or download the build.
    AcquireBuild,
    /// Boot the simulator.
    BootSimulator,
    /// Bring the simulator UI up.
    OpenSimulator,
    /// Install the build on the simulator.
    InstallBuild,
    /// Read the installed app's data container path.
    ReadAppDataPath,
    /// Copy caller supplied data into the data container.
    InjectData,
    /// Set the app's environment variables on the simulator.
    SetEnvVars,
    /// Launch the app.
    LaunchApp,
}

impl fmt::Display for IosStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ResolveApp => "resolve app",
            Self::ResolveDevice => "resolve device",
            Self::AcquireBuild => "acquire build",
            Self::BootSimulator => "boot simulator",
            Self::OpenSimulator => "open simulator",
            Self::InstallBuild => "install build",
            Self::ReadAppDataPath => "read app data path",
            Self::InjectData => "inject data",
            Self::SetEnvVars => "set environment variables",
            Self::LaunchApp => "launch app",
        };
        formatter.write_str(label)
    }
}

/// Steps of the desktop run pipeline, in execution order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DesktopStep {
    /// Look the app up in the desktop registry.
    ResolveApp,
    /// Reuse or download the build.
    AcquireBuild,
    /// Apply the app's environment variables.
    SetEnvVars,
    /// Open the app on the host.
    Launch,
}

impl fmt::Display for DesktopStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ResolveApp => "resolve app",
            Self::AcquireBuild => "acquire build",
            Self::SetEnvVars => "set environment variables",
            Self::Launch => "launch app",
        };
        formatter.write_str(label)
    }
}

/// The pipeline step a [`RunError`] is attributed to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RunStep {
    /// A step of the iOS pipeline.
    Ios(IosStep),
    /// A step of the desktop pipeline.
    Desktop(DesktopStep),
}

impl fmt::Display for RunStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ios(step) => write!(formatter, "iOS run: {step}"),
            Self::Desktop(step) => write!(formatter, "desktop run: {step}"),
        }
    }
}

type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a run, naming the step, a reason, and the underlying cause.
///
/// Nothing done by earlier steps is undone: a booted simulator stays booted
/// and an installed app stays installed.
#[derive(Debug, Error)]
#[error("{step} failed: {reason}")]
pub struct RunError {
    step: RunStep,
    kind: ErrorKind,
    reason: String,
    #[source]
    source: BoxedCause,
}

impl RunError {
    /// Wraps `cause` as the failure of `step`, keeping its error kind.
    #[must_use]
    pub fn new<E>(step: RunStep, reason: impl Into<String>, cause: E) -> Self
    where
        E: Classify + StdError + Send + Sync + 'static,
    {
        Self {
            step,
            kind: cause.kind(),
            reason: reason.into(),
            source: Box::new(cause),
        }
    }

    /// Step that failed.
    #[must_use]
    pub const fn step(&self) -> RunStep {
        self.step
    }

    /// Human readable reason for the failure.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Classify for RunError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Raised when an iOS app has no bundle identifier to install under.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("iOS app {app} has no bundle identifier")]
pub struct MissingBundleIdError {
    /// Full name of the app.
    pub app: String,
}

impl Classify for MissingBundleIdError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Invalid
    }
}

/// Raised when caller supplied data cannot be copied into the simulator.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to copy {from} to {to}: {message}")]
pub struct DataInjectionError {
    /// Source path being copied.
    pub from: String,
    /// Destination path.
    pub to: String,
    /// Operating system error string.
    pub message: String,
}

impl Classify for DataInjectionError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}
