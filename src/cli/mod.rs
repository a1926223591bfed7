//! Command-line interface definitions for the `buildbay` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `buildbay` binary.
#[derive(Debug, Parser)]
#[command(
    name = "buildbay",
    about = "Fetch, cache, and launch iOS simulator and desktop app builds",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace).
    ///
    /// Ignored when `BUILDBAY_LOG` holds a tracing filter.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `buildbay`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run iOS builds on a simulator and inspect simulators.
    #[command(subcommand)]
    Ios(IosCommand),
    /// Run desktop builds on this host.
    #[command(subcommand)]
    Desktop(DesktopCommand),
    /// List the configured apps.
    #[command(name = "list", about = "List the configured apps")]
    List(ListCommand),
}

/// Subcommands of `buildbay ios`.
#[derive(Debug, Subcommand)]
pub(crate) enum IosCommand {
    /// Download the latest build if needed and launch it on a simulator.
    #[command(name = "run")]
    Run(IosRunCommand),
    /// List the simulators available for a runtime.
    #[command(name = "devices")]
    Devices(IosDevicesCommand),
    /// Print the path of a simulator's system log.
    #[command(name = "logs")]
    Logs(IosLogsCommand),
}

/// Arguments for `buildbay ios run`.
#[derive(Debug, Args)]
pub(crate) struct IosRunCommand {
    /// App to run, as `registry/name` or a bare name.
    pub(crate) app: String,
    /// Simulator device name, for example "iPhone 15".
    #[arg(long, value_name = "NAME")]
    pub(crate) device: String,
    /// iOS runtime version. Defaults to the newest installed runtime.
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub(crate) ios_version: String,
    /// Run the build of this branch instead of the configured one.
    #[arg(long, value_name = "BRANCH")]
    pub(crate) branch: Option<String>,
    /// Directory copied into the app's data container before launch.
    #[arg(long, value_name = "PATH")]
    pub(crate) data_path: Option<String>,
}

/// Arguments for `buildbay ios devices`.
#[derive(Debug, Args)]
pub(crate) struct IosDevicesCommand {
    /// Only list devices suitable for this app.
    #[arg(long, value_name = "APP")]
    pub(crate) app: Option<String>,
    /// iOS runtime version. Defaults to the newest installed runtime.
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub(crate) ios_version: String,
}

/// Arguments for `buildbay ios logs`.
#[derive(Debug, Args)]
pub(crate) struct IosLogsCommand {
    /// Simulator device name.
    #[arg(long, value_name = "NAME")]
    pub(crate) device: String,
    /// iOS runtime version. Defaults to the newest installed runtime.
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub(crate) ios_version: String,
}

/// Subcommands of `buildbay desktop`.
#[derive(Debug, Subcommand)]
pub(crate) enum DesktopCommand {
    /// Download the latest build if needed and open it.
    #[command(name = "run")]
    Run(DesktopRunCommand),
}

/// Arguments for `buildbay desktop run`.
#[derive(Debug, Args)]
pub(crate) struct DesktopRunCommand {
    /// App to run, as `registry/name` or a bare name.
    pub(crate) app: String,
    /// Run the build of this branch instead of the configured one.
    #[arg(long, value_name = "BRANCH")]
    pub(crate) branch: Option<String>,
}

/// Arguments for `buildbay list`.
#[derive(Debug, Args)]
pub(crate) struct ListCommand {
    /// List iOS apps.
    #[arg(long)]
    pub(crate) ios: bool,
    /// List desktop apps.
    #[arg(long)]
    pub(crate) desktop: bool,
}
