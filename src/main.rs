//! Binary entry point for the `buildbay` CLI.

use std::error::Error as StdError;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use buildbay::{
    AppCatalog, AppListOptions, AppListing, AppRunner, BuildResolver, BuildbayConfig,
    CatalogError, ConfigError, DesktopRunOptions, DeviceError, DeviceResolver, GCS_PROVIDER_ID,
    GcsStorage, GitHubRevisions, IosRunOptions, IosRunOutcome, LOCAL_PROVIDER_ID, LocalStorage,
    ProcessCommandRunner, ProcessDesktopHost, RegistryError, RevisionError, RunError,
    SimctlClient, StorageError, StorageRegistry,
};

mod cli;

use cli::{Cli, Command, DesktopCommand, IosCommand, IosDevicesCommand, IosLogsCommand, ListCommand};

/// Environment variable holding a tracing filter that overrides `-v`.
const LOG_ENV: &str = "BUILDBAY_LOG";

type Simctl = SimctlClient<ProcessCommandRunner>;
type Runner = AppRunner<Simctl, Simctl, ProcessDesktopHost<ProcessCommandRunner>>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error")]
    Config(#[from] ConfigError),
    #[error("failed to load app catalog")]
    Catalog(#[from] CatalogError),
    #[error("failed to configure storage")]
    Storage(#[from] StorageError),
    #[error("failed to configure revision lookups")]
    Revision(#[from] RevisionError),
    #[error(transparent)]
    App(#[from] RegistryError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("failed to write output")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("buildbay={level}"))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    let config = BuildbayConfig::load_without_cli_args()?;
    config.validate()?;
    let runner = build_runner(&config)?;
    let mut stdout = io::stdout().lock();

    match command {
        Command::Ios(IosCommand::Run(args)) => {
            let options = IosRunOptions {
                ios_version: args.ios_version,
                device_name: args.device,
                data_path: args.data_path.map(Utf8PathBuf::from),
                branch: args.branch,
            };
            let outcome = runner.run_ios(&args.app, &options).await?;
            write_ios_outcome(&mut stdout, &outcome)?;
        }
        Command::Ios(IosCommand::Devices(args)) => list_devices(&runner, &args, &mut stdout)?,
        Command::Ios(IosCommand::Logs(args)) => print_logs_path(&runner, &args, &mut stdout)?,
        Command::Desktop(DesktopCommand::Run(args)) => {
            let options = DesktopRunOptions {
                branch: args.branch,
            };
            let outcome = runner.run_desktop(&args.app, &options).await?;
            writeln!(stdout, "opened {} ({})", outcome.app, outcome.branch)?;
        }
        Command::List(args) => {
            let listing = runner.list_apps(list_options(&args));
            write_listing(&mut stdout, &listing)?;
        }
    }
    Ok(())
}

fn build_runner(config: &BuildbayConfig) -> Result<Runner, CliError> {
    let timeout = config.http_timeout();
    let gcs = GcsStorage::new(&config.gcs_api_url, config.gcs_token.clone(), timeout)?;
    let mut storage = StorageRegistry::new().with_provider(GCS_PROVIDER_ID, gcs);
    if let Some(root) = config.local_storage_path() {
        storage = storage.with_provider(LOCAL_PROVIDER_ID, LocalStorage::new(root));
    }

    let revisions = GitHubRevisions::new(
        &config.github_api_url,
        config.github_token.clone(),
        timeout,
    )?;
    let builds = BuildResolver::new(config.workdir_path(), storage, revisions);
    let apps = AppCatalog::load(&config.apps_file_path())?;
    let simctl = SimctlClient::with_process_runner(&config.xcrun_bin, &config.open_bin);
    let desktop = ProcessDesktopHost::with_process_runner(&config.open_bin);

    Ok(AppRunner::new(
        apps,
        builds,
        DeviceResolver::new(simctl.clone()),
        simctl,
        desktop,
    ))
}

fn list_devices(
    runner: &Runner,
    args: &IosDevicesCommand,
    mut target: impl Write,
) -> Result<(), CliError> {
    let app = args
        .app
        .as_deref()
        .map(|name| runner.apps().ios().get(name))
        .transpose()?;
    let listing = runner.devices().list_devices(app, &args.ios_version)?;
    writeln!(target, "iOS {} simulators:", listing.version)?;
    for name in &listing.names {
        writeln!(target, "  {name}")?;
    }
    Ok(())
}

fn print_logs_path(
    runner: &Runner,
    args: &IosLogsCommand,
    mut target: impl Write,
) -> Result<(), CliError> {
    let path = runner
        .devices()
        .logs_path(&args.ios_version, &args.device)?;
    writeln!(target, "{path}")?;
    Ok(())
}

fn write_ios_outcome(mut target: impl Write, outcome: &IosRunOutcome) -> io::Result<()> {
    writeln!(
        target,
        "launched {} ({}) on {} (iOS {})",
        outcome.app, outcome.branch, outcome.device.name, outcome.device.os_version
    )?;
    writeln!(target, "build: {}", outcome.build.path)?;
    writeln!(target, "app data directory: {}", outcome.data_path)
}

const fn list_options(args: &ListCommand) -> AppListOptions {
    if args.ios || args.desktop {
        AppListOptions {
            ios: args.ios,
            desktop: args.desktop,
        }
    } else {
        AppListOptions {
            ios: true,
            desktop: true,
        }
    }
}

fn write_listing(mut target: impl Write, listing: &AppListing) -> io::Result<()> {
    let sections = [("iOS apps", &listing.ios), ("Desktop apps", &listing.desktop)];
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        writeln!(target, "{title}:")?;
        for name in names {
            writeln!(target, "  {name}")?;
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
    let mut cause = err.source();
    while let Some(inner) = cause {
        writeln!(target, "  caused by: {inner}").ok();
        cause = inner.source();
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
