//! BDD step definitions for the iOS and desktop run pipelines.

use buildbay::test_support::DesktopCall;
use buildbay::{AppType, DesktopRunOptions, DeviceType, IosRunOptions, RunError};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{AppRunContext, AppRunTestError, RunResult};
use buildbay::test_support::{RecordingDesktopHost, sample_app};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] AppRunTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("an iOS app \"{name}\"")]
fn ios_app(mut app_run_context: AppRunContext, name: String) -> AppRunContext {
    app_run_context.app = sample_app(&name, "main");
    app_run_context.app_type = AppType::Ios;
    app_run_context
}

#[given("a desktop app \"{name}\"")]
fn desktop_app(mut app_run_context: AppRunContext, name: String) -> AppRunContext {
    let mut app = sample_app(&name, "main");
    app.bundle_id = None;
    app_run_context.app = app;
    app_run_context.app_type = AppType::Desktop;
    app_run_context
}

#[given("the app sets \"{key}\" to \"{value}\"")]
fn app_env(mut app_run_context: AppRunContext, key: String, value: String) -> AppRunContext {
    app_run_context.app.env.insert(key, value);
    app_run_context
}

#[given("the app requires an \"{device_type}\" device")]
fn app_device_type(
    mut app_run_context: AppRunContext,
    device_type: String,
) -> Result<AppRunContext, StepError> {
    let parsed = device_type
        .parse::<DeviceType>()
        .map_err(|err| StepError::Assertion(format!("bad device type: {err}")))?;
    app_run_context.app.device_type = Some(parsed);
    Ok(app_run_context)
}

#[given("the remote build \"{file_name}\" is uploaded")]
fn remote_build(app_run_context: AppRunContext, file_name: String) -> AppRunContext {
    app_run_context.upload(&file_name);
    app_run_context
}

#[given("the simulator fails to \"{operation}\"")]
fn simulator_fails(
    app_run_context: AppRunContext,
    operation: String,
) -> Result<AppRunContext, StepError> {
    let known = match operation.as_str() {
        "boot" => "boot",
        "open" => "open",
        "install" => "install",
        "app_data_path" => "app_data_path",
        "setenv" => "setenv",
        "launch" => "launch",
        other => {
            return Err(StepError::Assertion(format!(
                "unknown simulator operation {other}"
            )));
        }
    };
    app_run_context.simulator.fail_on(known);
    Ok(app_run_context)
}

#[given("the host platform is \"{platform}\"")]
fn host_platform(mut app_run_context: AppRunContext, platform: String) -> AppRunContext {
    app_run_context.host = RecordingDesktopHost::unsupported(&platform);
    app_run_context
}

#[when("I run the iOS app on \"{device}\" with iOS \"{version}\"")]
fn run_ios(
    mut app_run_context: AppRunContext,
    device: String,
    version: String,
) -> Result<AppRunContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let runner = app_run_context.runner()?;
    let name = app_run_context.app.full_name();
    let options = IosRunOptions {
        ios_version: version,
        device_name: device,
        ..IosRunOptions::default()
    };
    let result = runtime.block_on(async { runner.run_ios(&name, &options).await });
    app_run_context.outcome = Some(
        result.map_or_else(failure, |outcome| RunResult::Success {
            build_path: outcome.build.path,
        }),
    );
    Ok(app_run_context)
}

#[when("I run the desktop app")]
fn run_desktop(mut app_run_context: AppRunContext) -> Result<AppRunContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let runner = app_run_context.runner()?;
    let name = app_run_context.app.full_name();
    let result = runtime.block_on(async {
        runner
            .run_desktop(&name, &DesktopRunOptions::default())
            .await
    });
    app_run_context.outcome = Some(
        result.map_or_else(failure, |outcome| RunResult::Success {
            build_path: outcome.build.path,
        }),
    );
    Ok(app_run_context)
}

fn failure(err: RunError) -> RunResult {
    RunResult::Failure {
        step: err.step().to_string(),
        message: err.to_string(),
    }
}

#[then("the run succeeds")]
fn run_succeeds(app_run_context: &AppRunContext) -> Result<(), StepError> {
    match app_run_context.outcome {
        Some(RunResult::Success { .. }) => Ok(()),
        Some(RunResult::Failure { ref message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the run fails at step \"{step}\"")]
fn run_fails_at(app_run_context: &AppRunContext, step: String) -> Result<(), StepError> {
    let Some(RunResult::Failure {
        step: actual,
        message,
    }) = &app_run_context.outcome
    else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if *actual == step {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure at {step}, got {actual}: {message}"
        )))
    }
}

#[then("the simulator saw \"{operations}\"")]
fn simulator_saw(app_run_context: &AppRunContext, operations: String) -> Result<(), StepError> {
    let seen = app_run_context.simulator.operations().join(", ");
    if seen == operations {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected simulator operations [{operations}], got [{seen}]"
        )))
    }
}

#[then("the simulator was not used")]
fn simulator_unused(app_run_context: &AppRunContext) -> Result<(), StepError> {
    let calls = app_run_context.simulator.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "simulator should not be touched, got {calls:?}"
        )))
    }
}

#[then("the storage served \"{count}\" downloads")]
fn downloads_served(app_run_context: &AppRunContext, count: usize) -> Result<(), StepError> {
    let served = app_run_context.storage.get_calls();
    if served == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} downloads, storage served {served}"
        )))
    }
}

#[then("the desktop host received \"{count}\" environment variables")]
fn desktop_env(app_run_context: &AppRunContext, count: usize) -> Result<(), StepError> {
    let received = app_run_context
        .host
        .calls()
        .iter()
        .filter(|call| matches!(call, DesktopCall::SetEnv(..)))
        .count();
    if received == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} environment variables, host received {received}"
        )))
    }
}

#[then("the desktop host opened the build")]
fn desktop_opened(app_run_context: &AppRunContext) -> Result<(), StepError> {
    let Some(RunResult::Success { build_path }) = &app_run_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected success outcome",
        )));
    };
    let opened = app_run_context.host.calls().last().cloned();
    if opened == Some(DesktopCall::Open(build_path.clone())) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {build_path} to be opened last, got {opened:?}"
        )))
    }
}
