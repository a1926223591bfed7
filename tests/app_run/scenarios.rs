//! BDD scenarios for the iOS and desktop run pipelines.

use rstest_bdd_macros::scenario;

use super::test_helpers::{AppRunContext, app_run_context};

#[scenario(
    path = "tests/features/app_run.feature",
    name = "Launch an iOS app on a simulator"
)]
fn scenario_launch_ios_app(app_run_context: AppRunContext) {
    let _ = app_run_context;
}

#[scenario(
    path = "tests/features/app_run.feature",
    name = "Refuse a device the app does not support"
)]
fn scenario_refuse_unsupported_device(app_run_context: AppRunContext) {
    let _ = app_run_context;
}

#[scenario(
    path = "tests/features/app_run.feature",
    name = "Stop when the build cannot be installed"
)]
fn scenario_install_failure(app_run_context: AppRunContext) {
    let _ = app_run_context;
}

#[scenario(
    path = "tests/features/app_run.feature",
    name = "Open a desktop app"
)]
fn scenario_open_desktop_app(app_run_context: AppRunContext) {
    let _ = app_run_context;
}

#[scenario(
    path = "tests/features/app_run.feature",
    name = "Refuse to open a desktop app on an unsupported host"
)]
fn scenario_unsupported_desktop_host(app_run_context: AppRunContext) {
    let _ = app_run_context;
}
