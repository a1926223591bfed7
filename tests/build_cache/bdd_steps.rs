//! BDD step definitions for build resolution.

use buildbay::{AppType, BuildSource, Classify};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{BuildCacheContext, BuildCacheTestError, BuildResult};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] BuildCacheTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("an app \"{name}\" tracking branch \"{branch}\"")]
fn app_tracking_branch(
    mut build_cache_context: BuildCacheContext,
    name: String,
    branch: String,
) -> BuildCacheContext {
    build_cache_context.app.name = name;
    build_cache_context.app.branch = branch;
    let app = &build_cache_context.app;
    build_cache_context
        .revisions
        .set_head(&app.repo, &app.branch, "abc123");
    build_cache_context
}

#[given("the remote branch holds build \"{file_name}\"")]
fn remote_holds_build(build_cache_context: BuildCacheContext, file_name: String) -> BuildCacheContext {
    build_cache_context.upload(&file_name);
    build_cache_context
}

#[given("the branch head is \"{sha}\"")]
fn branch_head(build_cache_context: BuildCacheContext, sha: String) -> BuildCacheContext {
    let app = &build_cache_context.app;
    build_cache_context
        .revisions
        .set_head(&app.repo, &app.branch, &sha);
    build_cache_context
}

#[when("the branch head cannot be looked up")]
fn branch_head_unknown(mut build_cache_context: BuildCacheContext) -> BuildCacheContext {
    build_cache_context.app.repo = String::from("acme/unknown");
    build_cache_context
}

#[given("the app uploads to provider \"{provider}\"")]
fn app_provider(mut build_cache_context: BuildCacheContext, provider: String) -> BuildCacheContext {
    build_cache_context.app.storage.provider = provider;
    build_cache_context
}

#[when("the remote branch is replaced by build \"{file_name}\"")]
fn remote_replaced(build_cache_context: BuildCacheContext, file_name: String) -> BuildCacheContext {
    let prefix = format!("{}/", build_cache_context.app.remote_prefix());
    build_cache_context
        .storage
        .clear_prefix(&build_cache_context.app.storage.bucket, &prefix);
    build_cache_context.upload(&file_name);
    build_cache_context
}

#[when("I resolve the build")]
fn resolve_build(mut build_cache_context: BuildCacheContext) -> Result<BuildCacheContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let resolver = build_cache_context.resolver();
    let app = build_cache_context.app.clone();
    let result = runtime.block_on(async move { resolver.resolve(&app, AppType::Ios).await });
    let outcome = match result {
        Ok(build) => BuildResult::Resolved(build),
        Err(err) => BuildResult::Failure {
            kind: err.kind(),
            message: err.to_string(),
        },
    };
    build_cache_context.outcomes.push(outcome);
    Ok(build_cache_context)
}

#[then("the storage served \"{count}\" downloads")]
fn downloads_served(build_cache_context: &BuildCacheContext, count: usize) -> Result<(), StepError> {
    let served = build_cache_context.storage.get_calls();
    if served == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} downloads, storage served {served}: {:?}",
            build_cache_context.storage.fetched_keys()
        )))
    }
}

#[then("the last build came from the cache")]
fn last_build_cached(build_cache_context: &BuildCacheContext) -> Result<(), StepError> {
    match build_cache_context.outcomes.last() {
        Some(BuildResult::Resolved(build)) if build.source == BuildSource::Cached => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a cached build, got {other:?}"
        ))),
    }
}

#[then("the last build has content id \"{content_id}\"")]
fn last_build_content_id(
    build_cache_context: &BuildCacheContext,
    content_id: String,
) -> Result<(), StepError> {
    match build_cache_context.outcomes.last() {
        Some(BuildResult::Resolved(build)) if build.content_id == content_id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected content id {content_id}, got {other:?}"
        ))),
    }
}

#[then("exactly one build is cached")]
fn one_build_cached(build_cache_context: &BuildCacheContext) -> Result<(), StepError> {
    let cached = build_cache_context.cached_builds();
    if cached.len() == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one cached build, found {cached:?}"
        )))
    }
}

#[then("resolution fails as \"{kind}\"")]
fn resolution_fails(build_cache_context: &BuildCacheContext, kind: String) -> Result<(), StepError> {
    let Some(BuildResult::Failure {
        kind: actual,
        message,
    }) = build_cache_context.outcomes.last()
    else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if actual.to_string() == kind {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {kind} failure, got {actual}: {message}"
        )))
    }
}
