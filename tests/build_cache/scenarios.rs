//! BDD scenarios for build resolution.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BuildCacheContext, build_cache_context};

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Reuse a cached build while the remote build is unchanged"
)]
fn scenario_reuse_cached_build(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Replace a cached build when a new build is uploaded"
)]
fn scenario_replace_outdated_build(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Reject a branch without uploads"
)]
fn scenario_reject_empty_branch(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Reject a branch with several uploads"
)]
fn scenario_reject_ambiguous_branch(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Keep using the cache when the branch head moved"
)]
fn scenario_stale_head_keeps_cache(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Stop when the branch head cannot be looked up"
)]
fn scenario_head_lookup_failure(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}

#[scenario(
    path = "tests/features/build_cache.feature",
    name = "Report an unknown storage provider"
)]
fn scenario_unknown_provider(build_cache_context: BuildCacheContext) {
    let _ = build_cache_context;
}
