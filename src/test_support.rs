//! Test support utilities shared across unit and integration tests.
//!
//! Every collaborator the run pipeline talks to has a scripted double here.
//! Doubles record what they were asked to do so tests can assert on call
//! order and call counts, and can be told to fail at a given operation.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::app::{App, StorageLocation};
use crate::process::{CommandOutput, CommandRunner, ProcessError};
use crate::revision::{RevisionError, RevisionFuture, RevisionProvider};
use crate::runner::{DesktopError, DesktopHost};
use crate::simulator::{Device, DeviceCatalog, DeviceType, Simulator, SimulatorError};
use crate::storage::{ObjectReader, StorageError, StorageFuture, StorageProvider};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Extra environment passed alongside the arguments.
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    fn respond(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, ProcessError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ProcessError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProcessError> {
        self.respond(program, args, &[])
    }

    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, ProcessError> {
        self.respond(program, args, env)
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Returns an app with predictable defaults for tests.
#[must_use]
pub fn sample_app(name: &str, branch: &str) -> App {
    App {
        name: name.to_owned(),
        registry: String::from("acme"),
        branch: branch.to_owned(),
        bundle_id: Some(format!("com.acme.{name}")),
        repo: format!("acme/{name}"),
        env: BTreeMap::new(),
        storage: StorageLocation {
            provider: String::from("fake"),
            bucket: String::from("builds"),
        },
        device_type: None,
    }
}

/// Returns a device on the given runtime.
#[must_use]
pub fn sample_device(name: &str, version: &str, device_type: DeviceType) -> Device {
    let udid = format!("{}-{version}", name.replace(' ', "-")).to_uppercase();
    Device {
        name: name.to_owned(),
        log_path: Utf8PathBuf::from(format!("/sim/{udid}/data/Library/Logs")),
        udid,
        device_type,
        os_version: version.to_owned(),
    }
}

/// Builds an in-memory tar archive holding `entries`, gzipped on request.
///
/// # Panics
///
/// Panics when the archive cannot be written to memory.
#[must_use]
pub fn tarball(entries: &[(&str, &[u8])], gzip: bool) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *body)
            .unwrap_or_else(|err| panic!("append {path}: {err}"));
    }
    let raw = builder
        .into_inner()
        .unwrap_or_else(|err| panic!("finish tarball: {err}"));
    if !gzip {
        return raw;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    std::io::Write::write_all(&mut encoder, &raw)
        .unwrap_or_else(|err| panic!("gzip tarball: {err}"));
    encoder
        .finish()
        .unwrap_or_else(|err| panic!("finish gzip: {err}"))
}

#[derive(Debug, Default)]
struct FakeStorageState {
    objects: BTreeMap<(String, String), Vec<u8>>,
    list_calls: usize,
    get_calls: Vec<String>,
    list_error: Option<StorageError>,
}

/// In-memory storage provider counting the calls it receives.
#[derive(Clone, Debug, Default)]
pub struct FakeStorage {
    state: Arc<Mutex<FakeStorageState>>,
}

impl FakeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeStorageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `body` under `key` in `bucket`, replacing any previous object.
    pub fn put(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.lock()
            .objects
            .insert((bucket.to_owned(), key.to_owned()), body);
    }

    /// Removes every object in `bucket` whose key starts with `prefix`.
    pub fn clear_prefix(&self, bucket: &str, prefix: &str) {
        self.lock()
            .objects
            .retain(|(stored_bucket, key), _| stored_bucket != bucket || !key.starts_with(prefix));
    }

    /// Makes every subsequent listing fail with `err`.
    pub fn fail_listing(&self, err: StorageError) {
        self.lock().list_error = Some(err);
    }

    /// Number of listings served.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Keys fetched so far, in call order.
    #[must_use]
    pub fn fetched_keys(&self) -> Vec<String> {
        self.lock().get_calls.clone()
    }

    /// Number of objects fetched so far.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.lock().get_calls.len()
    }
}

impl StorageProvider for FakeStorage {
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: &'a str) -> StorageFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.list_calls += 1;
            if let Some(err) = state.list_error.clone() {
                return Err(err);
            }
            Ok(state
                .objects
                .keys()
                .filter(|(stored_bucket, key)| stored_bucket == bucket && key.starts_with(prefix))
                .map(|(_, key)| key.clone())
                .collect())
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, ObjectReader> {
        Box::pin(async move {
            let mut state = self.lock();
            state.get_calls.push(key.to_owned());
            let body = state
                .objects
                .get(&(bucket.to_owned(), key.to_owned()))
                .cloned()
                .ok_or_else(|| StorageError::ObjectNotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                })?;
            Ok(Box::new(Cursor::new(body)) as ObjectReader)
        })
    }
}

#[derive(Debug, Default)]
struct FakeRevisionsState {
    heads: BTreeMap<(String, String), String>,
    calls: usize,
}

/// Revision provider answering from a fixed table.
///
/// Unknown branches fail with [`RevisionError::BranchNotFound`].
#[derive(Clone, Debug, Default)]
pub struct FakeRevisions {
    state: Arc<Mutex<FakeRevisionsState>>,
}

impl FakeRevisions {
    /// Creates a provider that knows no branches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeRevisionsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `sha` as the head of `branch` in `repo`.
    pub fn set_head(&self, repo: &str, branch: &str, sha: &str) {
        self.lock()
            .heads
            .insert((repo.to_owned(), branch.to_owned()), sha.to_owned());
    }

    /// Number of lookups served.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().calls
    }
}

impl RevisionProvider for FakeRevisions {
    fn branch_head_sha<'a>(&'a self, repo: &'a str, branch: &'a str) -> RevisionFuture<'a> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls += 1;
            state
                .heads
                .get(&(repo.to_owned(), branch.to_owned()))
                .cloned()
                .ok_or_else(|| RevisionError::BranchNotFound {
                    repo: repo.to_owned(),
                    branch: branch.to_owned(),
                })
        })
    }
}

/// Device catalog serving a fixed device list.
#[derive(Clone, Debug, Default)]
pub struct FakeCatalog {
    devices: Vec<Device>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeCatalog {
    /// Creates a catalog holding `devices`.
    #[must_use]
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            calls: Rc::default(),
        }
    }

    /// Catalog operations requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl DeviceCatalog for FakeCatalog {
    fn list_devices(
        &self,
        version: &str,
        device_type: Option<DeviceType>,
    ) -> Result<Vec<Device>, SimulatorError> {
        self.calls.borrow_mut().push(format!("list {version}"));
        Ok(self
            .devices
            .iter()
            .filter(|device| device.os_version == version)
            .filter(|device| device_type.is_none_or(|wanted| wanted == device.device_type))
            .cloned()
            .collect())
    }

    fn latest_version(&self) -> Result<String, SimulatorError> {
        self.calls.borrow_mut().push(String::from("latest"));
        self.devices
            .iter()
            .map(|device| device.os_version.clone())
            .max_by(|left, right| crate::simulator::compare_versions(left, right))
            .ok_or(SimulatorError::NoRuntimes)
    }

    fn device(&self, version: &str, name: &str) -> Result<Device, SimulatorError> {
        self.calls.borrow_mut().push(format!("device {version} {name}"));
        self.devices
            .iter()
            .find(|device| device.os_version == version && device.name == name)
            .cloned()
            .ok_or_else(|| SimulatorError::DeviceNotFound {
                version: version.to_owned(),
                name: name.to_owned(),
            })
    }
}

/// A simulator operation recorded by [`RecordingSimulator`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimulatorCall {
    /// `boot(device)`.
    Boot(String),
    /// `open(device)`.
    Open(String),
    /// `install_app(device, path)`.
    Install(String, Utf8PathBuf),
    /// `app_data_path(device, bundle)`.
    AppDataPath(String, String),
    /// `setenv(device, key, value)`.
    Setenv(String, String, String),
    /// `launch_app(device, bundle)`.
    Launch(String, String),
}

impl SimulatorCall {
    /// Short operation name, used to pick the failing operation.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Boot(_) => "boot",
            Self::Open(_) => "open",
            Self::Install(..) => "install",
            Self::AppDataPath(..) => "app_data_path",
            Self::Setenv(..) => "setenv",
            Self::Launch(..) => "launch",
        }
    }
}

/// Simulator controller that records calls and fails on request.
#[derive(Clone, Debug)]
pub struct RecordingSimulator {
    calls: Rc<RefCell<Vec<SimulatorCall>>>,
    fail_on: Rc<RefCell<Option<&'static str>>>,
    data_root: Utf8PathBuf,
}

impl RecordingSimulator {
    /// Creates a simulator whose app containers live under `data_root`.
    #[must_use]
    pub fn new(data_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            calls: Rc::default(),
            fail_on: Rc::default(),
            data_root: data_root.into(),
        }
    }

    /// Makes the named operation fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.borrow_mut() = Some(operation);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SimulatorCall> {
        self.calls.borrow().clone()
    }

    /// Operation names recorded so far.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(SimulatorCall::operation).collect()
    }

    /// Data container path reported for `bundle_id`.
    #[must_use]
    pub fn data_path_for(&self, bundle_id: &str) -> Utf8PathBuf {
        self.data_root.join(bundle_id)
    }

    fn record(&self, call: SimulatorCall) -> Result<(), SimulatorError> {
        let operation = call.operation();
        self.calls.borrow_mut().push(call);
        if *self.fail_on.borrow() == Some(operation) {
            return Err(SimulatorError::CommandFailure {
                action: operation.to_owned(),
                program: String::from("xcrun"),
                status_text: String::from("1"),
                stderr: String::from("simulated failure"),
            });
        }
        Ok(())
    }
}

impl Simulator for RecordingSimulator {
    fn boot(&self, device: &Device) -> Result<(), SimulatorError> {
        self.record(SimulatorCall::Boot(device.udid.clone()))
    }

    fn open(&self, device: &Device) -> Result<(), SimulatorError> {
        self.record(SimulatorCall::Open(device.udid.clone()))
    }

    fn install_app(&self, device: &Device, app_path: &Utf8Path) -> Result<(), SimulatorError> {
        self.record(SimulatorCall::Install(
            device.udid.clone(),
            app_path.to_owned(),
        ))
    }

    fn app_data_path(
        &self,
        device: &Device,
        bundle_id: &str,
    ) -> Result<Utf8PathBuf, SimulatorError> {
        self.record(SimulatorCall::AppDataPath(
            device.udid.clone(),
            bundle_id.to_owned(),
        ))?;
        Ok(self.data_path_for(bundle_id))
    }

    fn setenv(&self, device: &Device, key: &str, value: &str) -> Result<(), SimulatorError> {
        self.record(SimulatorCall::Setenv(
            device.udid.clone(),
            key.to_owned(),
            value.to_owned(),
        ))
    }

    fn launch_app(&self, device: &Device, bundle_id: &str) -> Result<(), SimulatorError> {
        self.record(SimulatorCall::Launch(
            device.udid.clone(),
            bundle_id.to_owned(),
        ))
    }
}

/// A desktop host operation recorded by [`RecordingDesktopHost`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DesktopCall {
    /// `set_env(key, value)`.
    SetEnv(String, String),
    /// `open_app(path)`.
    Open(Utf8PathBuf),
}

/// Desktop host that records calls and rejects launches on request.
#[derive(Clone, Debug, Default)]
pub struct RecordingDesktopHost {
    calls: Rc<RefCell<Vec<DesktopCall>>>,
    unsupported_platform: Option<String>,
}

impl RecordingDesktopHost {
    /// Creates a host that launches successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host that refuses to launch, reporting `platform`.
    #[must_use]
    pub fn unsupported(platform: &str) -> Self {
        Self {
            calls: Rc::default(),
            unsupported_platform: Some(platform.to_owned()),
        }
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DesktopCall> {
        self.calls.borrow().clone()
    }
}

impl DesktopHost for RecordingDesktopHost {
    fn set_env(&self, key: &str, value: &str) -> Result<(), DesktopError> {
        self.calls
            .borrow_mut()
            .push(DesktopCall::SetEnv(key.to_owned(), value.to_owned()));
        Ok(())
    }

    fn open_app(&self, app_path: &Utf8Path) -> Result<(), DesktopError> {
        self.calls
            .borrow_mut()
            .push(DesktopCall::Open(app_path.to_owned()));
        self.unsupported_platform
            .as_ref()
            .map_or(Ok(()), |platform| {
                Err(DesktopError::UnsupportedPlatform {
                    platform: platform.clone(),
                })
            })
    }
}
