//! Command runner abstraction used for every external tool invocation.
//!
//! Simulator control (`xcrun simctl`) and desktop launching (`open`) shell
//! out through [`CommandRunner`] so tests can script outcomes without
//! spawning processes.

use std::ffi::OsString;
use std::process::Command;

use shell_escape::unix::escape;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable representation of the exit status.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised while starting an external command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProcessError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

impl Classify for ProcessError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProcessError>;

    /// Runs `program` with extra environment variables layered over the
    /// current process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the command cannot be started.
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, ProcessError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    fn execute(mut command: Command, program: &str) -> Result<CommandOutput, ProcessError> {
        let output = command.output().map_err(|err| ProcessError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(command = %render_command(program, args), "running command");
        let mut command = Command::new(program);
        command.args(args);
        Self::execute(command, program)
    }

    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(String, String)],
    ) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(
            command = %render_command(program, args),
            env_vars = env.len(),
            "running command"
        );
        let mut command = Command::new(program);
        command.args(args);
        command.envs(env.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        Self::execute(command, program)
    }
}

/// Renders a shell-escaped command line for diagnostics.
#[must_use]
pub fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(escape(program.into()));
    for arg in args {
        rendered.push(' ');
        let lossy = arg.to_string_lossy();
        rendered.push_str(escape(lossy).as_ref());
    }
    rendered
}
