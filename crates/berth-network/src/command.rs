//! Host command construction and execution.
//!
//! Commands are assembled from typed values instead of text templates, so
//! there is no rendering step that can fail at runtime.

use std::fmt;
use std::process::Command;

use berth_common::{BerthError, BerthResult};

/// A program invocation on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostCommand {
    program: String,
    args: Vec<String>,
}

impl HostCommand {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished host command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Executes host commands.
pub trait CommandRunner {
    /// Run `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be run at all; a
    /// non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, command: &HostCommand) -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes of the agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &HostCommand) -> std::io::Result<CommandOutput> {
        let output = Command::new(command.program())
            .args(command.arguments())
            .output()?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How a non-zero exit code is treated by [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Any non-zero exit is an error.
    Success,
    /// Non-zero exits are expected outcomes (existence checks).
    AnyCode,
}

/// Run `command` and return its exit code.
///
/// # Errors
///
/// Returns [`BerthError::CommandSpawn`] if the command could not be run and,
/// under [`ExitPolicy::Success`], [`BerthError::CommandFailed`] for a
/// non-zero exit.
pub fn apply(
    runner: &dyn CommandRunner,
    command: &HostCommand,
    policy: ExitPolicy,
) -> BerthResult<i32> {
    tracing::debug!(command = %command, "Running command");
    let output = runner
        .run(command)
        .map_err(|source| BerthError::CommandSpawn {
            command: command.to_string(),
            source,
        })?;

    tracing::debug!(
        command = %command,
        code = output.code,
        stdout = %output.stdout.trim_end(),
        stderr = %output.stderr.trim_end(),
        "Command finished"
    );

    if output.code != 0 && policy == ExitPolicy::Success {
        return Err(BerthError::CommandFailed {
            command: command.to_string(),
            code: output.code,
        });
    }
    Ok(output.code)
}
