//! External process execution behind a narrow, fakeable interface.
//!
//! Every tool the bootstrap drives (`ssh-keygen`, `ssh-copy-id`,
//! `ansible-playbook`, `kubectl`, `curl`) is invoked through
//! [`CommandRunner`], so unit and behavioural tests can substitute a scripted
//! runner and assert on invocation order and arguments.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use shell_escape::unix::escape;
use thiserror::Error;


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

    /// Converts a non-zero exit into [`CommandError::Failure`].
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Failure`] when the exit code is not zero or
    /// missing.
    pub fn into_success(self, program: &str) -> Result<Self, CommandError> {
        if self.is_success() {
            return Ok(self);
        }

        let status_text = self
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(CommandError::Failure {
            program: program.to_owned(),
            status: self.code,
            status_text,
            stderr: self.stderr.trim().to_owned(),
        })
    }
}

/// Environment variable passed to a single child process.
pub type EnvVar = (String, OsString);

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.run_with_env(program, args, &[])
    }

    /// Runs `program` with extra environment variables set on the child only.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[EnvVar],
    ) -> Result<CommandOutput, CommandError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[EnvVar],
    ) -> Result<CommandOutput, CommandError> {
        (**self).run_with_env(program, args, envs)
    }
}

/// Errors surfaced while running external programs.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when reading the output of a running command fails.
    #[error("failed to collect output from {program}: {message}")]
    Output {
        /// Command whose output could not be read.
        program: String,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a command completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    Failure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}

impl CommandError {
    /// Returns the captured stderr of a failed command, if any.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failure { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

/// Real command runner that captures output without echoing it.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[EnvVar],
    ) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %render_command_line(program, args), "running");
        let output = Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(key, value)| (key.as_str(), value.as_os_str())))
            .output()
            .map_err(|err| CommandError::Spawn {
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

/// Command runner that forwards child output to the terminal while capturing
/// it, so long playbook runs stay visible.
///
/// Standard input is inherited, which lets `ssh-copy-id` ask for a password.
#[derive(Clone, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[EnvVar],
    ) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %render_command_line(program, args), "running");
        let mut child = Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(key, value)| (key.as_str(), value.as_os_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| CommandError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let (stdout, stderr) = thread::scope(|scope| {
            let out = scope.spawn(move || tee(child_stdout, io::stdout()));
            let err = scope.spawn(move || tee(child_stderr, io::stderr()));
            (join_tee(out, program), join_tee(err, program))
        });

        let status = child.wait().map_err(|err| CommandError::Output {
            program: program.to_owned(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout?).into_owned(),
            stderr: String::from_utf8_lossy(&stderr?).into_owned(),
        })
    }
}

fn tee(source: Option<impl Read>, mut sink: impl Write) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let Some(mut reader) = source else {
        return Ok(captured);
    };

    let mut chunk = [0_u8; 8192];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let bytes = chunk.get(..read).unwrap_or_default();
        sink.write_all(bytes)?;
        sink.flush()?;
        captured.extend_from_slice(bytes);
    }
    Ok(captured)
}

fn join_tee(
    handle: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>,
    program: &str,
) -> Result<Vec<u8>, CommandError> {
    let joined = handle.join().map_err(|_| CommandError::Output {
        program: program.to_owned(),
        message: String::from("output forwarding thread panicked"),
    })?;
    joined.map_err(|err| CommandError::Output {
        program: program.to_owned(),
        message: err.to_string(),
    })
}

/// Renders a program and its arguments as a shell-escaped command line.
///
/// Only used for diagnostics; nothing is executed through a shell.
#[must_use]
pub fn render_command_line(program: &str, args: &[OsString]) -> String {
    let mut rendered = escape(program.into()).into_owned();
    for arg in args {
        let lossy = arg.to_string_lossy();
        rendered.push(' ');
        rendered.push_str(escape(lossy).as_ref());
    }
    rendered
}
