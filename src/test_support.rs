//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;

use crate::command::{CommandError, CommandOutput, CommandRunner, EnvVar};
use crate::prompt::{PromptError, Prompter};
use crate::secret::Secret;

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
    /// Environment variables set on the child.
    pub envs: Vec<EnvVar>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.arg_strings());
        parts.join(" ")
    }

    /// Returns the arguments as lossy UTF-8 strings.
    #[must_use]
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Returns the value of a child environment variable, if one was set.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<String> {
        self.envs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.to_string_lossy().into_owned())
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

    /// Returns the program names invoked so far, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|invocation| invocation.program.clone())
            .collect()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
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
}

impl CommandRunner for ScriptedRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        envs: &[EnvVar],
    ) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            envs: envs.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// A queued answer for [`ScriptedPrompter`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptedAnswer {
    /// Answer to a yes/no question.
    Confirm(bool),
    /// Answer to a text prompt.
    Text(String),
    /// Answer to a password prompt.
    Password(String),
    /// Enter pressed with nothing typed: the question's default applies.
    Enter,
}

/// Prompter that replays queued answers and records every prompt shown.
///
/// Asking a question whose queued answer has the wrong kind, or asking when
/// the queue is empty, yields [`PromptError::NonInteractive`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    answers: Rc<RefCell<VecDeque<ScriptedAnswer>>>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedPrompter {
    /// Creates a prompter with no queued answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an answer to a yes/no question.
    pub fn push_confirm(&self, answer: bool) {
        self.answers
            .borrow_mut()
            .push_back(ScriptedAnswer::Confirm(answer));
    }

    /// Queues an answer to a text prompt.
    pub fn push_text(&self, answer: impl Into<String>) {
        self.answers
            .borrow_mut()
            .push_back(ScriptedAnswer::Text(answer.into()));
    }

    /// Queues a bare Enter, accepting whatever default the next question
    /// offers.
    pub fn push_enter(&self) {
        self.answers.borrow_mut().push_back(ScriptedAnswer::Enter);
    }

    /// Queues an answer to a password prompt.
    pub fn push_password(&self, answer: impl Into<String>) {
        self.answers
            .borrow_mut()
            .push_back(ScriptedAnswer::Password(answer.into()));
    }

    /// Returns the prompts shown so far, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Returns the number of queued answers not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    fn next(&self, prompt: &str) -> Option<ScriptedAnswer> {
        self.prompts.borrow_mut().push(prompt.to_owned());
        self.answers.borrow_mut().pop_front()
    }
}

fn exhausted(prompt: &str) -> PromptError {
    PromptError::NonInteractive {
        prompt: prompt.to_owned(),
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        match self.next(prompt) {
            Some(ScriptedAnswer::Confirm(answer)) => Ok(answer),
            Some(ScriptedAnswer::Enter) => Ok(default),
            _ => Err(exhausted(prompt)),
        }
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        match self.next(prompt) {
            Some(ScriptedAnswer::Text(answer)) => {
                let trimmed = answer.trim();
                match (trimmed.is_empty(), default) {
                    (true, Some(fallback)) => Ok(fallback.to_owned()),
                    _ => Ok(trimmed.to_owned()),
                }
            }
            Some(ScriptedAnswer::Enter) => Ok(default.unwrap_or_default().to_owned()),
            _ => Err(exhausted(prompt)),
        }
    }

    fn password(&self, prompt: &str) -> Result<Secret, PromptError> {
        match self.next(prompt) {
            Some(ScriptedAnswer::Password(answer)) => Ok(Secret::new(answer)),
            _ => Err(exhausted(prompt)),
        }
    }
}
