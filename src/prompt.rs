//! Operator input behind a trait, so orchestration can run without a TTY.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use thiserror::Error;

use crate::secret::Secret;

/// Errors raised while asking the operator for input.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PromptError {
    /// Raised when a prompt is needed but prompting is disabled.
    #[error("no value supplied for {prompt:?} and prompting is disabled")]
    NonInteractive {
        /// Prompt that could not be shown.
        prompt: String,
    },
    /// Raised when the terminal interaction fails.
    #[error("failed to read {prompt:?}: {message}")]
    Terminal {
        /// Prompt that was being shown.
        prompt: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Source of interactive answers.
pub trait Prompter {
    /// Asks a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Asks for a line of text. The answer is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Asks for a password without echoing it.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn password(&self, prompt: &str) -> Result<Secret, PromptError>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        (**self).confirm(prompt, default)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        (**self).input(prompt, default)
    }

    fn password(&self, prompt: &str) -> Result<Secret, PromptError> {
        (**self).password(prompt)
    }
}

/// Prompter backed by `dialoguer` on the controlling terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompter;

fn terminal_error(prompt: &str, err: &dialoguer::Error) -> PromptError {
    PromptError::Terminal {
        prompt: prompt.to_owned(),
        message: err.to_string(),
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|err| terminal_error(prompt, &err))
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt(prompt);
        if let Some(value) = default {
            input = input.default(value.to_owned());
        }
        input
            .interact_text()
            .map(|answer| answer.trim().to_owned())
            .map_err(|err| terminal_error(prompt, &err))
    }

    fn password(&self, prompt: &str) -> Result<Secret, PromptError> {
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map(Secret::new)
            .map_err(|err| terminal_error(prompt, &err))
    }
}

/// Prompter for unattended runs. Text questions with a default get the
/// default; yes/no questions and passwords fail.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        Err(PromptError::NonInteractive {
            prompt: prompt.to_owned(),
        })
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        default
            .map(str::to_owned)
            .ok_or_else(|| PromptError::NonInteractive {
                prompt: prompt.to_owned(),
            })
    }

    fn password(&self, prompt: &str) -> Result<Secret, PromptError> {
        Err(PromptError::NonInteractive {
            prompt: prompt.to_owned(),
        })
    }
}
