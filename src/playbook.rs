//! Ansible playbook execution against the generated inventory.
//!
//! Extra variables, including the privilege-escalation password, are handed
//! to `ansible-playbook` through a private temporary JSON file referenced as
//! `--extra-vars @<file>`, so nothing secret reaches the process table.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner};
use crate::config::BootstrapConfig;
use crate::secret::Secret;
use crate::session::InstallMode;
use crate::util::resolve_against;

const BECOME_PASSWORD_VAR: &str = "ansible_become_password";
const INSTALL_MODE_VAR: &str = "install_mode";

/// Errors raised while running a playbook.
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// Raised when the extra-vars file cannot be created or written.
    #[error("failed to prepare extra variables file: {message}")]
    VarsFile {
        /// Human-readable error message.
        message: String,
    },
    /// Raised when `ansible-playbook` cannot be started or fails.
    #[error("playbook {playbook} failed: {source}")]
    Command {
        /// Playbook that was running.
        playbook: String,
        /// Underlying command error.
        #[source]
        source: CommandError,
    },
}

/// Variables passed to every playbook via `--extra-vars`.
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtraVars(BTreeMap<String, serde_json::Value>);

impl ExtraVars {
    /// Creates an empty set of variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard variables for a deploy run.
    #[must_use]
    pub fn for_run(become_password: &Secret, mode: Option<InstallMode>) -> Self {
        let mut vars = Self::new();
        vars.insert(BECOME_PASSWORD_VAR, become_password.expose());
        if let Some(install_mode) = mode {
            vars.insert(INSTALL_MODE_VAR, install_mode.as_str());
        }
        vars
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }
}

impl fmt::Debug for ExtraVars {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.0.keys()).finish()
    }
}

/// Writes `vars` to a new temporary JSON file readable only by the owner.
///
/// The file is deleted when the returned handle is dropped.
///
/// # Errors
///
/// Returns [`PlaybookError::VarsFile`] when the file cannot be created or
/// written.
pub fn write_extra_vars(vars: &ExtraVars) -> Result<NamedTempFile, PlaybookError> {
    let vars_error = |message: String| PlaybookError::VarsFile { message };
    let mut file = tempfile::Builder::new()
        .prefix("kubestrap-vars-")
        .suffix(".json")
        .tempfile()
        .map_err(|err| vars_error(err.to_string()))?;
    serde_json::to_writer(&mut file, vars).map_err(|err| vars_error(err.to_string()))?;
    file.flush().map_err(|err| vars_error(err.to_string()))?;
    Ok(file)
}

/// Runs configured playbooks through a [`CommandRunner`].
#[derive(Debug)]
pub struct PlaybookRunner<'a, R> {
    config: &'a BootstrapConfig,
    runner: R,
    inventory: Utf8PathBuf,
    working_dir: Utf8PathBuf,
}

impl<'a, R: CommandRunner> PlaybookRunner<'a, R> {
    /// Creates a runner targeting `inventory`. `working_dir` anchors the
    /// relative kubeconfig destination.
    #[must_use]
    pub fn new(
        config: &'a BootstrapConfig,
        runner: R,
        inventory: impl Into<Utf8PathBuf>,
        working_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            config,
            runner,
            inventory: inventory.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Runs `playbook` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError`] when the variables file cannot be written or
    /// the playbook exits non-zero.
    pub fn run(&self, playbook: &str, vars: &ExtraVars) -> Result<(), PlaybookError> {
        let playbook_path = self.config.playbook_path(playbook);
        info!(playbook = %playbook_path, inventory = %self.inventory, "running playbook");

        let vars_file = write_extra_vars(vars)?;
        let mut vars_arg = OsString::from("@");
        vars_arg.push(vars_file.path());
        let args = [
            OsString::from(&playbook_path),
            OsString::from("-i"),
            OsString::from(self.inventory.as_str()),
            OsString::from("--extra-vars"),
            vars_arg,
        ];

        let bin = &self.config.ansible_playbook_bin;
        self.runner
            .run(bin, &args)
            .and_then(|output| output.into_success(bin))
            .map_err(|source| PlaybookError::Command {
                playbook: playbook_path.clone(),
                source,
            })?;
        drop(vars_file);

        info!(playbook = %playbook_path, "playbook finished");
        Ok(())
    }

    /// Runs the dependency playbook.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn install_dependencies(&self, vars: &ExtraVars) -> Result<(), PlaybookError> {
        self.run(&self.config.dependencies_playbook, vars)
    }

    /// Runs the cluster installation playbook.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn install_cluster(&self, vars: &ExtraVars) -> Result<(), PlaybookError> {
        self.run(&self.config.cluster_playbook, vars)
    }

    /// Runs the fetch playbook and returns where the kubeconfig is expected.
    ///
    /// The returned path is not checked; verification handles its absence.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub fn fetch_kubeconfig(&self, vars: &ExtraVars) -> Result<Utf8PathBuf, PlaybookError> {
        self.run(&self.config.kubeconfig_playbook, vars)?;
        Ok(self.kubeconfig_destination())
    }

    /// Configured kubeconfig path resolved against the working directory.
    #[must_use]
    pub fn kubeconfig_destination(&self) -> Utf8PathBuf {
        resolve_against(&self.working_dir, Utf8Path::new(&self.config.kubeconfig_path))
    }
}
