//! End-to-end deploy flow: keys, trust, inventory, playbooks, verification.
//!
//! [`DeployOrchestrator`] sequences the steps and owns the three failure
//! tiers: propagated [`DeployError`]s, soft aborts reported as
//! [`DeployOutcome::Aborted`], and a missing kubeconfig surfaced as
//! [`Verification::KubeconfigMissing`].

use std::ops::ControlFlow;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::config::BootstrapConfig;
use crate::inventory::{InventoryDecision, InventoryError, InventoryHost, InventoryStore};
use crate::keys::{KeyError, KeyPair, ensure_key_pair};
use crate::playbook::{ExtraVars, PlaybookError, PlaybookRunner};
use crate::prompt::{PromptError, Prompter};
use crate::secret::Secret;
use crate::session::{InstallMode, InvalidModeError, Session, SshTarget};
use crate::trust::{TrustError, distribute_public_key};
use crate::verify::{ApiVerifier, Verification, VerifyError};

const MODE_PROMPT: &str = "Enter installation mode (single/cluster)";
const SSH_USER_PROMPT: &str = "Enter SSH user for the node";
const SSH_PASSWORD_PROMPT: &str = "Enter SSH password (leave empty to be asked by ssh-copy-id)";
const HOST_PROMPT: &str = "Enter node IP address";
const BECOME_PASSWORD_PROMPT: &str = "Enter sudo password for the node";
const HOSTNAME_PROMPT: &str = "Enter hostname for the node";

/// Values supplied up front. Anything left as `None` is asked for.
#[derive(Clone, Debug, Default)]
pub struct DeployRequest {
    /// Installation mode as typed by the operator.
    pub mode: Option<String>,
    /// Node address.
    pub host: Option<String>,
    /// Inventory name of the node.
    pub hostname: Option<String>,
    /// SSH login user.
    pub ssh_user: Option<String>,
    /// Answer to the "reuse the existing inventory?" question.
    pub reuse_inventory: Option<bool>,
    /// SSH password. An empty secret means key or terminal authentication.
    pub ssh_password: Option<Secret>,
    /// Privilege-escalation password for Ansible.
    pub become_password: Option<Secret>,
}

/// Conditions that end a deploy early without failing it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AbortReason {
    /// The installation mode was neither `single` nor `cluster`.
    #[error(transparent)]
    InvalidMode(#[from] InvalidModeError),
    /// The reused inventory lacks the `all.hosts` structure.
    #[error("Invalid structure in inventory file {path}")]
    InvalidInventory {
        /// Inventory path.
        path: Utf8PathBuf,
    },
    /// The reused inventory has no hosts.
    #[error("No hosts found in inventory file {path}")]
    NoHosts {
        /// Inventory path.
        path: Utf8PathBuf,
    },
    /// The first host of the reused inventory has no address.
    #[error("Host {host} in inventory file {path} has no ansible_host address")]
    MissingAddress {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Host entry lacking an address.
        host: String,
    },
}

impl AbortReason {
    fn from_inventory(err: InventoryError) -> Result<Self, InventoryError> {
        match err {
            InventoryError::InvalidStructure { path } => Ok(Self::InvalidInventory { path }),
            InventoryError::NoHosts { path } => Ok(Self::NoHosts { path }),
            InventoryError::MissingAddress { path, host } => {
                Ok(Self::MissingAddress { path, host })
            }
            other => Err(other),
        }
    }
}

/// Result of a deploy run that did not fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeployOutcome {
    /// Every step ran.
    Completed {
        /// Host the playbooks targeted.
        host: InventoryHost,
        /// Where the kubeconfig was expected.
        kubeconfig: Utf8PathBuf,
        /// Result of the post-install checks.
        verification: Verification,
    },
    /// The run stopped early; nothing after the abort point ran.
    Aborted(AbortReason),
}

/// Fatal errors from any deploy step.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Key pair preparation failed.
    #[error(transparent)]
    Keys(#[from] KeyError),
    /// Public key distribution failed.
    #[error(transparent)]
    Trust(#[from] TrustError),
    /// The inventory could not be read or written.
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    /// A required answer could not be obtained.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// A playbook failed.
    #[error(transparent)]
    Playbook(#[from] PlaybookError),
    /// Cluster verification failed.
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Drives a full deploy through injected command and prompt seams.
#[derive(Debug)]
pub struct DeployOrchestrator<'a, R, P> {
    config: &'a BootstrapConfig,
    runner: R,
    prompter: P,
    working_dir: Utf8PathBuf,
}

impl<'a, R: CommandRunner, P: Prompter> DeployOrchestrator<'a, R, P> {
    /// Creates an orchestrator. Relative inventory and kubeconfig paths are
    /// resolved against `working_dir`.
    #[must_use]
    pub fn new(
        config: &'a BootstrapConfig,
        runner: R,
        prompter: P,
        working_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            config,
            runner,
            prompter,
            working_dir: working_dir.into(),
        }
    }

    /// Runs the whole deploy flow.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError`] when a step fails. Invalid input and unusable
    /// inventories end the run with [`DeployOutcome::Aborted`] instead.
    pub fn execute(&self, request: &DeployRequest) -> Result<DeployOutcome, DeployError> {
        let (keys, _) = ensure_key_pair(&self.runner, self.config)?;
        let store = InventoryStore::from_config(self.config, &self.working_dir);

        let flow = match store.reuse_or_discard(&self.prompter, request.reuse_inventory)? {
            InventoryDecision::CreateNew => self.prepare_new_inventory(request, &store, &keys)?,
            InventoryDecision::Reuse => self.prepare_reused_inventory(request, &store)?,
        };
        let (session, host) = match flow {
            ControlFlow::Continue(prepared) => prepared,
            ControlFlow::Break(reason) => {
                warn!(%reason, "deploy aborted");
                return Ok(DeployOutcome::Aborted(reason));
            }
        };

        let vars = ExtraVars::for_run(&session.become_password, session.mode);
        let playbooks =
            PlaybookRunner::new(self.config, &self.runner, store.path(), &self.working_dir);
        playbooks.install_dependencies(&vars)?;
        playbooks.install_cluster(&vars)?;
        let kubeconfig = playbooks.fetch_kubeconfig(&vars)?;

        let verification =
            ApiVerifier::new(self.config, &self.runner).verify(&kubeconfig, &session.target.host)?;
        info!(
            host = %session.hostname,
            target = %session.target.destination(),
            "deploy finished"
        );
        Ok(DeployOutcome::Completed {
            host,
            kubeconfig,
            verification,
        })
    }

    fn prepare_new_inventory(
        &self,
        request: &DeployRequest,
        store: &InventoryStore,
        keys: &KeyPair,
    ) -> Result<ControlFlow<AbortReason, (Session, InventoryHost)>, DeployError> {
        let session = match self.collect_session(request)? {
            ControlFlow::Continue(collected) => collected,
            ControlFlow::Break(reason) => return Ok(ControlFlow::Break(reason)),
        };

        distribute_public_key(
            &self.runner,
            self.config,
            &keys.public_key,
            &session.target,
            session.ssh_password.as_ref(),
        )?;
        let host = store.create(
            &session.hostname,
            &session.target.host,
            &session.become_password,
        )?;
        Ok(ControlFlow::Continue((session, host)))
    }

    fn collect_session(
        &self,
        request: &DeployRequest,
    ) -> Result<ControlFlow<AbortReason, Session>, DeployError> {
        let raw_mode = self.text(request.mode.as_deref(), MODE_PROMPT, None)?;
        let mode = match raw_mode.parse::<InstallMode>() {
            Ok(mode) => mode,
            Err(err) => return Ok(ControlFlow::Break(err.into())),
        };
        info!(%mode, "installation mode selected");

        let user = self.text(
            request.ssh_user.as_deref(),
            SSH_USER_PROMPT,
            Some(self.config.default_ssh_user.as_str()),
        )?;
        let ssh_password = self.ssh_password(request)?;
        let address = self.text(request.host.as_deref(), HOST_PROMPT, None)?;
        let target = SshTarget::new(&address, &user);
        let become_password = self.become_password(request)?;
        let hostname = self.text(
            request.hostname.as_deref(),
            HOSTNAME_PROMPT,
            Some(target.host.as_str()),
        )?;

        Ok(ControlFlow::Continue(Session {
            mode: Some(mode),
            target,
            hostname,
            ssh_password,
            become_password,
        }))
    }

    fn prepare_reused_inventory(
        &self,
        request: &DeployRequest,
        store: &InventoryStore,
    ) -> Result<ControlFlow<AbortReason, (Session, InventoryHost)>, DeployError> {
        let host = match store.load() {
            Ok(host) => host,
            Err(err) => return Ok(ControlFlow::Break(AbortReason::from_inventory(err)?)),
        };

        let mode = match request.mode.as_deref().map(str::parse::<InstallMode>) {
            None => None,
            Some(Ok(mode)) => Some(mode),
            Some(Err(err)) => return Ok(ControlFlow::Break(err.into())),
        };
        let become_password = self.become_password(request)?;

        Ok(ControlFlow::Continue((
            Session {
                mode,
                target: SshTarget::new(&host.address, &host.user),
                hostname: host.name.clone(),
                ssh_password: None,
                become_password,
            },
            host,
        )))
    }

    fn text(
        &self,
        preset: Option<&str>,
        prompt: &str,
        default: Option<&str>,
    ) -> Result<String, PromptError> {
        let Some(value) = preset else {
            return self.prompter.input(prompt, default);
        };
        let trimmed = value.trim();
        let answer = if trimmed.is_empty() {
            default.unwrap_or_default()
        } else {
            trimmed
        };
        Ok(answer.to_owned())
    }

    fn ssh_password(&self, request: &DeployRequest) -> Result<Option<Secret>, PromptError> {
        let secret = match &request.ssh_password {
            Some(secret) => secret.clone(),
            None => self.prompter.password(SSH_PASSWORD_PROMPT)?,
        };
        Ok((!secret.is_empty()).then_some(secret))
    }

    fn become_password(&self, request: &DeployRequest) -> Result<Secret, PromptError> {
        request.become_password.as_ref().map_or_else(
            || self.prompter.password(BECOME_PASSWORD_PROMPT),
            |secret| Ok(secret.clone()),
        )
    }
}
