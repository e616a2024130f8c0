//! Core library for the kubestrap bootstrap tool.
//!
//! The crate prepares SSH trust with a remote node, writes an Ansible
//! inventory for it, runs the installation playbooks, fetches the cluster
//! kubeconfig and checks that the Kubernetes API answers. Every external
//! program is driven through [`CommandRunner`] and every operator question
//! through [`Prompter`], so the whole flow runs under test without a network
//! or a terminal.

pub mod command;
pub mod config;
pub mod deploy;
pub mod files;
pub mod inventory;
pub mod keys;
pub mod logging;
pub mod playbook;
pub mod prompt;
pub mod secret;
pub mod session;
pub mod test_support;
pub mod trust;
pub mod util;
pub mod verify;

pub use command::{
    CommandError, CommandOutput, CommandRunner, ProcessCommandRunner, StreamingCommandRunner,
};
pub use config::{BootstrapConfig, ConfigError};
pub use deploy::{AbortReason, DeployError, DeployOrchestrator, DeployOutcome, DeployRequest};
pub use inventory::{InventoryDecision, InventoryError, InventoryHost, InventoryStore};
pub use keys::{KeyError, KeyPair, KeyStatus, ensure_key_pair};
pub use playbook::{ExtraVars, PlaybookError, PlaybookRunner};
pub use prompt::{NonInteractivePrompter, PromptError, Prompter, TerminalPrompter};
pub use secret::Secret;
pub use session::{InstallMode, InvalidModeError, Session, SshTarget};
pub use trust::{TrustError, distribute_public_key};
pub use verify::{ApiVerifier, Verification, VerifyError};
