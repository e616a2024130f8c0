//! Per-run values collected from flags, environment and prompts.
//!
//! A [`Session`] is built once by the deploy orchestrator and handed to each
//! step by reference.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::secret::Secret;

/// Installation topology requested by the operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstallMode {
    /// One node running the whole control plane.
    Single,
    /// A node that will anchor a multi-node cluster.
    Cluster,
}

impl InstallMode {
    /// Value passed to playbooks as `install_mode`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Raised when a mode other than `single` or `cluster` is entered.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid installation mode: {input:?} (expected single or cluster)")]
pub struct InvalidModeError {
    /// Text as entered, after trimming.
    pub input: String,
}

impl FromStr for InstallMode {
    type Err = InvalidModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "cluster" => Ok(Self::Cluster),
            _ => Err(InvalidModeError {
                input: trimmed.to_owned(),
            }),
        }
    }
}

/// SSH destination of the node being bootstrapped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshTarget {
    /// Hostname or IP address.
    pub host: String,
    /// Remote login user.
    pub user: String,
}

impl SshTarget {
    /// Builds a target from raw input, trimming both fields.
    #[must_use]
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.trim().to_owned(),
            user: user.trim().to_owned(),
        }
    }

    /// Renders the `user@host` form expected by SSH tooling.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Everything a deploy run needs after input collection.
#[derive(Clone, Debug)]
pub struct Session {
    /// Installation mode, when it was collected. Reused inventories do not
    /// ask for it.
    pub mode: Option<InstallMode>,
    /// Node the playbooks and API checks talk to.
    pub target: SshTarget,
    /// Inventory name of the node.
    pub hostname: String,
    /// Password passed to `sshpass`, if one was given.
    pub ssh_password: Option<Secret>,
    /// Privilege-escalation password for Ansible.
    pub become_password: Secret,
}
