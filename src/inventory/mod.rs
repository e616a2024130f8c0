//! Ansible inventory file management.
//!
//! The inventory is a YAML document with a single `all` group whose `hosts`
//! mapping describes the node to bootstrap:
//!
//! ```yaml
//! all:
//!   hosts:
//!     node1:
//!       ansible_host: 10.0.0.5
//!       ansible_user: ubuntu
//! ```
//!
//! Only the first host entry is used downstream.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::files::{self, FileError};
use crate::prompt::{PromptError, Prompter};
use crate::secret::Secret;
use crate::util::resolve_against;


const ALL_GROUP: &str = "all";
const HOSTS_KEY: &str = "hosts";
const HOST_ADDRESS_KEY: &str = "ansible_host";
const HOST_USER_KEY: &str = "ansible_user";

/// Errors raised while reading, writing or validating the inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Raised when the inventory file cannot be read, written or removed.
    #[error(transparent)]
    Files(#[from] FileError),
    /// Raised when the reuse question cannot be answered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// Raised when the file is not valid YAML.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Parser error message.
        message: String,
    },
    /// Raised when rendering the document fails.
    #[error("failed to render inventory for {path}: {message}")]
    Render {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Serializer error message.
        message: String,
    },
    /// Raised when the `all.hosts` structure is missing or malformed.
    #[error("Invalid structure in inventory file {path}: expected an `all.hosts` mapping")]
    InvalidStructure {
        /// Inventory path.
        path: Utf8PathBuf,
    },
    /// Raised when `all.hosts` is present but empty.
    #[error("No hosts found in inventory file {path}")]
    NoHosts {
        /// Inventory path.
        path: Utf8PathBuf,
    },
    /// Raised when the first host has no usable `ansible_host`.
    #[error("Host {host} in inventory file {path} has no ansible_host address")]
    MissingAddress {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Host entry that lacks an address.
        host: String,
    },
}

/// Whether an existing inventory is kept or a new one must be written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InventoryDecision {
    /// Load the existing file.
    Reuse,
    /// No usable file; collect details and create one.
    CreateNew,
}

/// The host entry downstream steps act on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InventoryHost {
    /// Inventory name of the host.
    pub name: String,
    /// `ansible_host` address.
    pub address: String,
    /// `ansible_user` login.
    pub user: String,
}

#[derive(Serialize)]
struct InventoryDocument<'a> {
    all: InventoryGroup<'a>,
}

#[derive(Serialize)]
struct InventoryGroup<'a> {
    hosts: BTreeMap<&'a str, HostVars<'a>>,
}

#[derive(Serialize)]
struct HostVars<'a> {
    ansible_host: &'a str,
    ansible_user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ansible_become_password: Option<&'a str>,
}

/// Reads and writes the inventory file at a fixed path.
#[derive(Clone, Debug)]
pub struct InventoryStore {
    path: Utf8PathBuf,
    default_user: String,
    persist_become_password: bool,
}

impl InventoryStore {
    /// Creates a store for `path` that writes `default_user` as
    /// `ansible_user`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, default_user: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_user: default_user.into(),
            persist_become_password: false,
        }
    }

    /// Builds a store from the bootstrap configuration, resolving a relative
    /// inventory path against `base`.
    #[must_use]
    pub fn from_config(config: &BootstrapConfig, base: &Utf8Path) -> Self {
        let path = resolve_against(base, Utf8Path::new(&config.inventory_path));
        Self::new(path, config.default_ssh_user.as_str())
            .with_persisted_become_password(config.persist_become_password)
    }

    /// Controls whether [`Self::create`] writes `ansible_become_password`.
    #[must_use]
    pub const fn with_persisted_become_password(mut self, persist: bool) -> Self {
        self.persist_become_password = persist;
        self
    }

    /// Inventory file location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns `true` when the inventory file exists.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Files`] when the location cannot be checked.
    pub fn exists(&self) -> Result<bool, InventoryError> {
        Ok(files::path_exists(&self.path)?)
    }

    /// Decides whether an existing inventory is reused.
    ///
    /// `preset` answers the question without prompting. Only an explicit yes
    /// keeps the file; any other answer deletes it.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] when the file cannot be checked or removed,
    /// or the prompt fails.
    pub fn reuse_or_discard<P: Prompter>(
        &self,
        prompter: &P,
        preset: Option<bool>,
    ) -> Result<InventoryDecision, InventoryError> {
        if !self.exists()? {
            return Ok(InventoryDecision::CreateNew);
        }

        let reuse = match preset {
            Some(answer) => answer,
            None => prompter.confirm(
                &format!(
                    "Inventory file '{}' already exists. Do you want to reuse it?",
                    self.path
                ),
                false,
            )?,
        };

        if reuse {
            info!(path = %self.path, "using existing inventory file");
            return Ok(InventoryDecision::Reuse);
        }

        files::remove(&self.path)?;
        info!(path = %self.path, "old inventory file deleted");
        Ok(InventoryDecision::CreateNew)
    }

    /// Writes a new inventory containing exactly one host.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] when rendering or writing fails.
    pub fn create(
        &self,
        hostname: &str,
        address: &str,
        become_password: &Secret,
    ) -> Result<InventoryHost, InventoryError> {
        let host = InventoryHost {
            name: hostname.trim().to_owned(),
            address: address.trim().to_owned(),
            user: self.default_user.clone(),
        };
        let rendered = self.render(&host, become_password)?;
        files::write(&self.path, &rendered)?;
        info!(path = %self.path, host = %host.name, "inventory file created");
        Ok(host)
    }

    fn render(
        &self,
        host: &InventoryHost,
        become_password: &Secret,
    ) -> Result<String, InventoryError> {
        let vars = HostVars {
            ansible_host: &host.address,
            ansible_user: &host.user,
            ansible_become_password: self
                .persist_become_password
                .then(|| become_password.expose()),
        };
        let document = InventoryDocument {
            all: InventoryGroup {
                hosts: BTreeMap::from([(host.name.as_str(), vars)]),
            },
        };
        serde_yaml::to_string(&document).map_err(|err| InventoryError::Render {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Loads the inventory and returns its first host.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidStructure`] when `all.hosts` is
    /// missing, [`InventoryError::NoHosts`] when it is empty, and
    /// [`InventoryError::MissingAddress`] when the first host has no address.
    pub fn load(&self) -> Result<InventoryHost, InventoryError> {
        let contents = files::read_to_string(&self.path)?;
        let host = parse_first_host(&self.path, &contents, &self.default_user)?;
        info!(host = %host.name, address = %host.address, "using existing host from inventory");
        Ok(host)
    }
}

fn parse_first_host(
    path: &Utf8Path,
    contents: &str,
    default_user: &str,
) -> Result<InventoryHost, InventoryError> {
    let invalid = || InventoryError::InvalidStructure {
        path: path.to_path_buf(),
    };

    let document: Value = if contents.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(contents).map_err(|err| InventoryError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?
    };

    let all = document
        .get(ALL_GROUP)
        .and_then(Value::as_mapping)
        .ok_or_else(invalid)?;
    let first_entry = match all.get(HOSTS_KEY) {
        None => return Err(invalid()),
        Some(Value::Null) => None,
        Some(Value::Mapping(hosts)) => hosts.iter().next(),
        Some(_) => return Err(invalid()),
    };

    let Some((key, details)) = first_entry else {
        return Err(InventoryError::NoHosts {
            path: path.to_path_buf(),
        });
    };

    let name = match key {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(invalid()),
    };

    let address = details
        .get(HOST_ADDRESS_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .ok_or_else(|| InventoryError::MissingAddress {
            path: path.to_path_buf(),
            host: name.clone(),
        })?
        .to_owned();
    let user = details
        .get(HOST_USER_KEY)
        .and_then(Value::as_str)
        .map_or_else(|| default_user.to_owned(), str::to_owned);

    Ok(InventoryHost {
        name,
        address,
        user,
    })
}
