//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `kubestrap.toml` and `KUBESTRAP_*` environment
//! variables in that order of precedence.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::util::expand_tilde;

/// Default location of the local private key.
pub const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_rsa";

/// Default inventory file, relative to the working directory.
pub const DEFAULT_INVENTORY_PATH: &str = "inventory.yaml";

/// Default kubeconfig destination, relative to the working directory.
pub const DEFAULT_KUBECONFIG_PATH: &str = ".kube/config";

/// Default remote user written into new inventories.
pub const DEFAULT_SSH_USER: &str = "ubuntu";

/// Port the Kubernetes API server listens on.
pub const DEFAULT_API_PORT: u16 = 6443;

/// Tool locations, file paths and playbook names for a bootstrap run.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "KUBESTRAP",
    discovery(
        app_name = "kubestrap",
        env_var = "KUBESTRAP_CONFIG_PATH",
        config_file_name = "kubestrap.toml",
        dotfile_name = ".kubestrap.toml",
        project_file_name = "kubestrap.toml"
    )
)]
pub struct BootstrapConfig {
    /// Path to the `ssh-keygen` executable.
    #[ortho_config(default = "ssh-keygen".to_owned())]
    pub ssh_keygen_bin: String,
    /// Path to the `ssh-copy-id` executable.
    #[ortho_config(default = "ssh-copy-id".to_owned())]
    pub ssh_copy_id_bin: String,
    /// Path to the `sshpass` executable, used only when an SSH password is
    /// supplied.
    #[ortho_config(default = "sshpass".to_owned())]
    pub sshpass_bin: String,
    /// Path to the `ansible-playbook` executable.
    #[ortho_config(default = "ansible-playbook".to_owned())]
    pub ansible_playbook_bin: String,
    /// Path to the `kubectl` executable.
    #[ortho_config(default = "kubectl".to_owned())]
    pub kubectl_bin: String,
    /// Path to the `curl` executable.
    #[ortho_config(default = "curl".to_owned())]
    pub curl_bin: String,
    /// Private key location. Supports tilde expansion; the public key is the
    /// same path with a `.pub` suffix.
    #[ortho_config(default = DEFAULT_SSH_KEY_PATH.to_owned())]
    pub ssh_key_path: String,
    /// Key algorithm passed to `ssh-keygen -t`.
    #[ortho_config(default = "rsa".to_owned())]
    pub ssh_key_type: String,
    /// Key size passed to `ssh-keygen -b`.
    #[ortho_config(default = 4096)]
    pub ssh_key_bits: u32,
    /// Whether `ssh-copy-id` accepts unknown host keys on first contact.
    #[ortho_config(default = true)]
    pub ssh_accept_new_host_keys: bool,
    /// Remote user written into new inventories.
    #[ortho_config(default = DEFAULT_SSH_USER.to_owned())]
    pub default_ssh_user: String,
    /// Inventory file location.
    #[ortho_config(default = DEFAULT_INVENTORY_PATH.to_owned())]
    pub inventory_path: String,
    /// Where the fetch playbook places the kubeconfig.
    #[ortho_config(default = DEFAULT_KUBECONFIG_PATH.to_owned())]
    pub kubeconfig_path: String,
    /// Optional directory holding the playbooks. Playbook names are used as
    /// given when unset.
    pub playbook_dir: Option<String>,
    /// Playbook installing host dependencies.
    #[ortho_config(default = "install_dependencies.yaml".to_owned())]
    pub dependencies_playbook: String,
    /// Playbook installing Kubernetes.
    #[ortho_config(default = "install_kubernetes.yaml".to_owned())]
    pub cluster_playbook: String,
    /// Playbook copying the kubeconfig back to this machine.
    #[ortho_config(default = "fetch_kubeconfig.yaml".to_owned())]
    pub kubeconfig_playbook: String,
    /// Port queried on the node for `/version`.
    #[ortho_config(default = DEFAULT_API_PORT)]
    pub api_port: u16,
    /// Whether the become password is also written into the inventory file.
    /// Defaults to false so the secret never lands on disk permanently.
    #[ortho_config(default = false)]
    pub persist_become_password: bool,
}

impl BootstrapConfig {
    /// Returns the built-in defaults without consulting files or the
    /// environment.
    #[must_use]
    pub fn builtin_defaults() -> Self {
        Self {
            ssh_keygen_bin: String::from("ssh-keygen"),
            ssh_copy_id_bin: String::from("ssh-copy-id"),
            sshpass_bin: String::from("sshpass"),
            ansible_playbook_bin: String::from("ansible-playbook"),
            kubectl_bin: String::from("kubectl"),
            curl_bin: String::from("curl"),
            ssh_key_path: String::from(DEFAULT_SSH_KEY_PATH),
            ssh_key_type: String::from("rsa"),
            ssh_key_bits: 4096,
            ssh_accept_new_host_keys: true,
            default_ssh_user: String::from(DEFAULT_SSH_USER),
            inventory_path: String::from(DEFAULT_INVENTORY_PATH),
            kubeconfig_path: String::from(DEFAULT_KUBECONFIG_PATH),
            playbook_dir: None,
            dependencies_playbook: String::from("install_dependencies.yaml"),
            cluster_playbook: String::from("install_kubernetes.yaml"),
            kubeconfig_playbook: String::from("fetch_kubeconfig.yaml"),
            api_port: DEFAULT_API_PORT,
            persist_become_password: false,
        }
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            toml_key,
        }
    }
}

impl BootstrapConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("kubestrap")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply the missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// or zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.ssh_keygen_bin, FieldMetadata::new("ssh-keygen binary", "ssh_keygen_bin")),
            (&self.ssh_copy_id_bin, FieldMetadata::new("ssh-copy-id binary", "ssh_copy_id_bin")),
            (&self.sshpass_bin, FieldMetadata::new("sshpass binary", "sshpass_bin")),
            (
                &self.ansible_playbook_bin,
                FieldMetadata::new("ansible-playbook binary", "ansible_playbook_bin"),
            ),
            (&self.kubectl_bin, FieldMetadata::new("kubectl binary", "kubectl_bin")),
            (&self.curl_bin, FieldMetadata::new("curl binary", "curl_bin")),
            (&self.ssh_key_path, FieldMetadata::new("SSH key path", "ssh_key_path")),
            (&self.ssh_key_type, FieldMetadata::new("SSH key type", "ssh_key_type")),
            (&self.default_ssh_user, FieldMetadata::new("default SSH user", "default_ssh_user")),
            (&self.inventory_path, FieldMetadata::new("inventory path", "inventory_path")),
            (&self.kubeconfig_path, FieldMetadata::new("kubeconfig path", "kubeconfig_path")),
            (
                &self.dependencies_playbook,
                FieldMetadata::new("dependencies playbook", "dependencies_playbook"),
            ),
            (&self.cluster_playbook, FieldMetadata::new("cluster playbook", "cluster_playbook")),
            (
                &self.kubeconfig_playbook,
                FieldMetadata::new("kubeconfig playbook", "kubeconfig_playbook"),
            ),
        ];
        for (value, metadata) in required {
            Self::require_field(value.trim().is_empty(), &metadata)?;
        }

        if let Some(dir) = &self.playbook_dir {
            Self::require_field(
                dir.trim().is_empty(),
                &FieldMetadata::new("playbook directory", "playbook_dir"),
            )?;
        }
        Self::require_field(
            self.ssh_key_bits == 0,
            &FieldMetadata::new("SSH key size", "ssh_key_bits"),
        )?;
        Self::require_field(
            self.api_port == 0,
            &FieldMetadata::new("API server port", "api_port"),
        )?;
        Ok(())
    }

    fn require_field(missing: bool, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if missing {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set KUBESTRAP_{} or add {} to kubestrap.toml",
                metadata.description,
                metadata.toml_key.to_uppercase(),
                metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Private key path with `~/` expanded.
    #[must_use]
    pub fn private_key_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(expand_tilde(&self.ssh_key_path))
    }

    /// Public key path: the private key path with `.pub` appended.
    #[must_use]
    pub fn public_key_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.pub", expand_tilde(&self.ssh_key_path)))
    }

    /// Resolves a playbook file name against [`Self::playbook_dir`].
    #[must_use]
    pub fn playbook_path(&self, playbook: &str) -> String {
        match &self.playbook_dir {
            Some(dir) => Utf8PathBuf::from(expand_tilde(dir))
                .join(playbook)
                .into_string(),
            None => playbook.to_owned(),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
