//! Local SSH key pair preparation.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner};
use crate::config::BootstrapConfig;
use crate::files::{self, FileError};

/// Location of the local key pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPair {
    /// Private key file.
    pub private_key: Utf8PathBuf,
    /// Public key file distributed to nodes.
    pub public_key: Utf8PathBuf,
}

/// Whether the key pair was already present or had to be generated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyStatus {
    /// The private key existed; nothing was run.
    Existing,
    /// `ssh-keygen` created a new pair.
    Generated,
}

/// Errors raised while preparing the key pair.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Raised when the key directory cannot be inspected or created.
    #[error("cannot prepare SSH key directory: {0}")]
    Files(#[from] FileError),
    /// Raised when `ssh-keygen` cannot be started or fails.
    #[error("ssh-keygen failed: {0}")]
    Generate(#[from] CommandError),
}

/// Makes sure the configured key pair exists, generating it when the private
/// key is absent. The new key has an empty passphrase.
///
/// # Errors
///
/// Returns [`KeyError`] when the key directory cannot be prepared or
/// `ssh-keygen` fails.
pub fn ensure_key_pair<R: CommandRunner>(
    runner: &R,
    config: &BootstrapConfig,
) -> Result<(KeyPair, KeyStatus), KeyError> {
    let pair = KeyPair {
        private_key: config.private_key_path(),
        public_key: config.public_key_path(),
    };

    if files::path_exists(&pair.private_key)? {
        info!(path = %pair.private_key, "SSH key pair already exists");
        return Ok((pair, KeyStatus::Existing));
    }

    info!(path = %pair.private_key, "SSH key pair not found, generating a new one");
    if let Some(parent) = pair.private_key.parent()
        && !parent.as_str().is_empty()
    {
        files::create_dir_all(parent)?;
    }

    let args = vec![
        OsString::from("-t"),
        OsString::from(&config.ssh_key_type),
        OsString::from("-b"),
        OsString::from(config.ssh_key_bits.to_string()),
        OsString::from("-f"),
        OsString::from(pair.private_key.as_str()),
        OsString::from("-N"),
        OsString::new(),
    ];
    runner
        .run(&config.ssh_keygen_bin, &args)?
        .into_success(&config.ssh_keygen_bin)?;

    info!(
        private_key = %pair.private_key,
        public_key = %pair.public_key,
        "SSH key pair generated"
    );
    Ok((pair, KeyStatus::Generated))
}
