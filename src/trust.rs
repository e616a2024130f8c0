//! Distribution of the local public key to a node's `authorized_keys`.

use std::ffi::OsString;

use camino::Utf8Path;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner, EnvVar};
use crate::config::BootstrapConfig;
use crate::secret::Secret;
use crate::session::SshTarget;

const SSHPASS_ENV: &str = "SSHPASS";

/// Errors raised while copying the public key.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Raised when the host or user is blank.
    #[error("cannot distribute SSH key: {field} must not be empty")]
    InvalidTarget {
        /// Field that was blank.
        field: &'static str,
    },
    /// Raised when `ssh-copy-id` cannot be started or fails, typically on
    /// authentication failure or an unreachable host.
    #[error("failed to copy SSH key to {destination}: {source}")]
    Copy {
        /// `user@host` that was targeted.
        destination: String,
        /// Underlying command error.
        #[source]
        source: CommandError,
    },
}

/// Copies `public_key` into the authorized keys of `target`.
///
/// When `ssh_password` is present and non-empty the copy runs under
/// `sshpass -e`, which reads the password from the child's `SSHPASS`
/// variable. Otherwise `ssh-copy-id` asks on the terminal itself.
///
/// # Errors
///
/// Returns [`TrustError::InvalidTarget`] for a blank host or user, and
/// [`TrustError::Copy`] when the copy command fails.
pub fn distribute_public_key<R: CommandRunner>(
    runner: &R,
    config: &BootstrapConfig,
    public_key: &Utf8Path,
    target: &SshTarget,
    ssh_password: Option<&Secret>,
) -> Result<(), TrustError> {
    if target.host.trim().is_empty() {
        return Err(TrustError::InvalidTarget { field: "host" });
    }
    if target.user.trim().is_empty() {
        return Err(TrustError::InvalidTarget { field: "user" });
    }

    let destination = target.destination();
    info!(%destination, "distributing SSH key");

    let mut copy_args = vec![OsString::from("-i"), OsString::from(public_key.as_str())];
    if config.ssh_accept_new_host_keys {
        copy_args.push(OsString::from("-o"));
        copy_args.push(OsString::from("StrictHostKeyChecking=accept-new"));
    }
    copy_args.push(OsString::from(&destination));

    let password = ssh_password.filter(|secret| !secret.is_empty());
    let result = match password {
        Some(secret) => {
            let mut args = vec![
                OsString::from("-e"),
                OsString::from(&config.ssh_copy_id_bin),
            ];
            args.extend(copy_args);
            let envs: [EnvVar; 1] = [(
                String::from(SSHPASS_ENV),
                OsString::from(secret.expose()),
            )];
            runner
                .run_with_env(&config.sshpass_bin, &args, &envs)
                .and_then(|output| output.into_success(&config.sshpass_bin))
        }
        None => runner
            .run(&config.ssh_copy_id_bin, &copy_args)
            .and_then(|output| output.into_success(&config.ssh_copy_id_bin)),
    };

    result.map_err(|source| TrustError::Copy {
        destination,
        source,
    })?;
    info!(host = %target.host, "SSH key distributed");
    Ok(())
}
