//! Post-install checks against the Kubernetes API server.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::command::{CommandError, CommandRunner, EnvVar};
use crate::config::BootstrapConfig;
use crate::files::{self, FileError};

const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Outcome of a verification attempt that did not fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verification {
    /// The kubeconfig was not present; no checks were run.
    KubeconfigMissing {
        /// Path that was looked up.
        path: Utf8PathBuf,
    },
    /// Both the client and the API server responded.
    Reachable {
        /// Output of `kubectl version`.
        client_report: String,
        /// Body returned by the `/version` endpoint.
        api_report: String,
    },
}

/// Errors raised while verifying the cluster.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Raised when the kubeconfig location cannot be inspected.
    #[error(transparent)]
    Files(#[from] FileError),
    /// Raised when `kubectl version` fails.
    #[error("kubectl version failed: {source}")]
    Client {
        /// Underlying command error.
        #[source]
        source: CommandError,
    },
    /// Raised when the API endpoint cannot be reached.
    #[error("API server check against {url} failed: {source}")]
    Api {
        /// URL that was requested.
        url: String,
        /// Underlying command error.
        #[source]
        source: CommandError,
    },
}

/// Builds the `/version` URL for `host`, bracketing IPv6 literals.
#[must_use]
pub fn version_url(host: &str, port: u16) -> String {
    let trimmed = host.trim();
    if trimmed.contains(':') && !trimmed.starts_with('[') {
        format!("https://[{trimmed}]:{port}/version")
    } else {
        format!("https://{trimmed}:{port}/version")
    }
}

/// Checks that a freshly installed cluster answers.
#[derive(Debug)]
pub struct ApiVerifier<'a, R> {
    config: &'a BootstrapConfig,
    runner: R,
}

impl<'a, R: CommandRunner> ApiVerifier<'a, R> {
    /// Creates a verifier using the configured `kubectl` and `curl`.
    #[must_use]
    pub const fn new(config: &'a BootstrapConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Runs `kubectl version` against `kubeconfig`, then queries the API
    /// server on `host`.
    ///
    /// A missing kubeconfig is reported as
    /// [`Verification::KubeconfigMissing`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] when either check fails. The failure is logged
    /// with the captured stderr before it is returned.
    pub fn verify(&self, kubeconfig: &Utf8Path, host: &str) -> Result<Verification, VerifyError> {
        if !files::path_exists(kubeconfig)? {
            warn!(path = %kubeconfig, "kubeconfig file not found, skipping verification");
            return Ok(Verification::KubeconfigMissing {
                path: kubeconfig.to_path_buf(),
            });
        }

        info!(path = %kubeconfig, "checking Kubernetes client");
        let client_report = self.client_version(kubeconfig).inspect_err(|err| {
            error!(
                error = %err,
                stderr = command_stderr(err),
                "error verifying Kubernetes installation"
            );
        })?;

        let url = version_url(host, self.config.api_port);
        info!(%url, "checking API server");
        let api_report = self.api_version(&url).inspect_err(|err| {
            error!(
                error = %err,
                stderr = command_stderr(err),
                "error verifying Kubernetes installation"
            );
        })?;

        info!("Kubernetes installation verified");
        Ok(Verification::Reachable {
            client_report,
            api_report,
        })
    }

    fn client_version(&self, kubeconfig: &Utf8Path) -> Result<String, VerifyError> {
        let bin = &self.config.kubectl_bin;
        let envs: [EnvVar; 1] = [(
            String::from(KUBECONFIG_ENV),
            OsString::from(kubeconfig.as_str()),
        )];
        self.runner
            .run_with_env(bin, &[OsString::from("version")], &envs)
            .and_then(|output| output.into_success(bin))
            .map(|output| output.stdout.trim().to_owned())
            .map_err(|source| VerifyError::Client { source })
    }

    fn api_version(&self, url: &str) -> Result<String, VerifyError> {
        let bin = &self.config.curl_bin;
        let args = [
            OsString::from("-k"),
            OsString::from("-sS"),
            OsString::from(url),
        ];
        self.runner
            .run(bin, &args)
            .and_then(|output| output.into_success(bin))
            .map(|output| output.stdout.trim().to_owned())
            .map_err(|source| VerifyError::Api {
                url: url.to_owned(),
                source,
            })
    }
}

fn command_stderr(err: &VerifyError) -> &str {
    match err {
        VerifyError::Client { source } | VerifyError::Api { source, .. } => {
            source.stderr().unwrap_or_default()
        }
        VerifyError::Files(_) => "",
    }
}
