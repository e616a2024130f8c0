//! Binary entry point for the kubestrap CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use thiserror::Error;

use kubestrap::util::resolve_against;
use kubestrap::{
    ApiVerifier, BootstrapConfig, ConfigError, DeployError, DeployOrchestrator, DeployOutcome,
    DeployRequest, NonInteractivePrompter, ProcessCommandRunner, Secret, StreamingCommandRunner,
    TerminalPrompter,
    Verification, VerifyError, logging,
};

mod cli;

use cli::{Cli, DeployCommand, VerifyCommand};

const SSH_PASSWORD_ENV: &str = "KUBESTRAP_SSH_PASSWORD";
const BECOME_PASSWORD_ENV: &str = "KUBESTRAP_BECOME_PASSWORD";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot determine working directory: {0}")]
    WorkingDir(String),
    #[error("deploy failed: {0}")]
    Deploy(#[from] DeployError),
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("failed to write report: {0}")]
    Output(String),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init() {
        writeln!(io::stderr(), "failed to initialise logging: {err}").ok();
    }

    let exit_code = match dispatch(cli, &mut io::stdout()) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let config = BootstrapConfig::load_without_cli_args()?;
    config.validate()?;
    let working_dir = current_dir()?;

    match cli {
        Cli::Deploy(args) => deploy(&config, args, working_dir, out),
        Cli::Verify(args) => verify(&config, &args, &working_dir, out),
    }
}

fn current_dir() -> Result<Utf8PathBuf, CliError> {
    let cwd = env::current_dir().map_err(|err| CliError::WorkingDir(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| CliError::WorkingDir(path.display().to_string()))
}

fn env_secret(key: &str) -> Option<Secret> {
    env::var(key).ok().map(Secret::new)
}

fn deploy(
    config: &BootstrapConfig,
    args: DeployCommand,
    working_dir: Utf8PathBuf,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let non_interactive = args.non_interactive;
    let request = deploy_request(
        args,
        env_secret(SSH_PASSWORD_ENV),
        env_secret(BECOME_PASSWORD_ENV),
    );

    let outcome = if non_interactive {
        DeployOrchestrator::new(config, StreamingCommandRunner, NonInteractivePrompter, working_dir)
            .execute(&request)?
    } else {
        DeployOrchestrator::new(config, StreamingCommandRunner, TerminalPrompter, working_dir)
            .execute(&request)?
    };

    write_outcome(out, &outcome).map_err(|err| CliError::Output(err.to_string()))
}

fn deploy_request(
    args: DeployCommand,
    env_ssh_password: Option<Secret>,
    become_password: Option<Secret>,
) -> DeployRequest {
    let reuse_inventory = if args.reuse_inventory {
        Some(true)
    } else if args.fresh_inventory {
        Some(false)
    } else {
        None
    };
    let ssh_password = env_ssh_password.or_else(|| args.non_interactive.then(Secret::default));

    DeployRequest {
        mode: args.mode,
        host: args.host,
        hostname: args.hostname,
        ssh_user: args.ssh_user,
        reuse_inventory,
        ssh_password,
        become_password,
    }
}

fn verify(
    config: &BootstrapConfig,
    args: &VerifyCommand,
    working_dir: &Utf8Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let requested = args
        .kubeconfig
        .as_deref()
        .unwrap_or(config.kubeconfig_path.as_str());
    let kubeconfig = resolve_against(working_dir, Utf8Path::new(requested));

    let verification =
        ApiVerifier::new(config, ProcessCommandRunner).verify(&kubeconfig, &args.host)?;
    write_verification(out, &verification).map_err(|err| CliError::Output(err.to_string()))
}

fn write_outcome(out: &mut impl Write, outcome: &DeployOutcome) -> io::Result<()> {
    match outcome {
        DeployOutcome::Completed {
            host,
            verification,
            ..
        } => {
            writeln!(
                out,
                "Kubernetes installed on {} ({})",
                host.name, host.address
            )?;
            write_verification_status(out, verification)
        }
        DeployOutcome::Aborted(reason) => writeln!(out, "{reason}"),
    }
}

/// One-line result. Deploy has already streamed the check output.
fn write_verification_status(
    out: &mut impl Write,
    verification: &Verification,
) -> io::Result<()> {
    match verification {
        Verification::KubeconfigMissing { path } => writeln!(
            out,
            "Kubeconfig file not found at {path}; skipping verification"
        ),
        Verification::Reachable { .. } => writeln!(out, "Kubernetes installation verified"),
    }
}

/// Result line followed by the captured `kubectl` and API reports.
fn write_verification(out: &mut impl Write, verification: &Verification) -> io::Result<()> {
    write_verification_status(out, verification)?;
    if let Verification::Reachable {
        client_report,
        api_report,
    } = verification
    {
        writeln!(out, "{client_report}")?;
        writeln!(out, "{api_report}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
