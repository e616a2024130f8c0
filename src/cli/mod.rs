//! Command-line interface definitions for the `kubestrap` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgGroup, Parser};

/// Top-level CLI for the `kubestrap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "kubestrap",
    about = "Bootstrap a Kubernetes control plane on a remote host with Ansible",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Prepare SSH trust, write the inventory, install the cluster and verify it.
    #[command(
        name = "deploy",
        about = "Prepare SSH trust, write the inventory, install the cluster and verify it"
    )]
    Deploy(DeployCommand),
    /// Check an already installed cluster through its kubeconfig and API.
    #[command(
        name = "verify",
        about = "Check an already installed cluster through its kubeconfig and API"
    )]
    Verify(VerifyCommand),
}

/// Arguments for the `kubestrap deploy` subcommand.
///
/// Any value left unset is asked for interactively. Passwords are never taken
/// from flags; set `KUBESTRAP_SSH_PASSWORD` or `KUBESTRAP_BECOME_PASSWORD` to
/// avoid the prompts.
#[derive(Debug, Parser)]
#[command(group(ArgGroup::new("inventory_choice").args(["reuse_inventory", "fresh_inventory"])))]
pub(crate) struct DeployCommand {
    /// Installation mode: `single` or `cluster`.
    #[arg(long, value_name = "MODE")]
    pub(crate) mode: Option<String>,
    /// Address of the node to install.
    #[arg(long, value_name = "ADDR")]
    pub(crate) host: Option<String>,
    /// Inventory name for the node. Defaults to the address.
    #[arg(long, value_name = "NAME")]
    pub(crate) hostname: Option<String>,
    /// User that receives the public key on the node.
    #[arg(long, value_name = "USER")]
    pub(crate) ssh_user: Option<String>,
    /// Reuse an existing inventory file without asking.
    #[arg(long)]
    pub(crate) reuse_inventory: bool,
    /// Delete an existing inventory file without asking.
    #[arg(long)]
    pub(crate) fresh_inventory: bool,
    /// Fail instead of prompting when a value is missing.
    #[arg(long)]
    pub(crate) non_interactive: bool,
}

/// Arguments for the `kubestrap verify` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct VerifyCommand {
    /// Address of the node serving the Kubernetes API.
    #[arg(long, value_name = "ADDR")]
    pub(crate) host: String,
    /// Kubeconfig to check. Defaults to the configured `kubeconfig_path`.
    #[arg(long, value_name = "PATH")]
    pub(crate) kubeconfig: Option<String>,
}
