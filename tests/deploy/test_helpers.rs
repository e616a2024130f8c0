//! Fixtures for deploy scenarios: a temporary working directory, a config
//! pointing into it, and scripted command and prompt seams.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use kubestrap::files;
use kubestrap::test_support::{ScriptedPrompter, ScriptedRunner};
use kubestrap::{
    BootstrapConfig, DeployError, DeployOrchestrator, DeployOutcome, DeployRequest, Secret,
};
use rstest::fixture;
use tempfile::TempDir;

pub const NODE_ADDRESS: &str = "10.0.0.9";
pub const BECOME_PASSWORD: &str = "sudo-pass";

pub const VALID_INVENTORY: &str =
    "all:\n  hosts:\n    node1:\n      ansible_host: 10.0.0.5\n      ansible_user: ubuntu\n";

#[derive(Clone, Debug)]
pub struct DeployFixture {
    _tmp: Arc<TempDir>,
    pub root: Utf8PathBuf,
    pub config: BootstrapConfig,
    pub runner: ScriptedRunner,
    pub prompter: ScriptedPrompter,
}

impl DeployFixture {
    pub fn key_path(&self) -> Utf8PathBuf {
        self.root.join(".ssh").join("id_rsa")
    }

    pub fn inventory_path(&self) -> Utf8PathBuf {
        self.root.join("inventory.yaml")
    }

    pub fn kubeconfig_path(&self) -> Utf8PathBuf {
        self.root.join(".kube").join("config")
    }

    pub fn with_existing_key(self) -> Self {
        write(&self.key_path(), "PRIVATE KEY");
        write(&self.root.join(".ssh").join("id_rsa.pub"), "ssh-rsa AAAA test");
        self
    }

    pub fn with_inventory(self, contents: &str) -> Self {
        write(&self.inventory_path(), contents);
        self
    }

    pub fn with_kubeconfig(self) -> Self {
        write(&self.kubeconfig_path(), "apiVersion: v1\nkind: Config\n");
        self
    }

    pub fn inventory_contents(&self) -> Option<String> {
        files::read_to_string(&self.inventory_path()).ok()
    }

    pub fn execute(&self, request: &DeployRequest) -> Result<DeployOutcome, DeployError> {
        DeployOrchestrator::new(&self.config, &self.runner, &self.prompter, self.root.clone())
            .execute(request)
    }

    /// Every argument of every recorded invocation, flattened.
    pub fn all_arguments(&self) -> Vec<String> {
        self.runner
            .invocations()
            .iter()
            .flat_map(kubestrap::test_support::CommandInvocation::arg_strings)
            .collect()
    }

    /// First argument of each `ansible-playbook` call, i.e. the playbook path.
    pub fn playbooks_run(&self) -> Vec<String> {
        self.runner
            .invocations()
            .iter()
            .filter(|invocation| invocation.program == "ansible-playbook")
            .filter_map(|invocation| invocation.arg_strings().first().cloned())
            .collect()
    }
}

fn write(path: &Utf8Path, contents: &str) {
    files::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
}

/// Request with every value preset, so no prompt is needed.
pub fn preset_request() -> DeployRequest {
    DeployRequest {
        mode: Some(String::from("single")),
        host: Some(String::from(NODE_ADDRESS)),
        hostname: Some(String::from("node1")),
        ssh_user: Some(String::from("ubuntu")),
        reuse_inventory: None,
        ssh_password: Some(Secret::default()),
        become_password: Some(Secret::new(BECOME_PASSWORD)),
    }
}

/// Result of a deploy run, kept cloneable for step-to-step hand-off.
#[derive(Clone, Debug)]
pub enum RunResult {
    Finished(DeployOutcome),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct DeployContext {
    pub fixture: DeployFixture,
    pub request: DeployRequest,
    pub result: Option<RunResult>,
}

#[fixture]
pub fn deploy_context(deploy_fixture: DeployFixture) -> DeployContext {
    DeployContext {
        fixture: deploy_fixture,
        request: DeployRequest::default(),
        result: None,
    }
}

#[fixture]
pub fn deploy_fixture() -> DeployFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
    let config = BootstrapConfig {
        ssh_key_path: root.join(".ssh").join("id_rsa").to_string(),
        ..BootstrapConfig::builtin_defaults()
    };
    DeployFixture {
        _tmp: Arc::new(tmp),
        root,
        config,
        runner: ScriptedRunner::new(),
        prompter: ScriptedPrompter::new(),
    }
}
