//! BDD step definitions for `kubestrap deploy`.

use kubestrap::{DeployOutcome, Verification};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{DeployContext, RunResult, preset_request};

/// Commands a full fresh deploy issues once the key pair exists.
const FULL_RUN_COMMANDS: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a workspace with an SSH key pair")]
fn workspace_with_key(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.fixture = deploy_context.fixture.with_existing_key();
    deploy_context
}

#[given("every answer is preset")]
fn every_answer_preset(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.request = preset_request();
    deploy_context
}

#[given("the installation mode is \"{mode}\"")]
fn installation_mode(mut deploy_context: DeployContext, mode: String) -> DeployContext {
    deploy_context.request.mode = Some(mode);
    deploy_context
}

#[given("the operator chooses to reuse the inventory")]
fn reuse_chosen(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.request.reuse_inventory = Some(true);
    deploy_context
}

#[given("an existing inventory for host \"{name}\" at \"{address}\"")]
fn existing_inventory(
    mut deploy_context: DeployContext,
    name: String,
    address: String,
) -> DeployContext {
    let contents = format!(
        "all:\n  hosts:\n    {name}:\n      ansible_host: {address}\n      ansible_user: ubuntu\n"
    );
    deploy_context.fixture = deploy_context.fixture.with_inventory(&contents);
    deploy_context
}

#[given("an existing inventory without an all group")]
fn inventory_without_all(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.fixture = deploy_context.fixture.with_inventory("other: {}\n");
    deploy_context
}

#[given("an existing inventory with an empty host list")]
fn inventory_without_hosts(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.fixture = deploy_context.fixture.with_inventory("all:\n  hosts: {}\n");
    deploy_context
}

#[given("every command succeeds")]
fn every_command_succeeds(deploy_context: DeployContext) -> DeployContext {
    for _ in 0..FULL_RUN_COMMANDS {
        deploy_context.fixture.runner.push_success();
    }
    deploy_context
}

#[given("the playbooks leave a kubeconfig behind")]
fn kubeconfig_present(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.fixture = deploy_context.fixture.with_kubeconfig();
    deploy_context
}

#[when("I run the deploy")]
fn run_deploy(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.result = Some(match deploy_context.fixture.execute(&deploy_context.request) {
        Ok(outcome) => RunResult::Finished(outcome),
        Err(err) => RunResult::Failed(err.to_string()),
    });
    deploy_context
}

fn finished(deploy_context: &DeployContext) -> Result<&DeployOutcome, StepError> {
    match deploy_context.result.as_ref() {
        Some(RunResult::Finished(outcome)) => Ok(outcome),
        Some(RunResult::Failed(message)) => Err(StepError::Assertion(format!(
            "expected the deploy to finish, got: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn listed(items: &str) -> Vec<String> {
    items.split(',').map(|item| item.trim().to_owned()).collect()
}

#[then("the deploy completes")]
fn deploy_completes(deploy_context: &DeployContext) -> Result<(), StepError> {
    match finished(deploy_context)? {
        DeployOutcome::Completed { .. } => Ok(()),
        DeployOutcome::Aborted(reason) => Err(StepError::Assertion(format!(
            "expected completion, got abort: {reason}"
        ))),
    }
}

#[then("the deploy is aborted with \"{message}\"")]
fn deploy_aborted(deploy_context: &DeployContext, message: String) -> Result<(), StepError> {
    match finished(deploy_context)? {
        DeployOutcome::Aborted(reason) if reason.to_string().starts_with(&message) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected abort starting with {message:?}, got {other:?}"
        ))),
    }
}

#[then("the commands run in order \"{programs}\"")]
fn commands_in_order(deploy_context: &DeployContext, programs: String) -> Result<(), StepError> {
    let actual = deploy_context.fixture.runner.programs();
    let expected = listed(&programs);
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected commands {expected:?}, got {actual:?}"
        )))
    }
}

#[then("the playbooks run in order \"{playbooks}\"")]
fn playbooks_in_order(deploy_context: &DeployContext, playbooks: String) -> Result<(), StepError> {
    let actual = deploy_context.fixture.playbooks_run();
    let expected = listed(&playbooks);
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected playbooks {expected:?}, got {actual:?}"
        )))
    }
}

#[then("no commands run")]
fn no_commands(deploy_context: &DeployContext) -> Result<(), StepError> {
    let programs = deploy_context.fixture.runner.programs();
    if programs.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no commands, got {programs:?}"
        )))
    }
}

#[then("no inventory is written")]
fn no_inventory(deploy_context: &DeployContext) -> Result<(), StepError> {
    match deploy_context.fixture.inventory_contents() {
        None => Ok(()),
        Some(contents) => Err(StepError::Assertion(format!(
            "expected no inventory, found:\n{contents}"
        ))),
    }
}

#[then("the inventory names host \"{name}\" at \"{address}\"")]
fn inventory_names_host(
    deploy_context: &DeployContext,
    name: String,
    address: String,
) -> Result<(), StepError> {
    let contents = deploy_context
        .fixture
        .inventory_contents()
        .ok_or_else(|| StepError::Assertion(String::from("inventory was not written")))?;
    if contents.contains(&format!("{name}:")) && contents.contains(&format!("ansible_host: {address}"))
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {name} at {address} in:\n{contents}"
        )))
    }
}

#[then("the deploy targets host \"{name}\" at \"{address}\"")]
fn deploy_targets_host(
    deploy_context: &DeployContext,
    name: String,
    address: String,
) -> Result<(), StepError> {
    let DeployOutcome::Completed { host, .. } = finished(deploy_context)? else {
        return Err(StepError::Assertion(String::from("deploy did not complete")));
    };
    if host.name == name && host.address == address {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {name} at {address}, got {host:?}"
        )))
    }
}

#[then("verification is skipped for a missing kubeconfig")]
fn verification_skipped(deploy_context: &DeployContext) -> Result<(), StepError> {
    match finished(deploy_context)? {
        DeployOutcome::Completed {
            verification: Verification::KubeconfigMissing { path },
            ..
        } if *path == deploy_context.fixture.kubeconfig_path() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a skipped verification, got {other:?}"
        ))),
    }
}
