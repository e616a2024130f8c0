//! Deploy flows exercised directly through the orchestrator.

use kubestrap::{
    AbortReason, DeployError, DeployOrchestrator, DeployOutcome, DeployRequest, InventoryError,
    InventoryHost, NonInteractivePrompter, PlaybookError, PromptError, Secret, Verification,
};
use rstest::rstest;

use super::test_helpers::{
    BECOME_PASSWORD, DeployFixture, NODE_ADDRESS, VALID_INVENTORY, deploy_fixture,
    preset_request,
};

#[rstest]
fn new_inventory_runs_every_step_in_order(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key().with_kubeconfig();
    fixture.prompter.push_text("single");
    fixture.prompter.push_text("");
    fixture.prompter.push_password("");
    fixture.prompter.push_text(NODE_ADDRESS);
    fixture.prompter.push_password(BECOME_PASSWORD);
    fixture.prompter.push_text("");
    for _ in 0..4 {
        fixture.runner.push_success();
    }
    fixture.runner.push_output(Some(0), "Client Version: v1.30.0", "");
    fixture
        .runner
        .push_output(Some(0), "{\"gitVersion\":\"v1.30.0\"}", "");

    let outcome = fixture
        .execute(&DeployRequest::default())
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    assert_eq!(
        outcome,
        DeployOutcome::Completed {
            host: InventoryHost {
                name: String::from(NODE_ADDRESS),
                address: String::from(NODE_ADDRESS),
                user: String::from("ubuntu"),
            },
            kubeconfig: fixture.kubeconfig_path(),
            verification: Verification::Reachable {
                client_report: String::from("Client Version: v1.30.0"),
                api_report: String::from("{\"gitVersion\":\"v1.30.0\"}"),
            },
        }
    );
    assert_eq!(
        fixture.runner.programs(),
        vec![
            "ssh-copy-id",
            "ansible-playbook",
            "ansible-playbook",
            "ansible-playbook",
            "kubectl",
            "curl",
        ]
    );
    assert_eq!(
        fixture.playbooks_run(),
        vec![
            "install_dependencies.yaml",
            "install_kubernetes.yaml",
            "fetch_kubeconfig.yaml",
        ]
    );

    let invocations = fixture.runner.invocations();
    let copy = invocations.first().unwrap_or_else(|| panic!("ssh-copy-id"));
    assert!(
        copy.command_string()
            .ends_with(&format!("ubuntu@{NODE_ADDRESS}")),
        "{}",
        copy.command_string()
    );
    let kubectl = invocations.get(4).unwrap_or_else(|| panic!("kubectl"));
    assert_eq!(
        kubectl.env("KUBECONFIG"),
        Some(fixture.kubeconfig_path().to_string())
    );
    let curl = invocations.get(5).unwrap_or_else(|| panic!("curl"));
    assert_eq!(
        curl.command_string(),
        format!("curl -k -sS https://{NODE_ADDRESS}:6443/version")
    );

    let inventory = fixture
        .inventory_contents()
        .unwrap_or_else(|| panic!("inventory should be written"));
    assert!(inventory.contains(&format!("ansible_host: {NODE_ADDRESS}")));
    assert!(inventory.contains("ansible_user: ubuntu"));
    assert_eq!(fixture.prompter.remaining(), 0);
}

#[rstest]
fn become_password_never_reaches_argv_or_inventory(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    for _ in 0..4 {
        fixture.runner.push_success();
    }

    fixture
        .execute(&preset_request())
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    assert!(
        fixture
            .all_arguments()
            .iter()
            .all(|arg| !arg.contains(BECOME_PASSWORD)),
        "password leaked into argv"
    );
    let inventory = fixture.inventory_contents().unwrap_or_default();
    assert!(!inventory.contains(BECOME_PASSWORD));
}

#[rstest]
fn missing_key_is_generated_before_anything_else(deploy_fixture: DeployFixture) {
    for _ in 0..5 {
        deploy_fixture.runner.push_success();
    }

    let outcome = deploy_fixture
        .execute(&preset_request())
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let programs = deploy_fixture.runner.programs();
    assert_eq!(programs.first().map(String::as_str), Some("ssh-keygen"));
    assert_eq!(programs.len(), 5);
    assert!(matches!(
        outcome,
        DeployOutcome::Completed {
            verification: Verification::KubeconfigMissing { .. },
            ..
        }
    ));
}

#[rstest]
fn missing_kubeconfig_skips_verification(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    for _ in 0..4 {
        fixture.runner.push_success();
    }

    let outcome = fixture
        .execute(&preset_request())
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let DeployOutcome::Completed { verification, .. } = outcome else {
        panic!("deploy should complete");
    };
    assert_eq!(
        verification,
        Verification::KubeconfigMissing {
            path: fixture.kubeconfig_path(),
        }
    );
    let programs = fixture.runner.programs();
    assert!(!programs.iter().any(|program| program == "kubectl" || program == "curl"));
}

#[rstest]
fn reused_inventory_targets_its_first_host(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture
        .with_existing_key()
        .with_inventory(VALID_INVENTORY)
        .with_kubeconfig();
    fixture.prompter.push_confirm(true);
    fixture.prompter.push_password(BECOME_PASSWORD);
    for _ in 0..5 {
        fixture.runner.push_success();
    }

    let outcome = fixture
        .execute(&DeployRequest::default())
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let DeployOutcome::Completed { host, .. } = outcome else {
        panic!("deploy should complete");
    };
    assert_eq!(host.name, "node1");
    assert_eq!(host.address, "10.0.0.5");
    assert_eq!(host.user, "ubuntu");
    let programs = fixture.runner.programs();
    assert!(!programs.iter().any(|program| program == "ssh-copy-id"));
    let invocations = fixture.runner.invocations();
    let curl = invocations.last().unwrap_or_else(|| panic!("curl"));
    assert_eq!(
        curl.command_string(),
        "curl -k -sS https://10.0.0.5:6443/version"
    );
    assert_eq!(
        fixture.inventory_contents().as_deref(),
        Some(VALID_INVENTORY)
    );
}

#[rstest]
fn declined_reuse_replaces_the_inventory(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture
        .with_existing_key()
        .with_inventory(VALID_INVENTORY);
    let request = DeployRequest {
        reuse_inventory: Some(false),
        ..preset_request()
    };
    for _ in 0..4 {
        fixture.runner.push_success();
    }

    fixture
        .execute(&request)
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let inventory = fixture
        .inventory_contents()
        .unwrap_or_else(|| panic!("inventory should be rewritten"));
    assert!(inventory.contains(NODE_ADDRESS));
    assert!(!inventory.contains("10.0.0.5"));
}

#[rstest]
#[case::missing_all("other: {}\n", "Invalid structure in inventory file")]
#[case::missing_hosts("all:\n  vars: {}\n", "Invalid structure in inventory file")]
#[case::empty_hosts("all:\n  hosts: {}\n", "No hosts found in inventory file")]
fn unusable_inventory_aborts_quietly(
    deploy_fixture: DeployFixture,
    #[case] contents: &str,
    #[case] message: &str,
) {
    let fixture = deploy_fixture.with_existing_key().with_inventory(contents);
    let request = DeployRequest {
        reuse_inventory: Some(true),
        ..preset_request()
    };

    let outcome = fixture
        .execute(&request)
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let DeployOutcome::Aborted(reason) = outcome else {
        panic!("deploy should abort");
    };
    assert!(reason.to_string().starts_with(message), "{reason}");
    assert!(fixture.runner.invocations().is_empty());
}

#[rstest]
fn invalid_mode_aborts_before_writing_anything(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    let request = DeployRequest {
        mode: Some(String::from("multi")),
        ..preset_request()
    };

    let outcome = fixture
        .execute(&request)
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let DeployOutcome::Aborted(reason) = outcome else {
        panic!("deploy should abort");
    };
    assert!(matches!(reason, AbortReason::InvalidMode(_)));
    assert!(reason.to_string().starts_with("Invalid installation mode"));
    assert!(fixture.inventory_contents().is_none());
    assert!(fixture.runner.invocations().is_empty());
}

#[rstest]
fn ssh_password_is_handed_to_sshpass(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    let request = DeployRequest {
        ssh_password: Some(Secret::new("ssh-pass")),
        ..preset_request()
    };
    for _ in 0..4 {
        fixture.runner.push_success();
    }

    fixture
        .execute(&request)
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let invocations = fixture.runner.invocations();
    let copy = invocations.first().unwrap_or_else(|| panic!("sshpass"));
    assert_eq!(copy.program, "sshpass");
    assert_eq!(copy.env("SSHPASS"), Some(String::from("ssh-pass")));
    assert!(fixture.all_arguments().iter().all(|arg| arg != "ssh-pass"));
}

#[rstest]
fn playbook_failure_stops_the_run(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    fixture.runner.push_success();
    fixture.runner.push_failure(2);

    let err = fixture
        .execute(&preset_request())
        .expect_err("failing playbook should propagate");

    assert!(matches!(
        err,
        DeployError::Playbook(PlaybookError::Command { .. })
    ));
    assert_eq!(fixture.playbooks_run(), vec!["install_dependencies.yaml"]);
}

#[rstest]
fn unanswerable_prompt_is_fatal(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture.with_existing_key();
    let request = DeployRequest {
        host: None,
        ..preset_request()
    };

    let err = fixture
        .execute(&request)
        .expect_err("missing host should fail");

    assert!(matches!(
        err,
        DeployError::Prompt(PromptError::NonInteractive { .. })
    ));
    assert!(fixture.runner.invocations().is_empty());
    assert!(fixture.inventory_contents().is_none());
}

#[rstest]
#[case::empty("")]
#[case::whitespace("   ")]
fn blank_hostname_preset_falls_back_to_the_address(
    deploy_fixture: DeployFixture,
    #[case] hostname: &str,
) {
    let fixture = deploy_fixture.with_existing_key();
    let request = DeployRequest {
        hostname: Some(hostname.to_owned()),
        ..preset_request()
    };
    for _ in 0..4 {
        fixture.runner.push_success();
    }

    let outcome = fixture
        .execute(&request)
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    let DeployOutcome::Completed { host, .. } = outcome else {
        panic!("deploy should complete");
    };
    assert_eq!(host.name, NODE_ADDRESS);
    let inventory = fixture
        .inventory_contents()
        .unwrap_or_else(|| panic!("inventory should be written"));
    assert!(inventory.contains(&format!("{NODE_ADDRESS}:")), "{inventory}");
    assert!(!inventory.contains("''"), "{inventory}");
    assert!(fixture.prompter.prompts().is_empty());
}

#[rstest]
fn unattended_reuse_question_is_not_answered_for_the_operator(deploy_fixture: DeployFixture) {
    let fixture = deploy_fixture
        .with_existing_key()
        .with_inventory(VALID_INVENTORY);

    let err = DeployOrchestrator::new(
        &fixture.config,
        &fixture.runner,
        NonInteractivePrompter,
        fixture.root.clone(),
    )
    .execute(&preset_request())
    .expect_err("reuse must be chosen explicitly");

    assert!(matches!(
        err,
        DeployError::Inventory(InventoryError::Prompt(PromptError::NonInteractive { .. }))
    ));
    assert_eq!(
        fixture.inventory_contents().as_deref(),
        Some(VALID_INVENTORY)
    );
    assert!(fixture.runner.invocations().is_empty());
}
