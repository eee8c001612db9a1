//! End-to-end webhook to deploy tests against fake collaborators

use std::time::Duration;

use futures::future::join_all;

use deployhook::deploy::fsm::{FsmSettings, Stage};
use deployhook::deploy::orchestrator::{AckStatus, Admission, BUSY_REASON};
use deployhook::errors::DeployHookError;
use deployhook::models::deployment::{ContainerAction, DeployOutcome, NotifyKind, Trigger};
use deployhook::webhook::matcher::IgnoreReason;

use crate::common::{repo, sign, workflow_run, FakeCredentials, FakeNotifier, FakeRuntime, HarnessBuilder};

fn success_body() -> Vec<u8> {
    workflow_run("completed", Some("success"), "acme/app", "main")
}

fn admitted(admission: Admission) -> deployhook::deploy::orchestrator::AdmittedDeploy {
    match admission {
        Admission::Admitted(admitted) => admitted,
        other => panic!("expected admission, got {:?}", other),
    }
}

#[tokio::test]
async fn test_successful_run_redeploys_container() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .credentials(FakeCredentials::new().with_registry("ghcr.io", "bot", "ghp_token"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Succeeded);
    assert_eq!(
        h.runtime.calls(),
        vec![
            "login ghcr.io bot",
            "pull ghcr.io/acme/app:latest",
            "stop app-container",
            "remove app-container",
            "run app-container",
            "prune",
        ]
    );
    assert!(h.registry.last_deployed("app").is_some());
    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Success]);
    assert!(!h.orchestrator.locks().is_held("app-container"));

    let run = &h.runtime.runs()[0];
    assert_eq!(run.spec.restart_policy, "unless-stopped");
    assert_eq!(run.spec.ports, vec!["8080:80".to_string()]);
    assert!(run.spec.env_file.is_none());
}

#[tokio::test]
async fn test_failed_conclusion_is_ignored() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    let body = workflow_run("completed", Some("failure"), "acme/app", "main");
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Ignored);
    assert!(h.runtime.calls().is_empty());
    assert!(h.notifier.events().is_empty());
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_in_progress_run_is_ignored() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    let body = workflow_run("in_progress", None, "acme/app", "main");
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert!(matches!(
        admission,
        Admission::Ignored(IgnoreReason::NotSuccessful { ref action, conclusion: None }) if action == "in_progress"
    ));
}

#[tokio::test]
async fn test_pull_failure_leaves_container_untouched() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().failing("pull", "dial tcp: i/o timeout"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Failed);
    assert_eq!(h.runtime.operations(), vec!["pull"]);
    assert!(h.registry.last_deployed("app").is_none());

    let events = h.notifier.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, NotifyKind::Failure);
    assert_eq!(events[1].stage, Some(Stage::Pulling));
    assert!(events[1].detail.contains("dial tcp: i/o timeout"));
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_second_webhook_while_deploying_is_skipped() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_millis(200)))
        .build();

    let body = success_body();
    let signature = sign(&body);

    let first = admitted(
        h.orchestrator
            .admit_webhook(&body, Some(&signature), Some("workflow_run"))
            .await
            .unwrap(),
    );
    let orchestrator = h.orchestrator.clone();
    let running = tokio::spawn(async move { orchestrator.execute(first).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h
        .orchestrator
        .admit_webhook(&body, Some(&signature), Some("workflow_run"))
        .await
        .unwrap();
    match second {
        Admission::Skipped(job) => assert_eq!(job.container_name, "app-container"),
        other => panic!("expected skip, got {:?}", other),
    }

    assert_eq!(running.await.unwrap(), DeployOutcome::Succeeded);
    assert_eq!(h.runtime.operations().iter().filter(|op| *op == "pull").count(), 1);
    // skips are logged, not notified
    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Success]);
}

#[tokio::test]
async fn test_concurrent_admissions_single_winner() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    let body = success_body();
    let signature = sign(&body);
    let admissions = join_all((0..8).map(|_| {
        h.orchestrator
            .admit_webhook(&body, Some(&signature), Some("workflow_run"))
    }))
    .await;

    let mut winners = Vec::new();
    let mut skipped = 0;
    for admission in admissions {
        match admission.unwrap() {
            Admission::Admitted(admitted) => winners.push(admitted),
            Admission::Skipped(_) => skipped += 1,
            other => panic!("unexpected admission {:?}", other),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(skipped, 7);

    let outcome = h.orchestrator.execute(winners.pop().unwrap()).await;
    assert!(outcome.is_success());
    assert_eq!(h.runtime.operations().iter().filter(|op| *op == "run").count(), 1);
}

#[tokio::test]
async fn test_different_containers_deploy_in_parallel() {
    let h = HarnessBuilder::new(vec![repo("api", "acme/api", "main"), repo("web", "acme/web", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_millis(100)))
        .build();

    let api = workflow_run("completed", Some("success"), "acme/api", "main");
    let web = workflow_run("completed", Some("success"), "acme/web", "main");

    let first = admitted(
        h.orchestrator
            .admit_webhook(&api, Some(&sign(&api)), Some("workflow_run"))
            .await
            .unwrap(),
    );
    let second = admitted(
        h.orchestrator
            .admit_webhook(&web, Some(&sign(&web)), Some("workflow_run"))
            .await
            .unwrap(),
    );

    let (a, b) = tokio::join!(h.orchestrator.execute(first), h.orchestrator.execute(second));
    assert!(a.is_success());
    assert!(b.is_success());
    assert!(h.registry.last_deployed("api").is_some());
    assert!(h.registry.last_deployed("web").is_some());
}

#[tokio::test]
async fn test_sequential_runs_are_independent_cycles() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();
    let body = success_body();

    let first = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    let second = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(first.status, AckStatus::Succeeded);
    assert_eq!(second.status, AckStatus::Succeeded);
    assert_ne!(first.attempt_id, second.attempt_id);
    assert_eq!(
        h.runtime.operations(),
        vec!["pull", "stop", "remove", "run", "prune", "pull", "stop", "remove", "run", "prune"]
    );
}

#[tokio::test]
async fn test_missing_container_still_deploys() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().missing_container())
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Succeeded);
    assert!(h.runtime.operations().contains(&"run".to_string()));
}

#[tokio::test]
async fn test_run_failure_reports_absent_container() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().failing("run", "port is already allocated"))
        .build();

    let body = success_body();
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    let outcome = h.orchestrator.execute(admitted(admission)).await;

    assert!(outcome.leaves_container_absent());
    assert!(!h.runtime.operations().contains(&"prune".to_string()));
    let failure = &h.notifier.events()[1];
    assert_eq!(failure.stage, Some(Stage::Starting));
    assert!(failure.detail.starts_with("run failed:"));
    assert!(failure.container_down);
}

#[tokio::test]
async fn test_notifier_failure_does_not_change_outcome() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .notifier(FakeNotifier::failing())
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Succeeded);
    assert!(h.registry.last_deployed("app").is_some());
    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Success]);
}

#[tokio::test]
async fn test_prune_failure_is_not_fatal() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().failing("prune", "image is in use"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Succeeded);
}

#[tokio::test]
async fn test_timeout_fails_stage_and_releases_lock() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_secs(5)))
        .settings(FsmSettings {
            pull_timeout: Duration::from_millis(30),
            ..Default::default()
        })
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Failed);
    assert!(ack.detail.unwrap().contains("timed out"));
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_executor_panic_is_contained() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().panicking_on("stop"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Failed);
    assert!(!h.orchestrator.locks().is_held("app-container"));
    let failure = &h.notifier.events()[1];
    assert_eq!(failure.stage, Some(Stage::Stopping));
    assert!(failure.detail.contains("runtime exploded during stop"));
}

#[tokio::test]
async fn test_env_blob_is_materialized_privately_and_removed() {
    let mut config = repo("app", "acme/app", "main");
    config.env_file_ref = Some("app".to_string());
    let h = HarnessBuilder::new(vec![config])
        .credentials(FakeCredentials::new().with_env("app", "# db\nDB_URL=\"postgres://db/app\"\n\nTOKEN=abc\n"))
        .build();

    let body = success_body();
    h.orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    let run = &h.runtime.runs()[0];
    let env_file = run.spec.env_file.clone().unwrap();
    assert!(env_file.starts_with(h.run_dir.path()));
    assert_eq!(run.env_content.as_deref(), Some("DB_URL=postgres://db/app\nTOKEN=abc\n"));
    #[cfg(unix)]
    assert_eq!(run.env_mode, Some(0o600));
    assert!(!env_file.exists());
    assert!(h.run_dir_is_empty());
}

#[tokio::test]
async fn test_env_file_removed_when_run_fails() {
    let mut config = repo("app", "acme/app", "main");
    config.env_file_ref = Some("app".to_string());
    let h = HarnessBuilder::new(vec![config])
        .runtime(FakeRuntime::new().failing("run", "bad flag"))
        .credentials(FakeCredentials::new().with_env("app", "A=1\n"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Failed);
    assert!(h.run_dir_is_empty());
}

#[tokio::test]
async fn test_missing_env_blob_runs_without_env_file() {
    let mut config = repo("app", "acme/app", "main");
    config.env_file_ref = Some("gone".to_string());
    let h = HarnessBuilder::new(vec![config]).build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Succeeded);
    assert!(h.runtime.runs()[0].spec.env_file.is_none());
}

#[tokio::test]
async fn test_login_only_for_matching_registry() {
    let mut config = repo("app", "acme/app", "main");
    config.image = "nginx:1.27".to_string();
    let h = HarnessBuilder::new(vec![config])
        .credentials(FakeCredentials::new().with_registry("ghcr.io", "bot", "ghp_token"))
        .build();

    let body = success_body();
    h.orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(h.runtime.operations()[0], "pull");
    assert!(!h.runtime.operations().contains(&"login".to_string()));
}

#[tokio::test]
async fn test_login_failure_fails_pulling_stage() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().failing("login", "unauthorized: bad credentials"))
        .credentials(FakeCredentials::new().with_registry("ghcr.io", "bot", "expired"))
        .build();

    let body = success_body();
    let ack = h
        .orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(ack.status, AckStatus::Failed);
    let detail = ack.detail.unwrap();
    assert!(detail.starts_with("failed at Pulling: auth:"), "{}", detail);
    assert!(!detail.contains("expired"));
    assert_eq!(h.runtime.operations(), vec!["login"]);
}

#[tokio::test]
async fn test_branch_placeholder_in_image() {
    let mut config = repo("app", "acme/app", "release");
    config.image = "ghcr.io/acme/app:{branch}".to_string();
    let h = HarnessBuilder::new(vec![config]).build();

    let body = workflow_run("completed", Some("success"), "acme/app", "release");
    h.orchestrator
        .handle_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();

    assert_eq!(h.runtime.calls()[0], "pull ghcr.io/acme/app:release");
}

#[tokio::test]
async fn test_matching_is_exact_and_first_wins() {
    let mut inactive = repo("old", "acme/app", "main");
    inactive.active = false;
    let h = HarnessBuilder::new(vec![inactive, repo("first", "acme/app", "main"), repo("second", "acme/app", "main")])
        .build();

    let other_branch = workflow_run("completed", Some("success"), "acme/app", "Main");
    let admission = h
        .orchestrator
        .admit_webhook(&other_branch, Some(&sign(&other_branch)), Some("workflow_run"))
        .await
        .unwrap();
    assert!(matches!(admission, Admission::NoMatch));

    let body = success_body();
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    assert_eq!(admitted(admission).job.repo_id, "first");
}

#[tokio::test]
async fn test_signature_rejections_touch_nothing() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();
    let body = success_body();

    let mut tampered = body.clone();
    tampered[0] = b' ';
    let bad = h
        .orchestrator
        .admit_webhook(&tampered, Some(&sign(&body)), Some("workflow_run"))
        .await;
    assert!(matches!(bad, Err(DeployHookError::SignatureInvalid)));

    let unsigned = h.orchestrator.admit_webhook(&body, None, Some("workflow_run")).await;
    assert!(matches!(unsigned, Err(DeployHookError::SignatureInvalid)));

    assert!(h.runtime.calls().is_empty());
    assert!(h.notifier.events().is_empty());
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_missing_secret_rejects_everything() {
    let credentials = FakeCredentials {
        webhook_secret: Some(String::new()),
        ..FakeCredentials::new()
    };
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .credentials(credentials)
        .build();

    let body = success_body();
    let result = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await;
    assert!(matches!(result, Err(DeployHookError::WebhookSecretMissing)));
}

#[tokio::test]
async fn test_other_events_are_ignored() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    let body = br#"{"zen":"Keep it logically awesome.","hook_id":1}"#.to_vec();
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("ping"))
        .await
        .unwrap();
    assert!(matches!(admission, Admission::Ignored(IgnoreReason::OtherEvent(ref e)) if e == "ping"));
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    let body = br#"{"action":"completed","workflow_run":{"conclusion":"success"}}"#.to_vec();
    let result = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await;
    assert!(matches!(result, Err(DeployHookError::InvalidPayload(_))));
}

#[tokio::test]
async fn test_manual_deploy_uses_configured_branch() {
    let mut config = repo("app", "acme/app", "stable");
    config.image = "ghcr.io/acme/app:{branch}".to_string();
    let h = HarnessBuilder::new(vec![config]).build();

    let deploy = admitted(h.orchestrator.admit_manual("app").await.unwrap());
    assert_eq!(deploy.job.trigger, Trigger::Manual);
    assert_eq!(deploy.job.image, "ghcr.io/acme/app:stable");
    assert!(h.orchestrator.execute(deploy).await.is_success());

    let missing = h.orchestrator.admit_manual("nope").await;
    assert!(matches!(missing, Err(DeployHookError::NotFound(_))));
}

#[tokio::test]
async fn test_async_dispatch_acknowledges_first() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_millis(50)))
        .build();

    let body = success_body();
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    let ack = h.orchestrator.dispatch(admission, true).await;

    assert_eq!(ack.status, AckStatus::Accepted);
    assert!(ack.attempt_id.is_some());

    h.wait_for_notifications(2).await;
    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Success]);
    assert!(h.registry.last_deployed("app").is_some());
}

#[tokio::test]
async fn test_busy_ack_carries_reason() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();
    let body = success_body();

    let _held = admitted(
        h.orchestrator
            .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
            .await
            .unwrap(),
    );
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    let ack = h.orchestrator.dispatch(admission, false).await;

    assert_eq!(ack.status, AckStatus::Skipped);
    assert_eq!(ack.detail.as_deref(), Some(BUSY_REASON));
}

async fn dispatch_async(h: &crate::common::Harness) {
    let body = success_body();
    let admission = h
        .orchestrator
        .admit_webhook(&body, Some(&sign(&body)), Some("workflow_run"))
        .await
        .unwrap();
    let ack = h.orchestrator.dispatch(admission, true).await;
    assert_eq!(ack.status, AckStatus::Accepted);
}

#[tokio::test]
async fn test_shutdown_waits_for_running_deploy() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_millis(50)))
        .build();

    dispatch_async(&h).await;
    h.orchestrator.shutdown(Duration::from_secs(5)).await;

    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Success]);
    assert_eq!(h.runtime.operations(), vec!["pull", "stop", "remove", "run", "prune"]);
    assert!(h.registry.last_deployed("app").is_some());
}

#[tokio::test]
async fn test_shutdown_interrupts_overdue_deploy_and_reports_it() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_secs(30)))
        .build();

    dispatch_async(&h).await;
    h.orchestrator.shutdown(Duration::from_millis(50)).await;

    assert_eq!(h.notifier.kinds(), vec![NotifyKind::Start, NotifyKind::Failure]);
    let failure = &h.notifier.events()[1];
    assert_eq!(failure.stage, Some(Stage::Pulling));
    assert_eq!(failure.detail, "interrupted by shutdown");
    assert!(!failure.container_down);
    assert!(h.runtime.calls().is_empty());
    assert!(h.registry.last_deployed("app").is_none());
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_shutdown_during_run_reports_container_down() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_run_delay(Duration::from_secs(30)))
        .build();

    dispatch_async(&h).await;
    h.orchestrator.shutdown(Duration::from_millis(50)).await;

    assert_eq!(h.runtime.operations(), vec!["pull", "stop", "remove"]);
    let failure = &h.notifier.events()[1];
    assert_eq!(failure.kind, NotifyKind::Failure);
    assert_eq!(failure.stage, Some(Stage::Starting));
    assert!(failure.container_down);
    assert!(h.run_dir_is_empty());
}

#[tokio::test]
async fn test_shutdown_without_deploys_returns_at_once() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")]).build();

    tokio::time::timeout(Duration::from_secs(1), h.orchestrator.shutdown(Duration::from_secs(60)))
        .await
        .unwrap();
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn test_restart_and_stop_controls() {
    let mut inactive = repo("old", "acme/old", "main");
    inactive.active = false;
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main"), inactive]).build();

    let ack = h.orchestrator.control("app", ContainerAction::Restart).await.unwrap();
    assert_eq!(ack.status, AckStatus::Succeeded);
    assert_eq!(h.runtime.calls(), vec!["restart app-container"]);

    let ack = h.orchestrator.control("old", ContainerAction::Stop).await.unwrap();
    assert_eq!(ack.status, AckStatus::Succeeded);
    assert_eq!(
        h.runtime.calls(),
        vec!["restart app-container", "stop old-container", "remove old-container"]
    );

    assert!(!h.orchestrator.locks().is_held("app-container"));
    assert!(!h.orchestrator.locks().is_held("old-container"));
    assert!(h.notifier.events().is_empty());
    assert!(h.registry.last_deployed("app").is_none());

    let missing = h.orchestrator.control("nope", ContainerAction::Restart).await;
    assert!(matches!(missing, Err(DeployHookError::NotFound(_))));
}

#[tokio::test]
async fn test_stop_control_tolerates_missing_container() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().missing_container())
        .build();

    let ack = h.orchestrator.control("app", ContainerAction::Stop).await.unwrap();
    assert_eq!(ack.status, AckStatus::Succeeded);
}

#[tokio::test]
async fn test_control_failure_is_acknowledged() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().failing("restart", "No such container: app-container"))
        .build();

    let ack = h.orchestrator.control("app", ContainerAction::Restart).await.unwrap();
    assert_eq!(ack.status, AckStatus::Failed);
    assert!(ack.detail.unwrap().starts_with("restart failed:"));
    assert!(!h.orchestrator.locks().is_held("app-container"));
}

#[tokio::test]
async fn test_control_skipped_while_deploy_in_flight() {
    let h = HarnessBuilder::new(vec![repo("app", "acme/app", "main")])
        .runtime(FakeRuntime::new().with_pull_delay(Duration::from_millis(200)))
        .build();

    dispatch_async(&h).await;
    for action in [ContainerAction::Restart, ContainerAction::Stop] {
        let ack = h.orchestrator.control("app", action).await.unwrap();
        assert_eq!(ack.status, AckStatus::Skipped);
        assert_eq!(ack.detail.as_deref(), Some(BUSY_REASON));
    }

    h.wait_for_notifications(2).await;
    assert_eq!(h.runtime.operations(), vec!["pull", "stop", "remove", "run", "prune"]);
}
