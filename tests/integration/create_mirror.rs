use std::sync::Arc;

use forkmirror::cli::MirrorRequest;
use forkmirror::MirrorError;
use serde_json::json;
use wiremock::MockServer;

use crate::fixtures::repository_json;
use crate::mocks::git::RecordingGit;
use crate::mocks::github::{
    any_create_repo_mock, create_property_mock, create_repo_mock, create_repo_status_mock,
    delete_repo_mock, get_repo_mock, get_repo_status_mock, list_properties_mock, org_mock,
};
use crate::support::service;

mod create_mirror {

    use super::*;

    fn request() -> MirrorRequest {
        MirrorRequest {
            fork_repo_owner: "alice".to_string(),
            fork_repo_name: "widget".to_string(),
            new_repo_name: "widget-mirror".to_string(),
            new_branch_name: "feature-x".to_string(),
        }
    }

    fn mirror_json() -> serde_json::Value {
        repository_json(100, "acme-private", "widget-mirror", Some("alice/widget"))
    }

    /// Everything a create call reads before it starts mutating.
    async fn mount_lookups(server: &MockServer) {
        org_mock("acme", "acme").mount(server).await;
        get_repo_status_mock("acme", "widget-mirror", 404)
            .mount(server)
            .await;
        get_repo_status_mock("acme-private", "widget-mirror", 404)
            .mount(server)
            .await;
        get_repo_mock("alice", "widget", repository_json(1, "alice", "widget", None))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn success() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .expect(1)
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .expect(1)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .expect(1)
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 204)
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let outcome = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap();

        assert!(outcome.success);
        let mirror = outcome.data.unwrap();
        assert_eq!(mirror.name, "widget-mirror");
        assert!(mirror.private);
        assert_eq!(mirror.fork_property(), Some("alice/widget"));

        assert_eq!(
            git.calls(),
            vec![
                "clone https://contribution-token@github.test/alice/widget.git",
                "config mirror-bot[bot] <42+mirror-bot[bot]@users.noreply.github.test>",
                "remote add upstream https://private-token@github.test/acme-private/widget-mirror.git",
                "push upstream main",
                "checkout -b feature-x main",
                "push upstream feature-x",
                "push origin feature-x",
            ]
        );

        let workdirs = git.workdirs();
        assert!(workdirs.windows(2).all(|w| w[0] == w[1]));
        assert!(!workdirs[0].exists());

        server.verify().await;
    }

    #[tokio::test]
    async fn existing_tracking_property_is_reused() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock(
            "acme-private",
            json!([{ "property_name": "fork", "value_type": "string", "required": false }]),
        )
        .mount(&server)
        .await;
        create_property_mock("acme-private", "fork", 200)
            .expect(0)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let outcome = service(&server, git)
            .create_mirror("acme", &request())
            .await
            .unwrap();

        assert!(outcome.success);
        server.verify().await;
    }

    #[tokio::test]
    async fn tracking_property_created_concurrently() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        list_properties_mock(
            "acme-private",
            json!([{ "property_name": "fork", "value_type": "string" }]),
        )
        .expect(1)
        .mount(&server)
        .await;
        create_property_mock("acme-private", "fork", 422)
            .expect(1)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let outcome = service(&server, git)
            .create_mirror("acme", &request())
            .await
            .unwrap();

        assert!(outcome.success);
        server.verify().await;
    }

    #[tokio::test]
    async fn tracking_property_creation_failure_is_fatal() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .expect(2)
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 403)
            .expect(1)
            .mount(&server)
            .await;
        any_create_repo_mock("acme-private")
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let err = service(&server, git)
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), MirrorError::UpstreamApi(_)));
        server.verify().await;
    }

    #[tokio::test]
    async fn existing_repository_in_public_org() {
        let server = MockServer::start().await;

        org_mock("acme", "Acme").mount(&server).await;
        get_repo_mock(
            "Acme",
            "widget-mirror",
            repository_json(5, "Acme", "widget-mirror", None),
        )
        .expect(1)
        .mount(&server)
        .await;
        get_repo_mock("alice", "widget", repository_json(1, "alice", "widget", None))
            .expect(0)
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .expect(0)
            .mount(&server)
            .await;
        any_create_repo_mock("acme-private")
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let outcome = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.data.is_none());
        assert!(git.calls().is_empty());

        server.verify().await;
    }

    #[tokio::test]
    async fn repeated_call_creates_nothing() {
        let server = MockServer::start().await;

        org_mock("acme", "acme").mount(&server).await;
        get_repo_status_mock("acme", "widget-mirror", 404)
            .mount(&server)
            .await;
        get_repo_status_mock("acme-private", "widget-mirror", 404)
            .up_to_n_times(1)
            .mount(&server)
            .await;
        get_repo_mock("acme-private", "widget-mirror", mirror_json())
            .mount(&server)
            .await;
        get_repo_mock("alice", "widget", repository_json(1, "alice", "widget", None))
            .mount(&server)
            .await;
        list_properties_mock("acme-private", json!([]))
            .expect(1)
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .expect(1)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let service = service(&server, git.clone());

        let first = service.create_mirror("acme", &request()).await.unwrap();
        let second = service.create_mirror("acme", &request()).await.unwrap();

        assert!(first.success);
        assert!(!second.success);
        assert!(second.data.is_none());
        assert_eq!(git.calls().len(), 7);

        server.verify().await;
    }

    #[tokio::test]
    async fn push_to_fork_failure_deletes_mirror() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .expect(1)
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 204)
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::failing_on("push origin feature-x"));
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MirrorError::Step {
                step: forkmirror::event::SagaStep::PushBranchToFork,
                ..
            }
        ));
        assert!(matches!(err.root(), MirrorError::VersionControl { .. }));
        assert!(git.workdirs().iter().all(|dir| !dir.exists()));

        server.verify().await;
    }

    #[tokio::test]
    async fn push_of_default_branch_failure_deletes_mirror() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 204)
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::failing_on("push upstream main"));
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), MirrorError::VersionControl { .. }));
        assert!(!git.calls().iter().any(|call| call.starts_with("checkout")));

        server.verify().await;
    }

    #[tokio::test]
    async fn failed_rollback_is_escalated() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .mount(&server)
            .await;
        create_property_mock("acme-private", "fork", 200)
            .mount(&server)
            .await;
        create_repo_mock("acme-private", "widget-mirror", "alice/widget", mirror_json())
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 500)
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::failing_on("push origin feature-x"));
        let err = service(&server, git)
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        match err {
            MirrorError::Compensation { original, failures } => {
                assert!(matches!(original.root(), MirrorError::VersionControl { .. }));
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("delete acme-private/widget-mirror"));
            }
            other => panic!("unexpected error: {}", other),
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn losing_the_create_race_deletes_nothing() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock(
            "acme-private",
            json!([{ "property_name": "fork", "value_type": "string" }]),
        )
        .mount(&server)
        .await;
        create_repo_status_mock("acme-private", 422)
            .expect(1)
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 204)
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MirrorError::Step {
                step: forkmirror::event::SagaStep::CreateRepository,
                ..
            }
        ));
        assert!(matches!(err.root(), MirrorError::UpstreamApi(_)));
        assert!(err.to_string().contains("Validation Failed"));
        assert_eq!(
            git.calls(),
            vec![
                "clone https://contribution-token@github.test/alice/widget.git",
                "config mirror-bot[bot] <42+mirror-bot[bot]@users.noreply.github.test>",
            ]
        );
        assert!(git.workdirs().iter().all(|dir| !dir.exists()));

        server.verify().await;
    }

    #[tokio::test]
    async fn clone_failure_creates_nothing() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;

        list_properties_mock("acme-private", json!([]))
            .expect(0)
            .mount(&server)
            .await;
        any_create_repo_mock("acme-private")
            .expect(0)
            .mount(&server)
            .await;
        delete_repo_mock("acme-private", "widget-mirror", 204)
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::failing_on("clone"));
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), MirrorError::VersionControl { .. }));
        assert!(git.workdirs().iter().all(|dir| !dir.exists()));

        server.verify().await;
    }

    #[tokio::test]
    async fn lookup_failure_is_raised_without_compensation() {
        let server = MockServer::start().await;

        org_mock("acme", "acme").mount(&server).await;
        get_repo_status_mock("acme", "widget-mirror", 500)
            .expect(1)
            .mount(&server)
            .await;
        any_create_repo_mock("acme-private")
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), MirrorError::UpstreamApi(_)));
        assert!(!err.is_not_found());
        assert!(git.calls().is_empty());

        server.verify().await;
    }

    #[tokio::test]
    async fn missing_fork_is_raised() {
        let server = MockServer::start().await;

        org_mock("acme", "acme").mount(&server).await;
        get_repo_status_mock("acme", "widget-mirror", 404)
            .mount(&server)
            .await;
        get_repo_status_mock("acme-private", "widget-mirror", 404)
            .mount(&server)
            .await;
        get_repo_status_mock("alice", "widget", 404)
            .expect(1)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let err = service(&server, git.clone())
            .create_mirror("acme", &request())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(git.calls().is_empty());

        server.verify().await;
    }

    #[tokio::test]
    async fn unknown_organization_fails_softly() {
        let server = MockServer::start().await;

        let git = Arc::new(RecordingGit::default());
        let outcome = service(&server, git)
            .create_mirror("globex", &request())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn name_being_mirrored_fails_softly() {
        let server = MockServer::start().await;
        any_create_repo_mock("acme-private")
            .expect(0)
            .mount(&server)
            .await;

        let git = Arc::new(RecordingGit::default());
        let service = service(&server, git.clone());
        let _lease = service
            .leases()
            .try_acquire("acme-private", "widget-mirror")
            .unwrap();

        let outcome = service.create_mirror("acme", &request()).await.unwrap();

        assert!(!outcome.success);
        assert!(git.calls().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
