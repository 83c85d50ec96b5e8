//! Data sources against a mock Scalr API

#![allow(clippy::disallowed_methods)]

mod common;

use common::{data_source, path};
use mockito::{Matcher, Server};
use serde_json::json;
use serial_test::serial;
use tfplug::context::Context;
use tfplug::data_source::ReadDataSourceRequest;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

fn read_request(type_name: &str, config: DynamicValue) -> ReadDataSourceRequest {
    ReadDataSourceRequest {
        type_name: type_name.to_string(),
        config,
    }
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn current_run_outside_scalr_is_a_placeholder() {
    std::env::remove_var("SCALR_RUN_ID");
    let server = Server::new_async().await;
    let current_run = data_source(&server.url(), "scalr_current_run").await;

    let read = current_run
        .read(Context::new(), read_request("scalr_current_run", DynamicValue::null()))
        .await;

    assert!(read.diagnostics.is_empty());
    assert_eq!(read.state.get_string(&AttributePath::new("id")).unwrap(), "-");
    assert!(read
        .state
        .get(&AttributePath::new("workspace_name"))
        .unwrap()
        .is_null());
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn current_run_reads_run_and_workspace() {
    let mut server = Server::new_async().await;
    let current_run = data_source(&server.url(), "scalr_current_run").await;

    let _run_mock = server
        .mock("GET", path("runs/run-1").as_str())
        .match_query(Matcher::UrlEncoded("include".into(), "vcs-revision".into()))
        .with_body(
            json!({
                "data": {
                    "id": "run-1",
                    "type": "runs",
                    "attributes": {"source": "vcs", "message": "Triggered by push", "is-destroy": false},
                    "relationships": {
                        "workspace": {"data": {"type": "workspaces", "id": "ws-1"}},
                        "apply": {"data": {"type": "applies", "id": "apply-1"}},
                        "vcs-revision": {"data": {"type": "vcs-revisions", "id": "vcsr-1"}}
                    }
                },
                "included": [{
                    "id": "vcsr-1",
                    "type": "vcs-revisions",
                    "attributes": {
                        "commit-sha": "abc123",
                        "commit-message": "fix",
                        "sender-username": "octocat"
                    }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _workspace_mock = server
        .mock("GET", path("workspaces/ws-1").as_str())
        .with_body(
            json!({
                "data": {
                    "id": "ws-1",
                    "type": "workspaces",
                    "attributes": {
                        "name": "network",
                        "vcs-repo": {"identifier": "org/infra", "branch": "main"}
                    },
                    "relationships": {
                        "environment": {"data": {"type": "environments", "id": "env-1"}}
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    std::env::set_var("SCALR_RUN_ID", "run-1");
    let read = current_run
        .read(Context::new(), read_request("scalr_current_run", DynamicValue::null()))
        .await;
    std::env::remove_var("SCALR_RUN_ID");

    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    let state = read.state;
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "run-1");
    assert_eq!(
        state.get_string(&AttributePath::new("environment_id")).unwrap(),
        "env-1"
    );
    assert_eq!(
        state.get_string(&AttributePath::new("workspace_name")).unwrap(),
        "network"
    );
    assert!(!state.get_bool(&AttributePath::new("is_dry")).unwrap());
    let sha = AttributePath::new("vcs")
        .index(0)
        .attribute("commit")
        .index(0)
        .attribute("sha");
    assert_eq!(state.get_string(&sha).unwrap(), "abc123");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn current_run_reports_missing_run() {
    let mut server = Server::new_async().await;
    let current_run = data_source(&server.url(), "scalr_current_run").await;

    let _mock = server
        .mock("GET", path("runs/run-404").as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    std::env::set_var("SCALR_RUN_ID", "run-404");
    let read = current_run
        .read(Context::new(), read_request("scalr_current_run", DynamicValue::null()))
        .await;
    std::env::remove_var("SCALR_RUN_ID");

    assert_eq!(read.diagnostics.len(), 1);
    assert_eq!(read.diagnostics[0].detail, "Could not find run run-404");
}

#[tokio::test(flavor = "multi_thread")]
async fn environment_lookup_by_name() {
    let mut server = Server::new_async().await;
    let environments = data_source(&server.url(), "scalr_environment").await;

    let _list_mock = server
        .mock("GET", path("environments").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("filter[name]".into(), "prod".into()),
            Matcher::UrlEncoded("filter[account]".into(), "acc-1".into()),
        ]))
        .with_body(
            json!({
                "data": [{
                    "id": "env-1",
                    "type": "environments",
                    "attributes": {"name": "prod", "status": "Active"},
                    "relationships": {
                        "account": {"data": {"type": "accounts", "id": "acc-1"}},
                        "policy-groups": {"data": [
                            {"type": "policy-groups", "id": "pgrp-2"},
                            {"type": "policy-groups", "id": "pgrp-1"}
                        ]}
                    }
                }],
                "meta": {"pagination": {"current-page": 1, "total-pages": 1}}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _federated_mock = server
        .mock(
            "GET",
            path("environments/env-1/relationships/federated-environments").as_str(),
        )
        .match_query(Matcher::Any)
        .with_body(r#"{"data":[{"type":"environments","id":"env-2"}]}"#)
        .create_async()
        .await;

    let read = environments
        .read(
            Context::new(),
            read_request(
                "scalr_environment",
                DynamicValue::object()
                    .with("name", "prod")
                    .with("account_id", "acc-1"),
            ),
        )
        .await;

    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    let state = read.state;
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "env-1");
    assert_eq!(
        state.get(&AttributePath::new("policy_groups")),
        Some(&Dynamic::string_list(["pgrp-1", "pgrp-2"]))
    );
    assert_eq!(
        state.get(&AttributePath::new("federated_environments")),
        Some(&Dynamic::string_set(["env-2"]))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn environment_lookup_rejects_name_mismatch() {
    let mut server = Server::new_async().await;
    let environments = data_source(&server.url(), "scalr_environment").await;

    let _mock = server
        .mock("GET", path("environments/env-1").as_str())
        .with_body(r#"{"data":{"id":"env-1","type":"environments","attributes":{"name":"prod"}}}"#)
        .create_async()
        .await;

    let read = environments
        .read(
            Context::new(),
            read_request(
                "scalr_environment",
                DynamicValue::object().with("id", "env-1").with("name", "dev"),
            ),
        )
        .await;

    assert_eq!(read.diagnostics.len(), 1);
    assert_eq!(
        read.diagnostics[0].detail,
        "Could not find environment with ID 'env-1' and name 'dev'"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn environment_id_is_encoded_as_one_path_segment() {
    let mut server = Server::new_async().await;
    let environments = data_source(&server.url(), "scalr_environment").await;

    let get_mock = server
        .mock("GET", path("environments/env-1%3Fx%3D1").as_str())
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let read = environments
        .read(
            Context::new(),
            read_request(
                "scalr_environment",
                DynamicValue::object().with("id", "env-1?x=1"),
            ),
        )
        .await;

    assert_eq!(read.diagnostics.len(), 1);
    get_mock.assert_async().await;
}
