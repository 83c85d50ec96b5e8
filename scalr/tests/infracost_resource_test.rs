//! Infracost integration against a mock Scalr API

#![allow(clippy::disallowed_methods)]

mod common;

use common::{path, resource};
use mockito::{Matcher, Server};
use serde_json::json;
use tfplug::context::Context;
use tfplug::resource::{CreateResourceRequest, UpdateResourceRequest};
use tfplug::types::{AttributePath, DiagnosticSeverity, Dynamic, DynamicValue};

fn planned(environments: Dynamic) -> DynamicValue {
    DynamicValue::object()
        .with("id", Dynamic::Unknown)
        .with("name", "costs")
        .with("api_key", "ico-key")
        .with("environments", environments)
        .with("status", Dynamic::Unknown)
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_key_is_saved_with_a_warning() {
    let mut server = Server::new_async().await;
    let integrations = resource(&server.url(), "scalr_integration_infracost").await;

    let _mock = server
        .mock("POST", path("integrations/infracost").as_str())
        .with_status(201)
        .with_body(
            json!({
                "data": {
                    "id": "ic-1",
                    "type": "infracost-integrations",
                    "attributes": {
                        "name": "costs",
                        "status": "failed",
                        "is-shared": false,
                        "err-message": "Invalid API key"
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let created = integrations
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "scalr_integration_infracost".to_string(),
                planned_state: planned(Dynamic::Unknown),
                config: planned(Dynamic::Null),
            },
        )
        .await;

    assert_eq!(created.diagnostics.len(), 1);
    assert_eq!(created.diagnostics[0].severity, DiagnosticSeverity::Warning);
    assert_eq!(created.diagnostics[0].summary, "Issues detected");
    assert_eq!(created.diagnostics[0].detail, "Invalid API key");

    let state = created.new_state;
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "ic-1");
    assert_eq!(state.get_string(&AttributePath::new("api_key")).unwrap(), "ico-key");
    assert_eq!(state.get_string(&AttributePath::new("status")).unwrap(), "failed");
}

#[tokio::test(flavor = "multi_thread")]
async fn wildcard_environments_share_the_integration() {
    let mut server = Server::new_async().await;
    let integrations = resource(&server.url(), "scalr_integration_infracost").await;

    let create_mock = server
        .mock("POST", path("integrations/infracost").as_str())
        .match_body(Matcher::PartialJson(json!({
            "data": {
                "attributes": {"name": "costs", "api-key": "ico-key", "is-shared": true},
                "relationships": {"environments": {"data": []}}
            }
        })))
        .with_status(201)
        .with_body(
            r#"{"data":{"id":"ic-1","type":"infracost-integrations",
                "attributes":{"name":"costs","status":"active","is-shared":true}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let environments = Dynamic::string_set(["*"]);
    let created = integrations
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "scalr_integration_infracost".to_string(),
                planned_state: planned(environments.clone()),
                config: planned(environments.clone()),
            },
        )
        .await;

    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(
        created.new_state.get(&AttributePath::new("environments")),
        Some(&environments)
    );
    create_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn update_rereads_the_integration() {
    let mut server = Server::new_async().await;
    let integrations = resource(&server.url(), "scalr_integration_infracost").await;

    let body = |status: &str| {
        json!({
            "data": {
                "id": "ic-1",
                "type": "infracost-integrations",
                "attributes": {"name": "renamed", "status": status, "is-shared": true},
                "relationships": {"environments": {"data": []}}
            }
        })
        .to_string()
    };
    let update_mock = server
        .mock("PATCH", path("integrations/infracost/ic-1").as_str())
        .match_body(Matcher::PartialJson(json!({
            "data": {"attributes": {"name": "renamed", "is-shared": true}}
        })))
        .with_body(body("pending"))
        .expect(1)
        .create_async()
        .await;
    let get_mock = server
        .mock("GET", path("integrations/infracost/ic-1").as_str())
        .with_body(body("active"))
        .expect(1)
        .create_async()
        .await;

    let prior = planned(Dynamic::string_set(["*"]))
        .with("id", "ic-1")
        .with("status", "active");
    let next = prior.clone().with("name", "renamed");
    let updated = integrations
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: "scalr_integration_infracost".to_string(),
                prior_state: prior,
                planned_state: next.clone(),
                config: next,
            },
        )
        .await;

    assert!(updated.diagnostics.is_empty(), "{:?}", updated.diagnostics);
    update_mock.assert_async().await;
    get_mock.assert_async().await;
    assert_eq!(
        updated.new_state.get_string(&AttributePath::new("status")).unwrap(),
        "active"
    );
    assert_eq!(
        updated.new_state.get_string(&AttributePath::new("api_key")).unwrap(),
        "ico-key"
    );
}
