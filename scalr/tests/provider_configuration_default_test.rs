//! Default provider configuration bookkeeping against a mock Scalr API

#![allow(clippy::disallowed_methods)]

mod common;

use std::time::Duration;

use common::{configure_provider, path, resource};
use mockito::{Matcher, Server};
use serde_json::json;
use tfplug::context::Context;
use tfplug::provider::Provider;
use tfplug::resource::{ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

const TYPE_NAME: &str = "scalr_provider_configuration_default";

fn environment_with_defaults(ids: &[&str]) -> String {
    let defaults: Vec<_> = ids
        .iter()
        .map(|id| json!({"type": "provider-configurations", "id": id}))
        .collect();
    json!({
        "data": {
            "id": "env-1",
            "type": "environments",
            "attributes": {"name": "prod"},
            "relationships": {"default-provider-configurations": {"data": defaults}}
        }
    })
    .to_string()
}

fn planned() -> DynamicValue {
    DynamicValue::object()
        .with("id", Dynamic::Unknown)
        .with("environment_id", "env-1")
        .with("provider_configuration_id", "pcfg-2")
}

fn create_request() -> CreateResourceRequest {
    CreateResourceRequest {
        type_name: TYPE_NAME.to_string(),
        planned_state: planned(),
        config: planned(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_appends_to_existing_defaults() {
    let mut server = Server::new_async().await;
    let defaults = resource(&server.url(), TYPE_NAME).await;

    let _env_mock = server
        .mock("GET", path("environments/env-1").as_str())
        .with_body(environment_with_defaults(&["pcfg-1"]))
        .create_async()
        .await;
    let _pcfg_mock = server
        .mock("GET", path("provider-configurations/pcfg-2").as_str())
        .with_body(r#"{"data":{"id":"pcfg-2","type":"provider-configurations","attributes":{"name":"aws"}}}"#)
        .create_async()
        .await;
    let patch_mock = server
        .mock("PATCH", path("environments/env-1").as_str())
        .match_body(Matcher::PartialJson(json!({
            "data": {"relationships": {"default-provider-configurations": {"data": [
                {"type": "provider-configurations", "id": "pcfg-1"},
                {"type": "provider-configurations", "id": "pcfg-2"}
            ]}}}
        })))
        .with_body(environment_with_defaults(&["pcfg-1", "pcfg-2"]))
        .expect(1)
        .create_async()
        .await;

    let created = defaults.create(Context::new(), create_request()).await;

    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(
        created.new_state.get_string(&AttributePath::new("id")).unwrap(),
        "env-1/pcfg-2"
    );
    patch_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_rejects_existing_default() {
    let mut server = Server::new_async().await;
    let defaults = resource(&server.url(), TYPE_NAME).await;

    let _env_mock = server
        .mock("GET", path("environments/env-1").as_str())
        .with_body(environment_with_defaults(&["pcfg-2"]))
        .create_async()
        .await;
    let _pcfg_mock = server
        .mock("GET", path("provider-configurations/pcfg-2").as_str())
        .with_body(r#"{"data":{"id":"pcfg-2","type":"provider-configurations","attributes":{"name":"aws"}}}"#)
        .create_async()
        .await;
    let patch_mock = server
        .mock("PATCH", path("environments/env-1").as_str())
        .expect(0)
        .create_async()
        .await;

    let created = defaults.create(Context::new(), create_request()).await;

    assert_eq!(created.diagnostics.len(), 1);
    assert_eq!(
        created.diagnostics[0].detail,
        "Provider configuration is already set as default for environment \"env-1\""
    );
    assert!(created.new_state.is_null());
    patch_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_is_a_no_op_when_not_a_default() {
    let mut server = Server::new_async().await;
    let defaults = resource(&server.url(), TYPE_NAME).await;

    let _env_mock = server
        .mock("GET", path("environments/env-1").as_str())
        .with_body(environment_with_defaults(&["pcfg-1"]))
        .create_async()
        .await;
    let patch_mock = server
        .mock("PATCH", path("environments/env-1").as_str())
        .expect(0)
        .create_async()
        .await;

    let deleted = defaults
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: DynamicValue::object()
                    .with("id", "env-1/pcfg-2")
                    .with("environment_id", "env-1")
                    .with("provider_configuration_id", "pcfg-2"),
            },
        )
        .await;

    assert!(deleted.diagnostics.is_empty());
    patch_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_waits_for_the_shared_lock() {
    let mut server = Server::new_async().await;
    let (provider, provider_data) = configure_provider(&server.url()).await;
    let lock = provider.provider_data().unwrap().default_pcfg_lock.clone();

    let factories = provider.resources();
    let mut defaults = factories[TYPE_NAME]();
    defaults
        .configure(Context::new(), ConfigureResourceRequest { provider_data })
        .await;

    let env_mock = server
        .mock("GET", path("environments/env-1").as_str())
        .with_body(environment_with_defaults(&[]))
        .create_async()
        .await;
    let _pcfg_mock = server
        .mock("GET", path("provider-configurations/pcfg-2").as_str())
        .with_body(r#"{"data":{"id":"pcfg-2","type":"provider-configurations","attributes":{"name":"aws"}}}"#)
        .create_async()
        .await;
    let _patch_mock = server
        .mock("PATCH", path("environments/env-1").as_str())
        .with_body(environment_with_defaults(&["pcfg-2"]))
        .create_async()
        .await;

    let guard = lock.lock().await;
    let blocked = tokio::time::timeout(
        Duration::from_millis(200),
        defaults.create(Context::new(), create_request()),
    )
    .await;
    assert!(blocked.is_err());
    assert!(!env_mock.matched_async().await);
    drop(guard);

    let created = defaults.create(Context::new(), create_request()).await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert!(env_mock.matched_async().await);
}
