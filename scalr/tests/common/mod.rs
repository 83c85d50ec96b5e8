//! Shared setup for tests that drive the provider against a mock Scalr API

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use scalr::ScalrProvider;
use tfplug::context::Context;
use tfplug::data_source::{ConfigureDataSourceRequest, DataSource};
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{ConfigureResourceRequest, Resource};
use tfplug::types::DynamicValue;

pub type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub const API: &str = "/api/iacp/v3";

pub fn path(suffix: &str) -> String {
    format!("{}/{}", API, suffix)
}

/// Configures a provider pointed at `url` and returns its shared data
pub async fn configure_provider(url: &str) -> (ScalrProvider, ProviderData) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let mut provider = ScalrProvider::new();
    let config = DynamicValue::object()
        .with("hostname", url)
        .with("token", "secret");

    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config,
            },
        )
        .await;
    assert!(
        response.diagnostics.is_empty(),
        "configure failed: {:?}",
        response.diagnostics
    );
    (provider, response.provider_data)
}

pub async fn resource(url: &str, type_name: &str) -> Box<dyn Resource> {
    let (provider, provider_data) = configure_provider(url).await;
    let factories = provider.resources();
    let factory = factories
        .get(type_name)
        .unwrap_or_else(|| panic!("{} is not registered", type_name));

    let mut resource = factory();
    let response = resource
        .configure(Context::new(), ConfigureResourceRequest { provider_data })
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

pub async fn data_source(url: &str, type_name: &str) -> Box<dyn DataSource> {
    let (provider, provider_data) = configure_provider(url).await;
    let factories = provider.data_sources();
    let factory = factories
        .get(type_name)
        .unwrap_or_else(|| panic!("{} is not registered", type_name));

    let mut data_source = factory();
    let response = data_source
        .configure(Context::new(), ConfigureDataSourceRequest { provider_data })
        .await;
    assert!(response.diagnostics.is_empty());
    data_source
}
