//! Terraform provider for Scalr
//!
//! The provider resolves its connection settings, builds one shared API
//! client and hands it to every resource and data source through
//! [`ScalrProviderData`].

pub mod api;
pub mod config;
pub mod data_sources;
pub mod defaults;
pub mod helpers;
pub mod provider_data;
pub mod resources;

pub use provider_data::ScalrProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::{Context, DataSource, Diagnostic, Resource};

use crate::config::ProviderConfig;

pub const PROVIDER_TYPE_NAME: &str = "scalr";

pub fn provider_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Scalr provider configuration")
        .attribute(
            AttributeBuilder::new("hostname", AttributeType::String)
                .description(
                    "The Scalr hostname to connect to. Defaults to `scalr.io`. Can be set with the `SCALR_HOSTNAME` environment variable.",
                )
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("token", AttributeType::String)
                .description(
                    "The token used to authenticate with Scalr. Can be set with the `SCALR_TOKEN` environment variable.",
                )
                .optional()
                .sensitive()
                .build(),
        )
        .build()
}

#[derive(Default)]
pub struct ScalrProvider {
    provider_data: Option<ScalrProviderData>,
}

impl ScalrProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data produced by the last successful configure call
    pub fn provider_data(&self) -> Option<&ScalrProviderData> {
        self.provider_data.as_ref()
    }
}

#[async_trait]
impl Provider for ScalrProvider {
    fn type_name(&self) -> &str {
        PROVIDER_TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: PROVIDER_TYPE_NAME.to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: provider_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = match ProviderConfig::from_config(&request.config) {
            Ok(config) => config,
            Err(diagnostics) => {
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        };

        let client = match api::Client::new(&config.address, &config.token) {
            Ok(client) => client,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    )],
                    provider_data: None,
                }
            }
        };

        let data = ScalrProviderData::new(client, defaults::current_account_id());
        tracing::info!(
            "Configured Scalr provider for {} (terraform {})",
            config.address,
            request.terraform_version
        );
        self.provider_data = Some(data.clone());

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(data)),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        let mut register = |factory: ResourceFactory| {
            let name = factory().type_name().to_string();
            factories.insert(name, factory);
        };

        register(Box::new(|| {
            Box::new(resources::TagResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::EnvironmentResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::AgentPoolResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::AgentPoolTokenResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::PolicyGroupLinkageResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::ProviderConfigurationDefaultResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::RoleResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::VariableResource::new()) as Box<dyn Resource>
        }));
        register(Box::new(|| {
            Box::new(resources::InfracostResource::new()) as Box<dyn Resource>
        }));
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "scalr_current_run".to_string(),
            Box::new(|| {
                Box::new(data_sources::CurrentRunDataSource::new()) as Box<dyn DataSource>
            }),
        );
        factories.insert(
            "scalr_environment".to_string(),
            Box::new(|| {
                Box::new(data_sources::EnvironmentDataSource::new()) as Box<dyn DataSource>
            }),
        );
        factories.insert(
            "scalr_tag".to_string(),
            Box::new(|| Box::new(data_sources::TagDataSource::new()) as Box<dyn DataSource>),
        );
        factories
    }
}
