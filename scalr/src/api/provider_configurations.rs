//! Provider configurations, read-only from this provider's point of view

use serde::Deserialize;
use tfplug::Context;

use super::common::{segment, Document, ResourceObject};
use super::{ApiError, Client};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfigurationAttributes {
    pub name: String,
    #[serde(default)]
    pub provider_name: Option<String>,
}

pub type ProviderConfiguration = ResourceObject<ProviderConfigurationAttributes>;

pub struct ProviderConfigurationsApi<'a> {
    client: &'a Client,
}

impl<'a> ProviderConfigurationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /provider-configurations/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<ProviderConfiguration, ApiError> {
        let doc: Document<ProviderConfiguration> = self
            .client
            .get(ctx, &format!("provider-configurations/{}", segment(id)))
            .await?;
        Ok(doc.data)
    }
}
