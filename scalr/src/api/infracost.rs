//! Infracost integration API

use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{segment, Document, NewDocument, Relationship, ResourceObject};
use super::{ApiError, Client};

pub const INFRACOST_TYPE: &str = "infracost-integrations";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InfracostAttributes {
    pub name: String,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub status: Option<String>,
    /// Set when the integration was saved but could not be verified
    #[serde(default)]
    pub err_message: Option<String>,
}

pub type InfracostIntegration = ResourceObject<InfracostAttributes>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct InfracostWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_shared: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct InfracostOptions {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub is_shared: Option<bool>,
    pub environments: Option<Vec<String>>,
}

impl InfracostOptions {
    fn document(&self) -> NewDocument<InfracostWrite> {
        let mut doc = NewDocument::new(
            INFRACOST_TYPE,
            InfracostWrite {
                name: self.name.clone(),
                api_key: self.api_key.clone(),
                is_shared: self.is_shared,
            },
        );
        if let Some(ids) = &self.environments {
            doc = doc.relationship(
                "environments",
                Relationship::many("environments", ids.iter().cloned()),
            );
        }
        doc
    }
}

pub struct InfracostApi<'a> {
    client: &'a Client,
}

impl<'a> InfracostApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /integrations/infracost/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<InfracostIntegration, ApiError> {
        let doc: Document<InfracostIntegration> = self
            .client
            .get(ctx, &format!("integrations/infracost/{}", segment(id)))
            .await?;
        Ok(doc.data)
    }

    /// POST /integrations/infracost
    pub async fn create(
        &self,
        ctx: &Context,
        options: &InfracostOptions,
    ) -> Result<InfracostIntegration, ApiError> {
        let doc: Document<InfracostIntegration> = self
            .client
            .post(ctx, "integrations/infracost", &options.document())
            .await?;
        Ok(doc.data)
    }

    /// PATCH /integrations/infracost/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        options: &InfracostOptions,
    ) -> Result<InfracostIntegration, ApiError> {
        let doc: Document<InfracostIntegration> = self
            .client
            .patch(
                ctx,
                &format!("integrations/infracost/{}", segment(id)),
                &options.document().with_id(id),
            )
            .await?;
        Ok(doc.data)
    }

    /// DELETE /integrations/infracost/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &format!("integrations/infracost/{}", segment(id)))
            .await
    }
}
