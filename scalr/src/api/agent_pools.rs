//! Agent pools and their access tokens

use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{
    segment, ApiQueryParams, Document, ListDocument, NewDocument, Relationship, ResourceObject,
};
use super::pagination::{collect_pages, page_params};
use super::{ApiError, Client};

pub const AGENT_POOL_TYPE: &str = "agent-pools";
pub const ACCESS_TOKEN_TYPE: &str = "access-tokens";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AgentPoolAttributes {
    pub name: String,
    #[serde(default)]
    pub vcs_enabled: bool,
    #[serde(default)]
    pub is_shared: bool,
}

pub type AgentPool = ResourceObject<AgentPoolAttributes>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct AgentPoolWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vcs_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_shared: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct AgentPoolOptions {
    pub name: Option<String>,
    pub vcs_enabled: Option<bool>,
    pub is_shared: Option<bool>,
    pub account_id: Option<String>,
    pub environment_id: Option<String>,
    pub environments: Option<Vec<String>>,
}

impl AgentPoolOptions {
    fn document(&self) -> NewDocument<AgentPoolWrite> {
        let mut doc = NewDocument::new(
            AGENT_POOL_TYPE,
            AgentPoolWrite {
                name: self.name.clone(),
                vcs_enabled: self.vcs_enabled,
                is_shared: self.is_shared,
            },
        );
        if let Some(account_id) = &self.account_id {
            doc = doc.relationship("account", Relationship::one("accounts", account_id.clone()));
        }
        if let Some(environment_id) = &self.environment_id {
            doc = doc.relationship(
                "environment",
                Relationship::one("environments", environment_id.clone()),
            );
        }
        if let Some(ids) = &self.environments {
            doc = doc.relationship(
                "environments",
                Relationship::many("environments", ids.iter().cloned()),
            );
        }
        doc
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccessTokenAttributes {
    #[serde(default)]
    pub description: Option<String>,
    /// Only returned by the create call
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub type AccessToken = ResourceObject<AccessTokenAttributes>;

#[derive(Debug, Serialize)]
struct AccessTokenWrite<'a> {
    description: &'a str,
}

pub struct AgentPoolsApi<'a> {
    client: &'a Client,
}

impl<'a> AgentPoolsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /agent-pools/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<AgentPool, ApiError> {
        let doc: Document<AgentPool> = self
            .client
            .get(ctx, &format!("agent-pools/{}", segment(id)))
            .await?;
        Ok(doc.data)
    }

    /// POST /agent-pools
    pub async fn create(
        &self,
        ctx: &Context,
        options: &AgentPoolOptions,
    ) -> Result<AgentPool, ApiError> {
        let doc: Document<AgentPool> = self
            .client
            .post(ctx, "agent-pools", &options.document())
            .await?;
        Ok(doc.data)
    }

    /// PATCH /agent-pools/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        options: &AgentPoolOptions,
    ) -> Result<AgentPool, ApiError> {
        let doc: Document<AgentPool> = self
            .client
            .patch(ctx, &format!("agent-pools/{}", segment(id)), &options.document().with_id(id))
            .await?;
        Ok(doc.data)
    }

    /// DELETE /agent-pools/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client.delete(ctx, &format!("agent-pools/{}", segment(id))).await
    }

    /// GET /agent-pools/{id}/access-tokens, every page
    pub async fn list_tokens(
        &self,
        ctx: &Context,
        pool_id: &str,
    ) -> Result<Vec<AccessToken>, ApiError> {
        let path = format!("agent-pools/{}/access-tokens", segment(pool_id));
        let path = path.as_str();
        collect_pages(move |page| async move {
            let params = page_params(ApiQueryParams::new(), page);
            self.client
                .get_with_params::<ListDocument<AccessToken>>(ctx, path, &params)
                .await
        })
        .await
    }

    /// POST /agent-pools/{id}/access-tokens
    pub async fn create_token(
        &self,
        ctx: &Context,
        pool_id: &str,
        description: &str,
    ) -> Result<AccessToken, ApiError> {
        let body = NewDocument::new(ACCESS_TOKEN_TYPE, AccessTokenWrite { description });
        let doc: Document<AccessToken> = self
            .client
            .post(ctx, &format!("agent-pools/{}/access-tokens", segment(pool_id)), &body)
            .await?;
        Ok(doc.data)
    }

    /// PATCH /access-tokens/{id}
    pub async fn update_token(
        &self,
        ctx: &Context,
        token_id: &str,
        description: &str,
    ) -> Result<AccessToken, ApiError> {
        let body =
            NewDocument::new(ACCESS_TOKEN_TYPE, AccessTokenWrite { description }).with_id(token_id);
        let doc: Document<AccessToken> = self
            .client
            .patch(ctx, &format!("access-tokens/{}", segment(token_id)), &body)
            .await?;
        Ok(doc.data)
    }

    /// DELETE /access-tokens/{id}
    pub async fn delete_token(&self, ctx: &Context, token_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(ctx, &format!("access-tokens/{}", segment(token_id)))
            .await
    }
}
