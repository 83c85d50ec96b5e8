//! Variables API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{segment, ApiQueryParams, Document, NewDocument, Relationship, ResourceObject};
use super::{ApiError, Client};

pub const VARIABLE_TYPE: &str = "vars";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariableAttributes {
    pub key: String,
    /// Null for sensitive variables
    #[serde(default)]
    pub value: Option<String>,
    pub category: String,
    #[serde(default)]
    pub hcl: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by_email: Option<String>,
}

pub type Variable = ResourceObject<VariableAttributes>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct VariableWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hcl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensitive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "final")]
    is_final: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// Fields of a create or update call; `None` leaves a field out. Scope
/// links are only honoured on create.
#[derive(Debug, Default, Clone)]
pub struct VariableOptions {
    pub key: Option<String>,
    pub value: Option<String>,
    pub category: Option<String>,
    pub hcl: Option<bool>,
    pub sensitive: Option<bool>,
    pub is_final: Option<bool>,
    pub description: Option<String>,
    pub account_id: Option<String>,
    pub environment_id: Option<String>,
    pub workspace_id: Option<String>,
    /// Sent as the `force` query flag
    pub force: bool,
}

impl VariableOptions {
    fn document(&self) -> NewDocument<VariableWrite> {
        let mut doc = NewDocument::new(
            VARIABLE_TYPE,
            VariableWrite {
                key: self.key.clone(),
                value: self.value.clone(),
                category: self.category.clone(),
                hcl: self.hcl,
                sensitive: self.sensitive,
                is_final: self.is_final,
                description: self.description.clone(),
            },
        );
        let links = [
            ("account", "accounts", &self.account_id),
            ("environment", "environments", &self.environment_id),
            ("workspace", "workspaces", &self.workspace_id),
        ];
        for (name, kind, id) in links {
            if let Some(id) = id {
                doc = doc.relationship(name, Relationship::one(kind, id.clone()));
            }
        }
        doc
    }

    fn query(&self) -> String {
        ApiQueryParams::new()
            .add_optional("force", self.force.then_some(true))
            .to_query_string()
    }
}

pub struct VariablesApi<'a> {
    client: &'a Client,
}

impl<'a> VariablesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /vars/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Variable, ApiError> {
        let doc: Document<Variable> = self.client.get(ctx, &format!("vars/{}", segment(id))).await?;
        Ok(doc.data)
    }

    /// POST /vars
    pub async fn create(
        &self,
        ctx: &Context,
        options: &VariableOptions,
    ) -> Result<Variable, ApiError> {
        let doc: Document<Variable> = self
            .client
            .post(ctx, &format!("vars{}", options.query()), &options.document())
            .await?;
        Ok(doc.data)
    }

    /// PATCH /vars/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        options: &VariableOptions,
    ) -> Result<Variable, ApiError> {
        let doc: Document<Variable> = self
            .client
            .patch(
                ctx,
                &format!("vars/{}{}", segment(id), options.query()),
                &options.document().with_id(id),
            )
            .await?;
        Ok(doc.data)
    }

    /// DELETE /vars/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client.delete(ctx, &format!("vars/{}", segment(id))).await
    }
}
