//! IAM roles API

use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{segment, Document, NewDocument, Relationship, ResourceObject};
use super::{ApiError, Client};

pub const ROLE_TYPE: &str = "roles";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoleAttributes {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
}

pub type Role = ResourceObject<RoleAttributes>;

#[derive(Debug, Serialize)]
struct RoleWrite<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Clone)]
pub struct RoleOptions {
    pub name: String,
    pub description: String,
    pub account_id: Option<String>,
    pub permissions: Vec<String>,
}

impl RoleOptions {
    fn document(&self) -> NewDocument<RoleWrite<'_>> {
        let mut doc = NewDocument::new(
            ROLE_TYPE,
            RoleWrite {
                name: &self.name,
                description: &self.description,
            },
        )
        .relationship(
            "permissions",
            Relationship::many("permissions", self.permissions.iter().cloned()),
        );
        if let Some(account_id) = &self.account_id {
            doc = doc.relationship("account", Relationship::one("accounts", account_id.clone()));
        }
        doc
    }
}

pub struct RolesApi<'a> {
    client: &'a Client,
}

impl<'a> RolesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /roles/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Role, ApiError> {
        let doc: Document<Role> = self.client.get(ctx, &format!("roles/{}", segment(id))).await?;
        Ok(doc.data)
    }

    /// POST /roles
    pub async fn create(&self, ctx: &Context, options: &RoleOptions) -> Result<Role, ApiError> {
        let doc: Document<Role> = self.client.post(ctx, "roles", &options.document()).await?;
        Ok(doc.data)
    }

    /// PATCH /roles/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        options: &RoleOptions,
    ) -> Result<Role, ApiError> {
        let doc: Document<Role> = self
            .client
            .patch(ctx, &format!("roles/{}", segment(id)), &options.document().with_id(id))
            .await?;
        Ok(doc.data)
    }

    /// DELETE /roles/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client.delete(ctx, &format!("roles/{}", segment(id))).await
    }
}
