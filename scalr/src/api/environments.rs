//! Environments API, including the tag and federation relationships

use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{
    segment, ApiQueryParams, Document, ListDocument, NewDocument, Relationship,
    RelationshipDocument, ResourceIdentifier, ResourceObject,
};
use super::pagination::{collect_pages, page_params};
use super::{ApiError, Client};

pub const ENVIRONMENT_TYPE: &str = "environments";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvironmentAttributes {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub remote_backend: bool,
    #[serde(default)]
    pub remote_backend_overridable: bool,
    #[serde(default)]
    pub mask_sensitive_output: bool,
    #[serde(default)]
    pub is_federated_to_account: bool,
    #[serde(default)]
    pub created_by: Option<User>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
}

pub type Environment = ResourceObject<EnvironmentAttributes>;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
struct EnvironmentWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_backend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_backend_overridable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask_sensitive_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_federated_to_account: Option<bool>,
}

/// Fields of a create or update call. `None` leaves a field out of the
/// request; for nullable links `Some(None)` clears the link.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentOptions {
    pub name: Option<String>,
    pub remote_backend: Option<bool>,
    pub remote_backend_overridable: Option<bool>,
    pub mask_sensitive_output: Option<bool>,
    pub is_federated_to_account: Option<bool>,
    pub account_id: Option<String>,
    pub default_provider_configurations: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub storage_profile_id: Option<Option<String>>,
    pub default_workspace_agent_pool_id: Option<Option<String>>,
}

impl EnvironmentOptions {
    fn document(&self) -> NewDocument<EnvironmentWrite> {
        let attributes = EnvironmentWrite {
            name: self.name.clone(),
            remote_backend: self.remote_backend,
            remote_backend_overridable: self.remote_backend_overridable,
            mask_sensitive_output: self.mask_sensitive_output,
            is_federated_to_account: self.is_federated_to_account,
        };

        let mut doc = NewDocument::new(ENVIRONMENT_TYPE, attributes);
        if let Some(account_id) = &self.account_id {
            doc = doc.relationship("account", Relationship::one("accounts", account_id.clone()));
        }
        if let Some(ids) = &self.default_provider_configurations {
            doc = doc.relationship(
                "default-provider-configurations",
                Relationship::many("provider-configurations", ids.iter().cloned()),
            );
        }
        if let Some(ids) = &self.tags {
            doc = doc.relationship("tags", Relationship::many("tags", ids.iter().cloned()));
        }
        if let Some(link) = &self.storage_profile_id {
            doc = doc.relationship("storage-profile", link_or_null("storage-profiles", link));
        }
        if let Some(link) = &self.default_workspace_agent_pool_id {
            doc = doc.relationship("default-workspace-agent-pool", link_or_null("agent-pools", link));
        }
        doc
    }
}

fn link_or_null(kind: &str, link: &Option<String>) -> Relationship {
    match link {
        Some(id) => Relationship::one(kind, id.clone()),
        None => Relationship::none(),
    }
}

/// Filters for environment lookups; unset fields are not sent
#[derive(Debug, Default, Clone)]
pub struct EnvironmentFilter {
    pub name: Option<String>,
    pub account_id: Option<String>,
}

pub struct EnvironmentsApi<'a> {
    client: &'a Client,
}

impl<'a> EnvironmentsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /environments/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Environment, ApiError> {
        let doc: Document<Environment> = self
            .client
            .get(ctx, &format!("environments/{}", segment(id)))
            .await?;
        Ok(doc.data)
    }

    /// GET /environments, every page
    pub async fn list(
        &self,
        ctx: &Context,
        filter: &EnvironmentFilter,
    ) -> Result<Vec<Environment>, ApiError> {
        collect_pages(move |page| async move {
            let params = page_params(
                ApiQueryParams::new()
                    .add_optional("filter[name]", filter.name.as_deref())
                    .add_optional("filter[account]", filter.account_id.as_deref()),
                page,
            );
            self.client
                .get_with_params::<ListDocument<Environment>>(ctx, "environments", &params)
                .await
        })
        .await
    }

    /// POST /environments
    pub async fn create(
        &self,
        ctx: &Context,
        options: &EnvironmentOptions,
    ) -> Result<Environment, ApiError> {
        let doc: Document<Environment> = self
            .client
            .post(ctx, "environments", &options.document())
            .await?;
        Ok(doc.data)
    }

    /// PATCH /environments/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        options: &EnvironmentOptions,
    ) -> Result<Environment, ApiError> {
        let doc: Document<Environment> = self
            .client
            .patch(ctx, &format!("environments/{}", segment(id)), &options.document().with_id(id))
            .await?;
        Ok(doc.data)
    }

    /// PATCH /environments/{id} touching only the default provider
    /// configurations relationship
    pub async fn set_default_provider_configurations(
        &self,
        ctx: &Context,
        id: &str,
        provider_configuration_ids: &[String],
    ) -> Result<Environment, ApiError> {
        let options = EnvironmentOptions {
            default_provider_configurations: Some(provider_configuration_ids.to_vec()),
            ..Default::default()
        };
        self.update(ctx, id, &options).await
    }

    /// DELETE /environments/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client.delete(ctx, &format!("environments/{}", segment(id))).await
    }

    /// POST /environments/{id}/relationships/tags
    pub async fn add_tags(&self, ctx: &Context, id: &str, tag_ids: &[String]) -> Result<(), ApiError> {
        self.client
            .post(
                ctx,
                &format!("environments/{}/relationships/tags", segment(id)),
                &RelationshipDocument::new("tags", tag_ids.iter().cloned()),
            )
            .await
    }

    /// DELETE /environments/{id}/relationships/tags
    pub async fn remove_tags(
        &self,
        ctx: &Context,
        id: &str,
        tag_ids: &[String],
    ) -> Result<(), ApiError> {
        self.client
            .delete_with_body(
                ctx,
                &format!("environments/{}/relationships/tags", segment(id)),
                &RelationshipDocument::new("tags", tag_ids.iter().cloned()),
            )
            .await
    }

    /// GET /environments/{id}/relationships/federated-environments, every page
    pub async fn list_federated(&self, ctx: &Context, id: &str) -> Result<Vec<String>, ApiError> {
        let path = format!("environments/{}/relationships/federated-environments", segment(id));
        let path = path.as_str();
        let identifiers = collect_pages(move |page| async move {
            let params = page_params(ApiQueryParams::new(), page);
            self.client
                .get_with_params::<ListDocument<ResourceIdentifier>>(ctx, path, &params)
                .await
        })
        .await?;
        Ok(identifiers.into_iter().map(|i| i.id).collect())
    }

    /// POST /environments/{id}/relationships/federated-environments
    pub async fn add_federated(
        &self,
        ctx: &Context,
        id: &str,
        environment_ids: &[String],
    ) -> Result<(), ApiError> {
        self.client
            .post(
                ctx,
                &format!("environments/{}/relationships/federated-environments", segment(id)),
                &RelationshipDocument::new(ENVIRONMENT_TYPE, environment_ids.iter().cloned()),
            )
            .await
    }

    /// DELETE /environments/{id}/relationships/federated-environments
    pub async fn remove_federated(
        &self,
        ctx: &Context,
        id: &str,
        environment_ids: &[String],
    ) -> Result<(), ApiError> {
        self.client
            .delete_with_body(
                ctx,
                &format!("environments/{}/relationships/federated-environments", segment(id)),
                &RelationshipDocument::new(ENVIRONMENT_TYPE, environment_ids.iter().cloned()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_document_only_carries_set_fields() {
        let options = EnvironmentOptions {
            name: Some("prod".to_string()),
            account_id: Some("acc-1".to_string()),
            tags: Some(vec!["tag-1".to_string()]),
            storage_profile_id: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(options.document()).unwrap();

        assert_eq!(value["data"]["type"], "environments");
        assert_eq!(value["data"]["attributes"], serde_json::json!({"name": "prod"}));
        let rels = &value["data"]["relationships"];
        assert_eq!(rels["account"]["data"]["id"], "acc-1");
        assert_eq!(rels["tags"]["data"][0]["type"], "tags");
        assert!(rels["storage-profile"]["data"].is_null());
        assert!(rels.get("default-provider-configurations").is_none());
    }

    #[test]
    fn environment_attributes_tolerate_missing_flags() {
        let env: Document<Environment> = serde_json::from_str(
            r#"{"data":{"id":"env-1","type":"environments","attributes":{"name":"prod",
                "created-by":{"username":"jdoe","email":"j@example.com","full-name":"J Doe"}}}}"#,
        )
        .unwrap();
        assert!(!env.data.attributes.remote_backend);
        assert_eq!(
            env.data.attributes.created_by.unwrap().full_name,
            "J Doe"
        );
    }
}
