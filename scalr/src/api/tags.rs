//! Tags API

use serde::{Deserialize, Serialize};
use tfplug::Context;

use super::common::{
    segment, ApiQueryParams, Document, ListDocument, NewDocument, Relationship, ResourceObject,
};
use super::pagination::{collect_pages, page_params};
use super::{ApiError, Client};

pub const TAG_TYPE: &str = "tags";

#[derive(Debug, Clone, Deserialize)]
pub struct TagAttributes {
    pub name: String,
}

pub type Tag = ResourceObject<TagAttributes>;

#[derive(Debug, Serialize)]
struct TagWrite<'a> {
    name: &'a str,
}

/// Filters for tag lookups; unset fields are not sent
#[derive(Debug, Default, Clone)]
pub struct TagFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub account_id: Option<String>,
}

impl TagFilter {
    fn params(&self) -> ApiQueryParams {
        ApiQueryParams::new()
            .add_optional("filter[tag]", self.id.as_deref())
            .add_optional("filter[name]", self.name.as_deref())
            .add_optional("filter[account]", self.account_id.as_deref())
    }
}

pub struct TagsApi<'a> {
    client: &'a Client,
}

impl<'a> TagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /tags/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Tag, ApiError> {
        let doc: Document<Tag> = self.client.get(ctx, &format!("tags/{}", segment(id))).await?;
        Ok(doc.data)
    }

    /// GET /tags, every page
    pub async fn list(&self, ctx: &Context, filter: &TagFilter) -> Result<Vec<Tag>, ApiError> {
        collect_pages(move |page| async move {
            let params = page_params(filter.params(), page);
            self.client
                .get_with_params::<ListDocument<Tag>>(ctx, "tags", &params)
                .await
        })
        .await
    }

    /// POST /tags
    pub async fn create(&self, ctx: &Context, name: &str, account_id: &str) -> Result<Tag, ApiError> {
        let body = NewDocument::new(TAG_TYPE, TagWrite { name })
            .relationship("account", Relationship::one("accounts", account_id));
        let doc: Document<Tag> = self.client.post(ctx, "tags", &body).await?;
        Ok(doc.data)
    }

    /// PATCH /tags/{id}
    pub async fn update(&self, ctx: &Context, id: &str, name: &str) -> Result<Tag, ApiError> {
        let body = NewDocument::new(TAG_TYPE, TagWrite { name }).with_id(id);
        let doc: Document<Tag> = self
            .client
            .patch(ctx, &format!("tags/{}", segment(id)), &body)
            .await?;
        Ok(doc.data)
    }

    /// DELETE /tags/{id}
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client.delete(ctx, &format!("tags/{}", segment(id))).await
    }
}
