//! Tag resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringNotWhitespace;
use tfplug::import_state_passthrough_id;

use crate::api::tags::Tag;
use crate::defaults::AccountIdDefault;
use crate::helpers::{api_error, not_configured, resolve_account_id, Attrs};
use crate::provider_data::ScalrProviderData;

pub fn tag_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the state of tags in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The identifier of the tag")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the tag")
                .required()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("account_id", AttributeType::String)
                .description("ID of the account")
                .optional()
                .computed()
                .default(AccountIdDefault::required())
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .build()
}

struct TagModel {
    id: Option<String>,
    name: String,
    account_id: Option<String>,
}

impl TagModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            name: attrs.string("name")?.unwrap_or_default(),
            account_id: attrs.string("account_id")?,
        })
    }
}

fn tag_state(tag: &Tag, fallback_account: Option<String>) -> DynamicValue {
    let account_id = tag
        .related_id("account")
        .map(str::to_string)
        .or(fallback_account);

    DynamicValue::object()
        .with("id", tag.id.as_str())
        .with("name", tag.attributes.name.as_str())
        .with("account_id", Dynamic::from(account_id))
}

#[derive(Default)]
pub struct TagResource {
    provider_data: Option<ScalrProviderData>,
}

impl TagResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_tag(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let plan = TagModel::from_value(planned)?;
        let account_id = resolve_account_id(plan.account_id, data)?;

        let tag = data
            .client
            .tags()
            .create(ctx, &plan.name, &account_id)
            .await
            .map_err(|e| api_error("Error creating tag", &e))?;

        tracing::debug!("Created tag {}", tag.id);
        Ok(tag_state(&tag, Some(account_id)))
    }

    async fn read_tag(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let state = TagModel::from_value(current)?;
        let Some(id) = state.id else {
            return Ok(None);
        };

        match data.client.tags().get(ctx, &id).await {
            Ok(tag) => Ok(Some(tag_state(&tag, state.account_id))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Tag {} not found, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Error retrieving tag", &e)),
        }
    }

    async fn update_tag(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let state = TagModel::from_value(prior)?;
        let plan = TagModel::from_value(planned)?;
        let id = state.id.unwrap_or_default();

        let tag = data
            .client
            .tags()
            .update(ctx, &id, &plan.name)
            .await
            .map_err(|e| api_error("Error updating tag", &e))?;

        Ok(tag_state(&tag, state.account_id))
    }
}

#[async_trait]
impl Resource for TagResource {
    fn type_name(&self) -> &str {
        "scalr_tag"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: tag_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match ScalrProviderData::from_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureResourceResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_tag(&ctx, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_tag(&ctx, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self
            .update_tag(&ctx, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let data = match self.data() {
            Ok(data) => data,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };
        let id = match TagModel::from_value(&request.prior_state) {
            Ok(TagModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data.client.tags().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Tag {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting tag", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::common::Document;
    use serial_test::serial;
    use tfplug::planning::{plan_resource_change, validate_resource_config};
    use tfplug::HasErrors;

    #[test]
    fn blank_name_fails_validation() {
        let config = DynamicValue::object().with("name", "   ");
        let diags = validate_resource_config(&tag_schema(), &config);
        assert!(diags.has_errors());
    }

    #[test]
    #[serial]
    fn plan_fills_account_from_environment() {
        std::env::set_var("SCALR_ACCOUNT_ID", "acc-1");
        let config = DynamicValue::object().with("name", "prod");
        let planned = plan_resource_change(&tag_schema(), &DynamicValue::null(), &config);
        std::env::remove_var("SCALR_ACCOUNT_ID");

        assert!(planned.diagnostics.is_empty());
        assert_eq!(
            planned
                .planned_state
                .get_string(&AttributePath::new("account_id"))
                .unwrap(),
            "acc-1"
        );
        assert!(planned
            .planned_state
            .get(&AttributePath::new("id"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn changing_account_requires_replace() {
        let prior = DynamicValue::object()
            .with("id", "tag-1")
            .with("name", "prod")
            .with("account_id", "acc-1");
        let config = DynamicValue::object()
            .with("name", "prod")
            .with("account_id", "acc-2");
        let planned = plan_resource_change(&tag_schema(), &prior, &config);
        assert_eq!(planned.requires_replace, vec![AttributePath::new("account_id")]);
    }

    #[test]
    fn state_prefers_account_relationship() {
        let doc: Document<Tag> = serde_json::from_str(
            r#"{"data":{"id":"tag-1","type":"tags","attributes":{"name":"prod"},
                "relationships":{"account":{"data":{"type":"accounts","id":"acc-9"}}}}}"#,
        )
        .unwrap();
        let state = tag_state(&doc.data, Some("acc-1".to_string()));
        assert_eq!(
            state.get_string(&AttributePath::new("account_id")).unwrap(),
            "acc-9"
        );
    }
}
