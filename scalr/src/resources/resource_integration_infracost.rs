//! Infracost integration resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NoWildcardWithIds, StringNotWhitespace};
use tfplug::import_state_passthrough_id;

use crate::api::infracost::{InfracostIntegration, InfracostOptions};
use crate::helpers::{api_error, not_configured, reread_after_write, Attrs, SharedScope};
use crate::provider_data::ScalrProviderData;

pub fn infracost_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the state of Infracost integrations in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the Infracost integration")
                .required()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("api_key", AttributeType::String)
                .description("API key for the Infracost integration")
                .required()
                .sensitive()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environments", AttributeType::string_set())
                .description(
                    "List of environments this integration is linked to. Use `[\"*\"]` to allow in all environments.",
                )
                .optional()
                .computed()
                .validator(NoWildcardWithIds::create())
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("status", AttributeType::String)
                .description("Status of the integration")
                .computed()
                .build(),
        )
        .build()
}

struct InfracostModel {
    id: Option<String>,
    name: String,
    api_key: Option<String>,
    environments: Option<Vec<String>>,
}

impl InfracostModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            name: attrs.string("name")?.unwrap_or_default(),
            api_key: attrs.string("api_key")?,
            environments: attrs.strings("environments")?,
        })
    }

    fn scope(&self) -> Result<SharedScope, Diagnostic> {
        SharedScope::from_ids(self.environments.as_deref().unwrap_or_default()).map_err(|e| {
            Diagnostic::error("Invalid environments", e)
                .with_attribute(AttributePath::new("environments"))
        })
    }
}

/// `api_key` is never returned by the API and comes from the caller
fn infracost_state(integration: &InfracostIntegration, api_key: Option<String>) -> DynamicValue {
    let scope = SharedScope::from_api(
        integration.attributes.is_shared,
        integration.related_ids("environments"),
    );

    DynamicValue::object()
        .with("id", integration.id.as_str())
        .with("name", integration.attributes.name.as_str())
        .with("api_key", Dynamic::from(api_key))
        .with("environments", Dynamic::string_set(scope.to_state()))
        .with("status", Dynamic::from(integration.attributes.status.clone()))
}

/// The integration is saved even when Infracost rejects the key; the API
/// reports that through `err-message`
fn issues(integration: &InfracostIntegration) -> Vec<Diagnostic> {
    match integration.attributes.err_message.as_deref() {
        Some(message) if !message.is_empty() => {
            tracing::warn!("Infracost integration {} reported: {}", integration.id, message);
            vec![Diagnostic::warning("Issues detected", message)]
        }
        _ => vec![],
    }
}

#[derive(Default)]
pub struct InfracostResource {
    provider_data: Option<ScalrProviderData>,
}

impl InfracostResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_integration(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let data = self.data()?;
        let plan = InfracostModel::from_value(planned)?;

        let mut options = InfracostOptions {
            name: Some(plan.name.clone()),
            api_key: plan.api_key.clone(),
            is_shared: Some(false),
            environments: None,
        };
        if plan.environments.is_some() {
            let scope = plan.scope()?;
            options.is_shared = Some(scope.is_shared());
            options.environments = Some(scope.ids());
        }

        let integration = data
            .client
            .infracost()
            .create(ctx, &options)
            .await
            .map_err(|e| api_error("Error creating Infracost integration", &e))?;

        tracing::debug!("Created Infracost integration {}", integration.id);
        Ok((
            infracost_state(&integration, plan.api_key),
            issues(&integration),
        ))
    }

    async fn read_integration(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let state = InfracostModel::from_value(current)?;
        let Some(id) = state.id else {
            return Ok(None);
        };

        match data.client.infracost().get(ctx, &id).await {
            Ok(integration) => Ok(Some(infracost_state(&integration, state.api_key))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Infracost integration {} not found, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Error retrieving Infracost integration", &e)),
        }
    }

    async fn update_integration(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let data = self.data()?;
        let state = InfracostModel::from_value(prior)?;
        let plan = InfracostModel::from_value(planned)?;
        let id = state.id.clone().unwrap_or_default();

        // Unknown environments keep the ones already linked
        let scope = if plan.environments.is_some() {
            plan.scope()?
        } else {
            state.scope()?
        };
        let options = InfracostOptions {
            name: (plan.name != state.name).then(|| plan.name.clone()),
            api_key: (plan.api_key != state.api_key)
                .then(|| plan.api_key.clone())
                .flatten(),
            is_shared: Some(scope.is_shared()),
            environments: Some(scope.ids()),
        };

        let integration = data
            .client
            .infracost()
            .update(ctx, &id, &options)
            .await
            .map_err(|e| api_error("Error updating Infracost integration", &e))?;

        let written = infracost_state(&integration, plan.api_key);
        let refreshed = self.read_integration(ctx, &written).await?;
        Ok((
            reread_after_write("Error updating Infracost integration", &id, refreshed)?,
            issues(&integration),
        ))
    }
}

#[async_trait]
impl Resource for InfracostResource {
    fn type_name(&self) -> &str {
        "scalr_integration_infracost"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: infracost_schema(),
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
        match self.create_integration(&ctx, &request.planned_state).await {
            Ok((new_state, diagnostics)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_integration(&ctx, &request.current_state).await {
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
            .update_integration(&ctx, &request.prior_state, &request.planned_state)
            .await
        {
            Ok((new_state, diagnostics)) => UpdateResourceResponse {
                new_state,
                diagnostics,
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
        let id = match InfracostModel::from_value(&request.prior_state) {
            Ok(InfracostModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data.client.infracost().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Infracost integration {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting Infracost integration", &e)),
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
    use tfplug::types::DiagnosticSeverity;

    fn integration(json: &str) -> InfracostIntegration {
        let doc: Document<InfracostIntegration> = serde_json::from_str(json).unwrap();
        doc.data
    }

    #[test]
    fn shared_integration_is_written_as_wildcard() {
        let integration = integration(
            r#"{"data":{"id":"ic-1","type":"infracost-integrations",
                "attributes":{"name":"costs","is-shared":true,"status":"active"}}}"#,
        );
        let state = infracost_state(&integration, Some("key".to_string()));
        assert_eq!(
            state.get_list(&AttributePath::new("environments")).unwrap(),
            vec![Dynamic::String("*".to_string())]
        );
        assert_eq!(state.get_string(&AttributePath::new("api_key")).unwrap(), "key");
    }

    #[test]
    fn err_message_becomes_a_warning() {
        let integration = integration(
            r#"{"data":{"id":"ic-1","type":"infracost-integrations",
                "attributes":{"name":"costs","err-message":"invalid api key"}}}"#,
        );
        let diags = issues(&integration);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Warning);
        assert_eq!(diags[0].summary, "Issues detected");
        assert_eq!(diags[0].detail, "invalid api key");
    }
}
