//! Provider configuration default resource implementation
//!
//! Adds one provider configuration to an environment's default list. The
//! list is rewritten as a whole on every change, so create and delete run
//! under the provider-wide lock.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::StringNotWhitespace;

use crate::api::environments::Environment;
use crate::helpers::{api_error, not_configured, pack_id, unpack_id, Attrs};
use crate::provider_data::ScalrProviderData;

const DEFAULTS_RELATIONSHIP: &str = "default-provider-configurations";

pub fn provider_configuration_default_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the default provider configurations of an environment")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environment_id", AttributeType::String)
                .description("ID of the environment")
                .required()
                .validator(StringNotWhitespace::create())
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("provider_configuration_id", AttributeType::String)
                .description("ID of the provider configuration")
                .required()
                .validator(StringNotWhitespace::create())
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .build()
}

fn default_state(environment_id: &str, provider_configuration_id: &str) -> DynamicValue {
    DynamicValue::object()
        .with("id", pack_id(environment_id, provider_configuration_id))
        .with("environment_id", environment_id)
        .with("provider_configuration_id", provider_configuration_id)
}

fn parse_id(id: &str) -> Result<(String, String), Diagnostic> {
    unpack_id(id).ok_or_else(|| {
        Diagnostic::error(
            "Error importing provider configuration default",
            format!(
                "invalid ID \"{}\": expected {{environment_id}}/{{provider_configuration_id}}",
                id
            ),
        )
    })
}

struct DefaultModel {
    environment_id: String,
    provider_configuration_id: String,
}

impl DefaultModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        let mut model = Self {
            environment_id: attrs.string("environment_id")?.unwrap_or_default(),
            provider_configuration_id: attrs
                .string("provider_configuration_id")?
                .unwrap_or_default(),
        };
        if model.environment_id.is_empty() || model.provider_configuration_id.is_empty() {
            if let Some(id) = attrs.string("id")? {
                let (env, pcfg) = parse_id(&id)?;
                model.environment_id = env;
                model.provider_configuration_id = pcfg;
            }
        }
        Ok(model)
    }
}

fn is_default(env: &Environment, provider_configuration_id: &str) -> bool {
    env.related_ids(DEFAULTS_RELATIONSHIP)
        .iter()
        .any(|id| id == provider_configuration_id)
}

#[derive(Default)]
pub struct ProviderConfigurationDefaultResource {
    provider_data: Option<ScalrProviderData>,
}

impl ProviderConfigurationDefaultResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn find_environment(
        &self,
        ctx: &Context,
        environment_id: &str,
    ) -> Result<Option<Environment>, Diagnostic> {
        let data = self.data()?;
        match data.client.environments().get(ctx, environment_id).await {
            Ok(env) => Ok(Some(env)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(api_error("error retrieving environment", &e)),
        }
    }

    async fn create_default(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let plan = DefaultModel::from_value(planned)?;
        let _guard = data.default_pcfg_lock.lock().await;

        let env = self
            .find_environment(ctx, &plan.environment_id)
            .await?
            .ok_or_else(|| {
                Diagnostic::error(
                    "error retrieving environment",
                    format!("Environment \"{}\" not found", plan.environment_id),
                )
            })?;

        match data
            .client
            .provider_configurations()
            .get(ctx, &plan.provider_configuration_id)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(Diagnostic::error(
                    "error retrieving provider configuration",
                    format!(
                        "Provider configuration \"{}\" not found",
                        plan.provider_configuration_id
                    ),
                ));
            }
            Err(e) => return Err(api_error("error retrieving provider configuration", &e)),
        }

        if is_default(&env, &plan.provider_configuration_id) {
            return Err(Diagnostic::error(
                "Error creating provider configuration default",
                format!(
                    "Provider configuration is already set as default for environment \"{}\"",
                    plan.environment_id
                ),
            ));
        }

        let mut defaults = env.related_ids(DEFAULTS_RELATIONSHIP);
        defaults.push(plan.provider_configuration_id.clone());
        data.client
            .environments()
            .set_default_provider_configurations(ctx, &plan.environment_id, &defaults)
            .await
            .map_err(|e| api_error("Error updating environment", &e))?;

        Ok(default_state(
            &plan.environment_id,
            &plan.provider_configuration_id,
        ))
    }

    async fn read_default(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let state = DefaultModel::from_value(current)?;
        match self.find_environment(ctx, &state.environment_id).await? {
            Some(env) if is_default(&env, &state.provider_configuration_id) => Ok(Some(
                default_state(&state.environment_id, &state.provider_configuration_id),
            )),
            _ => {
                tracing::warn!(
                    "Provider configuration {} is not a default of environment {}, removing from state",
                    state.provider_configuration_id,
                    state.environment_id
                );
                Ok(None)
            }
        }
    }

    async fn delete_default(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = self.data()?;
        let state = DefaultModel::from_value(prior)?;
        let _guard = data.default_pcfg_lock.lock().await;

        let Some(env) = self.find_environment(ctx, &state.environment_id).await? else {
            return Ok(());
        };
        let defaults = env.related_ids(DEFAULTS_RELATIONSHIP);
        if !defaults.contains(&state.provider_configuration_id) {
            return Ok(());
        }

        let remaining: Vec<String> = defaults
            .into_iter()
            .filter(|id| *id != state.provider_configuration_id)
            .collect();
        match data
            .client
            .environments()
            .set_default_provider_configurations(ctx, &state.environment_id, &remaining)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(api_error("Error updating environment", &e)),
        }
    }

    async fn import_default(&self, ctx: &Context, id: &str) -> Result<DynamicValue, Diagnostic> {
        let (environment_id, provider_configuration_id) = parse_id(id)?;
        match self.find_environment(ctx, &environment_id).await? {
            Some(env) if is_default(&env, &provider_configuration_id) => {
                Ok(default_state(&environment_id, &provider_configuration_id))
            }
            _ => Err(Diagnostic::error(
                "Error importing provider configuration default",
                format!("provider configuration default {} not found", id),
            )),
        }
    }
}

#[async_trait]
impl Resource for ProviderConfigurationDefaultResource {
    fn type_name(&self) -> &str {
        "scalr_provider_configuration_default"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: provider_configuration_default_schema(),
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
        match self.create_default(&ctx, &request.planned_state).await {
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
        match self.read_default(&ctx, &request.current_state).await {
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

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let diagnostics = match self.delete_default(&ctx, &request.prior_state).await {
            Ok(()) => vec![],
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match self.import_default(&ctx, &request.id).await {
            Ok(state) => ImportResourceStateResponse {
                imported_resources: vec![ImportedResource {
                    type_name: request.type_name,
                    state,
                }],
                diagnostics: vec![],
            },
            Err(diag) => ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![diag],
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::common::Document;

    #[test]
    fn bad_ids_name_the_expected_shape() {
        let diag = parse_id("env-1").err().unwrap();
        assert_eq!(
            diag.detail,
            "invalid ID \"env-1\": expected {environment_id}/{provider_configuration_id}"
        );
        assert_eq!(
            parse_id("env-1/pcfg-1").unwrap(),
            ("env-1".to_string(), "pcfg-1".to_string())
        );
    }

    #[test]
    fn default_membership_reads_the_relationship() {
        let doc: Document<Environment> = serde_json::from_str(
            r#"{"data":{"id":"env-1","type":"environments","attributes":{"name":"prod"},
                "relationships":{"default-provider-configurations":{"data":[
                    {"type":"provider-configurations","id":"pcfg-1"}]}}}}"#,
        )
        .unwrap();
        assert!(is_default(&doc.data, "pcfg-1"));
        assert!(!is_default(&doc.data, "pcfg-2"));
    }
}
