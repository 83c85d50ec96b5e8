//! Variable resource implementation
//!
//! Sensitive values are write-only on the API side: once a variable is
//! sensitive the value in state is whatever was last applied.

use async_trait::async_trait;
use chrono::SecondsFormat;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, RequiresReplaceIf, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse, UpgradeResourceStateRequest,
    UpgradeResourceStateResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, PlanModifierRequest, Schema, SchemaBuilder, Validator,
    ValidatorRequest, ValidatorResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringNotWhitespace, StringOneOf};
use tfplug::import_state_passthrough_id;

use crate::api::variables::{Variable, VariableOptions};
use crate::defaults::AccountIdDefault;
use crate::helpers::{api_error, not_configured, reread_after_write, resolve_account_id, Attrs};
use crate::provider_data::ScalrProviderData;

pub const CATEGORY_TERRAFORM: &str = "terraform";
pub const CATEGORY_SHELL: &str = "shell";
pub const CATEGORY_ENV: &str = "env";

/// Warns when `hcl = true` is set on anything but a terraform variable
struct CategoryHclValidator;

impl Validator for CategoryHclValidator {
    fn description(&self) -> String {
        "hcl is only meaningful for terraform variables".to_string()
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if request.value.as_bool() != Some(true) {
            return response;
        }

        let category = request
            .config
            .get_optional_string(&AttributePath::new("category"))
            .ok()
            .flatten();
        if category.as_deref() != Some(CATEGORY_TERRAFORM) {
            response.diagnostics.push(
                Diagnostic::warning(
                    "HCL is not supported for shell variables",
                    "Setting 'hcl' attribute to 'true' for shell variable is now deprecated.",
                )
                .with_attribute(request.path),
            );
        }
        response
    }
}

fn state_is_sensitive(request: &PlanModifierRequest<'_>) -> bool {
    request
        .state
        .get_optional_bool(&AttributePath::new("sensitive"))
        .ok()
        .flatten()
        .unwrap_or(false)
}

pub fn variable_schema() -> Schema {
    SchemaBuilder::new()
        .version(3)
        .description("Manages the state of variables in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("key", AttributeType::String)
                .description("Key of the variable")
                .required()
                .validator(StringNotWhitespace::create())
                .plan_modifier(RequiresReplaceIf::create(
                    state_is_sensitive,
                    "Recreate the resource when changing the `key` value of a sensitive variable.",
                ))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", AttributeType::String)
                .description("Variable value")
                .optional()
                .computed()
                .sensitive()
                .default(StaticDefault::string(""))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("readable_value", AttributeType::String)
                .description("Variable value if the variable is not sensitive, otherwise null")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("category", AttributeType::String)
                .description("Indicates if this is a Terraform or shell variable")
                .required()
                .validator(StringOneOf::create([
                    CATEGORY_ENV,
                    CATEGORY_TERRAFORM,
                    CATEGORY_SHELL,
                ]))
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("hcl", AttributeType::Bool)
                .description("Configure the variable as a string of HCL code")
                .optional()
                .computed()
                .default(StaticDefault::bool(false))
                .validator(Box::new(CategoryHclValidator))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("sensitive", AttributeType::Bool)
                .description("Sensitive variable values are not visible after being set")
                .optional()
                .computed()
                .default(StaticDefault::bool(false))
                .plan_modifier(RequiresReplaceIf::create(
                    |request: &PlanModifierRequest<'_>| {
                        request.state_value.as_bool().unwrap_or(false)
                    },
                    "Recreate the resource when changing the `sensitive` value from `true` to `false`.",
                ))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("description", AttributeType::String)
                .description("Variable verbose description")
                .optional()
                .computed()
                .default(StaticDefault::string(""))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("final", AttributeType::Bool)
                .description("Whether the variable can be overridden on a lower scope")
                .optional()
                .computed()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("force", AttributeType::Bool)
                .description("Allows creating final variables on higher scope, deleting lower ones")
                .optional()
                .computed()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("workspace_id", AttributeType::String)
                .description("The workspace that owns the variable")
                .optional()
                .computed()
                .plan_modifier(RequiresReplace::create())
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environment_id", AttributeType::String)
                .description("The environment that owns the variable")
                .optional()
                .computed()
                .plan_modifier(RequiresReplace::create())
                .plan_modifier(UseStateForUnknown::create())
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
        .attribute(
            AttributeBuilder::new("updated_at", AttributeType::String)
                .description("Date/time the variable was updated")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("updated_by_email", AttributeType::String)
                .description("Email of the user who updated the variable last time")
                .computed()
                .build(),
        )
        .build()
}

#[derive(Debug, Default)]
struct VariableModel {
    id: Option<String>,
    key: String,
    value: Option<String>,
    category: String,
    hcl: bool,
    sensitive: bool,
    description: String,
    is_final: bool,
    force: Option<bool>,
    workspace_id: Option<String>,
    environment_id: Option<String>,
    account_id: Option<String>,
}

impl VariableModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            key: attrs.string("key")?.unwrap_or_default(),
            value: attrs.string("value")?,
            category: attrs.string("category")?.unwrap_or_default(),
            hcl: attrs.bool("hcl")?.unwrap_or(false),
            sensitive: attrs.bool("sensitive")?.unwrap_or(false),
            description: attrs.string("description")?.unwrap_or_default(),
            is_final: attrs.bool("final")?.unwrap_or(false),
            force: attrs.bool("force")?,
            workspace_id: attrs.string("workspace_id")?,
            environment_id: attrs.string("environment_id")?,
            account_id: attrs.string("account_id")?,
        })
    }
}

/// Builds state from the API object. `existing` supplies what the API
/// never returns: the value of a sensitive variable and the `force` flag.
fn variable_state(var: &Variable, existing: Option<&VariableModel>) -> DynamicValue {
    let attrs = &var.attributes;

    let (value, readable_value) = if attrs.sensitive {
        (existing.and_then(|m| m.value.clone()), None)
    } else {
        let value = attrs.value.clone().unwrap_or_default();
        (Some(value.clone()), Some(value))
    };
    let force = existing.and_then(|m| m.force).unwrap_or(false);
    let account_id = var
        .related_id("account")
        .map(str::to_string)
        .or_else(|| existing.and_then(|m| m.account_id.clone()));

    DynamicValue::object()
        .with("id", var.id.as_str())
        .with("key", attrs.key.as_str())
        .with("value", Dynamic::from(value))
        .with("readable_value", Dynamic::from(readable_value))
        .with("category", attrs.category.as_str())
        .with("hcl", attrs.hcl)
        .with("sensitive", attrs.sensitive)
        .with("description", attrs.description.clone().unwrap_or_default())
        .with("final", attrs.is_final)
        .with("force", force)
        .with(
            "workspace_id",
            Dynamic::from(var.related_id("workspace").map(str::to_string)),
        )
        .with(
            "environment_id",
            Dynamic::from(var.related_id("environment").map(str::to_string)),
        )
        .with("account_id", Dynamic::from(account_id))
        .with(
            "updated_at",
            Dynamic::from(
                attrs
                    .updated_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ),
        )
        .with("updated_by_email", Dynamic::from(attrs.updated_by_email.clone()))
}

#[derive(Default)]
pub struct VariableResource {
    provider_data: Option<ScalrProviderData>,
}

impl VariableResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_variable(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let mut plan = VariableModel::from_value(planned)?;
        let account_id = resolve_account_id(plan.account_id.clone(), data)?;

        let options = VariableOptions {
            key: Some(plan.key.clone()),
            value: plan.value.clone(),
            category: Some(plan.category.clone()),
            hcl: Some(plan.hcl),
            sensitive: Some(plan.sensitive),
            is_final: Some(plan.is_final),
            description: Some(plan.description.clone()),
            account_id: Some(account_id.clone()),
            environment_id: plan.environment_id.clone(),
            workspace_id: plan.workspace_id.clone(),
            force: plan.force.unwrap_or(false),
        };
        let var = data
            .client
            .variables()
            .create(ctx, &options)
            .await
            .map_err(|e| api_error("Error creating variable", &e))?;

        tracing::debug!("Created variable {}", var.id);
        plan.account_id = Some(account_id);
        Ok(variable_state(&var, Some(&plan)))
    }

    async fn read_variable(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let state = VariableModel::from_value(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        match data.client.variables().get(ctx, &id).await {
            Ok(var) => Ok(Some(variable_state(&var, Some(&state)))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Variable {} not found, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Error retrieving variable", &e)),
        }
    }

    async fn update_variable(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let state = VariableModel::from_value(prior)?;
        let mut plan = VariableModel::from_value(planned)?;
        let id = state.id.clone().unwrap_or_default();

        let options = VariableOptions {
            key: Some(plan.key.clone()),
            value: (plan.value != state.value).then(|| plan.value.clone()).flatten(),
            hcl: Some(plan.hcl),
            sensitive: Some(plan.sensitive),
            is_final: Some(plan.is_final),
            description: Some(plan.description.clone()),
            force: plan.force.unwrap_or(false),
            ..Default::default()
        };
        let var = data
            .client
            .variables()
            .update(ctx, &id, &options)
            .await
            .map_err(|e| api_error("Error updating variable", &e))?;

        if plan.account_id.is_none() {
            plan.account_id = state.account_id;
        }
        let written = variable_state(&var, Some(&plan));
        let refreshed = self.read_variable(ctx, &written).await?;
        reread_after_write("Error updating variable", &id, refreshed)
    }

    /// Every older schema version is rebuilt from the API object
    async fn upgrade_variable(
        &self,
        ctx: &Context,
        request: &UpgradeResourceStateRequest,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let prior = request.raw_state.decode().map_err(|e| {
            Diagnostic::error("Unable to Read Previously Saved State", e.to_string())
        })?;
        let prior = VariableModel::from_value(&prior)?;
        let id = prior.id.clone().unwrap_or_default();

        let var = data
            .client
            .variables()
            .get(ctx, &id)
            .await
            .map_err(|e| api_error("Error reading variable", &e))?;
        Ok(variable_state(&var, Some(&prior)))
    }
}

#[async_trait]
impl Resource for VariableResource {
    fn type_name(&self) -> &str {
        "scalr_variable"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: variable_schema(),
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
        match self.create_variable(&ctx, &request.planned_state).await {
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
        match self.read_variable(&ctx, &request.current_state).await {
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
            .update_variable(&ctx, &request.prior_state, &request.planned_state)
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
        let id = match VariableModel::from_value(&request.prior_state) {
            Ok(VariableModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data.client.variables().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Variable {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting variable", &e)),
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

    async fn upgrade_state(
        &self,
        ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        match self.upgrade_variable(&ctx, &request).await {
            Ok(upgraded_state) => UpgradeResourceStateResponse {
                upgraded_state,
                diagnostics: vec![],
            },
            Err(diag) => UpgradeResourceStateResponse {
                upgraded_state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }
}
