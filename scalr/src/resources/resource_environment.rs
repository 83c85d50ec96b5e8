//! Environment resource implementation

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::validator::{NoWildcardWithIds, StringNotWhitespace};
use tfplug::import_state_passthrough_id;

use crate::api::environments::{Environment, EnvironmentOptions};
use crate::api::Client;
use crate::defaults::AccountIdDefault;
use crate::helpers::{
    api_error, diff, not_configured, resolve_account_id, sets_equal, Attrs, SharedScope,
};
use crate::provider_data::ScalrProviderData;

pub(crate) fn user_type() -> AttributeType {
    AttributeType::Object(HashMap::from([
        ("username".to_string(), AttributeType::String),
        ("email".to_string(), AttributeType::String),
        ("full_name".to_string(), AttributeType::String),
    ]))
}

pub fn environment_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the state of environments in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The ID of this resource")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the environment")
                .required()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("status", AttributeType::String)
                .description("The status of the environment")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("created_by", AttributeType::List(Box::new(user_type())))
                .description("Details of the user that created the environment")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("policy_groups", AttributeType::List(Box::new(AttributeType::String)))
                .description("List of the environment policy-groups IDs")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("default_provider_configurations", AttributeType::string_set())
                .description("IDs of provider configurations used in the environment workspaces by default")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("tag_ids", AttributeType::string_set())
                .description("List of tag IDs associated with the environment")
                .optional()
                .computed()
                .default(StaticDefault::list(vec![]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("remote_backend", AttributeType::Bool)
                .description("If Scalr exports the remote backend configuration and state storage")
                .optional()
                .computed()
                .plan_modifier(RequiresReplace::create())
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("remote_backend_overridable", AttributeType::Bool)
                .description("Whether the remote backend can be overridden on the workspace level")
                .optional()
                .computed()
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("mask_sensitive_output", AttributeType::Bool)
                .description("Enable masking of the sensitive console output")
                .optional()
                .computed()
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("federated_environments", AttributeType::string_set())
                .description("Environments allowed to access this one. Use [\"*\"] to share with all environments")
                .optional()
                .computed()
                .deprecated()
                .validator(NoWildcardWithIds::create())
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
            AttributeBuilder::new("storage_profile_id", AttributeType::String)
                .description("The storage profile for this environment")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("default_workspace_agent_pool_id", AttributeType::String)
                .description("Default agent pool for workspaces of the environment")
                .optional()
                .build(),
        )
        .build()
}

#[derive(Debug, Default)]
struct EnvironmentModel {
    id: Option<String>,
    name: String,
    account_id: Option<String>,
    default_provider_configurations: Option<Vec<String>>,
    tag_ids: Option<Vec<String>>,
    remote_backend: Option<bool>,
    remote_backend_overridable: Option<bool>,
    mask_sensitive_output: Option<bool>,
    federated_environments: Option<Vec<String>>,
    storage_profile_id: Option<String>,
    default_workspace_agent_pool_id: Option<String>,
}

impl EnvironmentModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            name: attrs.string("name")?.unwrap_or_default(),
            account_id: attrs.string("account_id")?,
            default_provider_configurations: attrs.strings("default_provider_configurations")?,
            tag_ids: attrs.strings("tag_ids")?,
            remote_backend: attrs.bool("remote_backend")?,
            remote_backend_overridable: attrs.bool("remote_backend_overridable")?,
            mask_sensitive_output: attrs.bool("mask_sensitive_output")?,
            federated_environments: attrs.strings("federated_environments")?,
            storage_profile_id: attrs.string("storage_profile_id")?,
            default_workspace_agent_pool_id: attrs.string("default_workspace_agent_pool_id")?,
        })
    }
}

fn federated_scope(ids: &[String]) -> Result<SharedScope, Diagnostic> {
    SharedScope::from_ids(ids).map_err(|msg| {
        Diagnostic::error("Invalid Attribute Combination", msg)
            .with_attribute(AttributePath::new("federated_environments"))
    })
}

fn environment_state(env: &Environment, federated: Vec<String>) -> DynamicValue {
    let attrs = &env.attributes;

    let created_by = match &attrs.created_by {
        Some(user) => Dynamic::List(vec![Dynamic::Map(HashMap::from([
            ("username".to_string(), Dynamic::String(user.username.clone())),
            ("email".to_string(), Dynamic::String(user.email.clone())),
            ("full_name".to_string(), Dynamic::String(user.full_name.clone())),
        ]))]),
        None => Dynamic::Null,
    };

    let mut policy_groups = env.related_ids("policy-groups");
    policy_groups.sort();

    let federated = SharedScope::from_api(attrs.is_federated_to_account, federated);

    DynamicValue::object()
        .with("id", env.id.as_str())
        .with("name", attrs.name.as_str())
        .with("status", Dynamic::from(attrs.status.clone()))
        .with("created_by", created_by)
        .with("policy_groups", Dynamic::string_list(policy_groups))
        .with(
            "default_provider_configurations",
            Dynamic::string_set(env.related_ids("default-provider-configurations")),
        )
        .with("tag_ids", Dynamic::string_set(env.related_ids("tags")))
        .with("remote_backend", attrs.remote_backend)
        .with("remote_backend_overridable", attrs.remote_backend_overridable)
        .with("mask_sensitive_output", attrs.mask_sensitive_output)
        .with("federated_environments", Dynamic::string_set(federated.to_state()))
        .with(
            "account_id",
            Dynamic::from(env.related_id("account").map(str::to_string)),
        )
        .with(
            "storage_profile_id",
            Dynamic::from(env.related_id("storage-profile").map(str::to_string)),
        )
        .with(
            "default_workspace_agent_pool_id",
            Dynamic::from(
                env.related_id("default-workspace-agent-pool")
                    .map(str::to_string),
            ),
        )
}

/// Reads the environment together with its federated environments list.
/// `None` when the environment is gone.
async fn fetch_environment(
    client: &Client,
    ctx: &Context,
    id: &str,
) -> Result<Option<DynamicValue>, Diagnostic> {
    let env = match client.environments().get(ctx, id).await {
        Ok(env) => env,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(api_error("Error retrieving environment", &e)),
    };

    environment_value(client, ctx, &env).await.map(Some)
}

/// State for an environment already fetched, completed with its federated
/// environments
pub(crate) async fn environment_value(
    client: &Client,
    ctx: &Context,
    env: &Environment,
) -> Result<DynamicValue, Diagnostic> {
    let federated = if env.attributes.is_federated_to_account {
        vec![]
    } else {
        client
            .environments()
            .list_federated(ctx, &env.id)
            .await
            .map_err(|e| api_error("Error retrieving federated environments", &e))?
    };

    Ok(environment_state(env, federated))
}

/// Re-read after a write, where a missing environment is an error
async fn refresh_environment(
    client: &Client,
    ctx: &Context,
    id: &str,
) -> Result<DynamicValue, Diagnostic> {
    fetch_environment(client, ctx, id).await?.ok_or_else(|| {
        Diagnostic::error(
            "Error retrieving environment",
            format!("Environment {} not found", id),
        )
    })
}

#[derive(Default)]
pub struct EnvironmentResource {
    provider_data: Option<ScalrProviderData>,
}

impl EnvironmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_environment(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<(DynamicValue, Vec<Diagnostic>), Diagnostic> {
        let data = self.data()?;
        let plan = EnvironmentModel::from_value(planned)?;
        let account_id = resolve_account_id(plan.account_id.clone(), data)?;

        let mut options = EnvironmentOptions {
            name: Some(plan.name.clone()),
            account_id: Some(account_id.clone()),
            remote_backend: plan.remote_backend,
            remote_backend_overridable: plan.remote_backend_overridable,
            mask_sensitive_output: plan.mask_sensitive_output,
            default_provider_configurations: plan.default_provider_configurations.clone(),
            tags: plan.tag_ids.clone(),
            storage_profile_id: plan.storage_profile_id.clone().map(Some),
            default_workspace_agent_pool_id: plan.default_workspace_agent_pool_id.clone().map(Some),
            ..Default::default()
        };

        let mut federated = vec![];
        if let Some(ids) = &plan.federated_environments {
            let scope = federated_scope(ids)?;
            options.is_federated_to_account = Some(scope.is_shared());
            federated = scope.ids();
        }

        tracing::debug!("Create environment {} for account {}", plan.name, account_id);
        let env = data
            .client
            .environments()
            .create(ctx, &options)
            .await
            .map_err(|e| api_error("Error creating environment", &e))?;

        // Failures past this point keep the created environment in state
        let mut diagnostics = vec![];
        if !federated.is_empty() {
            if let Err(e) = data
                .client
                .environments()
                .add_federated(ctx, &env.id, &federated)
                .await
            {
                diagnostics.push(api_error("Error adding federated environments", &e));
            }
        }

        let state = refresh_environment(&data.client, ctx, &env.id).await?;
        Ok((state, diagnostics))
    }

    async fn read_environment(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let state = EnvironmentModel::from_value(current)?;
        let Some(id) = state.id else {
            return Ok(None);
        };

        let state = fetch_environment(&data.client, ctx, &id).await?;
        if state.is_none() {
            tracing::warn!("Environment {} not found, removing from state", id);
        }
        Ok(state)
    }

    async fn update_environment(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let state = EnvironmentModel::from_value(prior)?;
        let plan = EnvironmentModel::from_value(planned)?;
        let id = state.id.clone().unwrap_or_default();
        let environments = data.client.environments();

        let mut options = EnvironmentOptions::default();
        if plan.name != state.name {
            options.name = Some(plan.name.clone());
        }
        if plan.mask_sensitive_output != state.mask_sensitive_output {
            options.mask_sensitive_output = plan.mask_sensitive_output;
        }
        if plan.remote_backend_overridable != state.remote_backend_overridable {
            options.remote_backend_overridable = plan.remote_backend_overridable;
        }
        options.default_provider_configurations = plan.default_provider_configurations.clone();

        if plan.storage_profile_id != state.storage_profile_id {
            options.storage_profile_id = Some(plan.storage_profile_id.clone());
        }
        if plan.default_workspace_agent_pool_id != state.default_workspace_agent_pool_id {
            options.default_workspace_agent_pool_id =
                Some(plan.default_workspace_agent_pool_id.clone());
        }

        let (mut federated_to_add, mut federated_to_remove) = (vec![], vec![]);
        if let Some(plan_federated) = &plan.federated_environments {
            let state_federated = state.federated_environments.clone().unwrap_or_default();
            if !sets_equal(plan_federated, &state_federated) {
                let plan_scope = federated_scope(plan_federated)?;
                let state_scope = SharedScope::from_ids(&state_federated)
                    .unwrap_or(SharedScope::Only(vec![]));
                options.is_federated_to_account = Some(plan_scope.is_shared());
                (federated_to_add, federated_to_remove) =
                    diff(&state_scope.ids(), &plan_scope.ids());
            }
        }

        tracing::debug!("Update environment {}", id);
        environments
            .update(ctx, &id, &options)
            .await
            .map_err(|e| api_error("Error updating environment", &e))?;

        if let Some(plan_tags) = &plan.tag_ids {
            let state_tags = state.tag_ids.clone().unwrap_or_default();
            let (tags_to_add, tags_to_remove) = diff(&state_tags, plan_tags);
            if !tags_to_add.is_empty() {
                environments
                    .add_tags(ctx, &id, &tags_to_add)
                    .await
                    .map_err(|e| api_error("Error adding tags to environment", &e))?;
            }
            if !tags_to_remove.is_empty() {
                environments
                    .remove_tags(ctx, &id, &tags_to_remove)
                    .await
                    .map_err(|e| api_error("Error removing tags from environment", &e))?;
            }
        }

        if !federated_to_add.is_empty() {
            environments
                .add_federated(ctx, &id, &federated_to_add)
                .await
                .map_err(|e| api_error("Error adding federated environments", &e))?;
        }
        if !federated_to_remove.is_empty() {
            environments
                .remove_federated(ctx, &id, &federated_to_remove)
                .await
                .map_err(|e| api_error("Error removing federated environments", &e))?;
        }

        refresh_environment(&data.client, ctx, &id).await
    }
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn type_name(&self) -> &str {
        "scalr_environment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: environment_schema(),
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
        match self.create_environment(&ctx, &request.planned_state).await {
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
        match self.read_environment(&ctx, &request.current_state).await {
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
            .update_environment(&ctx, &request.prior_state, &request.planned_state)
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
        let id = match EnvironmentModel::from_value(&request.prior_state) {
            Ok(EnvironmentModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        tracing::debug!("Delete environment {}", id);
        match data.client.environments().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Environment {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting environment", &e)),
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
