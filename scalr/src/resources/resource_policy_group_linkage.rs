//! Policy group linkage resource implementation
//!
//! Links a policy group to an environment. The instance id is
//! `<policy_group_id>/<environment_id>`; the link itself is read back from
//! the environment's `policy-groups` relationship.

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

use crate::helpers::{api_error, not_configured, pack_id, unpack_id, Attrs};
use crate::provider_data::ScalrProviderData;

pub fn policy_group_linkage_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages policy group environments linkage")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("policy_group_id", AttributeType::String)
                .description("ID of the policy group")
                .required()
                .validator(StringNotWhitespace::create())
                .plan_modifier(RequiresReplace::create())
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
        .build()
}

fn linkage_state(policy_group_id: &str, environment_id: &str) -> DynamicValue {
    DynamicValue::object()
        .with("id", pack_id(policy_group_id, environment_id))
        .with("policy_group_id", policy_group_id)
        .with("environment_id", environment_id)
}

fn invalid_id(id: &str) -> Diagnostic {
    Diagnostic::error(
        "Error importing policy group linkage",
        format!(
            "invalid policy group linkage ID format: {} (expected <policy_group_id>/<environment_id>)",
            id
        ),
    )
}

struct LinkageModel {
    policy_group_id: String,
    environment_id: String,
}

impl LinkageModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        let mut model = Self {
            policy_group_id: attrs.string("policy_group_id")?.unwrap_or_default(),
            environment_id: attrs.string("environment_id")?.unwrap_or_default(),
        };
        // Imported state only carries the id
        if model.policy_group_id.is_empty() || model.environment_id.is_empty() {
            if let Some(id) = attrs.string("id")? {
                let (pg, env) = unpack_id(&id).ok_or_else(|| invalid_id(&id))?;
                model.policy_group_id = pg;
                model.environment_id = env;
            }
        }
        Ok(model)
    }
}

#[derive(Default)]
pub struct PolicyGroupLinkageResource {
    provider_data: Option<ScalrProviderData>,
}

impl PolicyGroupLinkageResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    /// Whether the environment still lists the policy group. A missing
    /// environment counts as unlinked.
    async fn is_linked(
        &self,
        ctx: &Context,
        policy_group_id: &str,
        environment_id: &str,
    ) -> Result<bool, Diagnostic> {
        let data = self.data()?;
        match data.client.environments().get(ctx, environment_id).await {
            Ok(env) => Ok(env
                .related_ids("policy-groups")
                .iter()
                .any(|id| id == policy_group_id)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(api_error("Error retrieving policy group linkage", &e)),
        }
    }

    async fn create_linkage(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let plan = LinkageModel::from_value(planned)?;

        data.client
            .policy_groups()
            .link_environment(ctx, &plan.policy_group_id, &plan.environment_id)
            .await
            .map_err(|e| api_error("Error creating policy group linkage", &e))?;

        tracing::debug!(
            "Linked policy group {} to environment {}",
            plan.policy_group_id,
            plan.environment_id
        );
        Ok(linkage_state(&plan.policy_group_id, &plan.environment_id))
    }

    async fn read_linkage(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let state = LinkageModel::from_value(current)?;
        if self
            .is_linked(ctx, &state.policy_group_id, &state.environment_id)
            .await?
        {
            Ok(Some(linkage_state(
                &state.policy_group_id,
                &state.environment_id,
            )))
        } else {
            tracing::warn!(
                "Policy group {} is no longer linked to environment {}, removing from state",
                state.policy_group_id,
                state.environment_id
            );
            Ok(None)
        }
    }

    async fn import_linkage(&self, ctx: &Context, id: &str) -> Result<DynamicValue, Diagnostic> {
        let (policy_group_id, environment_id) = unpack_id(id).ok_or_else(|| invalid_id(id))?;
        if !self.is_linked(ctx, &policy_group_id, &environment_id).await? {
            return Err(Diagnostic::error(
                "Error importing policy group linkage",
                format!("policy group linkage {} not found", id),
            ));
        }
        Ok(linkage_state(&policy_group_id, &environment_id))
    }
}

#[async_trait]
impl Resource for PolicyGroupLinkageResource {
    fn type_name(&self) -> &str {
        "scalr_policy_group_linkage"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: policy_group_linkage_schema(),
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
        match self.create_linkage(&ctx, &request.planned_state).await {
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
        match self.read_linkage(&ctx, &request.current_state).await {
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

    /// Every attribute forces replacement, so there is nothing to send
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
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
        let state = match LinkageModel::from_value(&request.prior_state) {
            Ok(state) => state,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data
            .client
            .policy_groups()
            .unlink_environment(&ctx, &state.policy_group_id, &state.environment_id)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "Policy group {} already unlinked from environment {}",
                    state.policy_group_id,
                    state.environment_id
                );
            }
            Err(e) => diagnostics.push(api_error("Error deleting policy group linkage", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        match self.import_linkage(&ctx, &request.id).await {
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
