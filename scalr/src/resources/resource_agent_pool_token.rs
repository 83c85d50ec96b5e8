//! Agent pool access token resource implementation
//!
//! The token secret is only returned when the token is created; reads keep
//! the value already in state.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

use crate::helpers::{api_error, not_configured, reread_after_write, Attrs};
use crate::provider_data::ScalrProviderData;

pub fn agent_pool_token_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the state of agent pool's tokens in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("description", AttributeType::String)
                .description("Description of the token")
                .optional()
                .computed()
                .default(StaticDefault::string(""))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("agent_pool_id", AttributeType::String)
                .description("ID of the agent pool")
                .required()
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("token", AttributeType::String)
                .description("The token of the agent pool")
                .computed()
                .sensitive()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .build()
}

struct AgentPoolTokenModel {
    id: Option<String>,
    description: String,
    agent_pool_id: String,
    token: Option<String>,
}

impl AgentPoolTokenModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            description: attrs.string("description")?.unwrap_or_default(),
            agent_pool_id: attrs.string("agent_pool_id")?.unwrap_or_default(),
            token: attrs.string("token")?,
        })
    }

    fn to_value(&self) -> DynamicValue {
        DynamicValue::object()
            .with("id", Dynamic::from(self.id.clone()))
            .with("description", self.description.as_str())
            .with("agent_pool_id", self.agent_pool_id.as_str())
            .with("token", Dynamic::from(self.token.clone()))
    }
}

#[derive(Default)]
pub struct AgentPoolTokenResource {
    provider_data: Option<ScalrProviderData>,
}

impl AgentPoolTokenResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_token(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let mut plan = AgentPoolTokenModel::from_value(planned)?;

        let token = data
            .client
            .agent_pools()
            .create_token(ctx, &plan.agent_pool_id, &plan.description)
            .await
            .map_err(|e| api_error("Error creating agent_pool_token", &e))?;

        plan.id = Some(token.id);
        plan.description = token.attributes.description.unwrap_or_default();
        plan.token = token.attributes.token;
        Ok(plan.to_value())
    }

    /// Looks the token up in the pool's token list; a token missing from the
    /// list, or a missing pool, drops the instance
    async fn read_token(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let mut state = AgentPoolTokenModel::from_value(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        let tokens = match data
            .client
            .agent_pools()
            .list_tokens(ctx, &state.agent_pool_id)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Agent pool {} not found, removing token {} from state",
                    state.agent_pool_id,
                    id
                );
                return Ok(None);
            }
            Err(e) => return Err(api_error("Error retrieving agent_pool_token", &e)),
        };

        match tokens.into_iter().find(|t| t.id == id) {
            Some(token) => {
                state.description = token.attributes.description.unwrap_or_default();
                Ok(Some(state.to_value()))
            }
            None => {
                tracing::warn!("Agent pool token {} not found, removing from state", id);
                Ok(None)
            }
        }
    }

    async fn update_token(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let state = AgentPoolTokenModel::from_value(prior)?;
        let mut plan = AgentPoolTokenModel::from_value(planned)?;
        let id = state.id.clone().unwrap_or_default();

        let token = data
            .client
            .agent_pools()
            .update_token(ctx, &id, &plan.description)
            .await
            .map_err(|e| api_error("Error updating agent_pool_token", &e))?;

        plan.id = Some(id.clone());
        plan.description = token.attributes.description.unwrap_or_default();
        plan.token = state.token;
        let refreshed = self.read_token(ctx, &plan.to_value()).await?;
        reread_after_write("Error updating agent_pool_token", &id, refreshed)
    }
}

#[async_trait]
impl Resource for AgentPoolTokenResource {
    fn type_name(&self) -> &str {
        "scalr_agent_pool_token"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: agent_pool_token_schema(),
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
        match self.create_token(&ctx, &request.planned_state).await {
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
        match self.read_token(&ctx, &request.current_state).await {
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
            .update_token(&ctx, &request.prior_state, &request.planned_state)
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
        let id = match AgentPoolTokenModel::from_value(&request.prior_state) {
            Ok(AgentPoolTokenModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data.client.agent_pools().delete_token(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Agent pool token {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting agent_pool_token", &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tfplug::planning::plan_resource_change;
    use tfplug::AttributePath;

    #[test]
    fn token_is_kept_from_state_on_plan() {
        let prior = DynamicValue::object()
            .with("id", "at-1")
            .with("description", "old")
            .with("agent_pool_id", "apool-1")
            .with("token", "secret");
        let config = DynamicValue::object()
            .with("description", "new")
            .with("agent_pool_id", "apool-1");

        let planned = plan_resource_change(&agent_pool_token_schema(), &prior, &config);
        assert!(planned.requires_replace.is_empty());
        assert_eq!(
            planned
                .planned_state
                .get_string(&AttributePath::new("token"))
                .unwrap(),
            "secret"
        );
    }

    #[test]
    fn moving_to_another_pool_requires_replace() {
        let prior = DynamicValue::object()
            .with("id", "at-1")
            .with("description", "")
            .with("agent_pool_id", "apool-1")
            .with("token", "secret");
        let config = DynamicValue::object().with("agent_pool_id", "apool-2");

        let planned = plan_resource_change(&agent_pool_token_schema(), &prior, &config);
        assert_eq!(
            planned.requires_replace,
            vec![AttributePath::new("agent_pool_id")]
        );
    }
}
