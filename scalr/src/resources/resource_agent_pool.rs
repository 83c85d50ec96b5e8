//! Agent pool resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NoWildcardWithIds, StringNotWhitespace};
use tfplug::import_state_passthrough_id;

use crate::api::agent_pools::{AgentPool, AgentPoolOptions};
use crate::defaults::AccountIdDefault;
use crate::helpers::{
    api_error, not_configured, reread_after_write, Attrs, SharedScope, WILDCARD,
};
use crate::provider_data::ScalrProviderData;

pub fn agent_pool_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages the state of agent pools in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the agent pool")
                .required()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("account_id", AttributeType::String)
                .description("ID of the account")
                .optional()
                .computed()
                .default(AccountIdDefault::optional())
                .plan_modifier(RequiresReplace::create())
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environment_id", AttributeType::String)
                .description("ID of the environment, for environment-scoped pools")
                .optional()
                .deprecated()
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("vcs_enabled", AttributeType::Bool)
                .description("Indicates whether the VCS support is enabled for agents in the pool")
                .optional()
                .computed()
                .default(StaticDefault::bool(false))
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environments", AttributeType::string_set())
                .description("Environments the pool is shared to. Use [\"*\"] to share with all environments")
                .optional()
                .computed()
                .default(StaticDefault::list(vec![Dynamic::String(WILDCARD.to_string())]))
                .validator(NoWildcardWithIds::create())
                .build(),
        )
        .build()
}

struct AgentPoolModel {
    id: Option<String>,
    name: String,
    account_id: Option<String>,
    environment_id: Option<String>,
    vcs_enabled: Option<bool>,
    environments: Option<Vec<String>>,
}

impl AgentPoolModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            name: attrs.string("name")?.unwrap_or_default(),
            account_id: attrs.string("account_id")?,
            environment_id: attrs.string("environment_id")?,
            vcs_enabled: attrs.bool("vcs_enabled")?,
            environments: attrs.strings("environments")?,
        })
    }

    /// Sharing fields for a create or update call. An environment-scoped
    /// pool only carries the shared flag and never an environments linkage.
    fn sharing(&self, options: &mut AgentPoolOptions) -> Result<(), Diagnostic> {
        let scope = match &self.environments {
            Some(ids) => SharedScope::from_ids(ids).map_err(|msg| {
                Diagnostic::error("Invalid Attribute Combination", msg)
                    .with_attribute(AttributePath::new("environments"))
            })?,
            None => SharedScope::Only(vec![]),
        };
        if self.environment_id.is_some() {
            if !scope.ids().is_empty() {
                return Err(Diagnostic::error(
                    "Invalid Attribute Combination",
                    "Environment scope agent pool cannot have environments linkage",
                )
                .with_attribute(AttributePath::new("environments")));
            }
            options.is_shared = Some(scope.is_shared());
            return Ok(());
        }
        options.is_shared = Some(scope.is_shared());
        options.environments = Some(scope.ids());
        Ok(())
    }
}

fn agent_pool_state(pool: &AgentPool) -> DynamicValue {
    let environments =
        SharedScope::from_api(pool.attributes.is_shared, pool.related_ids("environments"));

    DynamicValue::object()
        .with("id", pool.id.as_str())
        .with("name", pool.attributes.name.as_str())
        .with(
            "account_id",
            Dynamic::from(pool.related_id("account").map(str::to_string)),
        )
        .with(
            "environment_id",
            Dynamic::from(pool.related_id("environment").map(str::to_string)),
        )
        .with("vcs_enabled", pool.attributes.vcs_enabled)
        .with("environments", Dynamic::string_set(environments.to_state()))
}

#[derive(Default)]
pub struct AgentPoolResource {
    provider_data: Option<ScalrProviderData>,
}

impl AgentPoolResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_pool(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let plan = AgentPoolModel::from_value(planned)?;

        let mut options = AgentPoolOptions {
            name: Some(plan.name.clone()),
            vcs_enabled: Some(plan.vcs_enabled.unwrap_or(false)),
            account_id: plan.account_id.clone().or_else(|| data.account_id.clone()),
            environment_id: plan.environment_id.clone(),
            ..Default::default()
        };
        plan.sharing(&mut options)?;

        tracing::debug!("Creating agent pool {}", plan.name);
        let pool = data
            .client
            .agent_pools()
            .create(ctx, &options)
            .await
            .map_err(|e| api_error("Error creating agent pool", &e))?;

        Ok(agent_pool_state(&pool))
    }

    async fn read_pool(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let Some(id) = AgentPoolModel::from_value(current)?.id else {
            return Ok(None);
        };

        match data.client.agent_pools().get(ctx, &id).await {
            Ok(pool) => Ok(Some(agent_pool_state(&pool))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Agent pool {} not found, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Error retrieving agent pool", &e)),
        }
    }

    async fn update_pool(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let id = AgentPoolModel::from_value(prior)?.id.unwrap_or_default();
        let plan = AgentPoolModel::from_value(planned)?;

        let mut options = AgentPoolOptions {
            name: Some(plan.name.clone()),
            ..Default::default()
        };
        plan.sharing(&mut options)?;

        tracing::debug!("Update agent pool {}", id);
        let pool = data
            .client
            .agent_pools()
            .update(ctx, &id, &options)
            .await
            .map_err(|e| api_error("Error updating agent pool", &e))?;

        let refreshed = self.read_pool(ctx, &agent_pool_state(&pool)).await?;
        reread_after_write("Error updating agent pool", &id, refreshed)
    }
}

#[async_trait]
impl Resource for AgentPoolResource {
    fn type_name(&self) -> &str {
        "scalr_agent_pool"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: agent_pool_schema(),
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

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        let has_environment_id = request
            .config
            .get(&AttributePath::new("environment_id"))
            .is_some_and(|v| !v.is_null());
        let has_environments = request
            .config
            .get(&AttributePath::new("environments"))
            .is_some_and(|v| !v.is_null());

        if has_environment_id && has_environments {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid Attribute Combination",
                    "Attribute 'environments' can't be used with 'environment_id'",
                )
                .with_attribute(AttributePath::new("environments")),
            );
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_pool(&ctx, &request.planned_state).await {
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
        match self.read_pool(&ctx, &request.current_state).await {
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
            .update_pool(&ctx, &request.prior_state, &request.planned_state)
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
        let id = match AgentPoolModel::from_value(&request.prior_state) {
            Ok(AgentPoolModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        tracing::debug!("Delete agent pool {}", id);
        match data.client.agent_pools().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Agent pool {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting agent pool", &e)),
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
    use tfplug::planning::plan_resource_change;
    use tfplug::HasErrors;

    fn pool(json: &str) -> AgentPool {
        let doc: Document<AgentPool> = serde_json::from_str(json).unwrap();
        doc.data
    }

    #[tokio::test]
    async fn environments_conflict_with_environment_id() {
        let resource = AgentPoolResource::new();
        let config = DynamicValue::object()
            .with("name", "pool")
            .with("environment_id", "env-1")
            .with("environments", Dynamic::string_list(["env-2"]));

        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "scalr_agent_pool".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.has_errors());
        assert_eq!(
            response.diagnostics[0].detail,
            "Attribute 'environments' can't be used with 'environment_id'"
        );
    }

    #[test]
    fn shared_pool_reads_as_wildcard() {
        let state = agent_pool_state(&pool(
            r#"{"data":{"id":"apool-1","type":"agent-pools",
                "attributes":{"name":"pool","is-shared":true},
                "relationships":{"environments":{"data":[{"type":"environments","id":"env-1"}]}}}}"#,
        ));
        assert_eq!(
            state.get(&AttributePath::new("environments")).unwrap(),
            &Dynamic::string_list(["*"])
        );
    }

    #[test]
    fn wildcard_maps_to_shared_flag() {
        let plan = AgentPoolModel::from_value(
            &DynamicValue::object()
                .with("name", "pool")
                .with("environments", Dynamic::string_list(["*"])),
        )
        .unwrap();
        let mut options = AgentPoolOptions::default();
        plan.sharing(&mut options).unwrap();

        assert_eq!(options.is_shared, Some(true));
        assert_eq!(options.environments, Some(vec![]));
    }

    #[test]
    fn empty_environments_unshare_the_pool() {
        let plan = AgentPoolModel::from_value(
            &DynamicValue::object()
                .with("name", "pool")
                .with("environments", Dynamic::List(vec![])),
        )
        .unwrap();
        let mut options = AgentPoolOptions::default();
        plan.sharing(&mut options).unwrap();

        assert_eq!(options.is_shared, Some(false));
        assert_eq!(options.environments, Some(vec![]));
    }

    #[test]
    fn environment_scoped_pool_keeps_the_default_wildcard() {
        let plan = AgentPoolModel::from_value(
            &DynamicValue::object()
                .with("name", "pool")
                .with("environment_id", "env-1")
                .with("environments", Dynamic::string_list(["*"])),
        )
        .unwrap();
        let mut options = AgentPoolOptions::default();
        plan.sharing(&mut options).unwrap();

        assert_eq!(options.is_shared, Some(true));
        assert_eq!(options.environments, None);
    }

    #[test]
    fn toggling_vcs_requires_replace() {
        let prior = DynamicValue::object()
            .with("id", "apool-1")
            .with("name", "pool")
            .with("account_id", "acc-1")
            .with("vcs_enabled", false)
            .with("environments", Dynamic::string_list(["*"]));
        let config = DynamicValue::object()
            .with("name", "pool")
            .with("vcs_enabled", true);

        let planned = plan_resource_change(&agent_pool_schema(), &prior, &config);
        assert!(planned
            .requires_replace
            .contains(&AttributePath::new("vcs_enabled")));
    }
}
