//! Environment data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringNotWhitespace;

use crate::api::environments::{Environment, EnvironmentFilter};
use crate::helpers::{api_error, not_configured, Attrs};
use crate::provider_data::ScalrProviderData;
use crate::resources::resource_environment::{environment_value, user_type};

const SUMMARY: &str = "Error retrieving environment";

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

pub fn environment_data_source_schema() -> Schema {
    let computed = |name: &str, ty: AttributeType, description: &str| {
        AttributeBuilder::new(name, ty)
            .description(description)
            .computed()
            .build()
    };

    SchemaBuilder::new()
        .version(0)
        .description("Retrieves information about environment")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The environment ID")
                .optional()
                .computed()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the environment")
                .optional()
                .computed()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("account_id", AttributeType::String)
                .description("The ID of the Scalr account")
                .optional()
                .computed()
                .build(),
        )
        .attribute(computed("status", AttributeType::String, "The status of an environment"))
        .attribute(computed(
            "created_by",
            AttributeType::List(Box::new(user_type())),
            "Details of the user that created the environment",
        ))
        .attribute(computed(
            "policy_groups",
            string_list(),
            "List of the environment policy-groups IDs",
        ))
        .attribute(computed(
            "tag_ids",
            string_list(),
            "List of tag IDs associated with the environment",
        ))
        .attribute(computed(
            "default_provider_configurations",
            string_list(),
            "List of IDs of provider configurations, used in the environment workspaces by default",
        ))
        .attribute(computed(
            "remote_backend",
            AttributeType::Bool,
            "If Scalr exports the remote backend configuration and state storage",
        ))
        .attribute(computed(
            "remote_backend_overridable",
            AttributeType::Bool,
            "Indicates if the remote backend configuration can be overridden on the workspace level",
        ))
        .attribute(computed(
            "mask_sensitive_output",
            AttributeType::Bool,
            "Enable masking of the sensitive console output",
        ))
        .attribute(computed(
            "federated_environments",
            AttributeType::string_set(),
            "Environments allowed to access this environment, or `[\"*\"]` if shared with all",
        ))
        .attribute(computed(
            "storage_profile_id",
            AttributeType::String,
            "The storage profile for this environment",
        ))
        .attribute(computed(
            "default_workspace_agent_pool_id",
            AttributeType::String,
            "Default agent pool for workspaces of the environment",
        ))
        .build()
}

/// Picks the single environment a name lookup may return
pub fn single_by_name(
    mut environments: Vec<Environment>,
    name: &str,
) -> Result<Environment, Diagnostic> {
    match environments.len() {
        0 => Err(Diagnostic::error(
            SUMMARY,
            format!(
                "Environment with name '{}' not found or user unauthorized",
                name
            ),
        )),
        1 => Ok(environments.remove(0)),
        _ => Err(Diagnostic::error(
            SUMMARY,
            format!(
                "Found more than one environment with name: {}, specify 'account_id' to search only for environments in specific account",
                name
            ),
        )),
    }
}

fn mismatch(id: &str, name: &str) -> Diagnostic {
    Diagnostic::error(
        SUMMARY,
        format!(
            "Could not find environment with ID '{}' and name '{}'",
            id, name
        ),
    )
}

#[derive(Default)]
pub struct EnvironmentDataSource {
    provider_data: Option<ScalrProviderData>,
}

impl EnvironmentDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_environment(
        &self,
        ctx: &Context,
        config: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let attrs = Attrs(config);
        let id = attrs.string("id")?;
        let name = attrs.string("name")?;

        let env = match (&id, &name) {
            (Some(id), _) => {
                let env = data
                    .client
                    .environments()
                    .get(ctx, id)
                    .await
                    .map_err(|e| api_error(SUMMARY, &e))?;
                if let Some(name) = &name {
                    if *name != env.attributes.name {
                        return Err(mismatch(id, name));
                    }
                }
                env
            }
            (None, Some(name)) => {
                let filter = EnvironmentFilter {
                    name: Some(name.clone()),
                    account_id: attrs.string("account_id")?.or_else(|| data.account_id.clone()),
                };
                let environments = data
                    .client
                    .environments()
                    .list(ctx, &filter)
                    .await
                    .map_err(|e| api_error(SUMMARY, &e))?;
                single_by_name(environments, name)?
            }
            (None, None) => return Err(missing_lookup()),
        };

        tracing::debug!("Found environment {}", env.id);
        environment_value(&data.client, ctx, &env).await
    }
}

fn missing_lookup() -> Diagnostic {
    Diagnostic::error(
        "Invalid Attribute Combination",
        "At least one of these attributes must be configured: [id, name]",
    )
}

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn type_name(&self) -> &str {
        "scalr_environment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: environment_data_source_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        match ScalrProviderData::from_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureDataSourceResponse { diagnostics }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let config = &request.config;
        let set = |name: &str| {
            config
                .get(&AttributePath::new(name))
                .map(|v| !v.is_null())
                .unwrap_or(false)
        };
        let diagnostics = if set("id") || set("name") {
            vec![]
        } else {
            vec![missing_lookup()]
        };
        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_environment(&ctx, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(diag) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![diag],
            },
        }
    }
}
