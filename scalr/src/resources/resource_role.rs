//! IAM role resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    UpdateResourceRequest, UpdateResourceResponse, UpgradeResourceStateRequest,
    UpgradeResourceStateResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{SetSizeBetween, StringNotWhitespace};
use tfplug::import_state_passthrough_id;

use crate::api::roles::{Role, RoleOptions};
use crate::defaults::AccountIdDefault;
use crate::helpers::{
    api_error, decode_error, not_configured, reread_after_write, resolve_account_id, Attrs,
};
use crate::provider_data::ScalrProviderData;

const SET_QUOTAS: &str = "accounts:set-quotas";

pub fn role_schema() -> Schema {
    SchemaBuilder::new()
        .version(1)
        .description("Manages the state of roles in Scalr")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the role")
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
        .attribute(
            AttributeBuilder::new("description", AttributeType::String)
                .description("Verbose description of the role")
                .optional()
                .computed()
                .default(StaticDefault::string(""))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("permissions", AttributeType::string_set())
                .description("Array of permission names")
                .required()
                .validator(SetSizeBetween::create(1, 128))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("is_system", AttributeType::Bool)
                .description("Set to `true` if the role is a system role")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .build()
}

/// Roles written before `accounts:set-quotas` existed got that capability
/// through `global-scope:read` plus `accounts:update`
pub fn upgrade_permissions(mut permissions: Vec<String>) -> Vec<String> {
    let has = |name: &str| permissions.iter().any(|p| p == name);
    if has("global-scope:read") && has("accounts:update") && !has(SET_QUOTAS) {
        permissions.push(SET_QUOTAS.to_string());
    }
    permissions.sort();
    permissions
}

struct RoleModel {
    id: Option<String>,
    name: String,
    account_id: Option<String>,
    description: String,
    permissions: Vec<String>,
}

impl RoleModel {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let attrs = Attrs(value);
        Ok(Self {
            id: attrs.string("id")?,
            name: attrs.string("name")?.unwrap_or_default(),
            account_id: attrs.string("account_id")?,
            description: attrs.string("description")?.unwrap_or_default(),
            permissions: attrs.strings("permissions")?.unwrap_or_default(),
        })
    }
}

fn role_state(role: &Role, fallback_account: Option<String>) -> DynamicValue {
    let account_id = role
        .related_id("account")
        .map(str::to_string)
        .or(fallback_account);

    DynamicValue::object()
        .with("id", role.id.as_str())
        .with("name", role.attributes.name.as_str())
        .with("account_id", Dynamic::from(account_id))
        .with(
            "description",
            role.attributes.description.clone().unwrap_or_default(),
        )
        .with(
            "permissions",
            Dynamic::string_set(role.related_ids("permissions")),
        )
        .with("is_system", role.attributes.is_system)
}

#[derive(Default)]
pub struct RoleResource {
    provider_data: Option<ScalrProviderData>,
}

impl RoleResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<&ScalrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn create_role(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let plan = RoleModel::from_value(planned)?;
        let account_id = resolve_account_id(plan.account_id, data)?;

        let options = RoleOptions {
            name: plan.name,
            description: plan.description,
            account_id: Some(account_id.clone()),
            permissions: plan.permissions,
        };
        let role = data
            .client
            .roles()
            .create(ctx, &options)
            .await
            .map_err(|e| api_error("Error creating role", &e))?;

        tracing::debug!("Created role {}", role.id);
        Ok(role_state(&role, Some(account_id)))
    }

    async fn read_role(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = self.data()?;
        let state = RoleModel::from_value(current)?;
        let Some(id) = state.id else {
            return Ok(None);
        };

        match data.client.roles().get(ctx, &id).await {
            Ok(role) => Ok(Some(role_state(&role, state.account_id))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Role {} not found, removing from state", id);
                Ok(None)
            }
            Err(e) => Err(api_error("Error retrieving role", &e)),
        }
    }

    async fn update_role(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = self.data()?;
        let state = RoleModel::from_value(prior)?;
        let plan = RoleModel::from_value(planned)?;
        let id = state.id.unwrap_or_default();

        let options = RoleOptions {
            name: plan.name,
            description: plan.description,
            account_id: None,
            permissions: plan.permissions,
        };
        let role = data
            .client
            .roles()
            .update(ctx, &id, &options)
            .await
            .map_err(|e| api_error("Error updating role", &e))?;

        let written = role_state(&role, state.account_id);
        let refreshed = self.read_role(ctx, &written).await?;
        reread_after_write("Error updating role", &id, refreshed)
    }

    fn upgrade_v0(&self, request: &UpgradeResourceStateRequest) -> Result<DynamicValue, Diagnostic> {
        let mut state = request.raw_state.decode().map_err(|e| {
            Diagnostic::error("Unable to Read Previously Saved State", e.to_string())
        })?;
        let permissions = Attrs(&state).strings("permissions")?.unwrap_or_default();
        state
            .set_string_set(
                &AttributePath::new("permissions"),
                upgrade_permissions(permissions),
            )
            .map_err(decode_error)?;
        Ok(state)
    }
}

#[async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &str {
        "scalr_role"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: role_schema(),
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
        match self.create_role(&ctx, &request.planned_state).await {
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
        match self.read_role(&ctx, &request.current_state).await {
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
            .update_role(&ctx, &request.prior_state, &request.planned_state)
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
        let id = match RoleModel::from_value(&request.prior_state) {
            Ok(RoleModel { id: Some(id), .. }) => id,
            Ok(_) => return DeleteResourceResponse { diagnostics },
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        match data.client.roles().delete(&ctx, &id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Role {} already deleted", id);
            }
            Err(e) => diagnostics.push(api_error("Error deleting role", &e)),
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
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        let result = match request.version {
            0 => self.upgrade_v0(&request),
            v => Err(Diagnostic::error(
                "Unable to Upgrade Resource State",
                format!("scalr_role has no state upgrader for version {}", v),
            )),
        };
        match result {
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

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tfplug::planning::validate_resource_config;
    use tfplug::HasErrors;

    fn perms(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn set_quotas_is_added_for_account_admins() {
        let upgraded = upgrade_permissions(perms(&["accounts:update", "global-scope:read"]));
        assert_eq!(
            upgraded,
            perms(&["accounts:set-quotas", "accounts:update", "global-scope:read"])
        );
    }

    #[test]
    fn other_permission_sets_are_left_alone() {
        assert_eq!(
            upgrade_permissions(perms(&["accounts:update"])),
            perms(&["accounts:update"])
        );
        assert_eq!(
            upgrade_permissions(perms(&[
                "accounts:set-quotas",
                "accounts:update",
                "global-scope:read"
            ]))
            .len(),
            3
        );
    }

    #[test]
    fn permissions_must_not_be_empty() {
        let config = DynamicValue::object()
            .with("name", "reader")
            .with("account_id", "acc-1")
            .with("permissions", Dynamic::List(vec![]));
        assert!(validate_resource_config(&role_schema(), &config).has_errors());
    }
}
