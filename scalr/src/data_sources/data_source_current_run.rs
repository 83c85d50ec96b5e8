//! Current run data source implementation
//!
//! Inside a Scalr remote backend run `SCALR_RUN_ID` is exported; outside of
//! one the data source reports a placeholder id and nothing else.

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

use crate::api::runs::RunDetails;
use crate::api::workspaces::Workspace;
use crate::helpers::{api_error, not_configured};
use crate::provider_data::ScalrProviderData;

pub const RUN_ID_ENV_VAR: &str = "SCALR_RUN_ID";

/// Id reported when no run is in progress
pub const DUMMY_ID: &str = "-";

fn object(fields: &[(&str, AttributeType)]) -> AttributeType {
    AttributeType::Object(
        fields
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect(),
    )
}

fn vcs_type() -> AttributeType {
    let author = object(&[("username", AttributeType::String)]);
    let commit = object(&[
        ("sha", AttributeType::String),
        ("message", AttributeType::String),
        ("author", AttributeType::List(Box::new(author))),
    ]);
    object(&[
        ("repository_id", AttributeType::String),
        ("branch", AttributeType::String),
        ("commit", AttributeType::List(Box::new(commit))),
    ])
}

pub fn current_run_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description(
            "Allows you to get information about the current Terraform run when using a Scalr remote backend workspace, including VCS (Git) metadata.",
        )
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The ID of the run")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("environment_id", AttributeType::String)
                .description("The ID of the environment")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("workspace_name", AttributeType::String)
                .description("Workspace name")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("vcs", AttributeType::List(Box::new(vcs_type())))
                .description("Details of the VCS configuration if the workspace is linked to a VCS repo")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("source", AttributeType::String)
                .description("The source of the run (VCS, API, Manual)")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("message", AttributeType::String)
                .description("Message describing how the run was triggered")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("is_destroy", AttributeType::Bool)
                .description("Indicates if this is a \"destroy\" run")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("is_dry", AttributeType::Bool)
                .description("Indicates if this is a dry run, i.e. there is no apply phase")
                .computed()
                .build(),
        )
        .build()
}

fn map(entries: Vec<(&str, Dynamic)>) -> Dynamic {
    Dynamic::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<_, _>>(),
    )
}

fn vcs_value(details: &RunDetails, workspace: &Workspace) -> Dynamic {
    let Some(repo) = &workspace.attributes.vcs_repo else {
        return Dynamic::Null;
    };

    let commit = match &details.vcs_revision {
        Some(revision) => vec![map(vec![
            ("sha", Dynamic::from(revision.commit_sha.clone())),
            ("message", Dynamic::from(revision.commit_message.clone())),
            (
                "author",
                Dynamic::List(vec![map(vec![(
                    "username",
                    Dynamic::from(revision.sender_username.clone()),
                )])]),
            ),
        ])],
        None => vec![],
    };

    Dynamic::List(vec![map(vec![
        ("repository_id", Dynamic::from(repo.identifier.as_str())),
        ("branch", Dynamic::from(repo.branch.clone())),
        ("commit", Dynamic::List(commit)),
    ])])
}

fn current_run_state(details: &RunDetails, workspace: &Workspace) -> DynamicValue {
    let run = &details.run;
    DynamicValue::object()
        .with("id", run.id.as_str())
        .with(
            "environment_id",
            Dynamic::from(workspace.related_id("environment").map(str::to_string)),
        )
        .with("workspace_name", workspace.attributes.name.as_str())
        .with("vcs", vcs_value(details, workspace))
        .with("source", Dynamic::from(run.attributes.source.clone()))
        .with("message", Dynamic::from(run.attributes.message.clone()))
        .with("is_destroy", run.attributes.is_destroy)
        .with("is_dry", details.is_dry())
}

fn placeholder_state() -> DynamicValue {
    DynamicValue::object()
        .with("id", DUMMY_ID)
        .with("environment_id", Dynamic::Null)
        .with("workspace_name", Dynamic::Null)
        .with("vcs", Dynamic::Null)
        .with("source", Dynamic::Null)
        .with("message", Dynamic::Null)
        .with("is_destroy", Dynamic::Null)
        .with("is_dry", Dynamic::Null)
}

#[derive(Default)]
pub struct CurrentRunDataSource {
    provider_data: Option<ScalrProviderData>,
}

impl CurrentRunDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_current_run(&self, ctx: &Context) -> Result<DynamicValue, Diagnostic> {
        let run_id = match std::env::var(RUN_ID_ENV_VAR) {
            Ok(id) if !id.is_empty() => id,
            _ => {
                tracing::debug!("{} is not set", RUN_ID_ENV_VAR);
                return Ok(placeholder_state());
            }
        };
        let data = self.provider_data.as_ref().ok_or_else(not_configured)?;

        tracing::debug!("Read configuration of run: {}", run_id);
        let details = data.client.runs().get(ctx, &run_id).await.map_err(|e| {
            if e.is_not_found() {
                Diagnostic::error("Error retrieving run", format!("Could not find run {}", run_id))
            } else {
                api_error("Error retrieving run", &e)
            }
        })?;

        let workspace_id = details
            .run
            .related_id("workspace")
            .map(str::to_string)
            .unwrap_or_default();
        tracing::debug!("Read workspace of run: {}", run_id);
        let workspace = data
            .client
            .workspaces()
            .get(ctx, &workspace_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Diagnostic::error(
                        "Error retrieving workspace",
                        format!("Could not find workspace {}", workspace_id),
                    )
                } else {
                    api_error("Error retrieving workspace", &e)
                }
            })?;

        Ok(current_run_state(&details, &workspace))
    }
}

#[async_trait]
impl DataSource for CurrentRunDataSource {
    fn type_name(&self) -> &str {
        "scalr_current_run"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: current_run_schema(),
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

    async fn read(&self, ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_current_run(&ctx).await {
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

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::common::Document;
    use crate::api::runs::{Run, VcsRevisionAttributes};
    use tfplug::AttributePath;

    fn run(json: &str) -> Run {
        let doc: Document<Run> = serde_json::from_str(json).unwrap();
        doc.data
    }

    fn workspace(json: &str) -> Workspace {
        let doc: Document<Workspace> = serde_json::from_str(json).unwrap();
        doc.data
    }

    #[test]
    fn vcs_block_is_null_without_repo() {
        let details = RunDetails {
            run: run(r#"{"data":{"id":"run-1","type":"runs","attributes":{"source":"api"}}}"#),
            vcs_revision: None,
        };
        let ws = workspace(r#"{"data":{"id":"ws-1","type":"workspaces","attributes":{"name":"net"}}}"#);

        let state = current_run_state(&details, &ws);
        assert!(state.get(&AttributePath::new("vcs")).unwrap().is_null());
        assert_eq!(state.get_bool(&AttributePath::new("is_dry")).unwrap(), true);
    }

    #[test]
    fn vcs_block_carries_commit_author() {
        let details = RunDetails {
            run: run(
                r#"{"data":{"id":"run-1","type":"runs","attributes":{"source":"vcs"},
                    "relationships":{"apply":{"data":{"type":"applies","id":"apply-1"}}}}}"#,
            ),
            vcs_revision: Some(VcsRevisionAttributes {
                commit_sha: Some("abc123".to_string()),
                commit_message: Some("fix".to_string()),
                sender_username: Some("octocat".to_string()),
            }),
        };
        let ws = workspace(
            r#"{"data":{"id":"ws-1","type":"workspaces",
                "attributes":{"name":"net","vcs-repo":{"identifier":"org/repo","branch":"main"}},
                "relationships":{"environment":{"data":{"type":"environments","id":"env-1"}}}}}"#,
        );

        let state = current_run_state(&details, &ws);
        let author = AttributePath::new("vcs")
            .index(0)
            .attribute("commit")
            .index(0)
            .attribute("author")
            .index(0)
            .attribute("username");
        assert_eq!(state.get_string(&author).unwrap(), "octocat");
        assert_eq!(
            state.get_string(&AttributePath::new("environment_id")).unwrap(),
            "env-1"
        );
        assert_eq!(state.get_bool(&AttributePath::new("is_dry")).unwrap(), false);
    }

    #[test]
    fn placeholder_only_sets_id() {
        let state = placeholder_state();
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), DUMMY_ID);
        assert!(state.get(&AttributePath::new("source")).unwrap().is_null());
    }
}
