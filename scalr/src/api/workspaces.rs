//! Workspaces API, used by the current run lookup

use serde::Deserialize;
use tfplug::Context;

use super::common::{segment, Document, ResourceObject};
use super::{ApiError, Client};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkspaceAttributes {
    pub name: String,
    #[serde(default)]
    pub vcs_repo: Option<VcsRepo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VcsRepo {
    pub identifier: String,
    #[serde(default)]
    pub branch: Option<String>,
}

pub type Workspace = ResourceObject<WorkspaceAttributes>;

pub struct WorkspacesApi<'a> {
    client: &'a Client,
}

impl<'a> WorkspacesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /workspaces/{id}
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Workspace, ApiError> {
        let doc: Document<Workspace> = self
            .client
            .get(ctx, &format!("workspaces/{}", segment(id)))
            .await?;
        Ok(doc.data)
    }
}
