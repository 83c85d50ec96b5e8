//! Runs API, used by the current run lookup

use serde::Deserialize;
use tfplug::Context;

use super::common::{segment, ApiQueryParams, ResourceObject};
use super::{ApiError, Client};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunAttributes {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_destroy: bool,
}

pub type Run = ResourceObject<RunAttributes>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VcsRevisionAttributes {
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub sender_username: Option<String>,
}

/// Run together with the VCS revision it was triggered by, if any
#[derive(Debug, Clone)]
pub struct RunDetails {
    pub run: Run,
    pub vcs_revision: Option<VcsRevisionAttributes>,
}

impl RunDetails {
    /// Plan-only runs have no apply phase
    pub fn is_dry(&self) -> bool {
        self.run.related_id("apply").is_none()
    }
}

#[derive(Debug, Deserialize)]
struct RunDocument {
    data: Run,
    #[serde(default)]
    included: Vec<ResourceObject<VcsRevisionAttributes>>,
}

pub struct RunsApi<'a> {
    client: &'a Client,
}

impl<'a> RunsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /runs/{id}?include=vcs-revision
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<RunDetails, ApiError> {
        let params = ApiQueryParams::new().add("include", "vcs-revision");
        let doc: RunDocument = self
            .client
            .get_with_params(ctx, &format!("runs/{}", segment(id)), &params)
            .await?;

        let revision_id = doc.data.related_id("vcs-revision").map(str::to_string);
        let vcs_revision = revision_id.and_then(|revision_id| {
            doc.included
                .into_iter()
                .find(|included| included.kind == "vcs-revisions" && included.id == revision_id)
                .map(|included| included.attributes)
        });

        Ok(RunDetails {
            run: doc.data,
            vcs_revision,
        })
    }
}
