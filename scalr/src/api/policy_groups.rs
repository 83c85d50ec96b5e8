//! Policy group to environment links

use tfplug::Context;

use super::common::{segment, RelationshipDocument};
use super::environments::ENVIRONMENT_TYPE;
use super::{ApiError, Client};

pub struct PolicyGroupsApi<'a> {
    client: &'a Client,
}

impl<'a> PolicyGroupsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /policy-groups/{id}/relationships/environments
    pub async fn link_environment(
        &self,
        ctx: &Context,
        policy_group_id: &str,
        environment_id: &str,
    ) -> Result<(), ApiError> {
        self.client
            .post(
                ctx,
                &format!("policy-groups/{}/relationships/environments", segment(policy_group_id)),
                &RelationshipDocument::new(ENVIRONMENT_TYPE, [environment_id]),
            )
            .await
    }

    /// DELETE /policy-groups/{id}/relationships/environments
    pub async fn unlink_environment(
        &self,
        ctx: &Context,
        policy_group_id: &str,
        environment_id: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete_with_body(
                ctx,
                &format!("policy-groups/{}/relationships/environments", segment(policy_group_id)),
                &RelationshipDocument::new(ENVIRONMENT_TYPE, [environment_id]),
            )
            .await
    }
}
