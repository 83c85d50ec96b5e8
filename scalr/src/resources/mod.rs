//! Resource implementations

pub mod resource_agent_pool;
pub mod resource_agent_pool_token;
pub mod resource_environment;
pub mod resource_integration_infracost;
pub mod resource_policy_group_linkage;
pub mod resource_provider_configuration_default;
pub mod resource_role;
pub mod resource_tag;
pub mod resource_variable;

pub use resource_agent_pool::AgentPoolResource;
pub use resource_agent_pool_token::AgentPoolTokenResource;
pub use resource_environment::EnvironmentResource;
pub use resource_integration_infracost::InfracostResource;
pub use resource_policy_group_linkage::PolicyGroupLinkageResource;
pub use resource_provider_configuration_default::ProviderConfigurationDefaultResource;
pub use resource_role::RoleResource;
pub use resource_tag::TagResource;
pub use resource_variable::VariableResource;
