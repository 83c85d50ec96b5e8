//! Scalr REST API client
//!
//! The [`Client`] owns transport concerns (authentication, JSON:API
//! headers, retries, deadlines). Each endpoint family is exposed as a
//! borrowed sub-API, e.g. `client.environments().get(&ctx, id)`.

pub mod agent_pools;
pub mod client;
pub mod common;
pub mod environments;
pub mod error;
pub mod infracost;
pub mod pagination;
pub mod policy_groups;
pub mod provider_configurations;
pub mod roles;
pub mod runs;
pub mod tags;
pub mod variables;
pub mod workspaces;

pub use client::{Client, RetryConfig};
pub use error::ApiError;
