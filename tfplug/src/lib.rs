//! tfplug - Terraform Plugin Framework for Rust
//!
//! The provider-side half of the Terraform plugin model: dynamic values,
//! schemas with validators, plan modifiers and defaults, the
//! resource/data source/provider traits, and an in-process planning engine
//! that evaluates schemas the way Terraform core would.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod plan_modifier;
pub mod planning;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use data_source::DataSource;
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{PlannedChange, Resource};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue, HasErrors};
