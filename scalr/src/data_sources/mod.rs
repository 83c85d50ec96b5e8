//! Data source implementations

pub mod data_source_current_run;
pub mod data_source_environment;
pub mod data_source_tag;

pub use data_source_current_run::CurrentRunDataSource;
pub use data_source_environment::EnvironmentDataSource;
pub use data_source_tag::TagDataSource;
