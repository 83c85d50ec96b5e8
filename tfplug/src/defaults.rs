//! Default value providers for attributes
//!
//! Default providers are evaluated during planning, only for optional+computed
//! attributes that are absent from configuration. They differ from plan
//! modifiers in that they never run when the value is set.
//!
//! # Examples
//!
//! ```no_run
//! use tfplug::schema::{AttributeBuilder, AttributeType};
//! use tfplug::defaults::{StaticDefault, EnvDefault};
//!
//! let description = AttributeBuilder::new("description", AttributeType::String)
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::string(""))
//!     .build();
//!
//! let hostname = AttributeBuilder::new("hostname", AttributeType::String)
//!     .optional()
//!     .computed()
//!     .default(EnvDefault::create("SCALR_HOSTNAME", "scalr.io"))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::Dynamic;
use std::env;

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn list(values: Vec<Dynamic>) -> Box<dyn Default> {
        Self::create(Dynamic::List(values))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse::value(self.value.clone())
    }
}

/// EnvDefault gets the default value from an environment variable
pub struct EnvDefault {
    env_var: String,
    fallback: Option<String>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback.to_string()),
        })
    }

    /// Without a fallback an unset variable leaves the value unknown, to be
    /// computed by the provider
    pub fn create_optional(env_var: &str) -> Box<dyn Default> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }
}

impl Default for EnvDefault {
    fn description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!(
                "default from environment variable {} (fallback: {})",
                self.env_var, fallback
            ),
            None => format!("default from environment variable {}", self.env_var),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = match env::var(&self.env_var) {
            Ok(val) if !val.is_empty() => Dynamic::String(val),
            _ => match &self.fallback {
                Some(fallback) => Dynamic::String(fallback.clone()),
                None => Dynamic::Unknown,
            },
        };
        DefaultResponse::value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn request() -> DefaultRequest {
        DefaultRequest {
            path: AttributePath::new("field"),
        }
    }

    #[test]
    fn static_default_returns_value() {
        let default = StaticDefault::bool(true);
        let response = default.default_value(request());
        assert_eq!(response.value, Dynamic::Bool(true));
        assert!(response.diagnostics.is_empty());

        let default = StaticDefault::list(vec![Dynamic::String("*".to_string())]);
        assert_eq!(
            default.default_value(request()).value,
            Dynamic::string_list(["*"])
        );
    }

    #[test]
    fn env_default_prefers_the_environment() {
        std::env::set_var("TFPLUG_TEST_ENV_DEFAULT_SET", "from-env");
        let default = EnvDefault::create("TFPLUG_TEST_ENV_DEFAULT_SET", "fallback");
        assert_eq!(
            default.default_value(request()).value,
            Dynamic::String("from-env".to_string())
        );
        std::env::remove_var("TFPLUG_TEST_ENV_DEFAULT_SET");
    }

    #[test]
    fn env_default_falls_back_or_stays_unknown() {
        let default = EnvDefault::create("TFPLUG_TEST_ENV_DEFAULT_UNSET", "fallback");
        assert_eq!(
            default.default_value(request()).value,
            Dynamic::String("fallback".to_string())
        );

        let default = EnvDefault::create_optional("TFPLUG_TEST_ENV_DEFAULT_UNSET");
        assert_eq!(default.default_value(request()).value, Dynamic::Unknown);
    }
}
