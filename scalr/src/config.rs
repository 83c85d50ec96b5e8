//! Provider block resolution: config values first, then environment

use std::env;

use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub const DEFAULT_HOSTNAME: &str = "scalr.io";
pub const HOSTNAME_ENV_VAR: &str = "SCALR_HOSTNAME";
pub const TOKEN_ENV_VAR: &str = "SCALR_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Scheme and host, e.g. `https://example.scalr.io`
    pub address: String,
    pub token: String,
}

impl ProviderConfig {
    pub fn from_config(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let hostname = resolve(config, "hostname", HOSTNAME_ENV_VAR, &mut diagnostics)
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
        let token = resolve(config, "token", TOKEN_ENV_VAR, &mut diagnostics);

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let Some(token) = token else {
            return Err(vec![Diagnostic::error(
                "required token could not be found",
                format!(
                    "Set the `token` attribute in the provider block or export {}",
                    TOKEN_ENV_VAR
                ),
            )
            .with_attribute(AttributePath::new("token"))]);
        };

        Ok(Self {
            address: address_for(&hostname),
            token,
        })
    }
}

fn resolve(
    config: &DynamicValue,
    name: &str,
    env_var: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    let path = AttributePath::new(name);
    match config.get(&path) {
        Some(Dynamic::Unknown) => {
            diagnostics.push(
                Diagnostic::error(
                    format!("Unknown {} value", name),
                    format!(
                        "The provider cannot be configured with an unknown {}. \
                         Set it statically or use the {} environment variable.",
                        name, env_var
                    ),
                )
                .with_attribute(path),
            );
            None
        }
        Some(Dynamic::String(value)) if !value.trim().is_empty() => Some(value.clone()),
        _ => env::var(env_var).ok().filter(|v| !v.trim().is_empty()),
    }
}

/// A bare hostname gets `https://`; an explicit scheme is kept
fn address_for(hostname: &str) -> String {
    let hostname = hostname.trim().trim_end_matches('/');
    if hostname.starts_with("https://") || hostname.starts_with("http://") {
        hostname.to_string()
    } else {
        format!("https://{}", hostname)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var(HOSTNAME_ENV_VAR);
        env::remove_var(TOKEN_ENV_VAR);
    }

    #[test]
    #[serial]
    fn config_values_win_over_environment() {
        env::set_var(HOSTNAME_ENV_VAR, "env.scalr.io");
        env::set_var(TOKEN_ENV_VAR, "env-token");

        let config = DynamicValue::object()
            .with("hostname", "cfg.scalr.io")
            .with("token", "cfg-token");
        let resolved = ProviderConfig::from_config(&config).unwrap();
        clear_env();

        assert_eq!(resolved.address, "https://cfg.scalr.io");
        assert_eq!(resolved.token, "cfg-token");
    }

    #[test]
    #[serial]
    fn falls_back_to_environment_and_default_host() {
        clear_env();
        env::set_var(TOKEN_ENV_VAR, "env-token");

        let resolved = ProviderConfig::from_config(&DynamicValue::object()).unwrap();
        clear_env();

        assert_eq!(resolved.address, "https://scalr.io");
        assert_eq!(resolved.token, "env-token");
    }

    #[test]
    #[serial]
    fn explicit_scheme_is_kept() {
        clear_env();
        let config = DynamicValue::object()
            .with("hostname", "http://127.0.0.1:1234/")
            .with("token", "t");
        let resolved = ProviderConfig::from_config(&config).unwrap();
        assert_eq!(resolved.address, "http://127.0.0.1:1234");
    }

    #[test]
    #[serial]
    fn missing_token_is_attributed() {
        clear_env();
        let diags = ProviderConfig::from_config(&DynamicValue::object()).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "required token could not be found");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("token")));
    }

    #[test]
    #[serial]
    fn unknown_values_are_rejected() {
        clear_env();
        let config = DynamicValue::object()
            .with("hostname", Dynamic::Unknown)
            .with("token", Dynamic::Unknown);
        let diags = ProviderConfig::from_config(&config).unwrap_err();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].summary, "Unknown hostname value");
        assert_eq!(diags[1].summary, "Unknown token value");
    }
}
