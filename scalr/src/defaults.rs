//! Account id default shared by account-scoped resources

use std::env;

use tfplug::schema::{Default, DefaultRequest, DefaultResponse};
use tfplug::{Diagnostic, Dynamic};

pub const ACCOUNT_ID_ENV_VAR: &str = "SCALR_ACCOUNT_ID";

/// Reads the current account from `SCALR_ACCOUNT_ID`, set inside Scalr
/// remote runs
pub fn current_account_id() -> Option<String> {
    env::var(ACCOUNT_ID_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Fills `account_id` from the environment. The required variant fails
/// planning when the variable is unset; the optional one leaves the value
/// unknown for the API to decide.
pub struct AccountIdDefault {
    required: bool,
}

impl AccountIdDefault {
    pub fn required() -> Box<dyn Default> {
        Box::new(Self { required: true })
    }

    pub fn optional() -> Box<dyn Default> {
        Box::new(Self { required: false })
    }
}

impl Default for AccountIdDefault {
    fn description(&self) -> String {
        format!("value of the {} environment variable", ACCOUNT_ID_ENV_VAR)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        if let Some(account_id) = current_account_id() {
            return DefaultResponse::value(Dynamic::String(account_id));
        }

        let mut response = DefaultResponse::value(Dynamic::Unknown);
        if self.required {
            response.diagnostics.push(Diagnostic::error(
                "Cannot infer current account",
                "Default value for `account_id` could not be computed.\n\
                 If you are using Scalr Provider for local runs, please set the attribute in resources explicitly,\n\
                 or export `SCALR_ACCOUNT_ID` environment variable prior the run.",
            ));
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::AttributePath;

    fn request() -> DefaultRequest {
        DefaultRequest {
            path: AttributePath::new("account_id"),
        }
    }

    #[test]
    #[serial]
    fn reads_account_from_environment() {
        env::set_var(ACCOUNT_ID_ENV_VAR, "acc-123");
        let response = AccountIdDefault::required().default_value(request());
        env::remove_var(ACCOUNT_ID_ENV_VAR);

        assert_eq!(response.value, Dynamic::String("acc-123".to_string()));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    #[serial]
    fn required_default_errors_when_unset() {
        env::remove_var(ACCOUNT_ID_ENV_VAR);
        let response = AccountIdDefault::required().default_value(request());

        assert!(response.value.is_unknown());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Cannot infer current account");
        assert!(response.diagnostics[0].detail.contains("SCALR_ACCOUNT_ID"));
    }

    #[test]
    #[serial]
    fn optional_default_stays_unknown_when_unset() {
        env::set_var(ACCOUNT_ID_ENV_VAR, "  ");
        let response = AccountIdDefault::optional().default_value(request());
        env::remove_var(ACCOUNT_ID_ENV_VAR);

        assert!(response.value.is_unknown());
        assert!(response.diagnostics.is_empty());
    }
}
