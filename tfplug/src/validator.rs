//! Built-in attribute validators
//!
//! Validators only see known, non-null values; the planning engine skips
//! null and unknown configuration before calling them.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};

/// Rejects empty strings and strings made only of whitespace
pub struct StringNotWhitespace;

impl StringNotWhitespace {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for StringNotWhitespace {
    fn description(&self) -> String {
        "must not be empty or consisting entirely of whitespace characters".to_string()
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Some(s) = request.value.as_str() {
            if s.trim().is_empty() {
                response.diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value",
                        format!("Attribute {} {}", request.path, self.description()),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Value must be one of a fixed set of strings
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn create<I, S>(allowed: I) -> Box<dyn Validator>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Box::new(Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Some(s) = request.value.as_str() {
            if !self.allowed.iter().any(|a| a == s) {
                response.diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Match",
                        format!(
                            "Attribute {} {}, got: {:?}",
                            request.path,
                            self.description(),
                            s
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Value must be an absolute http or https URL
pub struct StringIsUrl;

impl StringIsUrl {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for StringIsUrl {
    fn description(&self) -> String {
        "value must be a valid http(s) URL".to_string()
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Some(s) = request.value.as_str() {
            let valid = url::Url::parse(s)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
                .unwrap_or(false);
            if !valid {
                response.diagnostics.push(
                    Diagnostic::error(
                        "Invalid URL",
                        format!("Attribute {} {}, got: {:?}", request.path, self.description(), s),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Element count of a set or list must fall within `[min, max]`
pub struct SetSizeBetween {
    pub min: usize,
    pub max: usize,
}

impl SetSizeBetween {
    pub fn create(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for SetSizeBetween {
    fn description(&self) -> String {
        format!("set must contain at least {} elements and at most {} elements", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Dynamic::List(items) = request.value {
            if items.len() < self.min || items.len() > self.max {
                response.diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value",
                        format!(
                            "Attribute {} {}, got: {}",
                            request.path,
                            self.description(),
                            items.len()
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// The wildcard `"*"` means "all" and cannot be mixed with explicit ids
pub struct NoWildcardWithIds;

impl NoWildcardWithIds {
    pub const WILDCARD: &'static str = "*";

    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for NoWildcardWithIds {
    fn description(&self) -> String {
        "the wildcard \"*\" cannot be combined with explicit ids".to_string()
    }

    fn validate(&self, request: ValidatorRequest<'_>) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Dynamic::List(items) = request.value {
            let has_wildcard = items
                .iter()
                .any(|item| item.as_str() == Some(Self::WILDCARD));
            if has_wildcard && items.len() > 1 {
                response.diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Combination",
                        format!(
                            "Attribute {}: {}. Use [\"*\"] to select all, or list the ids explicitly.",
                            request.path,
                            self.description()
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}
