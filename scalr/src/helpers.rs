//! Small pure helpers shared by resources

use std::collections::BTreeSet;

use crate::api::ApiError;
use crate::provider_data::ScalrProviderData;
use tfplug::{AttributePath, Diagnostic, DynamicValue, TfplugError};

/// Marker for "shared with every environment"
pub const WILDCARD: &str = "*";

/// Splits a relation change into `(added, removed)`, both sorted
pub fn diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();

    let added = new.difference(&old).map(|s| s.to_string()).collect();
    let removed = old.difference(&new).map(|s| s.to_string()).collect();
    (added, removed)
}

/// Order-insensitive comparison of two relation sets
pub fn sets_equal(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

pub fn pack_id(first: &str, second: &str) -> String {
    format!("{}/{}", first, second)
}

/// Splits `first/second`. Exactly one separator with non-empty halves.
pub fn unpack_id(id: &str) -> Option<(String, String)> {
    let (first, second) = id.split_once('/')?;
    if first.is_empty() || second.is_empty() || second.contains('/') {
        return None;
    }
    Some((first.to_string(), second.to_string()))
}

/// Relation set with the wildcard collapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedScope {
    All,
    Only(Vec<String>),
}

impl SharedScope {
    /// Parses a configured set; `"*"` next to explicit ids is rejected
    pub fn from_ids(ids: &[String]) -> Result<Self, String> {
        if ids.iter().any(|id| id == WILDCARD) {
            if ids.len() > 1 {
                return Err(
                    "You cannot simultaneously enable the wildcard \"*\" and specify explicit IDs"
                        .to_string(),
                );
            }
            return Ok(SharedScope::All);
        }
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(SharedScope::Only(ids))
    }

    /// Builds the scope from what the API returns
    pub fn from_api(is_shared: bool, ids: Vec<String>) -> Self {
        if is_shared {
            SharedScope::All
        } else {
            let mut ids = ids;
            ids.sort();
            SharedScope::Only(ids)
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, SharedScope::All)
    }

    /// Explicit ids, empty when shared
    pub fn ids(&self) -> Vec<String> {
        match self {
            SharedScope::All => vec![],
            SharedScope::Only(ids) => ids.clone(),
        }
    }

    /// The form written to state
    pub fn to_state(&self) -> Vec<String> {
        match self {
            SharedScope::All => vec![WILDCARD.to_string()],
            SharedScope::Only(ids) => ids.clone(),
        }
    }
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub fn api_error(summary: &str, err: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

/// State re-read after a write. The object vanishing in between is an error.
pub fn reread_after_write(
    summary: &str,
    id: &str,
    refreshed: Option<DynamicValue>,
) -> Result<DynamicValue, Diagnostic> {
    refreshed.ok_or_else(|| Diagnostic::error(summary, format!("{} not found after update", id)))
}

/// Wraps a state or config decoding failure
pub fn decode_error(err: TfplugError) -> Diagnostic {
    Diagnostic::error("Invalid resource data", err.to_string())
}

/// Typed reads of top-level attributes from a config, plan or state value.
/// Absent, null and unknown all read as `None`.
pub struct Attrs<'a>(pub &'a DynamicValue);

impl Attrs<'_> {
    pub fn string(&self, name: &str) -> Result<Option<String>, Diagnostic> {
        self.0
            .get_optional_string(&AttributePath::new(name))
            .map_err(decode_error)
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>, Diagnostic> {
        self.0
            .get_optional_bool(&AttributePath::new(name))
            .map_err(decode_error)
    }

    pub fn strings(&self, name: &str) -> Result<Option<Vec<String>>, Diagnostic> {
        self.0
            .get_optional_string_list(&AttributePath::new(name))
            .map_err(decode_error)
    }
}

/// Explicit attribute first, then the account the provider was configured
/// with
pub fn resolve_account_id(
    explicit: Option<String>,
    provider_data: &ScalrProviderData,
) -> Result<String, Diagnostic> {
    explicit
        .or_else(|| provider_data.account_id.clone())
        .ok_or_else(|| {
            Diagnostic::error(
                "Cannot infer current account",
                "Default value for `account_id` could not be computed.",
            )
            .with_attribute(AttributePath::new("account_id"))
        })
}
