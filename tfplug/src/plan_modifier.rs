//! Built-in plan modifiers
//!
//! Plan modifiers run after defaults during planning and can:
//! - Modify the planned value
//! - Mark an attribute as requiring replacement
//! - Add warnings or errors to the plan

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this value forces replacement".to_string()
    }

    fn modify(&self, request: PlanModifierRequest<'_>) -> PlanModifierResponse {
        let requires_replace = value_changed(&request);
        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Forces replacement on change only when the predicate also holds
pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync + 'static,
{
    pub fn create(predicate: F, description: impl Into<String>) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.into(),
        })
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest<'_>) -> PlanModifierResponse {
        let requires_replace = value_changed(&request) && (self.predicate)(&request);
        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// A plan modifier that uses the current state value when the planned value is unknown
///
/// Computed attributes such as `id` keep their value during planning instead
/// of showing up as "(known after apply)" on every update.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest<'_>) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value
        } else {
            request.plan_value
        };
        PlanModifierResponse::unchanged(plan_value)
    }
}

/// A change that can force replacement: an update where both sides are
/// known and differ
fn value_changed(request: &PlanModifierRequest<'_>) -> bool {
    if request.is_create() {
        return false;
    }
    if request.state_value.is_unknown() || request.plan_value.is_unknown() {
        return false;
    }
    !values_equal(&request.state_value, &request.plan_value)
}

/// Compare two Dynamic values for equality
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request<'a>(
        state: &'a DynamicValue,
        state_value: Dynamic,
        plan_value: Dynamic,
    ) -> PlanModifierRequest<'a> {
        PlanModifierRequest {
            config_value: plan_value.clone(),
            state_value,
            plan_value,
            path: AttributePath::new("field"),
            state,
        }
    }

    fn existing() -> DynamicValue {
        let mut state = DynamicValue::object();
        state
            .set_string(&AttributePath::new("id"), "tag-1".to_string())
            .unwrap();
        state
    }

    #[test]
    fn requires_replace_does_not_trigger_on_same_value() {
        let state = existing();
        let response = RequiresReplace.modify(request(
            &state,
            Dynamic::String("acc-1".to_string()),
            Dynamic::String("acc-1".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_triggers_on_different_value() {
        let state = existing();
        let response = RequiresReplace.modify(request(
            &state,
            Dynamic::String("acc-1".to_string()),
            Dynamic::String("acc-2".to_string()),
        ));
        assert!(response.requires_replace);
        assert_eq!(response.plan_value, Dynamic::String("acc-2".to_string()));
    }

    #[test]
    fn requires_replace_never_triggers_on_create() {
        let state = DynamicValue::null();
        let response = RequiresReplace.modify(request(
            &state,
            Dynamic::Null,
            Dynamic::String("acc-1".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_unknown_values() {
        let state = existing();
        let response = RequiresReplace.modify(request(
            &state,
            Dynamic::String("acc-1".to_string()),
            Dynamic::Unknown,
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_consults_the_prior_state() {
        let modifier = replace_if_sensitive();

        let mut sensitive = existing();
        sensitive
            .set_bool(&AttributePath::new("sensitive"), true)
            .unwrap();
        let response = modifier.modify(request(
            &sensitive,
            Dynamic::String("OLD".to_string()),
            Dynamic::String("NEW".to_string()),
        ));
        assert!(response.requires_replace);

        let plain = existing();
        let response = modifier.modify(request(
            &plain,
            Dynamic::String("OLD".to_string()),
            Dynamic::String("NEW".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    fn replace_if_sensitive() -> Box<dyn PlanModifier> {
        RequiresReplaceIf::create(
            |req: &PlanModifierRequest<'_>| {
                req.state
                    .get_optional_bool(&AttributePath::new("sensitive"))
                    .ok()
                    .flatten()
                    .unwrap_or(false)
            },
            "renaming a sensitive variable forces replacement",
        )
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let state = existing();
        let response = UseStateForUnknown.modify(request(
            &state,
            Dynamic::String("tag-1".to_string()),
            Dynamic::Unknown,
        ));
        assert_eq!(response.plan_value, Dynamic::String("tag-1".to_string()));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_on_create() {
        let state = DynamicValue::null();
        let response = UseStateForUnknown.modify(request(&state, Dynamic::Null, Dynamic::Unknown));
        assert_eq!(response.plan_value, Dynamic::Unknown);
    }

    #[test]
    fn values_equal_handles_nested_values() {
        assert!(values_equal(&Dynamic::Number(42.0), &Dynamic::Number(42.0)));
        assert!(!values_equal(&Dynamic::Bool(true), &Dynamic::Bool(false)));
        assert!(values_equal(
            &Dynamic::string_set(["b", "a"]),
            &Dynamic::string_set(["a", "b"])
        ));
        assert!(!values_equal(&Dynamic::Null, &Dynamic::String(String::new())));
    }
}
