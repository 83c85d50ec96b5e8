//! In-process planning engine
//!
//! Evaluates the behaviour a schema declares: requiredness, types and
//! validators at validation time; computed unknowns, defaults, plan
//! modifiers and requires-replace at plan time; and the version check that
//! routes old state through a resource's upgrader.
//!
//! Planning runs in this order for every attribute:
//! 1. The planned value starts as the configured value
//! 2. Computed attributes absent from config become unknown
//! 3. Defaults fill optional+computed attributes absent from config
//! 4. Plan modifiers run in declaration order
//!
//! A create (null prior state) never requires replacement.

use crate::context::Context;
use crate::error::TfplugError;
use crate::resource::{PlannedChange, Resource, UpgradeResourceStateRequest, UpgradeResourceStateResponse};
use crate::schema::{DefaultRequest, PlanModifierRequest, Schema, ValidatorRequest};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use tracing::debug;

/// Checks a configuration against a resource or data source schema.
/// Unknown values are skipped; they are validated again once known.
pub fn validate_resource_config(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let entries = match &config.value {
        Dynamic::Map(entries) => Some(entries),
        Dynamic::Null | Dynamic::Unknown => None,
        other => {
            diagnostics.push(Diagnostic::error(
                "Invalid configuration",
                format!("expected an object, got {}", other.type_name()),
            ));
            return diagnostics;
        }
    };

    if let Some(entries) = entries {
        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        for name in names {
            if schema.attribute(name).is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named \"{}\" is not expected here.", name),
                    )
                    .with_attribute(AttributePath::new(name)),
                );
            }
        }
    }

    for attr in &schema.block.attributes {
        let path = attr.path();
        let value = entries
            .and_then(|e| e.get(&attr.name))
            .unwrap_or(&Dynamic::Null);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", attr.name),
                    )
                    .with_attribute(path),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid Configuration for Read-Only Attribute",
                    format!("Cannot set value for this attribute as the provider has marked it as read-only. Remove the configuration line setting the value for \"{}\".", attr.name),
                )
                .with_attribute(path),
            );
            continue;
        }

        if value.is_unknown() {
            continue;
        }

        if !attr.r#type.accepts(value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!("Inappropriate value for attribute \"{}\": got {}.", attr.name, value.type_name()),
                )
                .with_attribute(path),
            );
            continue;
        }

        if attr.deprecated {
            diagnostics.push(
                Diagnostic::warning(
                    "Attribute Deprecated",
                    format!("The attribute \"{}\" is deprecated.", attr.name),
                )
                .with_attribute(path.clone()),
            );
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                value,
                config,
                path: path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    diagnostics
}

/// Computes the planned state for a change from `prior_state` to `config`.
/// A null config plans a destroy.
pub fn plan_resource_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    config: &DynamicValue,
) -> PlannedChange {
    let mut diagnostics = Vec::new();
    let mut requires_replace = Vec::new();

    if config.is_null() {
        return PlannedChange {
            planned_state: DynamicValue::null(),
            requires_replace,
            diagnostics,
        };
    }

    let is_create = prior_state.is_null();
    let mut planned: HashMap<String, Dynamic> = HashMap::new();

    for attr in &schema.block.attributes {
        let path = attr.path();
        let config_value = config.get(&path).cloned().unwrap_or(Dynamic::Null);

        let plan_value = if !config_value.is_null() {
            config_value
        } else if let (true, Some(default)) = (attr.optional && attr.computed, &attr.default) {
            let response = default.default_value(DefaultRequest { path: path.clone() });
            diagnostics.extend(
                response
                    .diagnostics
                    .into_iter()
                    .map(|d| d.with_attribute(path.clone())),
            );
            response.value
        } else if attr.computed {
            Dynamic::Unknown
        } else {
            Dynamic::Null
        };

        planned.insert(attr.name.clone(), plan_value);
    }

    for attr in &schema.block.attributes {
        if attr.plan_modifiers.is_empty() {
            continue;
        }

        let path = attr.path();
        let state_value = prior_state.get(&path).cloned().unwrap_or(Dynamic::Null);
        let config_value = config.get(&path).cloned().unwrap_or(Dynamic::Null);
        let mut plan_value = planned.remove(&attr.name).unwrap_or(Dynamic::Null);
        let mut replace = false;

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: config_value.clone(),
                state_value: state_value.clone(),
                plan_value,
                path: path.clone(),
                state: prior_state,
            });
            plan_value = response.plan_value;
            replace |= response.requires_replace;
            diagnostics.extend(response.diagnostics);
        }

        if replace && !is_create {
            debug!("attribute {} requires replacement", path);
            requires_replace.push(path);
        }
        planned.insert(attr.name.clone(), plan_value);
    }

    PlannedChange {
        planned_state: DynamicValue::new(Dynamic::Map(planned)),
        requires_replace,
        diagnostics,
    }
}

/// Routes stored state to the resource's upgrader when it was written with
/// an older schema version. Current-version state is decoded as is.
pub async fn upgrade_resource_state(
    ctx: Context,
    resource: &dyn Resource,
    schema: &Schema,
    request: UpgradeResourceStateRequest,
) -> UpgradeResourceStateResponse {
    if request.version > schema.version {
        return UpgradeResourceStateResponse {
            upgraded_state: DynamicValue::null(),
            diagnostics: vec![Diagnostic::error(
                "Unable to Upgrade Resource State",
                TfplugError::UpgradeFailed(format!(
                    "state for {} was written by a newer provider (schema version {}, this provider supports {})",
                    request.type_name, request.version, schema.version
                ))
                .to_string(),
            )],
        };
    }

    if request.version == schema.version {
        return match request.raw_state.decode() {
            Ok(upgraded_state) => UpgradeResourceStateResponse {
                upgraded_state,
                diagnostics: vec![],
            },
            Err(e) => UpgradeResourceStateResponse {
                upgraded_state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error(
                    "Unable to Read Previously Saved State",
                    e.to_string(),
                )],
            },
        };
    }

    debug!(
        "upgrading {} state from version {} to {}",
        request.type_name, request.version, schema.version
    );
    resource.upgrade_state(ctx, request).await
}
