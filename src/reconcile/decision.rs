use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::descriptor::{Attributes, FieldRole, FieldType, Lifecycle, ResourceSpec, Schema};
use super::error::ReconcileError;
use super::fetcher::RemoteState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    None,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::None)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Declared values that differ from the remote state. Only set for `Update`.
    pub changes: Attributes,
}

impl Decision {
    fn of(action: Action) -> Self {
        Self {
            action,
            changes: Attributes::new(),
        }
    }
}

/// Classifies the corrective action for one resource.
///
/// Drift on a create-only field is reported as a conflict rather than an
/// update, since the service cannot apply it in place.
pub fn decide(
    schema: &Schema,
    spec: &ResourceSpec,
    remote: &RemoteState,
) -> Result<Decision, ReconcileError> {
    match (spec.lifecycle, remote) {
        (Lifecycle::Present, RemoteState::Absent) => Ok(Decision::of(Action::Create)),
        (Lifecycle::Absent, RemoteState::Absent) => Ok(Decision::of(Action::None)),
        (Lifecycle::Absent, RemoteState::Present(_)) => Ok(Decision::of(Action::Delete)),
        (Lifecycle::Present, RemoteState::Present(current)) => {
            let changes = diff(schema, spec, current);

            let immutable: Vec<&str> = changes
                .keys()
                .filter(|name| {
                    schema
                        .field(name)
                        .is_some_and(|f| f.role == FieldRole::CreateOnly)
                })
                .map(String::as_str)
                .collect();

            if !immutable.is_empty() {
                return Err(ReconcileError::conflict(
                    &spec.key,
                    format!(
                        "{} cannot be changed in place; delete and recreate the resource",
                        immutable.join(", ")
                    ),
                ));
            }

            if changes.is_empty() {
                Ok(Decision::of(Action::None))
            } else {
                Ok(Decision {
                    action: Action::Update,
                    changes,
                })
            }
        }
    }
}

/// Returns the declared, compared fields whose value differs from `current`.
pub fn diff(schema: &Schema, spec: &ResourceSpec, current: &Attributes) -> Attributes {
    schema
        .fields
        .iter()
        .filter(|field| field.is_compared())
        .filter_map(|field| {
            let desired = spec.get(field.name)?;
            let actual = current.get(field.name).unwrap_or(&JsonValue::Null);
            if values_match(field.kind, desired, actual) {
                None
            } else {
                Some((field.name.to_string(), desired.clone()))
            }
        })
        .collect()
}

pub fn values_match(kind: FieldType, desired: &JsonValue, actual: &JsonValue) -> bool {
    match kind {
        FieldType::StringSet => as_set(desired) == as_set(actual),
        FieldType::StringList => match (desired, actual) {
            (JsonValue::Array(d), JsonValue::Null) => d.is_empty(),
            _ => desired == actual,
        },
        FieldType::StringMap => match (desired, actual) {
            (JsonValue::Object(d), JsonValue::Null) => d.is_empty(),
            _ => desired == actual,
        },
        FieldType::String | FieldType::Integer | FieldType::Boolean => desired == actual,
    }
}

fn as_set(value: &JsonValue) -> BTreeSet<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
