use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::error::ReconcileError;

pub type Attributes = Map<String, JsonValue>;

/// Reserved input field naming the resource type.
pub const TYPE_FIELD: &str = "type";
/// Reserved input field carrying the desired lifecycle.
pub const STATE_FIELD: &str = "state";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Present,
    Absent,
}

impl Lifecycle {
    fn parse(value: &JsonValue) -> Result<Self, ReconcileError> {
        match value.as_str() {
            Some("present") => Ok(Lifecycle::Present),
            Some("absent") => Ok(Lifecycle::Absent),
            _ => Err(ReconcileError::validation(format!(
                "'{}' must be 'present' or 'absent', got {}",
                STATE_FIELD, value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub name: String,
    pub qualifier: Option<String>,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}:{}", self.name, qualifier),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    StringList,
    /// Order-insensitive list; compared as a set.
    StringSet,
    StringMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Identifies the resource; used for lookup, never diffed.
    Key,
    /// Compared and changed in place.
    Mutable,
    /// Compared, but drift cannot be corrected in place.
    CreateOnly,
    /// Sent to the service, never compared.
    WriteOnly,
    /// Produced by the service; cannot be declared.
    ServerAssigned,
}

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Integer(i64),
    Boolean(bool),
    String(&'static str),
}

impl DefaultValue {
    fn to_json(self) -> JsonValue {
        match self {
            DefaultValue::Integer(value) => JsonValue::from(value),
            DefaultValue::Boolean(value) => JsonValue::Bool(value),
            DefaultValue::String(value) => JsonValue::from(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
    pub role: FieldRole,
    pub default: Option<DefaultValue>,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldType, role: FieldRole) -> Self {
        Self {
            name,
            kind,
            role,
            default: None,
        }
    }

    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_compared(&self) -> bool {
        matches!(self.role, FieldRole::Mutable | FieldRole::CreateOnly)
    }
}

/// Static description of the attributes a resource type accepts.
#[derive(Debug)]
pub struct Schema {
    pub resource_type: &'static str,
    pub name_field: &'static str,
    pub qualifier_field: Option<&'static str>,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The validated, normalized desired state of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub resource_type: String,
    pub key: ResourceKey,
    pub lifecycle: Lifecycle,
    pub attributes: Attributes,
}

impl ResourceSpec {
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        string_list(self.get(name))
    }

    pub fn string_map(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.get(name).and_then(|v| v.as_object()).map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
    }

    pub fn is_present(&self) -> bool {
        self.lifecycle == Lifecycle::Present
    }

    pub fn require_str(&self, name: &str) -> Result<&str, ReconcileError> {
        self.str(name).ok_or_else(|| {
            ReconcileError::validation(format!(
                "'{}' is required for resource type '{}' with state '{}'",
                name,
                self.resource_type,
                if self.is_present() { "present" } else { "absent" }
            ))
        })
    }
}

pub fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a `ResourceSpec` from a raw input document.
///
/// Rejects unknown or server-assigned attributes, coerces scalar values to the
/// declared field type, and applies defaults when the target lifecycle is
/// `present`. A `null` value is treated as not declared.
pub fn validate(schema: &Schema, raw: &Attributes) -> Result<ResourceSpec, ReconcileError> {
    let mut lifecycle = Lifecycle::default();
    let mut attributes = Attributes::new();

    for (name, value) in raw {
        match name.as_str() {
            TYPE_FIELD => continue,
            STATE_FIELD => {
                lifecycle = Lifecycle::parse(value)?;
                continue;
            }
            _ => {}
        }

        let field = schema.field(name).ok_or_else(|| {
            ReconcileError::validation(format!(
                "unknown attribute '{}' for resource type '{}'",
                name, schema.resource_type
            ))
        })?;

        if field.role == FieldRole::ServerAssigned {
            return Err(ReconcileError::validation(format!(
                "'{}' is assigned by the service and cannot be declared",
                name
            )));
        }

        if value.is_null() {
            continue;
        }

        attributes.insert(name.clone(), coerce(field, value)?);
    }

    let name = attributes
        .get(schema.name_field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ReconcileError::validation(format!(
                "'{}' is required for resource type '{}'",
                schema.name_field, schema.resource_type
            ))
        })?
        .to_string();

    let qualifier = schema
        .qualifier_field
        .and_then(|field| attributes.get(field))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if lifecycle == Lifecycle::Present {
        for field in schema.fields {
            if let Some(default) = field.default {
                attributes
                    .entry(field.name.to_string())
                    .or_insert_with(|| default.to_json());
            }
        }
    }

    Ok(ResourceSpec {
        resource_type: schema.resource_type.to_string(),
        key: ResourceKey { name, qualifier },
        lifecycle,
        attributes,
    })
}

fn coerce(field: &Field, value: &JsonValue) -> Result<JsonValue, ReconcileError> {
    let mismatch = |expected: &str| {
        ReconcileError::validation(format!(
            "'{}' must be {}, got {}",
            field.name, expected, value
        ))
    };

    match field.kind {
        FieldType::String => scalar_string(value)
            .map(JsonValue::String)
            .ok_or_else(|| mismatch("a string")),
        FieldType::Integer => match value {
            JsonValue::Number(n) => n.as_i64().map(JsonValue::from),
            JsonValue::String(s) => s.trim().parse::<i64>().ok().map(JsonValue::from),
            _ => None,
        }
        .ok_or_else(|| mismatch("an integer")),
        FieldType::Boolean => match value {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
        .map(JsonValue::Bool)
        .ok_or_else(|| mismatch("a boolean")),
        FieldType::StringList | FieldType::StringSet => match value {
            JsonValue::Array(items) => items
                .iter()
                .map(scalar_string)
                .collect::<Option<Vec<_>>>()
                .map(|items| JsonValue::from(items)),
            JsonValue::String(s) => Some(JsonValue::from(vec![s.clone()])),
            _ => None,
        }
        .ok_or_else(|| mismatch("a list of strings")),
        FieldType::StringMap => match value {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| scalar_string(v).map(|s| (k.clone(), JsonValue::String(s))))
                .collect::<Option<Attributes>>()
                .map(JsonValue::Object),
            _ => None,
        }
        .ok_or_else(|| mismatch("a map of strings")),
    }
}

fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
