use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::clients::{LambdaOperations, PermissionRequest};
use super::utils::check_function_name;
use crate::modules::{Applied, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, DefaultValue, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("statement_id", FieldType::String, FieldRole::Key),
    Field::new("qualifier", FieldType::String, FieldRole::WriteOnly),
    Field::new("action", FieldType::String, FieldRole::CreateOnly)
        .with_default(DefaultValue::String("lambda:InvokeFunction")),
    Field::new("principal", FieldType::String, FieldRole::CreateOnly),
    Field::new("source_arn", FieldType::String, FieldRole::CreateOnly),
    Field::new("source_account", FieldType::String, FieldRole::CreateOnly),
    Field::new("event_source_token", FieldType::String, FieldRole::CreateOnly),
];

static SCHEMA: Schema = Schema {
    resource_type: "permission",
    name_field: "function_name",
    qualifier_field: Some("statement_id"),
    fields: FIELDS,
};

/// Reduces an account root principal (`arn:aws:iam::<id>:root`) to the bare
/// account id. Any other principal is returned unchanged.
pub fn normalize_principal(principal: &str) -> String {
    Regex::new(r"^arn:aws[\w-]*:iam::(\d{12}):root$")
        .ok()
        .and_then(|re| re.captures(principal))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| principal.to_string())
}

/// Flattens one resource-policy statement into permission attributes.
///
/// Account root principals are reported as the bare account id, which is how
/// they are usually declared.
pub fn statement_attributes(statement: &JsonValue) -> Attributes {
    let mut attrs = Attributes::new();

    if let Some(sid) = statement.get("Sid").and_then(|v| v.as_str()) {
        attrs.insert("statement_id".to_string(), sid.into());
    }
    if let Some(action) = statement.get("Action").and_then(|v| v.as_str()) {
        attrs.insert("action".to_string(), action.into());
    }

    let principal = match statement.get("Principal") {
        Some(JsonValue::String(p)) => Some(p.clone()),
        Some(JsonValue::Object(p)) => p
            .get("Service")
            .or_else(|| p.get("AWS"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    };
    if let Some(principal) = principal {
        attrs.insert("principal".to_string(), normalize_principal(&principal).into());
    }

    let condition = statement.get("Condition");
    let lookup = |operator: &str, key: &str| {
        condition
            .and_then(|c| c.get(operator))
            .and_then(|o| o.get(key))
            .and_then(|v| v.as_str())
            .map(|s| JsonValue::from(s))
    };

    if let Some(arn) = lookup("ArnLike", "AWS:SourceArn") {
        attrs.insert("source_arn".to_string(), arn);
    }
    if let Some(account) = lookup("StringEquals", "AWS:SourceAccount") {
        attrs.insert("source_account".to_string(), account);
    }
    if let Some(token) = lookup("StringEquals", "lambda:EventSourceToken") {
        attrs.insert("event_source_token".to_string(), token);
    }

    attrs
}

/// Resource-based policy statements on a function. Statements cannot be
/// edited, so any drift is reported as a conflict.
pub struct PermissionModule {
    lambda: Arc<dyn LambdaOperations>,
}

impl PermissionModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>) -> Self {
        Self { lambda }
    }

    fn statement_id(spec: &ResourceSpec) -> &str {
        spec.key.qualifier.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl ResourceModule for PermissionModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;
        if spec.key.qualifier.is_none() {
            return Err(ReconcileError::validation(
                "'statement_id' is required for resource type 'permission'",
            ));
        }
        if spec.is_present() {
            spec.require_str("principal")?;
        }
        Ok(())
    }

    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        if let Some(principal) = spec.str("principal").map(normalize_principal) {
            spec.attributes
                .insert("principal".to_string(), principal.into());
        }
        Ok(())
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        let policy = self
            .lambda
            .get_policy(&spec.key.name, spec.str("qualifier"))
            .await?;

        let sid = Self::statement_id(spec);
        policy
            .get("Statement")
            .and_then(|s| s.as_array())
            .and_then(|statements| {
                statements
                    .iter()
                    .find(|s| s.get("Sid").and_then(|v| v.as_str()) == Some(sid))
            })
            .map(|statement| {
                let mut attrs = statement_attributes(statement);
                attrs.insert("function_name".to_string(), spec.key.name.clone().into());
                attrs
            })
            .ok_or_else(|| {
                BoundaryError::not_found(format!("statement {} not found in policy", sid))
            })
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let owned = |name: &str| spec.str(name).map(str::to_string);
        let request = PermissionRequest {
            function_name: spec.key.name.clone(),
            statement_id: Self::statement_id(spec).to_string(),
            action: spec
                .str("action")
                .unwrap_or("lambda:InvokeFunction")
                .to_string(),
            principal: spec.str("principal").unwrap_or_default().to_string(),
            source_arn: owned("source_arn"),
            source_account: owned("source_account"),
            event_source_token: owned("event_source_token"),
            qualifier: owned("qualifier"),
        };

        let statement = self.lambda.add_permission(&request).await?;
        let mut state = statement_attributes(&statement);
        state.insert("function_name".to_string(), spec.key.name.clone().into());
        Ok(Applied::complete(state))
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
        _changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        Err(BoundaryError::conflict(format!(
            "statement {} cannot be modified in place",
            Self::statement_id(spec)
        )))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        self.lambda
            .remove_permission(
                &spec.key.name,
                Self::statement_id(spec),
                spec.str("qualifier"),
            )
            .await?;
        Ok(Applied::incomplete())
    }
}
