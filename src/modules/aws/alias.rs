use std::sync::Arc;

use async_trait::async_trait;

use super::clients::{AliasRequest, LambdaOperations};
use super::utils::check_function_name;
use crate::modules::{Applied, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, DefaultValue, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

pub const LATEST: &str = "$LATEST";

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("name", FieldType::String, FieldRole::Key),
    Field::new("function_version", FieldType::String, FieldRole::Mutable)
        .with_default(DefaultValue::String(LATEST)),
    Field::new("description", FieldType::String, FieldRole::Mutable),
    Field::new("alias_arn", FieldType::String, FieldRole::ServerAssigned),
    Field::new("revision_id", FieldType::String, FieldRole::ServerAssigned),
];

static SCHEMA: Schema = Schema {
    resource_type: "alias",
    name_field: "function_name",
    qualifier_field: Some("name"),
    fields: FIELDS,
};

pub struct AliasModule {
    lambda: Arc<dyn LambdaOperations>,
}

impl AliasModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>) -> Self {
        Self { lambda }
    }

    fn alias_name(spec: &ResourceSpec) -> &str {
        spec.key.qualifier.as_deref().unwrap_or_default()
    }

    fn request(spec: &ResourceSpec, changes: Option<&Attributes>) -> AliasRequest {
        let wanted = |name: &str| changes.map_or(true, |c| c.contains_key(name));
        AliasRequest {
            function_name: spec.key.name.clone(),
            name: Self::alias_name(spec).to_string(),
            function_version: spec
                .str("function_version")
                .filter(|_| wanted("function_version"))
                .map(str::to_string),
            description: spec
                .str("description")
                .filter(|_| wanted("description"))
                .map(str::to_string),
        }
    }
}

#[async_trait]
impl ResourceModule for AliasModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;
        if spec.key.qualifier.is_none() {
            return Err(ReconcileError::validation(
                "'name' is required for resource type 'alias'",
            ));
        }
        Ok(())
    }

    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        // Version 0 is shorthand for the unpublished code.
        if spec.str("function_version") == Some("0") {
            spec.attributes
                .insert("function_version".to_string(), LATEST.into());
        }
        Ok(())
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        self.lambda
            .get_alias(&spec.key.name, Self::alias_name(spec))
            .await
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let state = self.lambda.create_alias(&Self::request(spec, None)).await?;
        Ok(Applied::complete(state))
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
        changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let revision = current.get("revision_id").and_then(|v| v.as_str());
        let state = self
            .lambda
            .update_alias(&Self::request(spec, Some(changes)), revision)
            .await?;
        Ok(Applied::complete(state))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        self.lambda
            .delete_alias(&spec.key.name, Self::alias_name(spec))
            .await?;
        Ok(Applied::incomplete())
    }
}
