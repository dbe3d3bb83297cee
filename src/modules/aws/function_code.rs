use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::clients::LambdaOperations;
use super::function::{check_code_source, code_location};
use super::utils::{check_function_name, package_sha256};
use crate::modules::{Applied, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, DefaultValue, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("code_sha256", FieldType::String, FieldRole::Mutable),
    Field::new("s3_bucket", FieldType::String, FieldRole::WriteOnly),
    Field::new("s3_key", FieldType::String, FieldRole::WriteOnly),
    Field::new("s3_object_version", FieldType::String, FieldRole::WriteOnly),
    Field::new("local_path", FieldType::String, FieldRole::WriteOnly),
    Field::new("publish", FieldType::Boolean, FieldRole::WriteOnly)
        .with_default(DefaultValue::Boolean(false)),
];

static SCHEMA: Schema = Schema {
    resource_type: "function_code",
    name_field: "function_name",
    qualifier_field: None,
    fields: FIELDS,
};

/// Keeps the deployed package of an existing function in line with a local
/// archive or an S3 object.
pub struct FunctionCodeModule {
    lambda: Arc<dyn LambdaOperations>,
}

impl FunctionCodeModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>) -> Self {
        Self { lambda }
    }
}

#[async_trait]
impl ResourceModule for FunctionCodeModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;

        if !spec.is_present() {
            return Err(ReconcileError::validation(
                "function_code does not support state 'absent'; remove the function instead",
            ));
        }

        check_code_source(spec)?;

        if spec.is_declared("local_path") {
            return Ok(());
        }
        if spec.is_declared("s3_bucket") && spec.is_declared("code_sha256") {
            return Ok(());
        }
        Err(ReconcileError::validation(
            "either 'local_path', or 's3_bucket' and 's3_key' with 'code_sha256', is required",
        ))
    }

    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        let Some(path) = spec.str("local_path").map(str::to_string) else {
            return Ok(());
        };

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ReconcileError::validation(format!("cannot read 'local_path' {}: {}", path, e))
        })?;
        let digest = package_sha256(&bytes);
        debug!("{} hashes to {}", path, digest);

        if let Some(declared) = spec.str("code_sha256") {
            if declared != digest {
                return Err(ReconcileError::validation(format!(
                    "declared 'code_sha256' {} does not match {} ({})",
                    declared, path, digest
                )));
            }
        }

        spec.attributes
            .insert("code_sha256".to_string(), digest.into());
        Ok(())
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        self.lambda
            .get_function_configuration(&spec.key.name, None)
            .await
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        Err(BoundaryError::conflict(format!(
            "function {} does not exist; declare it with type 'function' first",
            spec.key.name
        )))
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
        _changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let code = code_location(spec)
            .await?
            .ok_or_else(|| BoundaryError::unknown("no deployment package declared"))?;
        let publish = spec.bool("publish").unwrap_or(false);

        let state = self
            .lambda
            .update_function_code(&spec.key.name, &code, publish)
            .await?;

        let mut applied = Applied::complete(state.clone());
        if publish {
            if let Some(version) = state.get("version") {
                applied = applied.with_metadata("version", version.clone());
            }
        }
        Ok(applied)
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        Err(BoundaryError::unknown(format!(
            "function_code cannot delete {}",
            spec.key.name
        )))
    }
}
