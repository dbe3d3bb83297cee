use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::clients::{
    CodeLocation, FunctionRequest, IamOperations, LambdaOperations, VpcSettings,
};
use super::utils::{check_function_name, check_range};
use crate::modules::{Applied, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, DefaultValue, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("runtime", FieldType::String, FieldRole::Mutable),
    Field::new("role", FieldType::String, FieldRole::Mutable),
    Field::new("handler", FieldType::String, FieldRole::Mutable),
    Field::new("description", FieldType::String, FieldRole::Mutable),
    Field::new("timeout", FieldType::Integer, FieldRole::Mutable)
        .with_default(DefaultValue::Integer(3)),
    Field::new("memory_size", FieldType::Integer, FieldRole::Mutable)
        .with_default(DefaultValue::Integer(128)),
    Field::new("environment", FieldType::StringMap, FieldRole::Mutable),
    Field::new("vpc_subnet_ids", FieldType::StringSet, FieldRole::Mutable),
    Field::new("vpc_security_group_ids", FieldType::StringSet, FieldRole::Mutable),
    Field::new("s3_bucket", FieldType::String, FieldRole::WriteOnly),
    Field::new("s3_key", FieldType::String, FieldRole::WriteOnly),
    Field::new("s3_object_version", FieldType::String, FieldRole::WriteOnly),
    Field::new("local_path", FieldType::String, FieldRole::WriteOnly),
    Field::new("publish", FieldType::Boolean, FieldRole::WriteOnly)
        .with_default(DefaultValue::Boolean(false)),
    Field::new("function_arn", FieldType::String, FieldRole::ServerAssigned),
    Field::new("last_modified", FieldType::String, FieldRole::ServerAssigned),
    Field::new("code_size", FieldType::Integer, FieldRole::ServerAssigned),
    Field::new("code_sha256", FieldType::String, FieldRole::ServerAssigned),
    Field::new("version", FieldType::String, FieldRole::ServerAssigned),
    Field::new("revision_id", FieldType::String, FieldRole::ServerAssigned),
];

static SCHEMA: Schema = Schema {
    resource_type: "function",
    name_field: "function_name",
    qualifier_field: None,
    fields: FIELDS,
};

/// Checks the deployment package source: either a local archive or an S3 object.
pub(crate) fn check_code_source(spec: &ResourceSpec) -> Result<(), ReconcileError> {
    let local = spec.is_declared("local_path");
    let bucket = spec.is_declared("s3_bucket");
    let key = spec.is_declared("s3_key");

    if local && (bucket || key) {
        return Err(ReconcileError::validation(
            "'local_path' and 's3_bucket'/'s3_key' are mutually exclusive",
        ));
    }
    if bucket != key {
        return Err(ReconcileError::validation(
            "'s3_bucket' and 's3_key' are required together",
        ));
    }
    if spec.is_declared("s3_object_version") && !bucket {
        return Err(ReconcileError::validation(
            "'s3_object_version' requires 's3_bucket' and 's3_key'",
        ));
    }
    Ok(())
}

/// Resolves the declared package into something the boundary can upload.
pub(crate) async fn code_location(spec: &ResourceSpec) -> Result<Option<CodeLocation>, BoundaryError> {
    if let (Some(bucket), Some(key)) = (spec.str("s3_bucket"), spec.str("s3_key")) {
        return Ok(Some(CodeLocation::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
            object_version: spec.str("s3_object_version").map(str::to_string),
        }));
    }

    match spec.str("local_path") {
        Some(path) => tokio::fs::read(path)
            .await
            .map(|bytes| Some(CodeLocation::ZipFile(bytes)))
            .map_err(|e| BoundaryError::unknown(format!("failed to read {}: {}", path, e))),
        None => Ok(None),
    }
}

fn as_i32(value: Option<i64>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

pub struct FunctionModule {
    lambda: Arc<dyn LambdaOperations>,
    iam: Arc<dyn IamOperations>,
}

impl FunctionModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>, iam: Arc<dyn IamOperations>) -> Self {
        Self { lambda, iam }
    }

    fn vpc(spec: &ResourceSpec) -> Option<VpcSettings> {
        if !spec.is_declared("vpc_subnet_ids") && !spec.is_declared("vpc_security_group_ids") {
            return None;
        }
        Some(VpcSettings {
            subnet_ids: spec.strings("vpc_subnet_ids"),
            security_group_ids: spec.strings("vpc_security_group_ids"),
        })
    }
}

#[async_trait]
impl ResourceModule for FunctionModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;
        check_range("timeout", spec.int("timeout"), 1, 900)?;
        check_range("memory_size", spec.int("memory_size"), 128, 10240)?;
        check_code_source(spec)?;

        let subnets = spec.strings("vpc_subnet_ids");
        let groups = spec.strings("vpc_security_group_ids");
        if subnets.is_empty() != groups.is_empty() {
            return Err(ReconcileError::validation(
                "'vpc_subnet_ids' and 'vpc_security_group_ids' are required together",
            ));
        }

        if spec.is_present() {
            for name in ["runtime", "role", "handler"] {
                spec.require_str(name)?;
            }
            if !spec.is_declared("local_path") && !spec.is_declared("s3_bucket") {
                return Err(ReconcileError::validation(
                    "either 'local_path' or 's3_bucket' and 's3_key' is required when state is 'present'",
                ));
            }
        }

        Ok(())
    }

    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        let role = match spec.str("role") {
            Some(role) if !role.starts_with("arn:aws:iam:") => role.to_string(),
            _ => return Ok(()),
        };

        let account = self
            .iam
            .account_id()
            .await
            .map_err(|source| ReconcileError::Fetch {
                key: format!("role {}", role),
                source,
            })?;

        let arn = format!("arn:aws:iam::{}:role/{}", account, role);
        info!("Expanded role {} to {}", role, arn);
        spec.attributes.insert("role".to_string(), arn.into());
        Ok(())
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        self.lambda
            .get_function_configuration(&spec.key.name, None)
            .await
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let request = FunctionRequest {
            function_name: spec.key.name.clone(),
            runtime: spec.str("runtime").map(str::to_string),
            role: spec.str("role").map(str::to_string),
            handler: spec.str("handler").map(str::to_string),
            description: spec.str("description").map(str::to_string),
            timeout: as_i32(spec.int("timeout")),
            memory_size: as_i32(spec.int("memory_size")),
            environment: spec.string_map("environment"),
            vpc: Self::vpc(spec),
            code: code_location(spec).await?,
            publish: spec.bool("publish").unwrap_or(false),
            revision_id: None,
        };

        let state = self.lambda.create_function(&request).await?;
        let mut applied = Applied::complete(state.clone());
        if request.publish {
            if let Some(version) = state.get("version") {
                applied = applied.with_metadata("version", version.clone());
            }
        }
        Ok(applied)
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
        changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let changed = |name: &str| changes.contains_key(name);
        let text = |name: &str| {
            changed(name)
                .then(|| spec.str(name).map(str::to_string))
                .flatten()
        };

        // Both VPC lists travel together, as the service replaces the whole block.
        let vpc = if changed("vpc_subnet_ids") || changed("vpc_security_group_ids") {
            Some(VpcSettings {
                subnet_ids: spec.strings("vpc_subnet_ids"),
                security_group_ids: spec.strings("vpc_security_group_ids"),
            })
        } else {
            None
        };

        let request = FunctionRequest {
            function_name: spec.key.name.clone(),
            runtime: text("runtime"),
            role: text("role"),
            handler: text("handler"),
            description: text("description"),
            timeout: changed("timeout").then(|| as_i32(spec.int("timeout"))).flatten(),
            memory_size: changed("memory_size")
                .then(|| as_i32(spec.int("memory_size")))
                .flatten(),
            environment: changed("environment")
                .then(|| spec.string_map("environment"))
                .flatten(),
            vpc,
            code: None,
            publish: false,
            revision_id: current
                .get("revision_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        };

        let state = self.lambda.update_function_configuration(&request).await?;
        Ok(Applied::complete(state))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        self.lambda.delete_function(&spec.key.name, None).await?;
        Ok(Applied::incomplete())
    }
}
