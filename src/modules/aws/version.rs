use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::alias::LATEST;
use super::clients::LambdaOperations;
use super::utils::check_function_name;
use crate::modules::{Applied, Lookup, Page, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("version", FieldType::String, FieldRole::Key),
    Field::new("code_sha256", FieldType::String, FieldRole::CreateOnly),
    Field::new("description", FieldType::String, FieldRole::WriteOnly),
];

static SCHEMA: Schema = Schema {
    resource_type: "version",
    name_field: "function_name",
    qualifier_field: Some("version"),
    fields: FIELDS,
};

/// Published, immutable snapshots of a function.
///
/// `present` publishes `$LATEST` unless a published version already carries
/// the same code hash; `absent` deletes one numbered version.
pub struct VersionModule {
    lambda: Arc<dyn LambdaOperations>,
}

impl VersionModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>) -> Self {
        Self { lambda }
    }
}

#[async_trait]
impl ResourceModule for VersionModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;

        match (&spec.key.qualifier, spec.is_present()) {
            (Some(_), true) => Err(ReconcileError::validation(
                "'version' is assigned by the service when publishing; omit it with state 'present'",
            )),
            (None, false) => Err(ReconcileError::validation(
                "'version' is required with state 'absent'",
            )),
            (Some(version), false) if version.parse::<u64>().is_err() => {
                Err(ReconcileError::validation(format!(
                    "'version' must be a published version number, got '{}'",
                    version
                )))
            }
            _ => Ok(()),
        }
    }

    async fn prepare(&self, spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        if !spec.is_present() || spec.is_declared("code_sha256") {
            return Ok(());
        }

        let latest = self
            .lambda
            .get_function_configuration(&spec.key.name, None)
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    ReconcileError::conflict(
                        &spec.key,
                        "cannot publish a version of a function that does not exist",
                    )
                } else {
                    ReconcileError::Fetch {
                        key: spec.key.to_string(),
                        source,
                    }
                }
            })?;

        let sha = latest
            .get("code_sha256")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ReconcileError::conflict(&spec.key, "$LATEST reports no code_sha256")
            })?
            .to_string();

        spec.attributes.insert("code_sha256".to_string(), sha.into());
        Ok(())
    }

    fn lookup(&self, spec: &ResourceSpec) -> Lookup {
        if spec.is_present() {
            Lookup::Scan
        } else {
            Lookup::Describe
        }
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        self.lambda
            .get_function_configuration(&spec.key.name, spec.key.qualifier.as_deref())
            .await
    }

    async fn list(
        &self,
        spec: &ResourceSpec,
        marker: Option<String>,
    ) -> Result<Page, BoundaryError> {
        self.lambda
            .list_versions_by_function(&spec.key.name, marker)
            .await
    }

    fn matches(&self, spec: &ResourceSpec, item: &Attributes) -> bool {
        let version = item.get("version").and_then(|v| v.as_str());
        version.is_some_and(|v| v != LATEST) && item.get("code_sha256") == spec.get("code_sha256")
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let state = self
            .lambda
            .publish_version(
                &spec.key.name,
                spec.str("description"),
                spec.str("code_sha256"),
            )
            .await?;

        let version = state.get("version").cloned().unwrap_or_default();
        info!("Published {} version {}", spec.key.name, version);
        Ok(Applied::complete(state).with_metadata("version", version))
    }

    async fn update(
        &self,
        _spec: &ResourceSpec,
        current: &Attributes,
        _changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        // Versions are immutable; drift on the hash is rejected before this point.
        Ok(Applied::complete(current.clone()))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let version = current
            .get("version")
            .and_then(|v| v.as_str())
            .or(spec.key.qualifier.as_deref())
            .ok_or_else(|| BoundaryError::unknown("no version to delete"))?;

        self.lambda
            .delete_function(&spec.key.name, Some(version))
            .await?;
        Ok(Applied::incomplete())
    }
}
