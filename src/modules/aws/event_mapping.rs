use std::sync::Arc;

use async_trait::async_trait;

use super::clients::{EventMappingRequest, LambdaOperations};
use super::utils::{check_function_name, check_range};
use crate::modules::{Applied, Lookup, Page, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, DefaultValue, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("function_name", FieldType::String, FieldRole::Key),
    Field::new("event_source_arn", FieldType::String, FieldRole::Key),
    Field::new("uuid", FieldType::String, FieldRole::WriteOnly),
    Field::new("batch_size", FieldType::Integer, FieldRole::Mutable),
    Field::new("enabled", FieldType::Boolean, FieldRole::Mutable)
        .with_default(DefaultValue::Boolean(true)),
    Field::new("starting_position", FieldType::String, FieldRole::CreateOnly),
    Field::new("state", FieldType::String, FieldRole::ServerAssigned),
    Field::new("last_modified", FieldType::String, FieldRole::ServerAssigned),
    Field::new("function_arn", FieldType::String, FieldRole::ServerAssigned),
];

static SCHEMA: Schema = Schema {
    resource_type: "event_mapping",
    name_field: "function_name",
    qualifier_field: Some("event_source_arn"),
    fields: FIELDS,
};

const STARTING_POSITIONS: &[&str] = &["TRIM_HORIZON", "LATEST", "AT_TIMESTAMP"];

/// Connects a stream or queue to a function.
pub struct EventMappingModule {
    lambda: Arc<dyn LambdaOperations>,
}

impl EventMappingModule {
    pub fn new(lambda: Arc<dyn LambdaOperations>) -> Self {
        Self { lambda }
    }

    fn source_arn(spec: &ResourceSpec) -> &str {
        spec.key.qualifier.as_deref().unwrap_or_default()
    }

    fn with_function_name(spec: &ResourceSpec, mut state: Attributes) -> Attributes {
        state.insert("function_name".to_string(), spec.key.name.clone().into());
        state
    }
}

#[async_trait]
impl ResourceModule for EventMappingModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        check_function_name(&spec.key.name)?;
        if spec.key.qualifier.is_none() {
            return Err(ReconcileError::validation(
                "'event_source_arn' is required for resource type 'event_mapping'",
            ));
        }
        check_range("batch_size", spec.int("batch_size"), 1, 10000)?;

        if let Some(position) = spec.str("starting_position") {
            if !STARTING_POSITIONS.contains(&position) {
                return Err(ReconcileError::validation(format!(
                    "'starting_position' must be one of {}, got '{}'",
                    STARTING_POSITIONS.join(", "),
                    position
                )));
            }
        }
        Ok(())
    }

    fn lookup(&self, spec: &ResourceSpec) -> Lookup {
        if spec.is_declared("uuid") {
            Lookup::Describe
        } else {
            Lookup::Scan
        }
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        let uuid = spec.str("uuid").unwrap_or_default();
        let state = self.lambda.get_event_source_mapping(uuid).await?;

        // A uuid pointing at another source must never be updated or deleted.
        let source = state.get("event_source_arn").and_then(|v| v.as_str());
        if source != Some(Self::source_arn(spec)) {
            return Err(BoundaryError::conflict(format!(
                "mapping {} belongs to event source {}, not {}",
                uuid,
                source.unwrap_or("<unknown>"),
                Self::source_arn(spec)
            )));
        }
        Ok(Self::with_function_name(spec, state))
    }

    async fn list(
        &self,
        spec: &ResourceSpec,
        marker: Option<String>,
    ) -> Result<Page, BoundaryError> {
        let mut page = self
            .lambda
            .list_event_source_mappings(
                Some(&spec.key.name),
                Some(Self::source_arn(spec)),
                marker,
            )
            .await?;

        page.items = page
            .items
            .into_iter()
            .map(|item| Self::with_function_name(spec, item))
            .collect();
        Ok(page)
    }

    fn matches(&self, spec: &ResourceSpec, item: &Attributes) -> bool {
        item.get("event_source_arn").and_then(|v| v.as_str()) == Some(Self::source_arn(spec))
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let request = EventMappingRequest {
            uuid: None,
            function_name: spec.key.name.clone(),
            event_source_arn: Self::source_arn(spec).to_string(),
            batch_size: spec.int("batch_size").and_then(|v| i32::try_from(v).ok()),
            enabled: spec.bool("enabled"),
            starting_position: spec.str("starting_position").map(str::to_string),
        };

        let state = self.lambda.create_event_source_mapping(&request).await?;
        let uuid = state.get("uuid").cloned().unwrap_or_default();
        Ok(Applied::complete(Self::with_function_name(spec, state)).with_metadata("uuid", uuid))
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
        changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let request = EventMappingRequest {
            uuid: current
                .get("uuid")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            function_name: spec.key.name.clone(),
            event_source_arn: Self::source_arn(spec).to_string(),
            batch_size: changes
                .get("batch_size")
                .and_then(|v| v.as_i64())
                .and_then(|v| i32::try_from(v).ok()),
            enabled: changes.get("enabled").and_then(|v| v.as_bool()),
            starting_position: None,
        };

        let state = self.lambda.update_event_source_mapping(&request).await?;
        Ok(Applied::complete(Self::with_function_name(spec, state)))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let uuid = current
            .get("uuid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BoundaryError::unknown("event source mapping has no uuid"))?;

        self.lambda.delete_event_source_mapping(uuid).await?;
        Ok(Applied::incomplete().with_metadata("uuid", uuid))
    }
}
