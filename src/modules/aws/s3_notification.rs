use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::clients::{LambdaNotification, S3Operations};
use crate::modules::{Applied, ResourceModule};
use crate::reconcile::descriptor::{
    Attributes, Field, FieldRole, FieldType, ResourceSpec, Schema,
};
use crate::reconcile::error::{BoundaryError, ReconcileError};

static FIELDS: &[Field] = &[
    Field::new("bucket", FieldType::String, FieldRole::Key),
    Field::new("id", FieldType::String, FieldRole::Key),
    Field::new("lambda_function_arn", FieldType::String, FieldRole::Mutable),
    Field::new("events", FieldType::StringSet, FieldRole::Mutable),
    Field::new("prefix", FieldType::String, FieldRole::Mutable),
    Field::new("suffix", FieldType::String, FieldRole::Mutable),
];

static SCHEMA: Schema = Schema {
    resource_type: "s3_notification",
    name_field: "bucket",
    qualifier_field: Some("id"),
    fields: FIELDS,
};

fn attributes(bucket: &str, notification: &LambdaNotification) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("bucket".to_string(), bucket.into());
    attrs.insert("id".to_string(), notification.id.as_str().into());
    attrs.insert(
        "lambda_function_arn".to_string(),
        notification.lambda_function_arn.as_str().into(),
    );
    attrs.insert(
        "events".to_string(),
        JsonValue::from(notification.events.clone()),
    );
    if let Some(prefix) = &notification.prefix {
        attrs.insert("prefix".to_string(), prefix.as_str().into());
    }
    if let Some(suffix) = &notification.suffix {
        attrs.insert("suffix".to_string(), suffix.as_str().into());
    }
    attrs
}

/// One Lambda trigger inside a bucket's notification configuration.
///
/// The bucket holds a single notification document, so every write reads the
/// current document, edits the entry with this `id` and writes the rest back
/// untouched.
pub struct S3NotificationModule {
    s3: Arc<dyn S3Operations>,
}

impl S3NotificationModule {
    pub fn new(s3: Arc<dyn S3Operations>) -> Self {
        Self { s3 }
    }

    fn id(spec: &ResourceSpec) -> &str {
        spec.key.qualifier.as_deref().unwrap_or_default()
    }

    fn desired(spec: &ResourceSpec) -> LambdaNotification {
        LambdaNotification {
            id: Self::id(spec).to_string(),
            lambda_function_arn: spec
                .str("lambda_function_arn")
                .unwrap_or_default()
                .to_string(),
            events: spec.strings("events"),
            prefix: spec.str("prefix").map(str::to_string),
            suffix: spec.str("suffix").map(str::to_string),
        }
    }

    /// Overwrites only the keys present in `changes`; filters the document
    /// leaves out keep their live values.
    fn apply_changes(notification: &mut LambdaNotification, changes: &Attributes) {
        let text = |name: &str| changes.get(name).and_then(|v| v.as_str()).map(str::to_string);

        if let Some(arn) = text("lambda_function_arn") {
            notification.lambda_function_arn = arn;
        }
        if let Some(events) = changes.get("events").and_then(|v| v.as_array()) {
            notification.events = events
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect();
        }
        if let Some(prefix) = text("prefix") {
            notification.prefix = Some(prefix);
        }
        if let Some(suffix) = text("suffix") {
            notification.suffix = Some(suffix);
        }
    }

    async fn write(
        &self,
        bucket: &str,
        notifications: &[LambdaNotification],
        entry: &LambdaNotification,
    ) -> Result<Applied, BoundaryError> {
        self.s3
            .put_lambda_notifications(bucket, notifications)
            .await?;
        Ok(Applied::complete(attributes(bucket, entry)))
    }
}

#[async_trait]
impl ResourceModule for S3NotificationModule {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn check(&self, spec: &ResourceSpec) -> Result<(), ReconcileError> {
        if spec.key.qualifier.is_none() {
            return Err(ReconcileError::validation(
                "'id' is required for resource type 's3_notification'",
            ));
        }
        if spec.is_present() {
            spec.require_str("lambda_function_arn")?;
            if spec.strings("events").is_empty() {
                return Err(ReconcileError::validation(
                    "'events' must list at least one event when state is 'present'",
                ));
            }
        }
        Ok(())
    }

    async fn describe(&self, spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        let bucket = &spec.key.name;
        let id = Self::id(spec);

        self.s3
            .get_lambda_notifications(bucket)
            .await?
            .iter()
            .find(|n| n.id == id)
            .map(|n| attributes(bucket, n))
            .ok_or_else(|| {
                BoundaryError::not_found(format!("no notification {} on bucket {}", id, bucket))
            })
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError> {
        let bucket = &spec.key.name;
        let desired = Self::desired(spec);

        let mut notifications = self.s3.get_lambda_notifications(bucket).await?;
        match notifications.iter_mut().find(|n| n.id == desired.id) {
            Some(existing) => *existing = desired.clone(),
            None => notifications.push(desired.clone()),
        }
        self.write(bucket, &notifications, &desired).await
    }

    async fn update(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
        changes: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let bucket = &spec.key.name;
        let id = Self::id(spec);

        let mut notifications = self.s3.get_lambda_notifications(bucket).await?;
        let entry = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| {
                BoundaryError::not_found(format!("no notification {} on bucket {}", id, bucket))
            })?;
        Self::apply_changes(entry, changes);
        let entry = entry.clone();

        self.write(bucket, &notifications, &entry).await
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        _current: &Attributes,
    ) -> Result<Applied, BoundaryError> {
        let bucket = &spec.key.name;
        let id = Self::id(spec);

        let mut notifications = self.s3.get_lambda_notifications(bucket).await?;
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == before {
            return Err(BoundaryError::not_found(format!(
                "no notification {} on bucket {}",
                id, bucket
            )));
        }

        self.s3
            .put_lambda_notifications(bucket, &notifications)
            .await?;
        Ok(Applied::incomplete())
    }
}
