use async_trait::async_trait;
use aws_sdk_s3::types::{
    Event, FilterRule, FilterRuleName, LambdaFunctionConfiguration, NotificationConfiguration,
    NotificationConfigurationFilter, S3KeyFilter,
};
use aws_sdk_s3::Client as S3Client;
use log::info;

use super::traits::{BoundaryResult, LambdaNotification, S3Operations};
use crate::modules::aws::utils::classify;
use crate::reconcile::error::BoundaryError;

pub struct S3Service {
    client: S3Client,
}

impl S3Service {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

fn from_sdk(config: &LambdaFunctionConfiguration) -> LambdaNotification {
    let mut notification = LambdaNotification {
        id: config.id().unwrap_or_default().to_string(),
        lambda_function_arn: config.lambda_function_arn().to_string(),
        events: config.events().iter().map(|e| e.as_str().to_string()).collect(),
        prefix: None,
        suffix: None,
    };

    let rules = config
        .filter()
        .and_then(|f| f.key())
        .map(|k| k.filter_rules())
        .unwrap_or_default();

    for rule in rules {
        match rule.name() {
            Some(FilterRuleName::Prefix) => notification.prefix = rule.value().map(str::to_string),
            Some(FilterRuleName::Suffix) => notification.suffix = rule.value().map(str::to_string),
            _ => {}
        }
    }

    notification
}

fn to_sdk(notification: &LambdaNotification) -> BoundaryResult<LambdaFunctionConfiguration> {
    let mut rules = Vec::new();
    if let Some(prefix) = &notification.prefix {
        rules.push(FilterRule::builder().name(FilterRuleName::Prefix).value(prefix).build());
    }
    if let Some(suffix) = &notification.suffix {
        rules.push(FilterRule::builder().name(FilterRuleName::Suffix).value(suffix).build());
    }

    let filter = (!rules.is_empty()).then(|| {
        NotificationConfigurationFilter::builder()
            .key(S3KeyFilter::builder().set_filter_rules(Some(rules)).build())
            .build()
    });

    LambdaFunctionConfiguration::builder()
        .id(&notification.id)
        .lambda_function_arn(&notification.lambda_function_arn)
        .set_events(Some(
            notification.events.iter().map(|e| Event::from(e.as_str())).collect(),
        ))
        .set_filter(filter)
        .build()
        .map_err(|e| BoundaryError::unknown(format!("invalid notification {}: {}", notification.id, e)))
}

#[async_trait]
impl S3Operations for S3Service {
    async fn get_lambda_notifications(
        &self,
        bucket: &str,
    ) -> BoundaryResult<Vec<LambdaNotification>> {
        let output = self
            .client
            .get_bucket_notification_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("GetBucketNotificationConfiguration", e))?;

        Ok(output
            .lambda_function_configurations()
            .iter()
            .map(from_sdk)
            .collect())
    }

    async fn put_lambda_notifications(
        &self,
        bucket: &str,
        notifications: &[LambdaNotification],
    ) -> BoundaryResult<()> {
        let current = self
            .client
            .get_bucket_notification_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("GetBucketNotificationConfiguration", e))?;

        let lambda_configs = notifications
            .iter()
            .map(to_sdk)
            .collect::<BoundaryResult<Vec<_>>>()?;

        let document = NotificationConfiguration::builder()
            .set_topic_configurations(Some(current.topic_configurations().to_vec()))
            .set_queue_configurations(Some(current.queue_configurations().to_vec()))
            .set_event_bridge_configuration(current.event_bridge_configuration().cloned())
            .set_lambda_function_configurations(Some(lambda_configs))
            .build();

        info!(
            "Writing {} Lambda notification(s) on bucket: {}",
            notifications.len(),
            bucket
        );

        self.client
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(document)
            .send()
            .await
            .map_err(|e| classify("PutBucketNotificationConfiguration", e))?;

        Ok(())
    }
}
