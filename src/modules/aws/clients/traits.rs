use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::modules::Page;
use crate::reconcile::descriptor::Attributes;
use crate::reconcile::error::BoundaryError;

pub type BoundaryResult<T> = Result<T, BoundaryError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CodeLocation {
    S3 {
        bucket: String,
        key: String,
        object_version: Option<String>,
    },
    ZipFile(Vec<u8>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpcSettings {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// Arguments for create and update-configuration calls. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionRequest {
    pub function_name: String,
    pub runtime: Option<String>,
    pub role: Option<String>,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub environment: Option<BTreeMap<String, String>>,
    pub vpc: Option<VpcSettings>,
    pub code: Option<CodeLocation>,
    pub publish: bool,
    pub revision_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasRequest {
    pub function_name: String,
    pub name: String,
    pub function_version: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMappingRequest {
    pub uuid: Option<String>,
    pub function_name: String,
    pub event_source_arn: String,
    pub batch_size: Option<i32>,
    pub enabled: Option<bool>,
    pub starting_position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionRequest {
    pub function_name: String,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: Option<String>,
    pub source_account: Option<String>,
    pub event_source_token: Option<String>,
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InvocationType {
    #[default]
    RequestResponse,
    Event,
    DryRun,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeRequest {
    pub function_name: String,
    pub qualifier: Option<String>,
    pub invocation_type: InvocationType,
    pub tail_log: bool,
    /// Base64-encoded client context document.
    pub client_context: Option<String>,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeOutput {
    pub status_code: i32,
    pub function_error: Option<String>,
    /// Base64-encoded tail of the execution log.
    pub log_result: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub executed_version: Option<String>,
}

/// One Lambda-targeted entry of a bucket's notification configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LambdaNotification {
    pub id: String,
    pub lambda_function_arn: String,
    pub events: Vec<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

/// Lambda service boundary. Function-shaped responses are flattened into
/// snake_case attributes (`function_name`, `timeout`, `vpc_subnet_ids`, ...).
#[async_trait]
pub trait LambdaOperations: Send + Sync {
    async fn get_function_configuration(
        &self,
        name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<Attributes>;
    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> BoundaryResult<Page>;
    async fn create_function(&self, request: &FunctionRequest) -> BoundaryResult<Attributes>;
    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> BoundaryResult<Attributes>;
    async fn update_function_code(
        &self,
        name: &str,
        code: &CodeLocation,
        publish: bool,
    ) -> BoundaryResult<Attributes>;
    async fn delete_function(&self, name: &str, qualifier: Option<&str>) -> BoundaryResult<()>;
    async fn publish_version(
        &self,
        name: &str,
        description: Option<&str>,
        code_sha256: Option<&str>,
    ) -> BoundaryResult<Attributes>;
    async fn list_versions_by_function(
        &self,
        name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page>;

    async fn get_alias(&self, function_name: &str, name: &str) -> BoundaryResult<Attributes>;
    async fn list_aliases(
        &self,
        function_name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page>;
    async fn create_alias(&self, request: &AliasRequest) -> BoundaryResult<Attributes>;
    async fn update_alias(
        &self,
        request: &AliasRequest,
        revision_id: Option<&str>,
    ) -> BoundaryResult<Attributes>;
    async fn delete_alias(&self, function_name: &str, name: &str) -> BoundaryResult<()>;

    async fn get_event_source_mapping(&self, uuid: &str) -> BoundaryResult<Attributes>;
    async fn list_event_source_mappings(
        &self,
        function_name: Option<&str>,
        event_source_arn: Option<&str>,
        marker: Option<String>,
    ) -> BoundaryResult<Page>;
    async fn create_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes>;
    async fn update_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes>;
    async fn delete_event_source_mapping(&self, uuid: &str) -> BoundaryResult<()>;

    /// The function's resource policy document, parsed.
    async fn get_policy(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<JsonValue>;
    /// Adds a statement and returns it, parsed.
    async fn add_permission(&self, request: &PermissionRequest) -> BoundaryResult<JsonValue>;
    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<()>;

    async fn invoke(&self, request: &InvokeRequest) -> BoundaryResult<InvokeOutput>;
}

#[async_trait]
pub trait S3Operations: Send + Sync {
    async fn get_lambda_notifications(&self, bucket: &str)
        -> BoundaryResult<Vec<LambdaNotification>>;
    /// Replaces the bucket's Lambda notifications, keeping topic, queue and
    /// EventBridge configurations as they are.
    async fn put_lambda_notifications(
        &self,
        bucket: &str,
        notifications: &[LambdaNotification],
    ) -> BoundaryResult<()>;
}

#[async_trait]
pub trait IamOperations: Send + Sync {
    async fn account_id(&self) -> BoundaryResult<String>;
}
