use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_lambda::primitives::{Blob, DateTimeFormat};
use aws_sdk_lambda::types::{
    Environment, EventSourcePosition, FunctionCode, InvocationType as SdkInvocationType,
    LogType, Runtime, VpcConfig,
};
use aws_sdk_lambda::Client as LambdaClient;
use log::info;
use serde_json::Value as JsonValue;

use super::traits::{
    AliasRequest, BoundaryResult, CodeLocation, EventMappingRequest, FunctionRequest,
    InvocationType, InvokeOutput, InvokeRequest, LambdaOperations, PermissionRequest,
};
use crate::modules::aws::utils::classify;
use crate::modules::Page;
use crate::reconcile::descriptor::Attributes;
use crate::reconcile::error::BoundaryError;

pub struct LambdaService {
    client: LambdaClient,
}

impl LambdaService {
    pub fn new(client: LambdaClient) -> Self {
        Self { client }
    }
}

fn put<V: Into<JsonValue>>(attrs: &mut Attributes, name: &str, value: Option<V>) {
    if let Some(value) = value {
        attrs.insert(name.to_string(), value.into());
    }
}

fn strings(values: &[String]) -> JsonValue {
    JsonValue::from(values.to_vec())
}

fn string_map(values: &HashMap<String, String>) -> JsonValue {
    JsonValue::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(v.as_str())))
            .collect(),
    )
}

// Every function-shaped response (get, create, update, publish, list item)
// exposes the same accessors.
macro_rules! function_attributes {
    ($config:expr) => {{
        let config = $config;
        let mut attrs = Attributes::new();
        put(&mut attrs, "function_name", config.function_name());
        put(&mut attrs, "function_arn", config.function_arn());
        put(&mut attrs, "runtime", config.runtime().map(|r| r.as_str()));
        put(&mut attrs, "role", config.role());
        put(&mut attrs, "handler", config.handler());
        put(&mut attrs, "description", config.description());
        put(&mut attrs, "timeout", config.timeout());
        put(&mut attrs, "memory_size", config.memory_size());
        put(&mut attrs, "last_modified", config.last_modified());
        put(&mut attrs, "code_size", Some(config.code_size()));
        put(&mut attrs, "code_sha256", config.code_sha256());
        put(&mut attrs, "version", config.version());
        put(&mut attrs, "revision_id", config.revision_id());
        put(&mut attrs, "state", config.state().map(|s| s.as_str()));
        put(
            &mut attrs,
            "environment",
            config
                .environment()
                .and_then(|e| e.variables())
                .map(string_map),
        );
        if let Some(vpc) = config.vpc_config() {
            if !vpc.subnet_ids().is_empty() || !vpc.security_group_ids().is_empty() {
                attrs.insert("vpc_subnet_ids".to_string(), strings(vpc.subnet_ids()));
                attrs.insert(
                    "vpc_security_group_ids".to_string(),
                    strings(vpc.security_group_ids()),
                );
            }
        }
        attrs
    }};
}

macro_rules! alias_attributes {
    ($function_name:expr, $alias:expr) => {{
        let alias = $alias;
        let mut attrs = Attributes::new();
        attrs.insert("function_name".to_string(), JsonValue::from($function_name));
        put(&mut attrs, "name", alias.name());
        put(&mut attrs, "alias_arn", alias.alias_arn());
        put(&mut attrs, "function_version", alias.function_version());
        put(&mut attrs, "description", alias.description());
        put(&mut attrs, "revision_id", alias.revision_id());
        attrs
    }};
}

macro_rules! mapping_attributes {
    ($mapping:expr) => {{
        let mapping = $mapping;
        let mut attrs = Attributes::new();
        put(&mut attrs, "uuid", mapping.uuid());
        put(&mut attrs, "event_source_arn", mapping.event_source_arn());
        put(&mut attrs, "function_arn", mapping.function_arn());
        put(&mut attrs, "batch_size", mapping.batch_size());
        put(&mut attrs, "state", mapping.state());
        put(
            &mut attrs,
            "enabled",
            mapping.state().map(|s| matches!(s, "Enabled" | "Enabling" | "Creating" | "Updating")),
        );
        put(
            &mut attrs,
            "starting_position",
            mapping.starting_position().map(|p| p.as_str()),
        );
        put(
            &mut attrs,
            "last_modified",
            mapping
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
        );
        attrs
    }};
}

fn code_builder(code: &CodeLocation) -> FunctionCode {
    match code {
        CodeLocation::S3 {
            bucket,
            key,
            object_version,
        } => FunctionCode::builder()
            .s3_bucket(bucket)
            .s3_key(key)
            .set_s3_object_version(object_version.clone())
            .build(),
        CodeLocation::ZipFile(bytes) => FunctionCode::builder()
            .zip_file(Blob::new(bytes.clone()))
            .build(),
    }
}

fn environment(request: &FunctionRequest) -> Option<Environment> {
    request.environment.as_ref().map(|vars| {
        Environment::builder()
            .set_variables(Some(vars.clone().into_iter().collect()))
            .build()
    })
}

fn vpc_config(request: &FunctionRequest) -> Option<VpcConfig> {
    request.vpc.as_ref().map(|vpc| {
        VpcConfig::builder()
            .set_subnet_ids(Some(vpc.subnet_ids.clone()))
            .set_security_group_ids(Some(vpc.security_group_ids.clone()))
            .build()
    })
}

fn parse_json(operation: &str, document: Option<&str>) -> BoundaryResult<JsonValue> {
    let document = document
        .ok_or_else(|| BoundaryError::unknown(format!("{}: empty response", operation)))?;
    serde_json::from_str(document)
        .map_err(|e| BoundaryError::unknown(format!("{}: malformed document: {}", operation, e)))
}

#[async_trait]
impl LambdaOperations for LambdaService {
    async fn get_function_configuration(
        &self,
        name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(name)
            .set_qualifier(qualifier.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("GetFunctionConfiguration", e))?;

        Ok(function_attributes!(&output))
    }

    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> BoundaryResult<Page> {
        let output = self
            .client
            .list_functions()
            .set_marker(marker)
            .set_max_items(max_items)
            .send()
            .await
            .map_err(|e| classify("ListFunctions", e))?;

        Ok(Page {
            items: output
                .functions()
                .iter()
                .map(|f| function_attributes!(f))
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn create_function(&self, request: &FunctionRequest) -> BoundaryResult<Attributes> {
        info!("Creating Lambda function: {}", request.function_name);

        let output = self
            .client
            .create_function()
            .function_name(&request.function_name)
            .set_runtime(request.runtime.as_deref().map(Runtime::from))
            .set_role(request.role.clone())
            .set_handler(request.handler.clone())
            .set_description(request.description.clone())
            .set_timeout(request.timeout)
            .set_memory_size(request.memory_size)
            .set_environment(environment(request))
            .set_vpc_config(vpc_config(request))
            .set_code(request.code.as_ref().map(code_builder))
            .publish(request.publish)
            .send()
            .await
            .map_err(|e| classify("CreateFunction", e))?;

        Ok(function_attributes!(&output))
    }

    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> BoundaryResult<Attributes> {
        info!("Updating configuration of Lambda function: {}", request.function_name);

        let output = self
            .client
            .update_function_configuration()
            .function_name(&request.function_name)
            .set_runtime(request.runtime.as_deref().map(Runtime::from))
            .set_role(request.role.clone())
            .set_handler(request.handler.clone())
            .set_description(request.description.clone())
            .set_timeout(request.timeout)
            .set_memory_size(request.memory_size)
            .set_environment(environment(request))
            .set_vpc_config(vpc_config(request))
            .set_revision_id(request.revision_id.clone())
            .send()
            .await
            .map_err(|e| classify("UpdateFunctionConfiguration", e))?;

        Ok(function_attributes!(&output))
    }

    async fn update_function_code(
        &self,
        name: &str,
        code: &CodeLocation,
        publish: bool,
    ) -> BoundaryResult<Attributes> {
        info!("Updating code of Lambda function: {}", name);

        let request = self
            .client
            .update_function_code()
            .function_name(name)
            .publish(publish);

        let request = match code {
            CodeLocation::S3 {
                bucket,
                key,
                object_version,
            } => request
                .s3_bucket(bucket)
                .s3_key(key)
                .set_s3_object_version(object_version.clone()),
            CodeLocation::ZipFile(bytes) => request.zip_file(Blob::new(bytes.clone())),
        };

        let output = request
            .send()
            .await
            .map_err(|e| classify("UpdateFunctionCode", e))?;

        Ok(function_attributes!(&output))
    }

    async fn delete_function(&self, name: &str, qualifier: Option<&str>) -> BoundaryResult<()> {
        info!("Deleting Lambda function: {} {:?}", name, qualifier);

        self.client
            .delete_function()
            .function_name(name)
            .set_qualifier(qualifier.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("DeleteFunction", e))?;

        Ok(())
    }

    async fn publish_version(
        &self,
        name: &str,
        description: Option<&str>,
        code_sha256: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        info!("Publishing version of Lambda function: {}", name);

        let output = self
            .client
            .publish_version()
            .function_name(name)
            .set_description(description.map(str::to_string))
            .set_code_sha256(code_sha256.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("PublishVersion", e))?;

        Ok(function_attributes!(&output))
    }

    async fn list_versions_by_function(
        &self,
        name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        let output = self
            .client
            .list_versions_by_function()
            .function_name(name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| classify("ListVersionsByFunction", e))?;

        Ok(Page {
            items: output
                .versions()
                .iter()
                .map(|v| function_attributes!(v))
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn get_alias(&self, function_name: &str, name: &str) -> BoundaryResult<Attributes> {
        let output = self
            .client
            .get_alias()
            .function_name(function_name)
            .name(name)
            .send()
            .await
            .map_err(|e| classify("GetAlias", e))?;

        Ok(alias_attributes!(function_name, &output))
    }

    async fn list_aliases(
        &self,
        function_name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        let output = self
            .client
            .list_aliases()
            .function_name(function_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| classify("ListAliases", e))?;

        Ok(Page {
            items: output
                .aliases()
                .iter()
                .map(|a| alias_attributes!(function_name, a))
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn create_alias(&self, request: &AliasRequest) -> BoundaryResult<Attributes> {
        info!(
            "Creating alias {} for Lambda function: {}",
            request.name, request.function_name
        );

        let output = self
            .client
            .create_alias()
            .function_name(&request.function_name)
            .name(&request.name)
            .set_function_version(request.function_version.clone())
            .set_description(request.description.clone())
            .send()
            .await
            .map_err(|e| classify("CreateAlias", e))?;

        Ok(alias_attributes!(request.function_name.as_str(), &output))
    }

    async fn update_alias(
        &self,
        request: &AliasRequest,
        revision_id: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        info!(
            "Updating alias {} for Lambda function: {}",
            request.name, request.function_name
        );

        let output = self
            .client
            .update_alias()
            .function_name(&request.function_name)
            .name(&request.name)
            .set_function_version(request.function_version.clone())
            .set_description(request.description.clone())
            .set_revision_id(revision_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("UpdateAlias", e))?;

        Ok(alias_attributes!(request.function_name.as_str(), &output))
    }

    async fn delete_alias(&self, function_name: &str, name: &str) -> BoundaryResult<()> {
        info!("Deleting alias {} for Lambda function: {}", name, function_name);

        self.client
            .delete_alias()
            .function_name(function_name)
            .name(name)
            .send()
            .await
            .map_err(|e| classify("DeleteAlias", e))?;

        Ok(())
    }

    async fn get_event_source_mapping(&self, uuid: &str) -> BoundaryResult<Attributes> {
        let output = self
            .client
            .get_event_source_mapping()
            .uuid(uuid)
            .send()
            .await
            .map_err(|e| classify("GetEventSourceMapping", e))?;

        Ok(mapping_attributes!(&output))
    }

    async fn list_event_source_mappings(
        &self,
        function_name: Option<&str>,
        event_source_arn: Option<&str>,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        let output = self
            .client
            .list_event_source_mappings()
            .set_function_name(function_name.map(str::to_string))
            .set_event_source_arn(event_source_arn.map(str::to_string))
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| classify("ListEventSourceMappings", e))?;

        Ok(Page {
            items: output
                .event_source_mappings()
                .iter()
                .map(|m| mapping_attributes!(m))
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn create_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes> {
        info!(
            "Creating event source mapping {} -> {}",
            request.event_source_arn, request.function_name
        );

        let output = self
            .client
            .create_event_source_mapping()
            .function_name(&request.function_name)
            .event_source_arn(&request.event_source_arn)
            .set_batch_size(request.batch_size)
            .set_enabled(request.enabled)
            .set_starting_position(
                request
                    .starting_position
                    .as_deref()
                    .map(EventSourcePosition::from),
            )
            .send()
            .await
            .map_err(|e| classify("CreateEventSourceMapping", e))?;

        Ok(mapping_attributes!(&output))
    }

    async fn update_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes> {
        let uuid = request
            .uuid
            .as_deref()
            .ok_or_else(|| BoundaryError::unknown("UpdateEventSourceMapping: missing uuid"))?;
        info!("Updating event source mapping {}", uuid);

        let output = self
            .client
            .update_event_source_mapping()
            .uuid(uuid)
            .set_batch_size(request.batch_size)
            .set_enabled(request.enabled)
            .send()
            .await
            .map_err(|e| classify("UpdateEventSourceMapping", e))?;

        Ok(mapping_attributes!(&output))
    }

    async fn delete_event_source_mapping(&self, uuid: &str) -> BoundaryResult<()> {
        info!("Deleting event source mapping {}", uuid);

        self.client
            .delete_event_source_mapping()
            .uuid(uuid)
            .send()
            .await
            .map_err(|e| classify("DeleteEventSourceMapping", e))?;

        Ok(())
    }

    async fn get_policy(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<JsonValue> {
        let output = self
            .client
            .get_policy()
            .function_name(function_name)
            .set_qualifier(qualifier.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("GetPolicy", e))?;

        parse_json("GetPolicy", output.policy())
    }

    async fn add_permission(&self, request: &PermissionRequest) -> BoundaryResult<JsonValue> {
        info!(
            "Adding permission {} to Lambda function: {}",
            request.statement_id, request.function_name
        );

        let output = self
            .client
            .add_permission()
            .function_name(&request.function_name)
            .statement_id(&request.statement_id)
            .action(&request.action)
            .principal(&request.principal)
            .set_source_arn(request.source_arn.clone())
            .set_source_account(request.source_account.clone())
            .set_event_source_token(request.event_source_token.clone())
            .set_qualifier(request.qualifier.clone())
            .send()
            .await
            .map_err(|e| classify("AddPermission", e))?;

        parse_json("AddPermission", output.statement())
    }

    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<()> {
        info!(
            "Removing permission {} from Lambda function: {}",
            statement_id, function_name
        );

        self.client
            .remove_permission()
            .function_name(function_name)
            .statement_id(statement_id)
            .set_qualifier(qualifier.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("RemovePermission", e))?;

        Ok(())
    }

    async fn invoke(&self, request: &InvokeRequest) -> BoundaryResult<InvokeOutput> {
        let invocation_type = match request.invocation_type {
            InvocationType::RequestResponse => SdkInvocationType::RequestResponse,
            InvocationType::Event => SdkInvocationType::Event,
            InvocationType::DryRun => SdkInvocationType::DryRun,
        };
        let log_type = if request.tail_log {
            LogType::Tail
        } else {
            LogType::None
        };

        let output = self
            .client
            .invoke()
            .function_name(&request.function_name)
            .set_qualifier(request.qualifier.clone())
            .invocation_type(invocation_type)
            .log_type(log_type)
            .set_client_context(request.client_context.clone())
            .set_payload(request.payload.clone().map(Blob::new))
            .send()
            .await
            .map_err(|e| classify("Invoke", e))?;

        Ok(InvokeOutput {
            status_code: output.status_code(),
            function_error: output.function_error().map(str::to_string),
            log_result: output.log_result().map(str::to_string),
            payload: output.payload().map(|p| p.as_ref().to_vec()),
            executed_version: output.executed_version().map(str::to_string),
        })
    }
}
