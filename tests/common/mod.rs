#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use lambda_sync::controller::Controller;
use lambda_sync::modules::aws::clients::{
    AliasRequest, BoundaryResult, CodeLocation, EventMappingRequest, FunctionRequest,
    IamOperations, InvokeOutput, InvokeRequest, LambdaNotification, LambdaOperations,
    PermissionRequest, S3Operations,
};
use lambda_sync::modules::aws::utils::package_sha256;
use lambda_sync::modules::aws::AwsClients;
use lambda_sync::modules::Page;
use lambda_sync::reconcile::{Attributes, BoundaryError};
use lambda_sync::utils::RetryPolicy;

pub const ACCOUNT_ID: &str = "123456789012";
pub const REGION: &str = "us-east-1";
const PAGE_SIZE: usize = 2;

pub fn attrs(value: JsonValue) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

pub fn not_found(what: &str) -> BoundaryError {
    BoundaryError::from_code(
        Some("ResourceNotFoundException".to_string()),
        format!("{} not found", what),
    )
}

pub fn conflict(what: &str) -> BoundaryError {
    BoundaryError::from_code(
        Some("ResourceConflictException".to_string()),
        format!("{} already exists", what),
    )
}

pub fn throttled() -> BoundaryError {
    BoundaryError::from_code(Some("TooManyRequestsException".to_string()), "Rate exceeded")
}

fn page(items: Vec<Attributes>, marker: Option<String>) -> Page {
    let start: usize = marker.and_then(|m| m.parse().ok()).unwrap_or(0);
    let end = (start + PAGE_SIZE).min(items.len());
    Page {
        items: items[start.min(end)..end].to_vec(),
        next_marker: (end < items.len()).then(|| end.to_string()),
    }
}

/// Records calls and hands out injected failures per operation name.
#[derive(Default)]
struct Script {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<BoundaryError>>>,
}

impl Script {
    fn enter(&self, operation: &str) -> BoundaryResult<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail_next(&self, operation: &str, err: BoundaryError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(err);
    }

    fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    fn mutating_calls(&self) -> usize {
        const READS: &[&str] = &[
            "GetFunctionConfiguration",
            "ListFunctions",
            "ListVersionsByFunction",
            "GetAlias",
            "ListAliases",
            "GetEventSourceMapping",
            "ListEventSourceMappings",
            "GetPolicy",
            "GetBucketNotificationConfiguration",
            "Invoke",
        ];
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !READS.contains(&c.as_str()))
            .count()
    }
}

#[derive(Default)]
struct LambdaState {
    functions: BTreeMap<String, Attributes>,
    versions: BTreeMap<String, Vec<Attributes>>,
    aliases: BTreeMap<(String, String), Attributes>,
    mappings: Vec<Attributes>,
    policies: BTreeMap<String, Vec<JsonValue>>,
    revision: u64,
}

impl LambdaState {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        format!("rev-{}", self.revision)
    }
}

/// In-memory Lambda control plane.
#[derive(Default)]
pub struct FakeLambda {
    state: Mutex<LambdaState>,
    script: Script,
}

impl FakeLambda {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, operation: &str, err: BoundaryError) {
        self.script.fail_next(operation, err);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.script.calls(operation)
    }

    pub fn mutating_calls(&self) -> usize {
        self.script.mutating_calls()
    }

    pub fn function(&self, name: &str) -> Option<Attributes> {
        self.state.lock().unwrap().functions.get(name).cloned()
    }

    pub fn versions(&self, name: &str) -> Vec<Attributes> {
        self.state
            .lock()
            .unwrap()
            .versions
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mappings(&self) -> Vec<Attributes> {
        self.state.lock().unwrap().mappings.clone()
    }

    /// Seeds a function directly, bypassing the API.
    pub fn seed_function(&self, name: &str, extra: JsonValue) {
        let mut state = self.state.lock().unwrap();
        let revision = state.next_revision();
        let mut function = attrs(json!({
            "function_name": name,
            "function_arn": format!("arn:aws:lambda:{}:{}:function:{}", REGION, ACCOUNT_ID, name),
            "runtime": "python3.12",
            "role": format!("arn:aws:iam::{}:role/lambda", ACCOUNT_ID),
            "handler": "app.handler",
            "description": "",
            "timeout": 3,
            "memory_size": 128,
            "code_sha256": package_sha256(b"seed"),
            "code_size": 4,
            "version": "$LATEST",
            "revision_id": revision,
        }));
        function.extend(attrs(extra));
        state.functions.insert(name.to_string(), function);
    }

    fn code_sha(code: &CodeLocation) -> String {
        match code {
            CodeLocation::ZipFile(bytes) => package_sha256(bytes),
            CodeLocation::S3 { bucket, key, .. } => {
                package_sha256(format!("s3://{}/{}", bucket, key).as_bytes())
            }
        }
    }

    fn apply_request(function: &mut Attributes, request: &FunctionRequest) {
        let mut set = |name: &str, value: Option<JsonValue>| {
            if let Some(value) = value {
                function.insert(name.to_string(), value);
            }
        };
        set("runtime", request.runtime.clone().map(JsonValue::from));
        set("role", request.role.clone().map(JsonValue::from));
        set("handler", request.handler.clone().map(JsonValue::from));
        set("description", request.description.clone().map(JsonValue::from));
        set("timeout", request.timeout.map(JsonValue::from));
        set("memory_size", request.memory_size.map(JsonValue::from));
        set(
            "environment",
            request.environment.as_ref().map(|env| json!(env)),
        );

        if let Some(vpc) = &request.vpc {
            if vpc.subnet_ids.is_empty() && vpc.security_group_ids.is_empty() {
                function.remove("vpc_subnet_ids");
                function.remove("vpc_security_group_ids");
            } else {
                function.insert("vpc_subnet_ids".to_string(), json!(vpc.subnet_ids));
                function.insert(
                    "vpc_security_group_ids".to_string(),
                    json!(vpc.security_group_ids),
                );
            }
        }
    }

    fn publish(state: &mut LambdaState, name: &str, description: Option<&str>) -> BoundaryResult<Attributes> {
        let latest = state
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))?;
        let versions = state.versions.entry(name.to_string()).or_default();
        let number = (versions.len() + 1).to_string();

        let mut version = latest;
        version.insert("version".to_string(), number.clone().into());
        version.insert(
            "function_arn".to_string(),
            format!(
                "arn:aws:lambda:{}:{}:function:{}:{}",
                REGION, ACCOUNT_ID, name, number
            )
            .into(),
        );
        version.insert(
            "description".to_string(),
            description.unwrap_or_default().into(),
        );
        versions.push(version.clone());
        Ok(version)
    }

    fn statement(request: &PermissionRequest, function_arn: &str) -> JsonValue {
        let principal = if request.principal.ends_with(".amazonaws.com") {
            json!({"Service": request.principal})
        } else if request.principal.chars().all(|c| c.is_ascii_digit()) {
            json!({"AWS": format!("arn:aws:iam::{}:root", request.principal)})
        } else if request.principal.starts_with("arn:") {
            json!({"AWS": request.principal})
        } else {
            json!(request.principal)
        };

        let mut statement = json!({
            "Sid": request.statement_id,
            "Effect": "Allow",
            "Principal": principal,
            "Action": request.action,
            "Resource": function_arn,
        });

        let mut string_equals = serde_json::Map::new();
        if let Some(account) = &request.source_account {
            string_equals.insert("AWS:SourceAccount".to_string(), json!(account));
        }
        if let Some(token) = &request.event_source_token {
            string_equals.insert("lambda:EventSourceToken".to_string(), json!(token));
        }
        let mut condition = serde_json::Map::new();
        if !string_equals.is_empty() {
            condition.insert("StringEquals".to_string(), JsonValue::Object(string_equals));
        }
        if let Some(arn) = &request.source_arn {
            condition.insert("ArnLike".to_string(), json!({"AWS:SourceArn": arn}));
        }
        if !condition.is_empty() {
            statement["Condition"] = JsonValue::Object(condition);
        }
        statement
    }

    fn policy_key(function_name: &str, qualifier: Option<&str>) -> String {
        match qualifier {
            Some(q) => format!("{}:{}", function_name, q),
            None => function_name.to_string(),
        }
    }

    fn mapping_state(enabled: bool) -> &'static str {
        if enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    }
}

#[async_trait]
impl LambdaOperations for FakeLambda {
    async fn get_function_configuration(
        &self,
        name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("GetFunctionConfiguration")?;
        let state = self.state.lock().unwrap();
        match qualifier {
            Some(q) if q != "$LATEST" => state
                .versions
                .get(name)
                .and_then(|versions| versions.iter().find(|v| v["version"] == q))
                .cloned()
                .ok_or_else(|| not_found(&format!("{}:{}", name, q))),
            _ => state
                .functions
                .get(name)
                .cloned()
                .ok_or_else(|| not_found(name)),
        }
    }

    async fn list_functions(
        &self,
        marker: Option<String>,
        _max_items: Option<i32>,
    ) -> BoundaryResult<Page> {
        self.script.enter("ListFunctions")?;
        let items = self.state.lock().unwrap().functions.values().cloned().collect();
        Ok(page(items, marker))
    }

    async fn create_function(&self, request: &FunctionRequest) -> BoundaryResult<Attributes> {
        self.script.enter("CreateFunction")?;
        let mut state = self.state.lock().unwrap();
        if state.functions.contains_key(&request.function_name) {
            return Err(conflict(&request.function_name));
        }

        let code = request
            .code
            .as_ref()
            .ok_or_else(|| BoundaryError::from_code(
                Some("InvalidParameterValueException".to_string()),
                "Code is required",
            ))?;

        let revision = state.next_revision();
        let mut function = attrs(json!({
            "function_name": request.function_name,
            "function_arn": format!(
                "arn:aws:lambda:{}:{}:function:{}",
                REGION, ACCOUNT_ID, request.function_name
            ),
            "description": "",
            "timeout": 3,
            "memory_size": 128,
            "code_sha256": Self::code_sha(code),
            "code_size": 1024,
            "version": "$LATEST",
            "revision_id": revision,
            "last_modified": "2024-05-01T12:00:00.000+0000",
        }));
        Self::apply_request(&mut function, request);
        state
            .functions
            .insert(request.function_name.clone(), function.clone());

        if request.publish {
            let version = Self::publish(&mut state, &request.function_name, None)?;
            function.insert("version".to_string(), version["version"].clone());
        }
        Ok(function)
    }

    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("UpdateFunctionConfiguration")?;
        let mut state = self.state.lock().unwrap();
        let revision = state.next_revision();
        let function = state
            .functions
            .get_mut(&request.function_name)
            .ok_or_else(|| not_found(&request.function_name))?;

        if let Some(expected) = &request.revision_id {
            if function.get("revision_id").and_then(|v| v.as_str()) != Some(expected.as_str()) {
                return Err(BoundaryError::from_code(
                    Some("PreconditionFailedException".to_string()),
                    "The RevisionId provided does not match the latest RevisionId",
                ));
            }
        }

        Self::apply_request(function, request);
        function.insert("revision_id".to_string(), revision.into());
        Ok(function.clone())
    }

    async fn update_function_code(
        &self,
        name: &str,
        code: &CodeLocation,
        publish: bool,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("UpdateFunctionCode")?;
        let mut state = self.state.lock().unwrap();
        let revision = state.next_revision();
        let function = state
            .functions
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        function.insert("code_sha256".to_string(), Self::code_sha(code).into());
        function.insert("revision_id".to_string(), revision.into());
        let mut updated = function.clone();

        if publish {
            let version = Self::publish(&mut state, name, None)?;
            updated.insert("version".to_string(), version["version"].clone());
        }
        Ok(updated)
    }

    async fn delete_function(&self, name: &str, qualifier: Option<&str>) -> BoundaryResult<()> {
        self.script.enter("DeleteFunction")?;
        let mut state = self.state.lock().unwrap();
        match qualifier {
            Some(q) => {
                let versions = state.versions.entry(name.to_string()).or_default();
                let before = versions.len();
                versions.retain(|v| v["version"] != q);
                if versions.len() == before {
                    return Err(not_found(&format!("{}:{}", name, q)));
                }
            }
            None => {
                state.functions.remove(name).ok_or_else(|| not_found(name))?;
                state.versions.remove(name);
                state.aliases.retain(|(function, _), _| function != name);
                state.policies.remove(name);
            }
        }
        Ok(())
    }

    async fn publish_version(
        &self,
        name: &str,
        description: Option<&str>,
        code_sha256: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("PublishVersion")?;
        let mut state = self.state.lock().unwrap();
        let latest = state
            .functions
            .get(name)
            .and_then(|f| f.get("code_sha256"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| not_found(name))?;

        if let Some(expected) = code_sha256 {
            if expected != latest {
                return Err(BoundaryError::from_code(
                    Some("PreconditionFailedException".to_string()),
                    "CodeSHA256 does not match",
                ));
            }
        }
        Self::publish(&mut state, name, description)
    }

    async fn list_versions_by_function(
        &self,
        name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        self.script.enter("ListVersionsByFunction")?;
        let state = self.state.lock().unwrap();
        let latest = state.functions.get(name).cloned().ok_or_else(|| not_found(name))?;

        let mut items = vec![latest];
        items.extend(state.versions.get(name).cloned().unwrap_or_default());
        Ok(page(items, marker))
    }

    async fn get_alias(&self, function_name: &str, name: &str) -> BoundaryResult<Attributes> {
        self.script.enter("GetAlias")?;
        self.state
            .lock()
            .unwrap()
            .aliases
            .get(&(function_name.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&format!("alias {}", name)))
    }

    async fn list_aliases(
        &self,
        function_name: &str,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        self.script.enter("ListAliases")?;
        let items = self
            .state
            .lock()
            .unwrap()
            .aliases
            .iter()
            .filter(|((function, _), _)| function == function_name)
            .map(|(_, alias)| alias.clone())
            .collect();
        Ok(page(items, marker))
    }

    async fn create_alias(&self, request: &AliasRequest) -> BoundaryResult<Attributes> {
        self.script.enter("CreateAlias")?;
        let mut state = self.state.lock().unwrap();
        if !state.functions.contains_key(&request.function_name) {
            return Err(not_found(&request.function_name));
        }
        let key = (request.function_name.clone(), request.name.clone());
        if state.aliases.contains_key(&key) {
            return Err(conflict(&format!("alias {}", request.name)));
        }

        let revision = state.next_revision();
        let version = request
            .function_version
            .clone()
            .unwrap_or_else(|| "$LATEST".to_string());
        let alias = attrs(json!({
            "function_name": request.function_name,
            "name": request.name,
            "alias_arn": format!(
                "arn:aws:lambda:{}:{}:function:{}:{}",
                REGION, ACCOUNT_ID, request.function_name, request.name
            ),
            "function_version": version,
            "description": request.description.clone().unwrap_or_default(),
            "revision_id": revision,
        }));
        state.aliases.insert(key, alias.clone());
        Ok(alias)
    }

    async fn update_alias(
        &self,
        request: &AliasRequest,
        _revision_id: Option<&str>,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("UpdateAlias")?;
        let mut state = self.state.lock().unwrap();
        let revision = state.next_revision();
        let alias = state
            .aliases
            .get_mut(&(request.function_name.clone(), request.name.clone()))
            .ok_or_else(|| not_found(&format!("alias {}", request.name)))?;

        if let Some(version) = &request.function_version {
            alias.insert("function_version".to_string(), version.clone().into());
        }
        if let Some(description) = &request.description {
            alias.insert("description".to_string(), description.clone().into());
        }
        alias.insert("revision_id".to_string(), revision.into());
        Ok(alias.clone())
    }

    async fn delete_alias(&self, function_name: &str, name: &str) -> BoundaryResult<()> {
        self.script.enter("DeleteAlias")?;
        self.state
            .lock()
            .unwrap()
            .aliases
            .remove(&(function_name.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(&format!("alias {}", name)))
    }

    async fn get_event_source_mapping(&self, uuid: &str) -> BoundaryResult<Attributes> {
        self.script.enter("GetEventSourceMapping")?;
        self.state
            .lock()
            .unwrap()
            .mappings
            .iter()
            .find(|m| m["uuid"] == uuid)
            .cloned()
            .ok_or_else(|| not_found(&format!("mapping {}", uuid)))
    }

    async fn list_event_source_mappings(
        &self,
        function_name: Option<&str>,
        event_source_arn: Option<&str>,
        marker: Option<String>,
    ) -> BoundaryResult<Page> {
        self.script.enter("ListEventSourceMappings")?;
        let items = self
            .state
            .lock()
            .unwrap()
            .mappings
            .iter()
            .filter(|m| {
                function_name.map_or(true, |f| {
                    m["function_arn"]
                        .as_str()
                        .is_some_and(|arn| arn.ends_with(&format!(":function:{}", f)))
                })
            })
            .filter(|m| event_source_arn.map_or(true, |arn| m["event_source_arn"] == arn))
            .cloned()
            .collect();
        Ok(page(items, marker))
    }

    async fn create_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("CreateEventSourceMapping")?;
        let mut state = self.state.lock().unwrap();
        let function_arn = state
            .functions
            .get(&request.function_name)
            .and_then(|f| f.get("function_arn"))
            .cloned()
            .ok_or_else(|| not_found(&request.function_name))?;

        let duplicate = state.mappings.iter().any(|m| {
            m["function_arn"] == function_arn && m["event_source_arn"] == request.event_source_arn.as_str()
        });
        if duplicate {
            return Err(conflict("event source mapping"));
        }

        let enabled = request.enabled.unwrap_or(true);
        let mut mapping = attrs(json!({
            "uuid": uuid::Uuid::new_v4().to_string(),
            "event_source_arn": request.event_source_arn,
            "function_arn": function_arn,
            "batch_size": request.batch_size.unwrap_or(10),
            "state": Self::mapping_state(enabled),
            "enabled": enabled,
            "last_modified": "2024-05-01T12:00:00Z",
        }));
        if let Some(position) = &request.starting_position {
            mapping.insert("starting_position".to_string(), position.clone().into());
        }
        state.mappings.push(mapping.clone());
        Ok(mapping)
    }

    async fn update_event_source_mapping(
        &self,
        request: &EventMappingRequest,
    ) -> BoundaryResult<Attributes> {
        self.script.enter("UpdateEventSourceMapping")?;
        let uuid = request.uuid.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        let mapping = state
            .mappings
            .iter_mut()
            .find(|m| m["uuid"] == uuid.as_str())
            .ok_or_else(|| not_found(&format!("mapping {}", uuid)))?;

        if let Some(batch_size) = request.batch_size {
            mapping.insert("batch_size".to_string(), batch_size.into());
        }
        if let Some(enabled) = request.enabled {
            mapping.insert("enabled".to_string(), enabled.into());
            mapping.insert("state".to_string(), Self::mapping_state(enabled).into());
        }
        Ok(mapping.clone())
    }

    async fn delete_event_source_mapping(&self, uuid: &str) -> BoundaryResult<()> {
        self.script.enter("DeleteEventSourceMapping")?;
        let mut state = self.state.lock().unwrap();
        let before = state.mappings.len();
        state.mappings.retain(|m| m["uuid"] != uuid);
        if state.mappings.len() == before {
            return Err(not_found(&format!("mapping {}", uuid)));
        }
        Ok(())
    }

    async fn get_policy(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<JsonValue> {
        self.script.enter("GetPolicy")?;
        let state = self.state.lock().unwrap();
        match state.policies.get(&Self::policy_key(function_name, qualifier)) {
            Some(statements) if !statements.is_empty() => Ok(json!({
                "Version": "2012-10-17",
                "Id": "default",
                "Statement": statements,
            })),
            _ => Err(not_found("The resource you requested does not exist.")),
        }
    }

    async fn add_permission(&self, request: &PermissionRequest) -> BoundaryResult<JsonValue> {
        self.script.enter("AddPermission")?;
        let mut state = self.state.lock().unwrap();
        let function_arn = state
            .functions
            .get(&request.function_name)
            .and_then(|f| f["function_arn"].as_str().map(str::to_string))
            .ok_or_else(|| not_found(&request.function_name))?;

        let statements = state
            .policies
            .entry(Self::policy_key(&request.function_name, request.qualifier.as_deref()))
            .or_default();
        if statements.iter().any(|s| s["Sid"] == request.statement_id.as_str()) {
            return Err(conflict(&format!("statement {}", request.statement_id)));
        }

        let statement = Self::statement(request, &function_arn);
        statements.push(statement.clone());
        Ok(statement)
    }

    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
        qualifier: Option<&str>,
    ) -> BoundaryResult<()> {
        self.script.enter("RemovePermission")?;
        let mut state = self.state.lock().unwrap();
        let statements = state
            .policies
            .entry(Self::policy_key(function_name, qualifier))
            .or_default();
        let before = statements.len();
        statements.retain(|s| s["Sid"] != statement_id);
        if statements.len() == before {
            return Err(not_found(&format!("statement {}", statement_id)));
        }
        Ok(())
    }

    async fn invoke(&self, request: &InvokeRequest) -> BoundaryResult<InvokeOutput> {
        self.script.enter("Invoke")?;
        if !self.state.lock().unwrap().functions.contains_key(&request.function_name) {
            return Err(not_found(&request.function_name));
        }

        use base64::Engine;
        let dry_run = matches!(
            request.invocation_type,
            lambda_sync::modules::aws::clients::InvocationType::DryRun
        );
        Ok(InvokeOutput {
            status_code: if dry_run { 204 } else { 200 },
            function_error: None,
            log_result: request
                .tail_log
                .then(|| base64::engine::general_purpose::STANDARD.encode("START RequestId: 1\nEND")),
            payload: if dry_run { None } else { request.payload.clone() },
            executed_version: Some("$LATEST".to_string()),
        })
    }
}

/// In-memory bucket notification documents. Non-Lambda configurations are
/// modelled as an opaque count that must survive every write.
#[derive(Default)]
pub struct FakeS3 {
    buckets: Mutex<BTreeMap<String, (Vec<LambdaNotification>, usize)>>,
    script: Script,
}

impl FakeS3 {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_bucket(&self, bucket: &str, notifications: Vec<LambdaNotification>, other_configs: usize) {
        self.buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string(), (notifications, other_configs));
    }

    pub fn notifications(&self, bucket: &str) -> Vec<LambdaNotification> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|(n, _)| n.clone())
            .unwrap_or_default()
    }

    pub fn other_configs(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|(_, other)| *other)
            .unwrap_or_default()
    }

    pub fn fail_next(&self, operation: &str, err: BoundaryError) {
        self.script.fail_next(operation, err);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.script.calls(operation)
    }
}

#[async_trait]
impl S3Operations for FakeS3 {
    async fn get_lambda_notifications(
        &self,
        bucket: &str,
    ) -> BoundaryResult<Vec<LambdaNotification>> {
        self.script.enter("GetBucketNotificationConfiguration")?;
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|(n, _)| n.clone())
            .ok_or_else(|| {
                BoundaryError::from_code(Some("NoSuchBucket".to_string()), "bucket does not exist")
            })
    }

    async fn put_lambda_notifications(
        &self,
        bucket: &str,
        notifications: &[LambdaNotification],
    ) -> BoundaryResult<()> {
        self.script.enter("PutBucketNotificationConfiguration")?;
        let mut buckets = self.buckets.lock().unwrap();
        let entry = buckets.get_mut(bucket).ok_or_else(|| {
            BoundaryError::from_code(Some("NoSuchBucket".to_string()), "bucket does not exist")
        })?;
        entry.0 = notifications.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIam {
    script: Script,
}

impl FakeIam {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.script.calls("GetUser")
    }
}

#[async_trait]
impl IamOperations for FakeIam {
    async fn account_id(&self) -> BoundaryResult<String> {
        self.script.enter("GetUser")?;
        Ok(ACCOUNT_ID.to_string())
    }
}

pub struct Harness {
    pub lambda: Arc<FakeLambda>,
    pub s3: Arc<FakeS3>,
    pub iam: Arc<FakeIam>,
    pub controller: Controller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::immediate(3))
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let lambda = FakeLambda::new();
        let s3 = FakeS3::new();
        let iam = FakeIam::new();

        let clients = AwsClients {
            lambda: lambda.clone(),
            s3: s3.clone(),
            iam: iam.clone(),
        };
        let controller = Controller::with_modules(retry, clients.modules());

        Self {
            lambda,
            s3,
            iam,
            controller,
        }
    }
}
