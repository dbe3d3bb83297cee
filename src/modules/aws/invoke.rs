use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{info, warn};
use serde_json::{json, Value as JsonValue};

use super::clients::{InvocationType, InvokeRequest, LambdaOperations};

#[derive(Debug, Clone, Default)]
pub struct InvokeParams {
    pub function_name: String,
    pub qualifier: Option<String>,
    pub invocation_type: InvocationType,
    pub tail_log: bool,
    pub client_context: Option<JsonValue>,
    pub payload: Option<JsonValue>,
}

/// Invokes a function and returns its status, decoded log tail and payload.
/// In check mode the call is always a dry run.
pub async fn invoke(
    lambda: &dyn LambdaOperations,
    params: &InvokeParams,
    check_mode: bool,
) -> Result<JsonValue> {
    let invocation_type = if check_mode {
        InvocationType::DryRun
    } else {
        params.invocation_type
    };

    let client_context = params
        .client_context
        .as_ref()
        .map(|ctx| serde_json::to_vec(ctx).map(|bytes| STANDARD.encode(bytes)))
        .transpose()
        .context("Failed to encode client context")?;

    let payload = params
        .payload
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .context("Failed to encode payload")?;

    let request = InvokeRequest {
        function_name: params.function_name.clone(),
        qualifier: params.qualifier.clone(),
        invocation_type,
        tail_log: params.tail_log,
        client_context,
        payload,
    };

    info!(
        "Invoking {} ({:?})",
        params.function_name, request.invocation_type
    );

    let output = lambda
        .invoke(&request)
        .await
        .with_context(|| format!("Failed to invoke {}", params.function_name))?;

    let logs = output
        .log_result
        .as_deref()
        .map(|encoded| STANDARD.decode(encoded))
        .transpose()
        .context("Failed to decode log tail")?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

    let result = match output.payload.as_deref() {
        None | Some([]) => JsonValue::Null,
        Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|_| {
            warn!("{} returned a non-JSON payload", params.function_name);
            JsonValue::from(String::from_utf8_lossy(bytes).into_owned())
        }),
    };

    Ok(json!({
        "status_code": output.status_code,
        "function_error": output.function_error,
        "executed_version": output.executed_version,
        "logs": logs,
        "output": result,
        "check_mode": check_mode,
    }))
}
