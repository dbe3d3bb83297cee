use std::error::Error;
use std::fmt::Debug;

use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use log::debug;
use regex::Regex;

use crate::reconcile::error::{BoundaryError, ReconcileError};
use crate::utils::Config;

pub async fn get_aws_config(config: &Config) -> aws_config::SdkConfig {
    // Throttles are retried by the executor, not by the SDK.
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(1));

    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Turns an SDK failure into a classified boundary error.
pub fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> BoundaryError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    debug!("{} failed: code={:?} message={}", operation, code, message);
    BoundaryError::from_code(code, format!("{}: {}", operation, message))
}

/// Lambda accepts `[\w-:]` names of up to 64 characters, or a full ARN of up to 140.
pub fn check_function_name(name: &str) -> Result<(), ReconcileError> {
    let pattern = Regex::new(r"^[\w\-:]+$")
        .map_err(|e| ReconcileError::validation(format!("invalid name pattern: {}", e)))?;

    if !pattern.is_match(name) {
        return Err(ReconcileError::validation(format!(
            "function name '{}' may only contain letters, digits, '_', '-' and ':'",
            name
        )));
    }

    let limit = if name.starts_with("arn:") { 140 } else { 64 };
    if name.len() > limit {
        return Err(ReconcileError::validation(format!(
            "function name '{}' is longer than {} characters",
            name, limit
        )));
    }

    Ok(())
}

pub fn check_range(name: &str, value: Option<i64>, min: i64, max: i64) -> Result<(), ReconcileError> {
    match value {
        Some(v) if v < min || v > max => Err(ReconcileError::validation(format!(
            "'{}' must be between {} and {}, got {}",
            name, min, max, v
        ))),
        _ => Ok(()),
    }
}

/// Base64 SHA-256 of a deployment package, as Lambda reports it in `code_sha256`.
pub fn package_sha256(bytes: &[u8]) -> String {
    use base64::Engine;
    use sha2::{Digest, Sha256};

    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(bytes))
}
