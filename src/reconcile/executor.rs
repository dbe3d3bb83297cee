use log::{debug, info};
use serde::Serialize;

use super::decision::{Action, Decision};
use super::descriptor::{Attributes, ResourceSpec};
use super::error::{BoundaryError, ReconcileError};
use super::fetcher::{self, RemoteState};
use crate::modules::{Applied, ResourceModule};
use crate::utils::retry::{retry_on_throttle, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub action: Action,
    pub state: Option<Attributes>,
    pub changed: bool,
    pub metadata: Attributes,
}

/// Applies the decided action with at most one mutating boundary call.
///
/// Throttled calls are retried under `policy`. When the mutation response is
/// incomplete the resource is read again so that `state` is authoritative.
pub async fn execute(
    module: &dyn ResourceModule,
    spec: &ResourceSpec,
    decision: &Decision,
    remote: RemoteState,
    policy: &RetryPolicy,
) -> Result<ExecutionResult, ReconcileError> {
    let key = spec.key.to_string();
    let action = decision.action;
    let operation_name = format!("{} {} {}", action, spec.resource_type, key);

    if action == Action::None {
        return Ok(ExecutionResult {
            action,
            state: remote.into_attributes(),
            changed: false,
            metadata: Attributes::new(),
        });
    }

    let applied = match (action, remote.attributes()) {
        (Action::Create, _) => {
            retry_on_throttle(policy, &operation_name, || module.create(spec)).await
        }
        (Action::Update, Some(current)) => {
            retry_on_throttle(policy, &operation_name, || {
                module.update(spec, current, &decision.changes)
            })
            .await
        }
        (Action::Delete, Some(current)) => {
            match retry_on_throttle(policy, &operation_name, || module.delete(spec, current)).await
            {
                Err(e) if e.is_not_found() => {
                    info!("{} {} was already absent", spec.resource_type, key);
                    Ok(Applied::incomplete().with_metadata("already_absent", true))
                }
                other => other,
            }
        }
        _ => {
            return Err(ReconcileError::conflict(
                &key,
                format!("cannot {} a resource that was not found", action),
            ));
        }
    }
    .map_err(|source| classify(&key, action, source))?;

    info!("{} {} {}", action, spec.resource_type, key);

    if action == Action::Delete {
        return Ok(ExecutionResult {
            action,
            state: None,
            changed: true,
            metadata: applied.metadata,
        });
    }

    let state = match applied.state {
        Some(state) => state,
        None => {
            debug!("re-reading {} {} after {}", spec.resource_type, key, action);
            match fetcher::fetch(module, spec).await? {
                RemoteState::Present(state) => state,
                RemoteState::Absent => {
                    return Err(ReconcileError::conflict(
                        &key,
                        format!("resource was not found after {}", action),
                    ));
                }
            }
        }
    };

    Ok(ExecutionResult {
        action,
        state: Some(state),
        changed: true,
        metadata: applied.metadata,
    })
}

fn classify(key: &str, action: Action, source: BoundaryError) -> ReconcileError {
    if source.is_conflict() {
        ReconcileError::Conflict {
            key: key.to_string(),
            message: source.message,
            code: source.code,
        }
    } else {
        ReconcileError::Execution {
            key: key.to_string(),
            action,
            source,
        }
    }
}
