use serde::{Deserialize, Serialize};

use super::decision::Action;
use super::descriptor::Attributes;
use super::error::ReconcileError;
use super::executor::ExecutionResult;
use super::Stage;

/// The single document returned for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub changed: bool,
    pub action: Option<Action>,
    pub state: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub metadata: Attributes,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub check_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    /// Last stage reached before the failure.
    pub stage: Stage,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Whether a mutating call was attempted. This includes a call that
    /// succeeded but whose follow-up re-read failed, so the remote side may
    /// already have changed even though `changed` is false.
    pub attempted: bool,
}

impl OutputDocument {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub fn normalize(result: ExecutionResult) -> OutputDocument {
    let state = match result.action {
        Action::Delete => None,
        _ => result.state,
    };

    OutputDocument {
        changed: result.action.is_mutating(),
        action: Some(result.action),
        state,
        metadata: result.metadata,
        check_mode: false,
        error: None,
    }
}

/// Builds the failure document. Nothing is reported as changed, even when a
/// mutating call was attempted; callers read `error.attempted` for that.
pub fn failure(stage: Stage, action: Option<Action>, err: &ReconcileError) -> OutputDocument {
    OutputDocument {
        changed: false,
        action,
        state: None,
        metadata: Attributes::new(),
        check_mode: false,
        error: Some(ErrorBody {
            kind: err.kind().to_string(),
            stage,
            message: err.to_string(),
            code: err.code().map(str::to_string),
            attempted: stage == Stage::Decided && action.is_some_and(|a| a.is_mutating()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::error::BoundaryError;
    use serde_json::json;

    fn result(action: Action, state: Option<serde_json::Value>) -> ExecutionResult {
        ExecutionResult {
            action,
            state: state.map(|s| s.as_object().unwrap().clone()),
            changed: action.is_mutating(),
            metadata: Attributes::new(),
        }
    }

    #[test]
    fn test_changed_follows_action() {
        assert!(!normalize(result(Action::None, Some(json!({"a": 1})))).changed);
        assert!(normalize(result(Action::Create, Some(json!({"a": 1})))).changed);
        assert!(normalize(result(Action::Update, Some(json!({"a": 1})))).changed);
        assert!(normalize(result(Action::Delete, None)).changed);
    }

    #[test]
    fn test_delete_has_null_state() {
        let doc = normalize(result(Action::Delete, Some(json!({"a": 1}))));
        assert_eq!(doc.state, None);

        let rendered = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            rendered,
            json!({"changed": true, "action": "delete", "state": null})
        );
    }

    #[test]
    fn test_failure_before_execution_was_not_attempted() {
        let err = ReconcileError::validation("'function_name' is required");
        let doc = failure(Stage::Start, None, &err);

        assert!(!doc.is_success());
        let body = doc.error.unwrap();
        assert_eq!(body.kind, "validation");
        assert_eq!(body.stage, Stage::Start);
        assert!(!body.attempted);
    }

    #[test]
    fn test_failure_at_execute_was_attempted() {
        let err = ReconcileError::Execution {
            key: "fn-A".to_string(),
            action: Action::Update,
            source: BoundaryError::from_code(Some("ServiceException".to_string()), "boom"),
        };
        let doc = failure(Stage::Decided, Some(Action::Update), &err);

        let rendered = serde_json::to_value(&doc).unwrap();
        assert_eq!(rendered["error"]["stage"], "decided");
        assert_eq!(rendered["error"]["code"], "ServiceException");
        assert_eq!(rendered["error"]["attempted"], true);
        assert_eq!(rendered["action"], "update");
        assert_eq!(rendered["changed"], false);
    }

    #[test]
    fn test_failed_reread_after_update_is_attempted() {
        let err = ReconcileError::Fetch {
            key: "fn-A".to_string(),
            source: BoundaryError::throttled("Rate exceeded"),
        };
        let doc = failure(Stage::Decided, Some(Action::Update), &err);

        assert!(!doc.changed);
        assert_eq!(doc.action, Some(Action::Update));
        let body = doc.error.unwrap();
        assert_eq!(body.kind, "fetch");
        assert!(body.attempted);
    }
}
