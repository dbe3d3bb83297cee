use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decision::Action;

/// Failure classes reported by a service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    NotFound,
    Throttled,
    Conflict,
    PermissionDenied,
    Unknown,
}

impl ErrorClass {
    /// Maps an AWS service error code onto a failure class.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" | "NoSuchEntity" | "NoSuchBucket" | "NoSuchKey"
            | "NotFound" => ErrorClass::NotFound,
            "TooManyRequestsException" | "ThrottlingException" | "Throttling"
            | "ThrottledException" | "RequestLimitExceeded" | "SlowDown"
            | "EC2ThrottledException" => ErrorClass::Throttled,
            "ResourceConflictException" | "ResourceInUseException"
            | "PreconditionFailedException" | "OperationAbortedException"
            | "EntityAlreadyExists" => ErrorClass::Conflict,
            "AccessDeniedException" | "AccessDenied" | "UnrecognizedClientException"
            | "InvalidSignatureException" | "ExpiredTokenException"
            | "UnauthorizedOperation" | "KMSAccessDeniedException" => {
                ErrorClass::PermissionDenied
            }
            _ => ErrorClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::NotFound => "not_found",
            ErrorClass::Throttled => "throttled",
            ErrorClass::Conflict => "conflict",
            ErrorClass::PermissionDenied => "permission_denied",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure returned by the service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct BoundaryError {
    pub class: ErrorClass,
    pub code: Option<String>,
    pub message: String,
}

impl BoundaryError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            code: None,
            message: message.into(),
        }
    }

    pub fn from_code(code: Option<String>, message: impl Into<String>) -> Self {
        let class = code
            .as_deref()
            .map(ErrorClass::from_code)
            .unwrap_or(ErrorClass::Unknown);

        Self {
            class,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Throttled, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unknown, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }

    pub fn is_throttled(&self) -> bool {
        self.class == ErrorClass::Throttled
    }

    pub fn is_conflict(&self) -> bool {
        self.class == ErrorClass::Conflict
    }
}

/// Every way a single reconciliation can fail.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("failed to read {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: BoundaryError,
    },

    #[error("failed to {action} {key}: {source}")]
    Execution {
        key: String,
        action: Action,
        #[source]
        source: BoundaryError,
    },

    #[error("conflict on {key}: {message}")]
    Conflict {
        key: String,
        message: String,
        code: Option<String>,
    },
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReconcileError::Validation(message.into())
    }

    pub fn conflict(key: impl fmt::Display, message: impl Into<String>) -> Self {
        ReconcileError::Conflict {
            key: key.to_string(),
            message: message.into(),
            code: None,
        }
    }

    /// Short tag used as `error.kind` in the output document.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Validation(_) => "validation",
            ReconcileError::Fetch { .. } => "fetch",
            ReconcileError::Execution { .. } => "execution",
            ReconcileError::Conflict { .. } => "conflict",
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ReconcileError::Validation(_) => None,
            ReconcileError::Fetch { source, .. } | ReconcileError::Execution { source, .. } => {
                source.code.as_deref()
            }
            ReconcileError::Conflict { code, .. } => code.as_deref(),
        }
    }
}
