pub mod decision;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod normalizer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use decision::{decide, Action, Decision};
pub use descriptor::{validate, Attributes, Lifecycle, ResourceKey, ResourceSpec, Schema};
pub use error::{BoundaryError, ErrorClass, ReconcileError};
pub use executor::{execute, ExecutionResult};
pub use fetcher::{fetch, paginate, RemoteState};
pub use normalizer::{normalize, ErrorBody, OutputDocument};

/// Stages of one reconciliation. Each is entered at most once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Start,
    Validated,
    Fetched,
    Decided,
    Executed,
    Normalized,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Validated => "validated",
            Stage::Fetched => "fetched",
            Stage::Decided => "decided",
            Stage::Executed => "executed",
            Stage::Normalized => "normalized",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}
