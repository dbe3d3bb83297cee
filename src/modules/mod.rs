pub mod aws;

use async_trait::async_trait;

use crate::reconcile::descriptor::{Attributes, ResourceSpec, Schema};
use crate::reconcile::error::{BoundaryError, ReconcileError};

/// How the fetcher locates a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A direct read keyed by the resource key.
    Describe,
    /// A paginated listing filtered through [`ResourceModule::matches`].
    Scan,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Attributes>,
    pub next_marker: Option<String>,
}

/// What a mutating call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Post-action attributes, when the response carries all of them.
    /// `None` makes the executor re-read the resource.
    pub state: Option<Attributes>,
    pub metadata: Attributes,
}

impl Applied {
    pub fn complete(state: Attributes) -> Self {
        Self {
            state: Some(state),
            metadata: Attributes::new(),
        }
    }

    pub fn incomplete() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// One resource type's capabilities against the service boundary.
#[async_trait]
pub trait ResourceModule: Send + Sync {
    fn schema(&self) -> &'static Schema;

    fn name(&self) -> &str {
        self.schema().resource_type
    }

    /// Combination rules that the schema alone cannot express.
    fn check(&self, _spec: &ResourceSpec) -> Result<(), ReconcileError> {
        Ok(())
    }

    /// Normalizes declared values that need a boundary call or local I/O to resolve.
    async fn prepare(&self, _spec: &mut ResourceSpec) -> Result<(), ReconcileError> {
        Ok(())
    }

    fn lookup(&self, _spec: &ResourceSpec) -> Lookup {
        Lookup::Describe
    }

    async fn describe(&self, _spec: &ResourceSpec) -> Result<Attributes, BoundaryError> {
        Err(BoundaryError::unknown(format!(
            "{} does not support describe",
            self.name()
        )))
    }

    async fn list(
        &self,
        _spec: &ResourceSpec,
        _marker: Option<String>,
    ) -> Result<Page, BoundaryError> {
        Err(BoundaryError::unknown(format!(
            "{} does not support list",
            self.name()
        )))
    }

    fn matches(&self, _spec: &ResourceSpec, _item: &Attributes) -> bool {
        false
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Applied, BoundaryError>;

    async fn update(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
        changes: &Attributes,
    ) -> Result<Applied, BoundaryError>;

    async fn delete(
        &self,
        spec: &ResourceSpec,
        current: &Attributes,
    ) -> Result<Applied, BoundaryError>;
}
