use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};

use crate::modules::ResourceModule;
use crate::reconcile::decision::{decide, Action};
use crate::reconcile::descriptor::{validate, TYPE_FIELD};
use crate::reconcile::error::ReconcileError;
use crate::reconcile::executor::execute;
use crate::reconcile::fetcher::fetch;
use crate::reconcile::normalizer::{failure, normalize, OutputDocument};
use crate::reconcile::Stage;
use crate::utils::RetryPolicy;

/// Where a reconciliation got to before it stopped.
#[derive(Debug, Clone, Copy)]
struct Progress {
    stage: Stage,
    action: Option<Action>,
}

impl Progress {
    fn advance(&mut self, stage: Stage) {
        info!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }
}

/// Reconciles one resource per call through the registered resource modules.
#[derive(Clone)]
pub struct Controller {
    modules: Arc<HashMap<String, Arc<dyn ResourceModule>>>,
    retry: RetryPolicy,
}

impl Controller {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            modules: Arc::new(HashMap::new()),
            retry,
        }
    }

    pub fn with_modules<I>(retry: RetryPolicy, modules: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ResourceModule>>,
    {
        let mut controller = Self::new(retry);
        for module in modules {
            controller.register_module(module);
        }
        controller
    }

    pub fn register_module(&mut self, module: Arc<dyn ResourceModule>) {
        let name = module.name().to_string();
        Arc::make_mut(&mut self.modules).insert(name, module);
    }

    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    fn select_module(&self, resource_type: &str) -> Result<Arc<dyn ResourceModule>, ReconcileError> {
        self.modules.get(resource_type).cloned().ok_or_else(|| {
            ReconcileError::validation(format!(
                "unsupported resource type '{}'; expected one of: {}",
                resource_type,
                self.resource_types().join(", ")
            ))
        })
    }

    /// Parses a YAML or JSON input document and reconciles it.
    pub async fn reconcile_document(&self, text: &str, check_mode: bool) -> OutputDocument {
        match serde_yaml::from_str::<JsonValue>(text) {
            Ok(input) => self.reconcile(&input, check_mode).await,
            Err(e) => {
                let err = ReconcileError::validation(format!("malformed input document: {}", e));
                error!(error = %err, "reconciliation failed");
                failure(Stage::Start, None, &err)
            }
        }
    }

    /// Runs one reconciliation and always returns an output document; failures
    /// are reported in its `error` field.
    #[instrument(
        skip(self, input),
        fields(resource_type = tracing::field::Empty, key = tracing::field::Empty)
    )]
    pub async fn reconcile(&self, input: &JsonValue, check_mode: bool) -> OutputDocument {
        let mut progress = Progress {
            stage: Stage::Start,
            action: None,
        };

        match self.run(input, check_mode, &mut progress).await {
            Ok(document) => document,
            Err(err) => {
                error!(
                    stage = %progress.stage,
                    kind = err.kind(),
                    error = %err,
                    "reconciliation failed"
                );
                let mut document = failure(progress.stage, progress.action, &err);
                document.check_mode = check_mode;
                document
            }
        }
    }

    async fn run(
        &self,
        input: &JsonValue,
        check_mode: bool,
        progress: &mut Progress,
    ) -> Result<OutputDocument, ReconcileError> {
        let raw = input
            .as_object()
            .ok_or_else(|| ReconcileError::validation("input document must be a mapping"))?;

        let resource_type = raw
            .get(TYPE_FIELD)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ReconcileError::validation("'type' is required"))?;
        let module = self.select_module(resource_type)?;

        let mut spec = validate(module.schema(), raw)?;
        module.check(&spec)?;
        module.prepare(&mut spec).await?;

        let span = tracing::Span::current();
        span.record("resource_type", resource_type);
        span.record("key", spec.key.to_string().as_str());
        progress.advance(Stage::Validated);

        let remote = fetch(module.as_ref(), &spec).await?;
        progress.advance(Stage::Fetched);

        let decision = decide(module.schema(), &spec, &remote)?;
        progress.action = Some(decision.action);
        progress.advance(Stage::Decided);
        info!(action = %decision.action, changes = decision.changes.len(), "decided");

        if check_mode {
            if decision.action.is_mutating() {
                warn!(action = %decision.action, "check mode, not applying");
            }
            return Ok(OutputDocument {
                changed: decision.action.is_mutating(),
                action: Some(decision.action),
                state: remote.into_attributes(),
                metadata: decision.changes,
                check_mode: true,
                error: None,
            });
        }

        let result = execute(module.as_ref(), &spec, &decision, remote, &self.retry).await?;
        progress.advance(Stage::Executed);

        let document = normalize(result);
        progress.advance(Stage::Normalized);
        progress.advance(Stage::Done);
        Ok(document)
    }
}
