use anyhow::{Context, Result};
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde_json::{json, Value as JsonValue};

use super::clients::LambdaOperations;
use super::permission::statement_attributes;
use crate::reconcile::descriptor::Attributes;
use crate::reconcile::error::BoundaryError;
use crate::reconcile::fetcher::paginate;

#[derive(Debug, Clone, Default)]
pub struct FactsQuery {
    pub function_name: Option<String>,
    pub include_versions: bool,
    /// Caps every listing; `None` walks each listing to the end.
    pub max_items: Option<usize>,
}

async fn collect<S>(items: S, max_items: Option<usize>) -> Result<Vec<Attributes>, BoundaryError>
where
    S: futures::Stream<Item = Result<Attributes, BoundaryError>>,
{
    items
        .take(max_items.unwrap_or(usize::MAX))
        .try_collect()
        .await
}

/// Read-only view of one function (configuration, aliases, policy, versions)
/// or, without a name, of every function and event source mapping.
pub async fn gather(lambda: &dyn LambdaOperations, query: &FactsQuery) -> Result<JsonValue> {
    let Some(name) = query.function_name.as_deref() else {
        info!("Gathering facts for all functions");

        let functions = collect(
            paginate(|marker| lambda.list_functions(marker, None)),
            query.max_items,
        )
        .await
        .context("Failed to list functions")?;

        let mappings = collect(
            paginate(|marker| lambda.list_event_source_mappings(None, None, marker)),
            query.max_items,
        )
        .await
        .context("Failed to list event source mappings")?;

        return Ok(json!({
            "functions": functions,
            "event_source_mappings": mappings,
        }));
    };

    info!("Gathering facts for function: {}", name);

    let configuration = lambda
        .get_function_configuration(name, None)
        .await
        .with_context(|| format!("Failed to read function {}", name))?;

    let aliases = collect(
        paginate(|marker| lambda.list_aliases(name, marker)),
        query.max_items,
    )
    .await
    .with_context(|| format!("Failed to list aliases of {}", name))?;

    let policy = match lambda.get_policy(name, None).await {
        Ok(policy) => policy
            .get("Statement")
            .and_then(|s| s.as_array())
            .map(|statements| {
                statements
                    .iter()
                    .map(|s| JsonValue::Object(statement_attributes(s)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read policy of {}", name));
        }
    };

    let mut facts = json!({
        "function": configuration,
        "aliases": aliases,
        "policy": policy,
    });

    if query.include_versions {
        let versions = collect(
            paginate(|marker| lambda.list_versions_by_function(name, marker)),
            query.max_items,
        )
        .await
        .with_context(|| format!("Failed to list versions of {}", name))?;
        facts["versions"] = json!(versions);
    }

    Ok(facts)
}
