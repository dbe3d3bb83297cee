use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;

use super::descriptor::{Attributes, ResourceSpec};
use super::error::{BoundaryError, ReconcileError};
use crate::modules::{Lookup, Page, ResourceModule};

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteState {
    Absent,
    Present(Attributes),
}

impl RemoteState {
    pub fn is_present(&self) -> bool {
        matches!(self, RemoteState::Present(_))
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            RemoteState::Present(attributes) => Some(attributes),
            RemoteState::Absent => None,
        }
    }

    pub fn into_attributes(self) -> Option<Attributes> {
        match self {
            RemoteState::Present(attributes) => Some(attributes),
            RemoteState::Absent => None,
        }
    }
}

enum Cursor {
    Start(Option<String>),
    Next(String),
    Done,
}

/// Lazily walks a marker-paginated listing, yielding one item at a time.
///
/// A page is only requested once the previous one has been consumed, and the
/// stream ends after the first page that carries no marker.
pub fn paginate<F, Fut>(fetch_page: F) -> impl Stream<Item = Result<Attributes, BoundaryError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, BoundaryError>>,
{
    paginate_from(None, fetch_page)
}

/// Like [`paginate`], but resumes from a marker returned by an earlier walk.
pub fn paginate_from<F, Fut>(
    marker: Option<String>,
    fetch_page: F,
) -> impl Stream<Item = Result<Attributes, BoundaryError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, BoundaryError>>,
{
    stream::try_unfold(
        (Cursor::Start(marker), fetch_page),
        |(cursor, mut fetch_page)| async move {
            let marker = match cursor {
                Cursor::Start(marker) => marker,
                Cursor::Next(marker) => Some(marker),
                Cursor::Done => return Ok(None),
            };

            let page = fetch_page(marker).await?;
            let next = match page.next_marker {
                Some(marker) if !marker.is_empty() => Cursor::Next(marker),
                _ => Cursor::Done,
            };

            Ok::<_, BoundaryError>(Some((page.items, (next, fetch_page))))
        },
    )
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, BoundaryError>)))
    .try_flatten()
}

/// Reads the current state of the resource named by `spec`.
///
/// The boundary's not-found signal becomes `Absent` and a conflict stays a
/// conflict; every other failure is a fetch error.
pub async fn fetch(
    module: &dyn ResourceModule,
    spec: &ResourceSpec,
) -> Result<RemoteState, ReconcileError> {
    let key = spec.key.to_string();
    let wrap = |source: BoundaryError| ReconcileError::Fetch {
        key: key.clone(),
        source,
    };

    match module.lookup(spec) {
        Lookup::Describe => match module.describe(spec).await {
            Ok(attributes) => Ok(RemoteState::Present(attributes)),
            Err(e) if e.is_not_found() => {
                debug!("{} {} not found", spec.resource_type, key);
                Ok(RemoteState::Absent)
            }
            Err(e) if e.is_conflict() => Err(ReconcileError::Conflict {
                key: key.clone(),
                message: e.message,
                code: e.code,
            }),
            Err(e) => Err(wrap(e)),
        },
        Lookup::Scan => {
            let items = paginate(|marker| module.list(spec, marker));
            futures::pin_mut!(items);

            let mut scanned = 0usize;
            while let Some(item) = items.try_next().await.map_err(wrap)? {
                scanned += 1;
                if module.matches(spec, &item) {
                    return Ok(RemoteState::Present(item));
                }
            }

            debug!(
                "{} {} not found after scanning {} items",
                spec.resource_type, key, scanned
            );
            Ok(RemoteState::Absent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(n: usize) -> Attributes {
        json!({"n": n}).as_object().unwrap().clone()
    }

    fn pages(marker: Option<String>) -> Result<Page, BoundaryError> {
        match marker.as_deref() {
            None => Ok(Page {
                items: vec![item(1), item(2)],
                next_marker: Some("p2".to_string()),
            }),
            Some("p2") => Ok(Page {
                items: vec![],
                next_marker: Some("p3".to_string()),
            }),
            Some("p3") => Ok(Page {
                items: vec![item(3)],
                next_marker: None,
            }),
            Some(other) => Err(BoundaryError::unknown(format!("bad marker {}", other))),
        }
    }

    #[tokio::test]
    async fn test_paginate_follows_markers_until_exhausted() {
        let items: Vec<Attributes> = paginate(|m| async move { pages(m) })
            .try_collect()
            .await
            .unwrap();

        let ns: Vec<u64> = items.iter().map(|i| i["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_paginate_is_lazy() {
        let calls = AtomicUsize::new(0);
        let items = paginate(|m| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { pages(m) }
        });
        futures::pin_mut!(items);

        let first = items.try_next().await.unwrap().unwrap();
        assert_eq!(first["n"], 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_paginate_from_resumes() {
        let items: Vec<Attributes> =
            paginate_from(Some("p3".to_string()), |m| async move { pages(m) })
                .try_collect()
                .await
                .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["n"], 3);
    }

    #[tokio::test]
    async fn test_paginate_surfaces_errors() {
        let result: Result<Vec<Attributes>, _> =
            paginate_from(Some("zz".to_string()), |m| async move { pages(m) })
                .try_collect()
                .await;

        assert!(result.unwrap_err().message.contains("bad marker"));
    }
}
