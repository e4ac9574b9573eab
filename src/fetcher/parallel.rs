use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::app::Result;
use crate::domain::ListDetails;
use crate::fetcher::{FetchRequest, FetchResult, Fetcher};

pub const DEFAULT_WORKERS: usize = 10;

/// Fans out conditional fetches over a bounded worker pool. A per-item
/// failure is captured in that item's result and never aborts the batch;
/// result ordering is not the input ordering, so consumers match by id.
/// Dropping the future returned by [`fetch_all`] aborts every outstanding
/// fetch in the batch.
///
/// [`fetch_all`]: ParallelFetcher::fetch_all
pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers)),
        }
    }

    pub async fn fetch_all(
        &self,
        requests: Vec<FetchRequest>,
    ) -> Vec<(ListDetails, Result<FetchResult>)> {
        // A JoinSet so the whole batch is aborted when this future is
        // dropped; a plain tokio::spawn would leave the fetches detached.
        let mut tasks = JoinSet::new();

        for request in requests {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");

                let result = fetcher
                    .fetch(&request.details, request.etag.as_deref())
                    .await;
                (request.details, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::app::TokenbookError;

    /// Serves canned bodies with etags; a missing entry is a fetch error.
    struct MockFetcher {
        responses: HashMap<String, (Vec<u8>, String)>,
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, details: &ListDetails, etag: Option<&str>) -> Result<FetchResult> {
            details.validate()?;
            let (body, current_tag) = self
                .responses
                .get(&details.id)
                .ok_or_else(|| TokenbookError::Other(format!("no route for {}", details.id)))?;
            if etag == Some(current_tag.as_str()) {
                return Ok(FetchResult::NotModified);
            }
            Ok(FetchResult::Content {
                body: body.clone(),
                etag: Some(current_tag.clone()),
            })
        }
    }

    fn mock_with(routes: &[(&str, &str, &str)]) -> Arc<MockFetcher> {
        Arc::new(MockFetcher {
            responses: routes
                .iter()
                .map(|(id, body, tag)| {
                    (id.to_string(), (body.as_bytes().to_vec(), tag.to_string()))
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_empty_batch_yields_empty_result() {
        let fetcher = ParallelFetcher::new(mock_with(&[]));
        let results = fetcher.fetch_all(Vec::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_per_item_failure_does_not_abort_batch() {
        let fetcher = ParallelFetcher::new(mock_with(&[
            ("a", "body-a", "tag-a"),
            ("c", "body-c", "tag-c"),
        ]));

        let requests = vec![
            FetchRequest::new(ListDetails::new("a", "https://example.com/a.json")),
            FetchRequest::new(ListDetails::new("b", "https://example.com/b.json")),
            FetchRequest::new(ListDetails::new("c", "https://example.com/c.json")),
        ];

        let mut results = fetcher.fetch_all(requests).await;
        assert_eq!(results.len(), 3);
        results.sort_by(|(a, _), (b, _)| a.id.cmp(&b.id));

        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
    }

    #[tokio::test]
    async fn test_revalidation_round_trip() {
        let mock = mock_with(&[("a", "body-a", "tag-a")]);
        let details = ListDetails::new("a", "https://example.com/a.json");

        // No tag: full body plus a fresh tag.
        let first = mock.fetch(&details, None).await.unwrap();
        let tag = match &first {
            FetchResult::Content { body, etag } => {
                assert_eq!(body, b"body-a");
                etag.clone().unwrap()
            }
            FetchResult::NotModified => panic!("expected content"),
        };

        // Current tag: unchanged.
        let second = mock.fetch(&details, Some(&tag)).await.unwrap();
        assert_eq!(second, FetchResult::NotModified);

        // Stale tag: full body again.
        let third = mock.fetch(&details, Some("stale")).await.unwrap();
        assert!(matches!(third, FetchResult::Content { .. }));
    }
}
