pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::ListDetails;

pub use http_fetcher::HttpFetcher;
pub use parallel::{ParallelFetcher, DEFAULT_WORKERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// New content fetched successfully, with the server's revalidation tag.
    Content { body: Vec<u8>, etag: Option<String> },
    /// Content not modified relative to the supplied tag (HTTP 304).
    NotModified,
}

/// One unit of work for the parallel fetcher: a list plus the revalidation
/// tag from its last known-good copy, if any.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub details: ListDetails,
    pub etag: Option<String>,
}

impl FetchRequest {
    pub fn new(details: ListDetails) -> Self {
        Self { details, etag: None }
    }

    pub fn with_etag(details: ListDetails, etag: Option<String>) -> Self {
        Self { details, etag }
    }
}

/// Validates a fetched body against a named schema before it is handed to
/// callers. Registered on the fetcher, referenced by `ListDetails::schema`.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, body: &[u8]) -> std::result::Result<(), String>;
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Conditional GET of one list. Supplying `etag` asks the server whether
    /// the resource changed since that tag; an unchanged resource comes back
    /// as [`FetchResult::NotModified`]. Callers should only supply a tag for
    /// which they still hold the matching body.
    async fn fetch(&self, details: &ListDetails, etag: Option<&str>) -> Result<FetchResult>;
}
