use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};

use crate::app::{Result, TokenbookError};
use crate::domain::ListDetails;
use crate::fetcher::{FetchResult, Fetcher, SchemaValidator};

pub struct HttpFetcher {
    client: Client,
    validators: HashMap<String, Arc<dyn SchemaValidator>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .user_agent("tokenbook/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            validators: HashMap::new(),
        }
    }

    /// Registers a schema validator under `name`; lists whose `schema` field
    /// names it will have their bodies validated before being returned.
    pub fn with_validator(mut self, name: impl Into<String>, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validators.insert(name.into(), validator);
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, details: &ListDetails, etag: Option<&str>) -> Result<FetchResult> {
        details.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        let response = self
            .client
            .get(&details.source_url)
            .headers(headers)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!(id = %details.id, "list not modified");
            return Ok(FetchResult::NotModified);
        }

        response.error_for_status_ref()?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        // reqwest decompresses gzip/brotli transparently.
        let body = response.bytes().await?.to_vec();

        self.validate_body(details, &body)?;

        Ok(FetchResult::Content { body, etag })
    }
}

impl HttpFetcher {
    /// A schema mismatch is terminal for the fetch: no partial data escapes.
    fn validate_body(&self, details: &ListDetails, body: &[u8]) -> Result<()> {
        let Some(schema) = &details.schema else {
            return Ok(());
        };
        let Some(validator) = self.validators.get(schema) else {
            return Ok(());
        };
        validator
            .validate(body)
            .map_err(|reason| TokenbookError::SchemaValidation {
                id: details.id.clone(),
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectAll;

    impl crate::fetcher::SchemaValidator for RejectAll {
        fn validate(&self, _body: &[u8]) -> std::result::Result<(), String> {
            Err("does not match schema".into())
        }
    }

    #[test]
    fn test_schema_validation_gates_body() {
        let fetcher = HttpFetcher::new().with_validator("strict", Arc::new(RejectAll));

        let mut details = ListDetails::new("a", "https://example.com/a.json");
        assert!(fetcher.validate_body(&details, b"{}").is_ok());

        details.schema = Some("strict".into());
        assert!(matches!(
            fetcher.validate_body(&details, b"{}"),
            Err(TokenbookError::SchemaValidation { .. })
        ));

        // An unregistered schema name is not an error.
        details.schema = Some("unknown".into());
        assert!(fetcher.validate_body(&details, b"{}").is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_details() {
        let fetcher = HttpFetcher::new();

        let empty_id = ListDetails::new("", "https://example.com/list.json");
        assert!(matches!(
            fetcher.fetch(&empty_id, None).await,
            Err(TokenbookError::Config(_))
        ));

        let bad_url = ListDetails::new("uniswap", "not a url");
        assert!(matches!(
            fetcher.fetch(&bad_url, None).await,
            Err(TokenbookError::InvalidUrl(_))
        ));
    }
}
