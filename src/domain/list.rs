use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Result, TokenbookError};
use crate::domain::Token;

/// Reserved id of the synthesized native-asset list.
pub const NATIVE_LIST_ID: &str = "native";
/// Reserved id of the synthesized custom-token list.
pub const CUSTOM_LIST_ID: &str = "custom";

/// Where to find one fetchable token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDetails {
    pub id: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    /// Name of a registered schema validator to run against fetched bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl ListDetails {
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            schema: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TokenbookError::Config("list id must not be empty".into()));
        }
        url::Url::parse(&self.source_url)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVersion {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
}

/// One source's token list, after parsing and metadata stamping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenList {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Update time declared by the source itself.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// When this copy was fetched; stamped at merge time.
    #[serde(default)]
    pub fetched_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: ListVersion,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

/// A remote manifest describing where to find several token lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenListManifest {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: ListVersion,
    #[serde(default)]
    pub lists: Vec<ListDetails>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_details_validation() {
        assert!(ListDetails::new("uniswap", "https://example.com/list.json")
            .validate()
            .is_ok());
        assert!(ListDetails::new("", "https://example.com/list.json")
            .validate()
            .is_err());
        assert!(ListDetails::new("uniswap", "not a url").validate().is_err());
    }
}
