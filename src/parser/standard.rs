//! Parsers for the standard (Uniswap-style) token-list JSON format and the
//! standard manifest format.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::app::{Result, TokenbookError};
use crate::domain::{Address, ListVersion, Token, TokenList, TokenListManifest, MAX_DECIMALS};
use crate::parser::{ManifestParser, TokenListParser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenList {
    #[serde(default)]
    name: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    version: ListVersion,
    #[serde(default, rename = "logoURI")]
    logo_uri: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToken {
    #[serde(default)]
    cross_chain_id: Option<String>,
    chain_id: u64,
    address: String,
    #[serde(default)]
    decimals: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default, rename = "logoURI")]
    logo_uri: Option<String>,
}

/// Standard token-list decoder.
#[derive(Debug, Clone, Default)]
pub struct StandardTokenListParser;

impl StandardTokenListParser {
    pub fn new() -> Self {
        Self
    }
}

impl TokenListParser for StandardTokenListParser {
    fn parse(&self, raw: &[u8], allowed_chains: &[u64]) -> Result<TokenList> {
        let list: RawTokenList = serde_json::from_slice(raw)
            .map_err(|e| TokenbookError::ListParse(e.to_string()))?;

        let mut tokens = Vec::with_capacity(list.tokens.len());
        for entry in list.tokens {
            if !allowed_chains.contains(&entry.chain_id) {
                continue;
            }
            let address: Address = match entry.address.parse() {
                Ok(a) => a,
                Err(_) => {
                    tracing::debug!(address = %entry.address, "skipping token with malformed address");
                    continue;
                }
            };
            if entry.symbol.is_empty() || entry.decimals > MAX_DECIMALS {
                continue;
            }
            tokens.push(Token {
                cross_chain_id: entry.cross_chain_id,
                chain_id: entry.chain_id,
                address,
                decimals: entry.decimals,
                name: entry.name,
                symbol: entry.symbol,
                logo_uri: entry.logo_uri,
                is_custom: false,
            });
        }

        Ok(TokenList {
            id: String::new(),
            name: list.name,
            timestamp: list.timestamp,
            fetched_timestamp: None,
            source: String::new(),
            version: list.version,
            tags: Vec::new(),
            logo_uri: list.logo_uri,
            keywords: list.keywords,
            tokens,
        })
    }
}

/// Standard manifest decoder: `{timestamp?, version?, lists: [...]}`.
#[derive(Debug, Clone, Default)]
pub struct StandardManifestParser;

impl StandardManifestParser {
    pub fn new() -> Self {
        Self
    }
}

impl ManifestParser for StandardManifestParser {
    fn parse(&self, raw: &[u8]) -> Result<TokenListManifest> {
        let manifest: TokenListManifest = serde_json::from_slice(raw)
            .map_err(|e| TokenbookError::ListParse(e.to_string()))?;
        for details in &manifest.lists {
            details.validate()?;
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_SAMPLE: &str = r#"{
        "name": "Test List",
        "timestamp": "2024-01-01T00:00:00Z",
        "version": {"major": 2, "minor": 1, "patch": 0},
        "keywords": ["defi"],
        "tokens": [
            {
                "chainId": 1,
                "address": "0xAAAAAAAAaaaaaaaaAAAAAAAAaaaaaaaaAAAAAAAA",
                "name": "Foo Coin",
                "symbol": "FOO",
                "decimals": 18
            },
            {
                "chainId": 999,
                "address": "0xBBBBBBBBbbbbbbbbBBBBBBBBbbbbbbbbBBBBBBBB",
                "name": "Wrong Chain",
                "symbol": "WRONG",
                "decimals": 18
            },
            {
                "chainId": 1,
                "address": "not-an-address",
                "name": "Bad Address",
                "symbol": "BAD",
                "decimals": 18
            }
        ]
    }"#;

    #[test]
    fn test_parse_filters_disallowed_and_malformed() {
        let parser = StandardTokenListParser::new();
        let list = parser.parse(LIST_SAMPLE.as_bytes(), &[1]).unwrap();

        assert_eq!(list.name, "Test List");
        assert_eq!(list.version.major, 2);
        assert_eq!(list.tokens.len(), 1);
        assert_eq!(list.tokens[0].symbol, "FOO");
        assert_eq!(
            list.tokens[0].key(),
            "1-0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_parse_empty_token_array_is_ok() {
        let parser = StandardTokenListParser::new();
        let list = parser
            .parse(br#"{"name": "Empty", "tokens": []}"#, &[1])
            .unwrap();
        assert!(list.tokens.is_empty());
    }

    #[test]
    fn test_parse_malformed_json_errors() {
        let parser = StandardTokenListParser::new();
        assert!(parser.parse(b"{not json", &[1]).is_err());
    }

    #[test]
    fn test_parse_manifest() {
        let raw = r#"{
            "timestamp": "2024-06-01T00:00:00Z",
            "version": {"major": 1, "minor": 0, "patch": 0},
            "lists": [
                {"id": "uniswap", "sourceUrl": "https://example.com/uniswap.json"},
                {"id": "aave", "sourceUrl": "https://example.com/aave.json", "schema": "standard"}
            ]
        }"#;
        let parser = StandardManifestParser::new();
        let manifest = parser.parse(raw.as_bytes()).unwrap();
        assert_eq!(manifest.lists.len(), 2);
        assert_eq!(manifest.lists[0].id, "uniswap");
        assert_eq!(manifest.lists[1].schema.as_deref(), Some("standard"));
    }

    #[test]
    fn test_parse_manifest_rejects_bad_entry() {
        let raw = r#"{"lists": [{"id": "", "sourceUrl": "https://example.com/x.json"}]}"#;
        let parser = StandardManifestParser::new();
        assert!(parser.parse(raw.as_bytes()).is_err());
    }
}
