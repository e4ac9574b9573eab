//! Deterministic multi-source merge.
//!
//! A [`SnapshotBuilder`] receives an ordered sequence of token lists and folds
//! them into one aggregate index with a last-write-wins rule per
//! `(chain_id, address)` key. The ordering of `add_*` calls is therefore a
//! precedence contract: later sources override earlier ones. [`build`]
//! freezes the aggregate into an immutable [`Snapshot`].
//!
//! [`build`]: SnapshotBuilder::build

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{token_key, Address, Token, TokenList, NATIVE_LIST_ID};
use crate::parser::TokenListParser;

pub struct SnapshotBuilder {
    chains: Vec<u64>,
    tokens_by_key: HashMap<String, Token>,
    lists_by_id: HashMap<String, TokenList>,
}

impl SnapshotBuilder {
    pub fn new(chains: Vec<u64>) -> Self {
        Self {
            chains,
            tokens_by_key: HashMap::new(),
            lists_by_id: HashMap::new(),
        }
    }

    /// Synthesizes one native-asset token per configured chain under the
    /// reserved `native` list id.
    pub fn add_native_token_list(&mut self) {
        let tokens: Vec<Token> = self.chains.iter().map(|&c| Token::native(c)).collect();
        let list = TokenList {
            id: NATIVE_LIST_ID.to_string(),
            name: "Native Tokens".to_string(),
            source: NATIVE_LIST_ID.to_string(),
            tokens,
            ..Default::default()
        };
        self.merge(NATIVE_LIST_ID.to_string(), list);
    }

    /// Parses `raw` with the given parser, stamps list metadata, and merges.
    pub fn add_raw_token_list(
        &mut self,
        id: &str,
        raw: &[u8],
        source: &str,
        fetched_at: Option<DateTime<Utc>>,
        parser: &dyn TokenListParser,
    ) -> Result<()> {
        let mut list = parser.parse(raw, &self.chains)?;
        list.id = id.to_string();
        list.source = source.to_string();
        list.fetched_timestamp = fetched_at;
        self.merge(id.to_string(), list);
        Ok(())
    }

    /// Merges an already-materialized list (the synthetic custom list).
    pub fn add_token_list(&mut self, id: &str, mut list: TokenList) {
        list.id = id.to_string();
        self.merge(id.to_string(), list);
    }

    fn merge(&mut self, id: String, list: TokenList) {
        for token in &list.tokens {
            self.tokens_by_key.insert(token.key(), token.clone());
        }
        self.lists_by_id.insert(id, list);
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            tokens_by_key: self.tokens_by_key,
            lists_by_id: self.lists_by_id,
        }
    }
}

/// The immutable output of one build pass: a deduplicated token index plus
/// an index of the merged lists. Never mutated after construction.
#[derive(Debug, Default)]
pub struct Snapshot {
    tokens_by_key: HashMap<String, Token>,
    lists_by_id: HashMap<String, TokenList>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all_tokens(&self) -> Vec<Token> {
        self.tokens_by_key.values().cloned().collect()
    }

    pub fn token(&self, chain_id: u64, address: &Address) -> Option<&Token> {
        self.tokens_by_key.get(&token_key(chain_id, address))
    }

    pub fn tokens_by_chain(&self, chain_id: u64) -> Vec<Token> {
        self.tokens_by_key
            .values()
            .filter(|t| t.chain_id == chain_id)
            .cloned()
            .collect()
    }

    /// Batch lookup by precomputed `"{chain}-0x{address}"` keys,
    /// case-insensitive on the address part.
    pub fn tokens_by_keys(&self, keys: &[String]) -> Vec<Token> {
        keys.iter()
            .filter_map(|k| self.tokens_by_key.get(&k.to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn all_lists(&self) -> Vec<&TokenList> {
        self.lists_by_id.values().collect()
    }

    pub fn list(&self, id: &str) -> Option<&TokenList> {
        self.lists_by_id.get(id)
    }

    pub fn token_count(&self) -> usize {
        self.tokens_by_key.len()
    }

    pub fn list_count(&self) -> usize {
        self.lists_by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CUSTOM_LIST_ID;
    use crate::parser::StandardTokenListParser;

    const FOO_ADDR: &str = "0xAAAAAAAAaaaaaaaaAAAAAAAAaaaaaaaaAAAAAAAA";

    fn raw_list(symbol: &str) -> String {
        format!(
            r#"{{"name": "L", "tokens": [{{"chainId": 1, "address": "{}", "name": "{}", "symbol": "{}", "decimals": 18}}]}}"#,
            FOO_ADDR, symbol, symbol
        )
    }

    fn custom_token(symbol: &str) -> Token {
        Token {
            cross_chain_id: None,
            chain_id: 1,
            address: FOO_ADDR.parse().unwrap(),
            decimals: 18,
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            logo_uri: None,
            is_custom: true,
        }
    }

    #[test]
    fn test_native_list_covers_all_chains() {
        let mut builder = SnapshotBuilder::new(vec![1, 56]);
        builder.add_native_token_list();
        let snapshot = builder.build();

        assert_eq!(snapshot.token_count(), 2);
        assert!(snapshot.token(1, &Address::ZERO).is_some());
        assert!(snapshot.token(56, &Address::ZERO).is_some());
        assert_eq!(snapshot.list(NATIVE_LIST_ID).unwrap().tokens.len(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let parser = StandardTokenListParser::new();
        let mut builder = SnapshotBuilder::new(vec![1]);
        builder
            .add_raw_token_list("main", raw_list("FOO").as_bytes(), "main", None, &parser)
            .unwrap();
        builder.add_token_list(
            CUSTOM_LIST_ID,
            TokenList {
                tokens: vec![custom_token("BAR")],
                ..Default::default()
            },
        );

        let snapshot = builder.build();
        let address: Address = FOO_ADDR.parse().unwrap();
        let token = snapshot.token(1, &address).unwrap();
        assert_eq!(token.symbol, "BAR");
        assert!(token.is_custom);
        // Both lists survive even though the token was overwritten.
        assert_eq!(snapshot.list_count(), 2);
    }

    #[test]
    fn test_raw_list_metadata_is_stamped() {
        let parser = StandardTokenListParser::new();
        let fetched = Some(Utc::now());
        let mut builder = SnapshotBuilder::new(vec![1]);
        builder
            .add_raw_token_list("main", raw_list("FOO").as_bytes(), "bundled", fetched, &parser)
            .unwrap();

        let snapshot = builder.build();
        let list = snapshot.list("main").unwrap();
        assert_eq!(list.id, "main");
        assert_eq!(list.source, "bundled");
        assert_eq!(list.fetched_timestamp, fetched);
    }

    #[test]
    fn test_tokens_by_keys_is_case_insensitive() {
        let parser = StandardTokenListParser::new();
        let mut builder = SnapshotBuilder::new(vec![1]);
        builder
            .add_raw_token_list("main", raw_list("FOO").as_bytes(), "main", None, &parser)
            .unwrap();
        let snapshot = builder.build();

        let keys = vec![format!("1-{}", FOO_ADDR)];
        let found = snapshot.tokens_by_keys(&keys);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbol, "FOO");
    }

    #[test]
    fn test_malformed_raw_list_errors() {
        let parser = StandardTokenListParser::new();
        let mut builder = SnapshotBuilder::new(vec![1]);
        assert!(builder
            .add_raw_token_list("bad", b"{broken", "bad", None, &parser)
            .is_err());
    }
}
