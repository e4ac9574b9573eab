use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::{Result, TokenbookError};

/// Maximum supported token precision.
pub const MAX_DECIMALS: u8 = 18;

/// A 20-byte account address. The zero address denotes a chain's native asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form, the canonical key representation.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TokenbookError;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if stripped.len() != 40 {
            return Err(TokenbookError::InvalidToken(format!(
                "address must be 40 hex digits, got {:?}",
                s
            )));
        }
        let bytes = hex::decode(stripped)
            .map_err(|e| TokenbookError::InvalidToken(format!("bad address {:?}: {}", s, e)))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Address {
    type Error = TokenbookError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_hex()
    }
}

/// One token's metadata. Identity is `(chain_id, address)`; everything else
/// is descriptive and may be overwritten by a higher-precedence source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_chain_id: Option<String>,
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
}

impl Token {
    /// The native asset of `chain_id`, carried at the zero address.
    pub fn native(chain_id: u64) -> Self {
        let (name, symbol) = native_asset_labels(chain_id);
        Self {
            cross_chain_id: None,
            chain_id,
            address: Address::ZERO,
            decimals: MAX_DECIMALS,
            name: name.to_string(),
            symbol: symbol.to_string(),
            logo_uri: None,
            is_custom: false,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }

    /// Canonical index key: `"{chain_id}-0x{lowercase address}"`.
    pub fn key(&self) -> String {
        token_key(self.chain_id, &self.address)
    }

    /// Checks the invariants a custom token must satisfy before it may enter
    /// the aggregate index. Remote tokens are filtered at parse time instead.
    pub fn validate(&self, allowed_chains: &[u64]) -> Result<()> {
        if !allowed_chains.contains(&self.chain_id) {
            return Err(TokenbookError::InvalidToken(format!(
                "chain {} is not configured",
                self.chain_id
            )));
        }
        if self.symbol.is_empty() {
            return Err(TokenbookError::InvalidToken("empty symbol".into()));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(TokenbookError::InvalidToken(format!(
                "decimals {} exceeds {}",
                self.decimals, MAX_DECIMALS
            )));
        }
        if let Some(uri) = &self.logo_uri {
            if !uri.is_empty() {
                url::Url::parse(uri)?;
            }
        }
        Ok(())
    }
}

pub fn token_key(chain_id: u64, address: &Address) -> String {
    format!("{}-{}", chain_id, address.to_hex())
}

fn native_asset_labels(chain_id: u64) -> (&'static str, &'static str) {
    match chain_id {
        1 | 10 | 42161 | 8453 => ("Ether", "ETH"),
        56 => ("BNB", "BNB"),
        137 => ("Polygon Ecosystem Token", "POL"),
        43114 => ("Avalanche", "AVAX"),
        _ => ("Native Token", "NATIVE"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_and_without_prefix() {
        let a: Address = "0xAAAAAAAAaaaaaaaaAAAAAAAAaaaaaaaaAAAAAAAA".parse().unwrap();
        let b: Address = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
        assert!("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_native_token() {
        let t = Token::native(1);
        assert!(t.is_native());
        assert_eq!(t.symbol, "ETH");
        assert_eq!(t.key(), format!("1-{}", Address::ZERO.to_hex()));
    }

    #[test]
    fn test_validate_rejects_unknown_chain_and_bad_decimals() {
        let mut t = Token::native(1);
        assert!(t.validate(&[1, 56]).is_ok());
        assert!(t.validate(&[56]).is_err());

        t.decimals = 19;
        assert!(t.validate(&[1]).is_err());

        t.decimals = 18;
        t.symbol = String::new();
        assert!(t.validate(&[1]).is_err());
    }

    #[test]
    fn test_key_is_case_insensitive_on_address() {
        let a: Token = Token {
            cross_chain_id: None,
            chain_id: 1,
            address: "0xAAAAAAAAaaaaaaaaAAAAAAAAaaaaaaaaAAAAAAAA".parse().unwrap(),
            decimals: 18,
            name: "Foo".into(),
            symbol: "FOO".into(),
            logo_uri: None,
            is_custom: false,
        };
        assert_eq!(a.key(), "1-0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }
}
