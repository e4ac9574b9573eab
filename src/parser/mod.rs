pub mod standard;

use crate::app::Result;
use crate::domain::{TokenList, TokenListManifest};

pub use standard::{StandardManifestParser, StandardTokenListParser};

/// Decodes one token-list wire format into the unified [`TokenList`] model.
///
/// Implementations must tolerate an empty token array (that is a valid list)
/// and must silently drop entries on chains outside `allowed_chains` or with
/// malformed addresses; only structurally malformed input is an error.
pub trait TokenListParser: Send + Sync {
    fn parse(&self, raw: &[u8], allowed_chains: &[u64]) -> Result<TokenList>;
}

/// Decodes a remote "list of lists" manifest.
pub trait ManifestParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<TokenListManifest>;
}
