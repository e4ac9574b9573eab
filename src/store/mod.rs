pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::Token;

pub use memory::{MemoryContentStore, MemoryCustomTokenStore};
pub use sqlite::SqliteContentStore;

/// The persisted unit: one list's last known-good copy plus the revalidation
/// tag needed to check it for staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub source_url: String,
    pub etag: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Keyed storage for fetched list contents. Implementations must be safe for
/// concurrent calls; the scheduler writes while rebuilds read.
pub trait ContentStore: Send + Sync {
    fn get_etag(&self, id: &str) -> Result<Option<String>>;
    fn get(&self, id: &str) -> Result<Option<Content>>;
    fn set(&self, id: &str, content: Content) -> Result<()>;
    fn get_all(&self) -> Result<HashMap<String, Content>>;
}

/// Source of user-added tokens, merged last during a rebuild.
pub trait CustomTokenStore: Send + Sync {
    fn get_all(&self) -> Result<Vec<Token>>;
}
