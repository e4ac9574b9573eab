use std::collections::HashMap;
use std::sync::RwLock;

use crate::app::{Result, TokenbookError};
use crate::domain::Token;
use crate::store::{Content, ContentStore, CustomTokenStore};

/// In-memory content store, primarily for tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryContentStore {
    contents: RwLock<HashMap<String, Content>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    fn get_etag(&self, id: &str) -> Result<Option<String>> {
        let contents = self
            .contents
            .read()
            .map_err(|e| TokenbookError::Other(format!("content store poisoned: {}", e)))?;
        Ok(contents.get(id).and_then(|c| c.etag.clone()))
    }

    fn get(&self, id: &str) -> Result<Option<Content>> {
        let contents = self
            .contents
            .read()
            .map_err(|e| TokenbookError::Other(format!("content store poisoned: {}", e)))?;
        Ok(contents.get(id).cloned())
    }

    fn set(&self, id: &str, content: Content) -> Result<()> {
        let mut contents = self
            .contents
            .write()
            .map_err(|e| TokenbookError::Other(format!("content store poisoned: {}", e)))?;
        contents.insert(id.to_string(), content);
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, Content>> {
        let contents = self
            .contents
            .read()
            .map_err(|e| TokenbookError::Other(format!("content store poisoned: {}", e)))?;
        Ok(contents.clone())
    }
}

/// In-memory custom-token store.
#[derive(Default)]
pub struct MemoryCustomTokenStore {
    tokens: RwLock<Vec<Token>>,
}

impl MemoryCustomTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    pub fn add(&self, token: Token) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| TokenbookError::Other(format!("token store poisoned: {}", e)))?;
        tokens.push(token);
        Ok(())
    }
}

impl CustomTokenStore for MemoryCustomTokenStore {
    fn get_all(&self) -> Result<Vec<Token>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| TokenbookError::Other(format!("token store poisoned: {}", e)))?;
        Ok(tokens.clone())
    }
}
