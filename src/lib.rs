//! # Tokenbook
//!
//! Aggregates cryptocurrency token lists from remote and local sources into
//! one consistent, queryable snapshot, and keeps that snapshot fresh with a
//! cancellable background refresh loop.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Content Store → Scheduler
//!                              ↓ (result channel)
//!                           Manager → SnapshotBuilder → Snapshot
//! ```
//!
//! - [`fetcher`]: conditional HTTP retrieval (ETag revalidation, gzip) with a
//!   concurrent fan-out variant that never fails a batch on one bad item
//! - [`scheduler`]: at-most-one background task that periodically refreshes
//!   every configured list and persists changed copies
//! - [`builder`]: deterministic last-write-wins merge into an immutable index
//! - [`manager`]: lifecycle owner and the concurrent read API
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokenbook::config::ManagerConfig;
//! use tokenbook::manager::TokenManager;
//! use tokenbook::parser::StandardTokenListParser;
//! use tokenbook::store::{MemoryCustomTokenStore, SqliteContentStore};
//!
//! # async fn run() -> tokenbook::app::Result<()> {
//! let config = ManagerConfig::load("tokenbook.toml")?;
//! let manager = Arc::new(TokenManager::new(
//!     config,
//!     Arc::new(SqliteContentStore::new(SqliteContentStore::default_db_path()?)?),
//!     Arc::new(MemoryCustomTokenStore::new()),
//!     Arc::new(StandardTokenListParser::new()),
//!     None,
//! )?);
//! manager.start(false, None).await?;
//! let _tokens = manager.tokens_by_chain(1);
//! # Ok(())
//! # }
//! ```

/// Error type and crate-wide `Result` alias.
pub mod app;

/// Deterministic multi-source merge into an immutable [`Snapshot`](builder::Snapshot).
pub mod builder;

/// Construction-time configuration, validated synchronously, loadable from TOML.
pub mod config;

/// Core domain models.
///
/// - [`Token`](domain::Token): one token's metadata, keyed by `(chain, address)`
/// - [`Address`](domain::Address): 20-byte address; zero means native asset
/// - [`TokenList`](domain::TokenList): one source's list after parsing
/// - [`ListDetails`](domain::ListDetails): where to fetch a list from
pub mod domain;

/// Conditional HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for conditional GETs
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::ParallelFetcher): semaphore-bounded fan-out
pub mod fetcher;

/// Catalog lifecycle and the public read API.
pub mod manager;

/// Token-list and manifest decoders behind injectable traits.
pub mod parser;

/// The background refresh loop and its result channel.
pub mod scheduler;

/// Content and custom-token storage.
///
/// - [`ContentStore`](store::ContentStore) / [`CustomTokenStore`](store::CustomTokenStore): trait seams
/// - [`SqliteContentStore`](store::SqliteContentStore): persistent implementation
/// - [`MemoryContentStore`](store::MemoryContentStore): in-memory implementation
pub mod store;
