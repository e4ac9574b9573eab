//! Catalog lifecycle and the public read API.
//!
//! A [`TokenManager`] owns the configuration, the content and custom-token
//! stores, an optional [`AutoRefreshScheduler`], and the current [`Snapshot`].
//! Reads are served from an atomically swapped `Arc<Snapshot>` behind a
//! read-write lock; lifecycle transitions are serialized by a separate mutex,
//! so readers only ever contend with an in-progress swap.
//!
//! The full-build merge order is the central contract here: native tokens,
//! then the main list, then the remaining initial lists (ascending id), then
//! the remaining persisted lists (ascending id, best-effort), then custom
//! tokens. Later stages override earlier ones per token key.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::app::{Result, TokenbookError};
use crate::builder::{Snapshot, SnapshotBuilder};
use crate::config::{InitialList, ManagerConfig};
use crate::domain::{Address, Token, TokenList, CUSTOM_LIST_ID};
use crate::parser::TokenListParser;
use crate::scheduler::AutoRefreshScheduler;
use crate::store::{Content, ContentStore, CustomTokenStore};

struct Supervisor {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct Lifecycle {
    started: bool,
    refresh_enabled: bool,
    notify: Option<mpsc::Sender<()>>,
    supervisor: Option<Supervisor>,
}

pub struct TokenManager {
    // Shared with the supervisor task, which rebuilds through it.
    inner: Arc<ManagerInner>,
    scheduler: Option<Arc<AutoRefreshScheduler>>,
    lifecycle: Mutex<Lifecycle>,
}

struct ManagerInner {
    config: ManagerConfig,
    content_store: Arc<dyn ContentStore>,
    custom_store: Arc<dyn CustomTokenStore>,
    parser: Arc<dyn TokenListParser>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl TokenManager {
    pub fn new(
        config: ManagerConfig,
        content_store: Arc<dyn ContentStore>,
        custom_store: Arc<dyn CustomTokenStore>,
        parser: Arc<dyn TokenListParser>,
        scheduler: Option<Arc<AutoRefreshScheduler>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                content_store,
                custom_store,
                parser,
                snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            }),
            scheduler,
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Builds the first snapshot synchronously and, when `auto_refresh` is
    /// set, starts the scheduler plus a supervisor task that rebuilds on
    /// every successful refresh. Idempotent while started.
    ///
    /// Enabling refresh without a notify channel is rejected, as is passing a
    /// notify channel when no scheduler was configured.
    pub async fn start(
        &self,
        auto_refresh: bool,
        notify: Option<mpsc::Sender<()>>,
    ) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.started {
            return Ok(());
        }

        if auto_refresh && notify.is_none() {
            return Err(TokenbookError::Config(
                "auto refresh requires a notify channel".into(),
            ));
        }
        if notify.is_some() && self.scheduler.is_none() {
            return Err(TokenbookError::Config(
                "a notify channel requires a configured scheduler".into(),
            ));
        }

        // A failed first build leaves the manager un-started.
        self.rebuild()?;

        lifecycle.notify = notify;
        lifecycle.started = true;

        if auto_refresh {
            self.spawn_refresh(&mut lifecycle).await;
            lifecycle.refresh_enabled = true;
        }
        Ok(())
    }

    /// Stops the supervisor and scheduler and marks the manager stopped so
    /// `start` can be called again. Idempotent.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !lifecycle.started {
            return;
        }
        self.stop_refresh(&mut lifecycle).await;
        lifecycle.refresh_enabled = false;
        lifecycle.notify = None;
        lifecycle.started = false;
    }

    pub async fn enable_auto_refresh(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.require_refresh_wiring(&lifecycle)?;
        if lifecycle.refresh_enabled {
            return Ok(());
        }
        self.spawn_refresh(&mut lifecycle).await;
        lifecycle.refresh_enabled = true;
        Ok(())
    }

    pub async fn disable_auto_refresh(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.require_refresh_wiring(&lifecycle)?;
        if !lifecycle.refresh_enabled {
            return Ok(());
        }
        self.stop_refresh(&mut lifecycle).await;
        lifecycle.refresh_enabled = false;
        Ok(())
    }

    /// Restarts the refresh machinery with the gate cleared, forcing the
    /// next cycle to execute immediately.
    pub async fn trigger_refresh(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.require_refresh_wiring(&lifecycle)?;
        self.stop_refresh(&mut lifecycle).await;
        if let Some(scheduler) = &self.scheduler {
            scheduler.reset_gate();
        }
        self.spawn_refresh(&mut lifecycle).await;
        lifecycle.refresh_enabled = true;
        Ok(())
    }

    fn require_refresh_wiring(&self, lifecycle: &Lifecycle) -> Result<()> {
        if self.scheduler.is_none() {
            return Err(TokenbookError::Config("no scheduler configured".into()));
        }
        if lifecycle.notify.is_none() {
            return Err(TokenbookError::Config("no notify channel active".into()));
        }
        Ok(())
    }

    async fn spawn_refresh(&self, lifecycle: &mut Lifecycle) {
        let Some(scheduler) = self.scheduler.clone() else {
            return;
        };
        let mut results = scheduler.start().await;

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let notify = lifecycle.notify.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    outcome = results.recv() => match outcome {
                        Ok(Ok(())) => {
                            match inner.rebuild() {
                                Ok(()) => {
                                    tracing::info!("snapshot rebuilt after refresh");
                                    if let Some(tx) = &notify {
                                        // Non-blocking: a full channel drops
                                        // the notification, never stalls us.
                                        let _ = tx.try_send(());
                                    }
                                }
                                Err(e) => {
                                    tracing::error!("rebuild after refresh failed: {}", e);
                                }
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::warn!("refresh cycle failed: {}", e);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("supervisor lagged, skipped {} outcomes", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        lifecycle.supervisor = Some(Supervisor {
            handle,
            cancel: cancel_tx,
        });
    }

    async fn stop_refresh(&self, lifecycle: &mut Lifecycle) {
        if let Some(supervisor) = lifecycle.supervisor.take() {
            let _ = supervisor.cancel.send(true);
            if let Err(e) = supervisor.handle.await {
                tracing::error!("supervisor join error: {}", e);
            }
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop().await;
        }
    }

    /// Runs one full build pass and atomically swaps the snapshot. On error
    /// the previous snapshot stays in place.
    pub fn rebuild(&self) -> Result<()> {
        self.inner.rebuild()
    }

    // Read API. All safe for concurrent use; all empty before the first
    // successful build.

    pub fn all_tokens(&self) -> Vec<Token> {
        self.inner.current().all_tokens()
    }

    pub fn token(&self, chain_id: u64, address: &Address) -> Option<Token> {
        self.inner.current().token(chain_id, address).cloned()
    }

    pub fn tokens_by_chain(&self, chain_id: u64) -> Vec<Token> {
        self.inner.current().tokens_by_chain(chain_id)
    }

    pub fn tokens_by_keys(&self, keys: &[String]) -> Vec<Token> {
        self.inner.current().tokens_by_keys(keys)
    }

    pub fn all_lists(&self) -> Vec<TokenList> {
        self.inner.current().all_lists().into_iter().cloned().collect()
    }

    pub fn list(&self, id: &str) -> Option<TokenList> {
        self.inner.current().list(id).cloned()
    }
}

impl ManagerInner {
    fn rebuild(&self) -> Result<()> {
        let snapshot = self.build_snapshot()?;
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
        Ok(())
    }

    fn build_snapshot(&self) -> Result<Snapshot> {
        let mut builder = SnapshotBuilder::new(self.config.chains.clone());

        // 1. Native assets for every configured chain.
        builder.add_native_token_list();

        let contents = self.content_store.get_all()?;

        // 2. The main list, fail-fast with fallback to the bundled bytes.
        let main = self
            .config
            .initial_lists
            .iter()
            .find(|l| l.details.id == self.config.main_list_id)
            .ok_or_else(|| TokenbookError::ListNotFound(self.config.main_list_id.clone()))?;
        self.add_with_fallback(&mut builder, main, &contents)?;

        // 3. Remaining initial lists, ascending id, same fail-fast rule.
        let mut rest: Vec<&InitialList> = self
            .config
            .initial_lists
            .iter()
            .filter(|l| l.details.id != self.config.main_list_id)
            .collect();
        rest.sort_by(|a, b| a.details.id.cmp(&b.details.id));
        for list in rest {
            self.add_with_fallback(&mut builder, list, &contents)?;
        }

        // 4. Everything else the scheduler has persisted, ascending id,
        //    best-effort: one bad source never blanks the catalog.
        let initial_ids: Vec<&str> = self
            .config
            .initial_lists
            .iter()
            .map(|l| l.details.id.as_str())
            .collect();
        let mut extra_ids: Vec<&String> = contents
            .keys()
            .filter(|id| !initial_ids.contains(&id.as_str()))
            .filter(|id| Some(id.as_str()) != self.config.manifest_list_id.as_deref())
            .collect();
        extra_ids.sort();
        for id in extra_ids {
            let content = &contents[id];
            if let Err(e) = builder.add_raw_token_list(
                id,
                &content.body,
                &content.source_url,
                Some(content.fetched_at),
                &*self.parser,
            ) {
                tracing::warn!(id = %id, "skipping unparsable fetched list: {}", e);
            }
        }

        // 5. Custom tokens win every conflict; invalid entries are dropped.
        let custom = self.custom_store.get_all()?;
        let mut valid = Vec::with_capacity(custom.len());
        for mut token in custom {
            if let Err(e) = token.validate(&self.config.chains) {
                tracing::warn!(key = %token.key(), "dropping invalid custom token: {}", e);
                continue;
            }
            token.is_custom = true;
            valid.push(token);
        }
        builder.add_token_list(
            CUSTOM_LIST_ID,
            TokenList {
                name: "Custom Tokens".to_string(),
                source: CUSTOM_LIST_ID.to_string(),
                tokens: valid,
                ..Default::default()
            },
        );

        Ok(builder.build())
    }

    fn add_with_fallback(
        &self,
        builder: &mut SnapshotBuilder,
        list: &InitialList,
        contents: &HashMap<String, Content>,
    ) -> Result<()> {
        let id = &list.details.id;
        if let Some(content) = contents.get(id) {
            if !content.body.is_empty() {
                return builder.add_raw_token_list(
                    id,
                    &content.body,
                    &content.source_url,
                    Some(content.fetched_at),
                    &*self.parser,
                );
            }
        }
        if !list.raw.is_empty() {
            return builder.add_raw_token_list(
                id,
                &list.raw,
                &list.details.source_url,
                None,
                &*self.parser,
            );
        }
        Err(TokenbookError::ListNotFound(id.clone()))
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
