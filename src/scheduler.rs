//! Background refresh loop.
//!
//! An [`AutoRefreshScheduler`] owns at most one ticking task. Each tick it
//! decides whether a refresh is due, resolves the current set of lists to
//! fetch (statically configured, or via a remote manifest), fans the fetches
//! out, and persists every successful changed result into the content store.
//! Each executed refresh reports exactly one outcome on the result channel;
//! the channel closes once the task has been stopped.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::app::{Result, SharedError, TokenbookError};
use crate::config::RefreshIntervals;
use crate::domain::ListDetails;
use crate::fetcher::{FetchRequest, FetchResult, Fetcher, ParallelFetcher};
use crate::parser::ManifestParser;
use crate::store::{Content, ContentStore};

/// One value per executed refresh: `Ok` on success, the cycle's error
/// otherwise. Clonable so it can travel on a broadcast channel.
pub type RefreshOutcome = std::result::Result<(), SharedError>;

const RESULT_CHANNEL_CAPACITY: usize = 16;

/// How the scheduler finds out which lists to fetch each cycle.
pub enum RefreshSource {
    /// A fixed set, fetched every cycle.
    Static(Vec<ListDetails>),
    /// A remote "list of lists" manifest, fetched first (with its own stored
    /// revalidation tag), parsed, then its entries fetched.
    Remote {
        details: ListDetails,
        parser: Arc<dyn ManifestParser>,
    },
}

struct RunningTask {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
    result_tx: broadcast::Sender<RefreshOutcome>,
}

pub struct AutoRefreshScheduler {
    inner: Arc<SchedulerInner>,
    // Guards start/stop transitions; concurrent starters all observe the
    // same running task and therefore the same result channel.
    task: Mutex<Option<RunningTask>>,
}

struct SchedulerInner {
    fetcher: Arc<dyn Fetcher>,
    parallel: ParallelFetcher,
    store: Arc<dyn ContentStore>,
    source: RefreshSource,
    intervals: RefreshIntervals,
    last_success: StdMutex<Option<Instant>>,
}

impl AutoRefreshScheduler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ContentStore>,
        source: RefreshSource,
        intervals: RefreshIntervals,
    ) -> Result<Self> {
        match &source {
            RefreshSource::Static(lists) => {
                for details in lists {
                    details.validate()?;
                }
            }
            RefreshSource::Remote { details, .. } => details.validate()?,
        }

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                parallel: ParallelFetcher::new(fetcher.clone()),
                fetcher,
                store,
                source,
                intervals,
                last_success: StdMutex::new(None),
            }),
            task: Mutex::new(None),
        })
    }

    /// Spawns the background task and returns a receiver for its outcomes.
    /// Calling `start` while already running is a no-op that subscribes to
    /// the existing channel.
    pub async fn start(&self) -> broadcast::Receiver<RefreshOutcome> {
        let mut task = self.task.lock().await;
        if let Some(running) = task.as_ref() {
            return running.result_tx.subscribe();
        }

        let (result_tx, result_rx) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let inner = self.inner.clone();
        let tx = result_tx.clone();
        let handle = tokio::spawn(async move {
            run_loop(inner, tx, cancel_rx).await;
        });

        *task = Some(RunningTask {
            handle,
            cancel: cancel_tx,
            result_tx,
        });
        tracing::info!("auto-refresh scheduler started");
        result_rx
    }

    /// Cancels the background task and waits for it to exit; an in-flight
    /// refresh cycle is aborted along with its outstanding fetches, so this
    /// never waits for the network. Stopping a stopped scheduler is a no-op.
    /// A later `start` allocates a fresh channel.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        let Some(running) = task.take() else {
            return;
        };

        let _ = running.cancel.send(true);
        drop(running.result_tx);
        if let Err(e) = running.handle.await {
            tracing::error!("refresh task join error: {}", e);
        }
        tracing::info!("auto-refresh scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Forgets the last successful refresh so the next tick executes.
    pub fn reset_gate(&self) {
        if let Ok(mut last) = self.inner.last_success.lock() {
            *last = None;
        }
    }
}

async fn run_loop(
    inner: Arc<SchedulerInner>,
    tx: broadcast::Sender<RefreshOutcome>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = interval(inner.intervals.check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            // First tick completes immediately, so one refresh check runs
            // right after start.
            _ = ticker.tick() => {
                if !inner.refresh_due() {
                    continue;
                }
                // The cycle itself races the cancel signal: dropping it
                // aborts the in-flight fetches, so stop() never waits for
                // the network.
                let outcome = tokio::select! {
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                        continue;
                    }
                    outcome = inner.run_refresh() => outcome,
                };
                match &outcome {
                    Ok(()) => inner.mark_success(),
                    Err(e) => tracing::warn!("refresh cycle failed: {}", e),
                }
                // No receiver is fine: outcomes are advisory.
                let _ = tx.send(outcome);
            }
        }
    }
}

impl SchedulerInner {
    fn refresh_due(&self) -> bool {
        match self.last_success.lock() {
            Ok(last) => match *last {
                Some(at) => at.elapsed() >= self.intervals.refresh_interval(),
                None => true,
            },
            Err(_) => true,
        }
    }

    fn mark_success(&self) {
        if let Ok(mut last) = self.last_success.lock() {
            *last = Some(Instant::now());
        }
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let lists = self.resolve_lists().await.map_err(Arc::new)?;
        tracing::debug!(count = lists.len(), "refreshing token lists");

        let requests = lists
            .into_iter()
            .map(|details| {
                let etag = self.stored_etag(&details.id);
                FetchRequest::with_etag(details, etag)
            })
            .collect();

        let results = self.parallel.fetch_all(requests).await;
        for (details, result) in results {
            match result {
                Ok(FetchResult::Content { body, etag }) => {
                    self.persist(&details, body, etag);
                }
                Ok(FetchResult::NotModified) => {
                    tracing::debug!(id = %details.id, "list unchanged, keeping stored copy");
                }
                Err(e) => {
                    tracing::warn!(id = %details.id, "list fetch failed: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Resolves the set of lists for this cycle. For the remote strategy the
    /// manifest itself is fetched conditionally; a failed remote call falls
    /// back to the last persisted copy, and only a cold store makes the
    /// failure terminal for the cycle.
    async fn resolve_lists(&self) -> Result<Vec<ListDetails>> {
        match &self.source {
            RefreshSource::Static(lists) => Ok(lists.clone()),
            RefreshSource::Remote { details, parser } => {
                let etag = self.stored_etag(&details.id);
                let raw = match self.fetcher.fetch(details, etag.as_deref()).await {
                    Ok(FetchResult::Content { body, etag }) => {
                        self.persist(details, body.clone(), etag);
                        body
                    }
                    Ok(FetchResult::NotModified) => self
                        .store
                        .get(&details.id)?
                        .map(|c| c.body)
                        .ok_or_else(|| TokenbookError::ListNotFound(details.id.clone()))?,
                    Err(e) => match self.store.get(&details.id) {
                        Ok(Some(cached)) => {
                            tracing::warn!(
                                id = %details.id,
                                "manifest fetch failed, using cached copy: {}", e
                            );
                            cached.body
                        }
                        _ => return Err(e),
                    },
                };
                Ok(parser.parse(&raw)?.lists)
            }
        }
    }

    fn stored_etag(&self, id: &str) -> Option<String> {
        match self.store.get_etag(id) {
            Ok(etag) => etag,
            Err(e) => {
                tracing::warn!(id, "etag lookup failed: {}", e);
                None
            }
        }
    }

    fn persist(&self, details: &ListDetails, body: Vec<u8>, etag: Option<String>) {
        let content = Content {
            source_url: details.source_url.clone(),
            etag,
            body,
            fetched_at: Utc::now(),
        };
        if let Err(e) = self.store.set(&details.id, content) {
            tracing::warn!(id = %details.id, "failed to persist list: {}", e);
        } else {
            tracing::info!(id = %details.id, "persisted fresh list");
        }
    }
}
