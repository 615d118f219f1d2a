//! The JWKS refresh engine (§4.6): non-blocking remote refresh with stampede
//! prevention on the initial fetch, rate-limited periodic refresh, and
//! retained last-known-good keys across transient failures.
//!
//! The "latch" the spec describes and the key snapshot are the same piece of
//! state here: fulfilment is simply "the snapshot is no longer empty". Once
//! the first fetch succeeds the snapshot is never cleared again (failures
//! after that point retain the last-known-good set), so there is no way for
//! `keys()` to observe a later not-yet-fulfilled state, which is exactly
//! the "never observe a retrograde state" property the latch exists to
//! provide.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, JoseError};
use crate::jwk::{Jwk, JwkSet};

use super::KeyStore;

/// Fetches a `JwkSet` from a remote source. The live implementation
/// (`HttpFetcher`) performs an HTTP GET; tests substitute an in-memory or
/// wiremock-backed fetcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, FetchError>;
}

/// Performs a GET against a JWKS endpoint, requires a 2xx response, and
/// decodes the body as a `JwkSet`.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpFetcher {
    pub fn new(url: reqwest::Url) -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn with_client(url: reqwest::Url, client: reqwest::Client) -> Self {
        HttpFetcher { client, url }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> Result<JwkSet, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Configuration for the refresh engine.
#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    /// How often the background task attempts a periodic refresh.
    pub refresh_interval: Duration,
    /// The minimum time that must elapse since the last successful fetch
    /// before any refresh attempt (periodic or triggered) is allowed to
    /// issue a request at all.
    pub min_refresh_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            refresh_interval: Duration::from_secs(300),
            min_refresh_interval: Duration::from_secs(30),
        }
    }
}

const MAX_INITIAL_RETRIES: u32 = 20;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A `KeyStore` backed by a JWKS endpoint, refreshed in the background.
pub struct RefreshingKeyStore {
    keys: ArcSwapOption<Vec<Jwk>>,
    ready: Notify,
    /// Set iff the initial fetch exhausted its retry budget. `KeyStore::keys`
    /// still suspends forever in that case (the spec's chosen default: the
    /// service is non-functional without initial keys); `wait_ready` is the
    /// escape hatch for callers who would rather see the error (see
    /// `DESIGN.md`'s note on the corresponding Open Question).
    initial_failure: OnceLock<String>,
    last_fetch: Mutex<Option<Instant>>,
    fetcher: Arc<dyn Fetcher>,
    config: RefreshConfig,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshingKeyStore {
    /// Construct the store and schedule the initial fetch plus the periodic
    /// refresh loop as a background task tied to the returned `Arc`'s
    /// lifetime: when the last reference is dropped, the task is aborted.
    pub fn spawn(fetcher: Arc<dyn Fetcher>, config: RefreshConfig) -> Arc<Self> {
        let store = Arc::new(RefreshingKeyStore {
            keys: ArcSwapOption::from(None),
            ready: Notify::new(),
            initial_failure: OnceLock::new(),
            last_fetch: Mutex::new(None),
            fetcher,
            config,
            background: Mutex::new(None),
        });

        let task_store = store.clone();
        let handle = tokio::spawn(async move { task_store.run().await });
        *store.background.lock().unwrap() = Some(handle);
        store
    }

    /// Like `KeyStore::keys`, but surfaces the permanent initial-fetch
    /// failure as a `JoseError` instead of suspending forever.
    pub async fn wait_ready(&self) -> Result<Arc<Vec<Jwk>>, JoseError> {
        loop {
            let notified = self.ready.notified();
            if let Some(snapshot) = self.keys.load_full() {
                return Ok(snapshot);
            }
            if let Some(cause) = self.initial_failure.get() {
                return Err(JoseError::MalformedToken(format!(
                    "initial JWKS fetch failed permanently: {cause}"
                )));
            }
            notified.await;
        }
    }

    /// Attempt a refresh right now, subject to the same rate limit as the
    /// periodic loop. Used for externally-triggered refreshes (e.g. a
    /// `KeyNotFound` on an unrecognised `kid`, handled by the caller).
    pub async fn trigger_refresh(&self) {
        self.maybe_refresh().await;
    }

    async fn run(self: Arc<Self>) {
        self.initial_fetch().await;
        if self.initial_failure.get().is_some() {
            // No point running the periodic loop: we never successfully
            // fetched, and the periodic loop's whole job is retaining a
            // last-known-good set that does not exist yet.
            return;
        }

        let mut interval = tokio::time::interval(self.config.refresh_interval);
        // The first tick fires immediately; the initial fetch already
        // covered that cycle.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.maybe_refresh().await;
        }
    }

    async fn initial_fetch(&self) {
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_INITIAL_RETRIES {
            match self.fetcher.fetch().await {
                Ok(set) => {
                    self.publish(set);
                    info!(attempt, "initial JWKS fetch succeeded");
                    return;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "initial JWKS fetch attempt failed");
                    if attempt == MAX_INITIAL_RETRIES {
                        error!(
                            attempts = MAX_INITIAL_RETRIES,
                            "initial JWKS fetch permanently failed; store will never become ready"
                        );
                        let _ = self.initial_failure.set(err.to_string());
                        self.ready.notify_waiters();
                        return;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn maybe_refresh(&self) {
        {
            let last = self.last_fetch.lock().unwrap();
            if let Some(last) = *last {
                if last.elapsed() < self.config.min_refresh_interval {
                    debug!("jwks refresh skipped: below min_refresh_interval");
                    return;
                }
            }
        }

        match self.fetcher.fetch().await {
            Ok(set) => {
                info!(key_count = set.keys.len(), "jwks refresh succeeded");
                self.publish(set);
            }
            Err(err) => {
                warn!(error = %err, "jwks refresh failed, retaining last-known-good keys");
            }
        }
    }

    fn publish(&self, set: JwkSet) {
        self.keys.store(Some(Arc::new(set.keys)));
        *self.last_fetch.lock().unwrap() = Some(Instant::now());
        self.ready.notify_waiters();
    }
}

impl Drop for RefreshingKeyStore {
    fn drop(&mut self) {
        if let Some(handle) = self.background.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl KeyStore for RefreshingKeyStore {
    async fn keys(&self) -> Arc<Vec<Jwk>> {
        loop {
            let notified = self.ready.notified();
            if let Some(snapshot) = self.keys.load_full() {
                return snapshot;
            }
            notified.await;
        }
    }
}
