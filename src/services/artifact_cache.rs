//! Content-keyed cache for expensive generated artifacts (diff summaries).
//!
//! Each key moves through `Absent -> Computing -> Present`:
//! - `get` returns a fresh `Present` entry or nothing.
//! - `compute_and_store` runs the computation at most once per key at a
//!   time. Concurrent callers for the same key subscribe to the in-flight
//!   result instead of starting their own.
//! - `invalidate` drops the entry at once. A computation still running for
//!   the key is marked stale: it answers its current waiters but is not
//!   stored, and later callers wait for it to end before recomputing.
//!
//! Keys embed the content revision, so new content is a different key and
//! never sees a stale artifact. Explicit invalidation is only needed to force
//! a refresh of the same revision.
//!
//! The registry lock guards map mutation only; computations run on spawned
//! tasks without holding it. A caller that times out stops waiting but the
//! computation keeps going and stores its result for the next caller.

use crate::config::CacheConfig;
use crate::error::AppError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Cache key: merge request plus content revision (e.g. head commit SHA).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub mr_id: i64,
    pub content_revision: String,
}

impl CacheKey {
    /// Build a key, rejecting a non-positive MR ID or blank revision.
    pub fn new(mr_id: i64, content_revision: impl Into<String>) -> Result<Self, AppError> {
        if mr_id <= 0 {
            return Err(AppError::invalid_input_field(
                format!("invalid merge request ID {}", mr_id),
                "mr_id",
            ));
        }

        let content_revision = content_revision.into().trim().to_string();
        if content_revision.is_empty() {
            return Err(AppError::invalid_input_field(
                "content revision is required",
                "content_revision",
            ));
        }

        Ok(Self {
            mr_id,
            content_revision,
        })
    }

    /// Build a key whose revision is the SHA-256 of `content`.
    pub fn for_content(mr_id: i64, content: &[u8]) -> Result<Self, AppError> {
        Self::new(mr_id, content_revision_of(content))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mr:{}@{}", self.mr_id, self.content_revision)
    }
}

/// Hex SHA-256 of some content, usable as a content revision.
pub fn content_revision_of(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Cache-internal errors.
///
/// `Clone` so a single failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("computation failed for {key}: {message}")]
    ComputationFailed { key: String, message: String },

    #[error("timed out after {timeout_ms}ms waiting for {key}")]
    Timeout { key: String, timeout_ms: u64 },

    #[error("cache lock poisoned")]
    Poisoned,
}

/// A stored artifact.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub artifact: Arc<V>,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

/// Counters for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry.
    pub hits: u64,
    /// Lookups that found no fresh entry.
    pub misses: u64,
    /// Computations started.
    pub computations: u64,
    /// Computations that failed.
    pub failures: u64,
    /// Callers that subscribed to an already running computation.
    pub joined: u64,
    /// Callers that gave up waiting.
    pub timeouts: u64,
}

type SharedResult<V> = Shared<BoxFuture<'static, Result<Arc<V>, CacheError>>>;
type ResultSender<V> = oneshot::Sender<Result<Arc<V>, CacheError>>;

struct InFlight<V> {
    generation: u64,
    result: SharedResult<V>,
    /// Invalidated while running: the result goes to current waiters only.
    stale: bool,
}

/// What a caller does after consulting the registry.
enum Role<V> {
    /// Start the computation and publish its result.
    Leader {
        generation: u64,
        tx: ResultSender<V>,
        result: SharedResult<V>,
    },
    /// Wait on a computation someone else started.
    Follower(SharedResult<V>),
    /// Wait for an invalidated computation to end, then look again.
    Drain(SharedResult<V>),
}

struct State<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, InFlight<V>>,
    next_generation: u64,
    stats: CacheStats,
}

impl<V> State<V> {
    fn fresh(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<V>> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.artifact.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Drop the in-flight registration if it still belongs to `generation`.
    ///
    /// Returns whether the result may be stored (`Some(false)` when the
    /// computation was invalidated while running).
    fn finish(&mut self, key: &CacheKey, generation: u64) -> Option<bool> {
        match self.in_flight.get(key) {
            Some(flight) if flight.generation == generation => {
                self.in_flight.remove(key).map(|flight| !flight.stale)
            }
            _ => None,
        }
    }

    /// Mark running computations matching `pred` as stale.
    fn mark_stale(&mut self, pred: impl Fn(&CacheKey) -> bool) -> usize {
        let mut marked = 0;
        for (key, flight) in self.in_flight.iter_mut() {
            if !flight.stale && pred(key) {
                flight.stale = true;
                marked += 1;
            }
        }
        marked
    }
}

struct Inner<V> {
    state: Mutex<State<V>>,
    ttl: Duration,
    compute_timeout: Duration,
}

impl<V> Inner<V> {
    fn lock(&self) -> Result<MutexGuard<'_, State<V>>, CacheError> {
        self.state.lock().map_err(|_| CacheError::Poisoned)
    }
}

/// Owns one computation's registration and result channel.
///
/// Dropped without `complete` (the closure or its future panicked, or the
/// runtime shut down) it clears the registration before waiters are
/// released, so the key can be computed again.
struct FlightGuard<V> {
    inner: Arc<Inner<V>>,
    key: CacheKey,
    generation: u64,
    tx: Option<ResultSender<V>>,
}

impl<V> FlightGuard<V> {
    fn complete(mut self, outcome: Result<Arc<V>, CacheError>) {
        match self.inner.lock() {
            Ok(mut state) => match (state.finish(&self.key, self.generation), &outcome) {
                (Some(true), Ok(artifact)) => {
                    state.entries.insert(
                        self.key.clone(),
                        CacheEntry {
                            artifact: Arc::clone(artifact),
                            created_at: Instant::now(),
                            ttl: self.inner.ttl,
                        },
                    );
                    log::debug!("[cache] Stored {}", self.key);
                }
                (_, Ok(_)) => log::debug!("[cache] Discarded result for invalidated {}", self.key),
                (_, Err(e)) => {
                    state.stats.failures += 1;
                    log::warn!("[cache] {}", e);
                }
            },
            Err(_) => log::warn!("[cache] Lock poisoned while storing {}", self.key),
        }

        // Waiters may all have timed out already.
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if let Ok(mut state) = self.inner.state.lock() {
            if state.finish(&self.key, self.generation).is_some() {
                state.stats.failures += 1;
                log::warn!("[cache] Computation for {} ended without a result", self.key);
            }
        }
        drop(tx);
    }
}

/// Shared cache handle. Cloning is cheap and every clone sees the same entries.
pub struct ArtifactCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ArtifactCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> ArtifactCache<V> {
    /// Create a cache with a TTL for stored artifacts and a bound on how long
    /// a caller waits for a computation.
    pub fn new(ttl: Duration, compute_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                    next_generation: 0,
                    stats: CacheStats::default(),
                }),
                ttl,
                compute_timeout,
            }),
        }
    }

    /// Create a cache from the `cache` configuration section.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.compute_timeout())
    }

    /// Look up a fresh artifact. Expired entries are removed and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Arc<V>>, CacheError> {
        let mut state = self.inner.lock()?;
        let found = state.fresh(key, Instant::now());
        if found.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        Ok(found)
    }

    /// Return the cached artifact for `key`, computing it if needed.
    ///
    /// `compute` is only called when no fresh entry exists and nothing is in
    /// flight for the key. If the running computation was invalidated, the
    /// caller waits for it to end before starting a new one. Failures are
    /// surfaced to every waiter and leave the key absent.
    ///
    /// The whole wait is bounded by the configured compute timeout.
    pub async fn compute_and_store<F, Fut, E>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<V>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match tokio::time::timeout(self.inner.compute_timeout, self.resolve(&key, compute)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Ok(mut state) = self.inner.lock() {
                    state.stats.timeouts += 1;
                }
                log::warn!(
                    "[cache] Gave up waiting for {} after {:?}",
                    key,
                    self.inner.compute_timeout
                );
                Err(CacheError::Timeout {
                    key: key.to_string(),
                    timeout_ms: self.inner.compute_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn resolve<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<Arc<V>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        loop {
            let role = {
                let mut state = self.inner.lock()?;

                if let Some(hit) = state.fresh(key, Instant::now()) {
                    state.stats.hits += 1;
                    log::debug!("[cache] Hit for {}", key);
                    return Ok(hit);
                }

                let running = state
                    .in_flight
                    .get(key)
                    .map(|flight| (flight.stale, flight.result.clone()));

                match running {
                    Some((true, result)) => Role::Drain(result),
                    Some((false, result)) => {
                        state.stats.joined += 1;
                        Role::Follower(result)
                    }
                    None => {
                        let generation = state.next_generation;
                        state.next_generation += 1;
                        state.stats.misses += 1;
                        state.stats.computations += 1;

                        let (tx, rx) = oneshot::channel();
                        let result = subscribe(key.clone(), rx);
                        state.in_flight.insert(
                            key.clone(),
                            InFlight {
                                generation,
                                result: result.clone(),
                                stale: false,
                            },
                        );
                        Role::Leader {
                            generation,
                            tx,
                            result,
                        }
                    }
                }
            };

            match role {
                Role::Leader {
                    generation,
                    tx,
                    result,
                } => {
                    log::debug!("[cache] Miss for {}, computing", key);
                    let guard = FlightGuard {
                        inner: Arc::clone(&self.inner),
                        key: key.clone(),
                        generation,
                        tx: Some(tx),
                    };
                    let task = compute();
                    tokio::spawn(run_computation(guard, task));
                    return result.await;
                }
                Role::Follower(result) => {
                    log::debug!("[cache] Joining in-flight computation for {}", key);
                    return result.await;
                }
                Role::Drain(result) => {
                    log::debug!("[cache] Waiting for invalidated computation of {} to end", key);
                    let _ = result.await;
                }
            }
        }
    }

    /// Force a key back to `Absent`.
    ///
    /// A computation already running for the key still answers its current
    /// waiters, but its result is not stored. It stays registered until it
    /// ends, so no second computation for the key starts alongside it.
    ///
    /// # Returns
    /// Whether an entry was dropped or a running computation invalidated
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut state = self.inner.lock()?;
        let had_entry = state.entries.remove(key).is_some();
        let had_flight = state.mark_stale(|k| k == key) > 0;
        if had_entry || had_flight {
            log::debug!("[cache] Invalidated {}", key);
        }
        Ok(had_entry || had_flight)
    }

    /// Drop every revision cached for one merge request.
    ///
    /// # Returns
    /// Number of entries dropped plus running computations invalidated
    pub fn invalidate_mr(&self, mr_id: i64) -> Result<usize, CacheError> {
        let mut state = self.inner.lock()?;
        let before = state.entries.len();
        state.entries.retain(|k, _| k.mr_id != mr_id);
        let dropped = before - state.entries.len();
        Ok(dropped + state.mark_stale(|k| k.mr_id == mr_id))
    }

    /// Remove expired entries.
    ///
    /// # Returns
    /// Number of entries removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut state = self.inner.lock()?;
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - state.entries.len())
    }

    /// Whether a computation is currently registered for `key`.
    pub fn is_computing(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.inner.lock()?.in_flight.contains_key(key))
    }

    /// Number of stored entries (expired ones included until purged).
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.inner.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.inner.lock()?.stats)
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

/// Future every caller for one computation awaits.
fn subscribe<V: Send + Sync + 'static>(
    key: CacheKey,
    rx: oneshot::Receiver<Result<Arc<V>, CacheError>>,
) -> SharedResult<V> {
    async move {
        rx.await.unwrap_or_else(|_| {
            Err(CacheError::ComputationFailed {
                key: key.to_string(),
                message: "computation ended without a result".to_string(),
            })
        })
    }
    .boxed()
    .shared()
}

/// Run one computation, store a successful result, then notify waiters.
async fn run_computation<V, Fut, E>(guard: FlightGuard<V>, task: Fut)
where
    V: Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let outcome = task.await.map(Arc::new).map_err(|e| CacheError::ComputationFailed {
        key: guard.key.to_string(),
        message: e.to_string(),
    });

    guard.complete(outcome);
}
