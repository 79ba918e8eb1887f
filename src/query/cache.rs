//! Process-wide query cache.
//!
//! Entries are keyed by [`QueryKey`] and hold type-erased data, so one cache
//! serves every entity type of a session. The cache guarantees:
//! - at most one current request per key; concurrent readers share it
//! - a response is committed only if its generation still matches the entry
//! - a failed fetch only affects its own entry and keeps the last good data

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::{KeyFamily, QueryKey};
use super::state::{QueryResult, QueryStatus};
use crate::error::ApiError;

pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyData, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Entries = Mutex<HashMap<QueryKey, Entry>>;

/// A fetcher with its output type erased, so entries of different types can
/// be refetched uniformly on invalidation.
pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

pub(crate) fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
  Arc::new(move || {
    let request = fetcher();
    async move { request.await.map(|data| Arc::new(data) as AnyData) }.boxed()
  })
}

fn downcast<T: Send + Sync + 'static>(data: AnyData) -> Option<Arc<T>> {
  data.downcast::<T>().ok()
}

/// Timing policy of a [`QueryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
  /// Age after which successful data is revalidated on the next read
  pub stale_time: Duration,
  /// Idle time after which an unobserved entry may be evicted
  pub gc_time: Duration,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(5 * 60),
      gc_time: Duration::from_secs(10 * 60),
    }
  }
}

struct InFlight {
  generation: u64,
  future: SharedFetch,
}

struct Entry {
  /// Distinguishes this entry from any earlier one stored under the same key
  id: u64,
  data: Option<AnyData>,
  error: Option<ApiError>,
  status: QueryStatus,
  fetched_at: Option<DateTime<Utc>>,
  updated: Option<Instant>,
  invalidated: bool,
  /// Set for every request started and every external write, from a
  /// counter shared by the whole cache. A response carrying any other
  /// generation is dropped, even if its entry was dropped and recreated.
  generation: u64,
  in_flight: Option<InFlight>,
  observers: usize,
  fetcher: Option<ErasedFetcher>,
  notify: watch::Sender<u64>,
  last_used: Instant,
}

impl Entry {
  fn new(id: u64) -> Self {
    let (notify, _) = watch::channel(0);
    Self {
      id,
      data: None,
      error: None,
      status: QueryStatus::Pending,
      fetched_at: None,
      updated: None,
      invalidated: false,
      generation: 0,
      in_flight: None,
      observers: 0,
      fetcher: None,
      notify,
      last_used: Instant::now(),
    }
  }

  fn notify(&self) {
    self.notify.send_modify(|version| *version += 1);
  }

  fn store(&mut self, data: AnyData) {
    self.data = Some(data);
    self.error = None;
    self.status = QueryStatus::Success;
    self.fetched_at = Some(Utc::now());
    self.updated = Some(Instant::now());
    self.invalidated = false;
  }

  fn reset(&mut self) {
    self.data = None;
    self.error = None;
    self.status = QueryStatus::Pending;
    self.fetched_at = None;
    self.updated = None;
    self.invalidated = true;
    self.in_flight = None;
  }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
  entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a finished request to its entry, unless it has been superseded.
fn commit(entries: &Entries, key: &QueryKey, generation: u64, result: &FetchResult) {
  let mut entries = lock(entries);
  let Some(entry) = entries.get_mut(key) else {
    debug!(key = %key, generation, "entry evicted before response arrived, discarding");
    return;
  };

  if entry.generation != generation {
    debug!(
      key = %key,
      generation,
      current = entry.generation,
      "discarding superseded response"
    );
    return;
  }

  entry.in_flight = None;
  match result {
    Ok(data) => {
      debug!(key = %key, fp = %key.fingerprint(), generation, "fetch committed");
      entry.store(Arc::clone(data));
    }
    Err(e) => {
      warn!(key = %key, error = %e, "fetch failed");
      entry.error = Some(e.clone());
      entry.status = QueryStatus::Error;
    }
  }
  entry.notify();
}

/// Shared handle to the cache. Cloning is cheap; all clones see the same
/// entries.
#[derive(Clone)]
pub struct QueryCache {
  entries: Arc<Entries>,
  /// Source of entry ids and generations; never reused
  sequence: Arc<AtomicU64>,
  config: CacheConfig,
}

/// Ties an observer to the entry it registered with, so it can only ever
/// unregister from that same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Subscription {
  entry: u64,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new(CacheConfig::default())
  }
}

impl QueryCache {
  pub fn new(config: CacheConfig) -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      sequence: Arc::new(AtomicU64::new(0)),
      config,
    }
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    lock(&self.entries)
  }

  fn next_sequence(&self) -> u64 {
    self.sequence.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn new_entry(&self) -> Entry {
    Entry::new(self.next_sequence())
  }

  /// Supersede whatever generation `entry` is at.
  fn bump(&self, entry: &mut Entry) {
    entry.generation = self.next_sequence();
  }

  fn is_stale(&self, entry: &Entry) -> bool {
    entry.invalidated
      || entry
        .updated
        .map(|at| at.elapsed() > self.config.stale_time)
        .unwrap_or(true)
  }

  /// Start a request for `key`, or join the one already running.
  ///
  /// Must be called with the entry map locked; the spawned request commits
  /// through a weak handle once it completes.
  fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, fetcher: ErasedFetcher) -> SharedFetch {
    if let Some(in_flight) = &entry.in_flight {
      debug!(key = %key, generation = in_flight.generation, "joining in-flight fetch");
      return in_flight.future.clone();
    }

    self.bump(entry);
    let generation = entry.generation;
    let entries: Weak<Entries> = Arc::downgrade(&self.entries);
    let commit_key = key.clone();
    let request = fetcher();

    let future = async move {
      let result = request.await;
      if let Some(entries) = entries.upgrade() {
        commit(&entries, &commit_key, generation, &result);
      }
      result
    }
    .boxed()
    .shared();

    // Requests are never aborted: the response is dropped instead if the
    // entry has moved on by the time it arrives.
    tokio::spawn(future.clone());

    entry.in_flight = Some(InFlight {
      generation,
      future: future.clone(),
    });
    entry.notify();
    debug!(key = %key, fp = %key.fingerprint(), generation, "fetch started");
    future
  }

  /// Read `key`, fetching it if there is no fresh successful data.
  ///
  /// Callers arriving while a request for `key` is running share that
  /// request and its result.
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ApiError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let pending = {
      let mut entries = self.entries();
      let entry = entries.entry(key.clone()).or_insert_with(|| self.new_entry());
      let fetcher = erase(fetcher);
      entry.fetcher = Some(Arc::clone(&fetcher));
      entry.last_used = Instant::now();

      if entry.status == QueryStatus::Success && !self.is_stale(entry) {
        if let Some(data) = entry.data.clone().and_then(downcast::<T>) {
          debug!(key = %key, "cache hit");
          return Ok(data);
        }
      }
      self.start_fetch(key, entry, fetcher)
    };

    let data = pending.await?;
    downcast::<T>(data)
      .ok_or_else(|| ApiError::Decode(format!("cached value for {} has an unexpected type", key)))
  }

  /// Manually refetch `key` with its last registered fetcher. Joins a
  /// running request instead of starting a second one.
  ///
  /// Returns false if the key is unknown.
  pub fn refetch(&self, key: &QueryKey) -> bool {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return false;
    };
    let Some(fetcher) = entry.fetcher.clone() else {
      return false;
    };
    self.start_fetch(key, entry, fetcher);
    true
  }

  /// Mark every entry matching `predicate` stale.
  ///
  /// A request already running for a matching entry may predate the change
  /// that caused the invalidation, so its response will be discarded.
  /// Observed entries are refetched immediately; the rest refetch on their
  /// next read. Returns the number of matching entries.
  pub fn invalidate(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
    let mut entries = self.entries();
    let mut count = 0;

    for (key, entry) in entries.iter_mut() {
      if !predicate(key) {
        continue;
      }
      count += 1;
      entry.invalidated = true;
      if entry.in_flight.take().is_some() {
        self.bump(entry);
      }

      let refetch = if entry.observers > 0 {
        entry.fetcher.clone()
      } else {
        None
      };
      match refetch {
        Some(fetcher) => {
          self.start_fetch(key, entry, fetcher);
        }
        None => entry.notify(),
      }
    }

    debug!(count, "invalidated entries");
    count
  }

  pub fn invalidate_family(&self, family: &KeyFamily) -> usize {
    let count = self.invalidate(|key| family.matches(key));
    debug!(family = %family, count, "invalidated family");
    count
  }

  /// Purge every entry in `family`.
  ///
  /// Entries nobody observes are dropped outright. Observed entries are
  /// reset to pending and refetched, so a deleted record surfaces as a fresh
  /// not-found rather than its old cached value.
  pub fn remove(&self, family: &KeyFamily) -> usize {
    let mut entries = self.entries();
    let mut count = 0;

    entries.retain(|key, entry| {
      if !family.matches(key) {
        return true;
      }
      count += 1;
      if entry.observers == 0 {
        return false;
      }
      entry.reset();
      self.bump(entry);
      if let Some(fetcher) = entry.fetcher.clone() {
        self.start_fetch(key, entry, fetcher);
      } else {
        entry.notify();
      }
      true
    });

    debug!(family = %family, count, "removed entries");
    count
  }

  /// Write data for `key` directly, as if a fetch had just returned it.
  /// Any request running for the key is superseded.
  pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T) {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(|| self.new_entry());
    self.bump(entry);
    entry.in_flight = None;
    entry.store(Arc::new(data));
    entry.last_used = Instant::now();
    entry.notify();
  }

  /// Cached data for `key`, fresh or not.
  pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let entries = self.entries();
    entries.get(key)?.data.clone().and_then(downcast::<T>)
  }

  /// Current state of `key` as an observer would see it.
  pub fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryResult<T> {
    let entries = self.entries();
    let Some(entry) = entries.get(key) else {
      return QueryResult::pending();
    };
    QueryResult {
      data: entry.data.clone().and_then(downcast::<T>),
      previous_data: None,
      status: entry.status,
      error: entry.error.clone(),
      is_fetching: entry.in_flight.is_some(),
      is_stale: self.is_stale(entry),
      fetched_at: entry.fetched_at,
    }
  }

  pub fn is_fetching(&self, key: &QueryKey) -> bool {
    self
      .entries()
      .get(key)
      .map(|entry| entry.in_flight.is_some())
      .unwrap_or(false)
  }

  /// Register an observer of `key`. Starts a fetch if the entry has no good
  /// data or it is stale, and nothing is running yet.
  pub(crate) fn subscribe(
    &self,
    key: &QueryKey,
    fetcher: ErasedFetcher,
  ) -> (Subscription, watch::Receiver<u64>) {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(|| self.new_entry());
    entry.observers += 1;
    entry.fetcher = Some(Arc::clone(&fetcher));
    entry.last_used = Instant::now();
    let changes = entry.notify.subscribe();

    let needs_fetch = entry.status != QueryStatus::Success || self.is_stale(entry);
    if needs_fetch && entry.in_flight.is_none() {
      self.start_fetch(key, entry, fetcher);
    }
    (Subscription { entry: entry.id }, changes)
  }

  /// Release a subscription. Does nothing if the entry it was taken on has
  /// since been dropped, even if another entry now lives under `key`.
  pub(crate) fn unsubscribe(&self, key: &QueryKey, subscription: Subscription) {
    let mut entries = self.entries();
    match entries.get_mut(key) {
      Some(entry) if entry.id == subscription.entry => {
        entry.observers = entry.observers.saturating_sub(1);
        entry.last_used = Instant::now();
      }
      _ => debug!(key = %key, "subscription outlived its entry"),
    }
  }

  /// Evict unobserved, idle entries untouched for longer than `gc_time`.
  pub fn garbage_collect(&self) -> usize {
    let gc_time = self.config.gc_time;
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| {
      entry.observers > 0 || entry.in_flight.is_some() || entry.last_used.elapsed() < gc_time
    });
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!(evicted, "garbage collected cache entries");
    }
    evicted
  }

  /// Drop everything, e.g. at logout. Responses still in flight are
  /// discarded when they arrive.
  pub fn clear(&self) {
    self.entries().clear();
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn counting_fetcher(
    calls: Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, ApiError>> + Send + Sync + 'static {
    move || {
      let calls = calls.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        Ok(n)
      }
      .boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_fetches_are_coalesced() {
    let cache = QueryCache::default();
    let key = QueryKey::list("clients", [("page", "1")]);
    let calls = Arc::new(AtomicU32::new(0));

    let (a, b) = tokio::join!(
      cache.fetch(&key, counting_fetcher(calls.clone(), Duration::from_millis(50))),
      cache.fetch(&key, counting_fetcher(calls.clone(), Duration::from_millis(50))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(*a, 1);
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_data_is_served_from_cache() {
    let cache = QueryCache::default();
    let key = QueryKey::detail("clients", 1);
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let second = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*first, *second);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_data_is_refetched() {
    let cache = QueryCache::new(CacheConfig {
      stale_time: Duration::from_secs(1),
      ..CacheConfig::default()
    });
    let key = QueryKey::detail("clients", 1);
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    let second = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*second, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_superseded_response_is_discarded() {
    let cache = QueryCache::default();
    let key = QueryKey::list("invoices", [("page", "1")]);
    let calls = Arc::new(AtomicU32::new(0));

    // First request is slow, second fast: the first resolves last and must
    // not overwrite the newer value.
    let fetcher = {
      let calls = calls.clone();
      move || {
        let calls = calls.clone();
        async move {
          let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
          let delay = if n == 1 { 100 } else { 10 };
          tokio::time::sleep(Duration::from_millis(delay)).await;
          Ok::<_, ApiError>(n)
        }
      }
    };

    let slow = {
      let cache = cache.clone();
      let key = key.clone();
      let fetcher = fetcher.clone();
      tokio::spawn(async move { cache.fetch(&key, fetcher).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    cache.invalidate(|k| k == &key);
    let fast = cache.fetch(&key, fetcher).await.unwrap();
    assert_eq!(*fast, 2);

    // The slow caller still gets its own answer...
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(*slow, 1);
    // ...but the cache keeps the newer one.
    assert_eq!(cache.get_query_data::<u32>(&key).as_deref(), Some(&2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_keeps_previous_data_and_other_keys() {
    let cache = QueryCache::default();
    let key = QueryKey::detail("domains", 1);
    let other = QueryKey::detail("domains", 2);

    cache.set_query_data(&key, 10u32);
    cache.set_query_data(&other, 20u32);
    cache.invalidate(|k| k == &key);

    let result = cache
      .fetch(&key, || async {
        Err::<u32, _>(ApiError::from_status(500, None))
      })
      .await;
    assert_eq!(result.unwrap_err().status(), Some(500));

    let snapshot = cache.snapshot::<u32>(&key);
    assert!(snapshot.is_error());
    assert_eq!(snapshot.data.as_deref(), Some(&10));
    assert_eq!(cache.get_query_data::<u32>(&other).as_deref(), Some(&20));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_unobserved_is_lazy() {
    let cache = QueryCache::default();
    let key = QueryKey::list("plans", [("page", "1")]);
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(cache.invalidate_family(&KeyFamily::Lists("plans")), 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.snapshot::<u32>(&key).is_stale);

    let next = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(*next, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_remove_drops_unobserved_entries() {
    let cache = QueryCache::default();
    cache.set_query_data(&QueryKey::detail("domains", 1), 1u32);
    cache.set_query_data(&QueryKey::detail("domains", 2), 2u32);

    assert_eq!(cache.remove(&KeyFamily::detail("domains", 1)), 1);
    assert!(cache
      .get_query_data::<u32>(&QueryKey::detail("domains", 1))
      .is_none());
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_garbage_collect_evicts_idle_entries() {
    let cache = QueryCache::new(CacheConfig {
      gc_time: Duration::from_secs(60),
      ..CacheConfig::default()
    });
    cache.set_query_data(&QueryKey::detail("meetings", 1), 1u32);

    assert_eq!(cache.garbage_collect(), 0);
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(cache.garbage_collect(), 1);
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_purged_entry_ignores_response_from_before_purge() {
    let cache = QueryCache::default();
    let key = QueryKey::detail("domains", 1);
    let calls = Arc::new(AtomicU32::new(0));

    // First request still sees the record and answers late; every later one
    // answers quickly that it is gone.
    let fetcher = {
      let calls = calls.clone();
      move || {
        let calls = calls.clone();
        async move {
          if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok("deleted-record".to_string())
          } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(ApiError::from_status(404, None))
          }
        }
      }
    };

    let stale = {
      let cache = cache.clone();
      let key = key.clone();
      let fetcher = fetcher.clone();
      tokio::spawn(async move { cache.fetch(&key, fetcher).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(cache.remove(&KeyFamily::detail("domains", 1)), 1);
    let fresh = cache.fetch(&key, fetcher.clone()).await;
    assert!(fresh.unwrap_err().is_not_found());

    assert!(stale.await.unwrap().is_ok());
    assert!(cache.get_query_data::<String>(&key).is_none());
    assert!(cache.snapshot::<String>(&key).is_error());

    let again = cache.fetch(&key, fetcher).await;
    assert!(again.unwrap_err().is_not_found());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_discards_in_flight_response() {
    let cache = QueryCache::default();
    let key = QueryKey::detail("expenses", 1);
    let calls = Arc::new(AtomicU32::new(0));

    let pending = {
      let cache = cache.clone();
      let key = key.clone();
      let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(20));
      tokio::spawn(async move { cache.fetch(&key, fetcher).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    cache.clear();

    assert_eq!(*pending.await.unwrap().unwrap(), 1);
    assert!(cache.is_empty());
  }
}
