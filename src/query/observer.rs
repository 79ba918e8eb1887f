//! Subscription to one cache key at a time.
//!
//! Inspired by TanStack Query's `useQuery`: a `QueryObserver<T>` keeps its
//! key's entry alive and refetched, reports loading/fetching/error state,
//! and when moved to a new key keeps the old key's data visible until the
//! new key resolves.
//!
//! # Example
//!
//! ```ignore
//! let mut observer = QueryObserver::new(cache.clone(), key, move || {
//!     let client = client.clone();
//!     async move { client.list::<Domain>(query.clone()).await }
//! });
//!
//! let result = observer.settle().await;
//! match result.visible_data() {
//!     Some(page) => render(page),
//!     None if result.is_error() => render_error(result.error_message()),
//!     None => render_spinner(),
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::cache::{erase, QueryCache, Subscription};
use super::key::QueryKey;
use super::state::QueryResult;
use crate::error::ApiError;

pub struct QueryObserver<T> {
  cache: QueryCache,
  key: QueryKey,
  subscription: Subscription,
  changes: watch::Receiver<u64>,
  previous_data: Option<Arc<T>>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  /// Subscribe to `key`, fetching it in the background if needed.
  pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let (subscription, changes) = cache.subscribe(&key, erase(fetcher));
    Self {
      cache,
      key,
      subscription,
      changes,
      previous_data: None,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Current state, with the previous key's data attached while the current
  /// key has none.
  pub fn result(&self) -> QueryResult<T> {
    let mut result = self.cache.snapshot::<T>(&self.key);
    if result.data.is_none() {
      result.previous_data = self.previous_data.clone();
    }
    result
  }

  /// Move to a new key. A no-op if the key is unchanged.
  pub fn set_key<F, Fut>(&mut self, key: QueryKey, fetcher: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if key == self.key {
      return;
    }

    // Keep the newest good data across several quick key changes
    if let Some(current) = self.cache.get_query_data::<T>(&self.key) {
      self.previous_data = Some(current);
    }

    self.cache.unsubscribe(&self.key, self.subscription);
    let (subscription, changes) = self.cache.subscribe(&key, erase(fetcher));
    self.subscription = subscription;
    self.changes = changes;
    self.key = key;
  }

  /// Manual retry. Joins a running request rather than starting another.
  pub fn refetch(&self) -> bool {
    self.cache.refetch(&self.key)
  }

  /// Wait for the next state change of the current key.
  ///
  /// Returns false if the entry was dropped from the cache.
  pub async fn changed(&mut self) -> bool {
    self.changes.changed().await.is_ok()
  }

  /// Wait until no request is running for the current key.
  pub async fn settle(&mut self) -> QueryResult<T> {
    loop {
      self.changes.borrow_and_update();
      let result = self.result();
      if !result.is_fetching {
        return result;
      }
      if self.changes.changed().await.is_err() {
        return self.result();
      }
    }
  }
}

impl<T> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    self.cache.unsubscribe(&self.key, self.subscription);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::key::KeyFamily;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn delayed(
    calls: Arc<AtomicU32>,
    value: &'static str,
    delay_ms: u64,
  ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<String, ApiError>> + Send>>
       + Send
       + Sync
       + 'static {
    move || {
      let calls = calls.clone();
      Box::pin(async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(format!("{}#{}", value, n))
      })
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_observer_fetches_on_subscribe() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let mut observer = QueryObserver::new(
      cache.clone(),
      QueryKey::detail("clients", 1),
      delayed(calls.clone(), "client", 20),
    );

    let initial = observer.result();
    assert!(initial.is_loading());
    assert!(initial.data.is_none());

    let settled = observer.settle().await;
    assert!(settled.is_success());
    assert_eq!(settled.data.as_deref().map(String::as_str), Some("client#1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_key_change_keeps_previous_data_visible() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let page1 = QueryKey::list("domains", [("page", "1")]);
    let page2 = QueryKey::list("domains", [("page", "2")]);

    let mut observer = QueryObserver::new(cache.clone(), page1, delayed(calls.clone(), "p1", 10));
    observer.settle().await;

    observer.set_key(page2, delayed(calls.clone(), "p2", 50));
    let during = observer.result();
    assert!(during.is_fetching);
    assert!(during.is_placeholder());
    assert_eq!(
      during.visible_data().map(|d| d.as_str()),
      Some("p1#1")
    );

    let after = observer.settle().await;
    assert!(!after.is_placeholder());
    assert_eq!(after.data.as_deref().map(String::as_str), Some("p2#2"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_refetches_observed_entry() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::list("invoices", [("page", "1")]);

    let mut observer = QueryObserver::new(cache.clone(), key, delayed(calls.clone(), "inv", 5));
    observer.settle().await;

    cache.invalidate_family(&KeyFamily::Entity("invoices"));
    assert!(observer.result().is_fetching);

    let refreshed = observer.settle().await;
    assert_eq!(refreshed.data.as_deref().map(String::as_str), Some("inv#2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_is_not_retried_automatically() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut observer: QueryObserver<String> = QueryObserver::new(
      cache.clone(),
      QueryKey::detail("meetings", 9),
      move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(ApiError::from_status(503, None)) }
      },
    );

    let failed = observer.settle().await;
    assert!(failed.is_error());
    assert_eq!(failed.error.as_ref().and_then(ApiError::status), Some(503));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(observer.refetch());
    observer.settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_observer_from_before_clear_does_not_unmount_new_one() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::list("clients", [("page", "1")]);

    let mut first = QueryObserver::new(cache.clone(), key.clone(), delayed(calls.clone(), "c", 5));
    first.settle().await;
    cache.clear();

    let mut second = QueryObserver::new(cache.clone(), key, delayed(calls.clone(), "c", 5));
    second.settle().await;
    drop(first);

    cache.invalidate_family(&KeyFamily::Lists("clients"));
    assert!(second.result().is_fetching);
    let refreshed = second.settle().await;
    assert_eq!(refreshed.data.as_deref().map(String::as_str), Some("c#3"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_unsubscribes() {
    let cache = QueryCache::new(crate::query::CacheConfig {
      gc_time: Duration::from_secs(1),
      ..Default::default()
    });
    let calls = Arc::new(AtomicU32::new(0));
    let mut observer = QueryObserver::new(
      cache.clone(),
      QueryKey::detail("plans", 1),
      delayed(calls.clone(), "plan", 1),
    );
    observer.settle().await;

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(cache.garbage_collect(), 0);

    drop(observer);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(cache.garbage_collect(), 1);
  }
}
