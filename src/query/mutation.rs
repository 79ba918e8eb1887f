//! Writes against the backend, followed by cache invalidation.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::QueryCache;
use super::key::{KeyFamily, QueryKey};
use crate::error::ApiError;

/// Runs create/update/delete requests and keeps the cache consistent with
/// their outcome.
///
/// The cache is only touched after the backend confirms a write; a failed
/// write leaves every entry as it was. Mutations are independent of each
/// other: several may run at once, each invalidating on its own completion.
#[derive(Clone)]
pub struct MutationCoordinator {
  cache: QueryCache,
  pending: Arc<AtomicUsize>,
}

/// Decrements the pending counter when a mutation finishes, however it ends.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

impl MutationCoordinator {
  pub fn new(cache: QueryCache) -> Self {
    Self {
      cache,
      pending: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Number of mutations currently waiting on the backend.
  pub fn pending(&self) -> usize {
    self.pending.load(Ordering::SeqCst)
  }

  fn track(&self) -> PendingGuard {
    self.pending.fetch_add(1, Ordering::SeqCst);
    PendingGuard(Arc::clone(&self.pending))
  }

  /// Run a create or update.
  ///
  /// On success the returned record is written to the key `detail_key`
  /// gives for it, and every key in `lists` is invalidated.
  pub async fn save<E, Fut>(
    &self,
    lists: &KeyFamily,
    request: Fut,
    detail_key: impl FnOnce(&E) -> QueryKey,
  ) -> Result<E, ApiError>
  where
    E: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<E, ApiError>>,
  {
    let _pending = self.track();
    let saved = request.await.map_err(|e| {
      warn!(lists = %lists, error = %e, "save failed");
      e
    })?;

    let key = detail_key(&saved);
    self.cache.set_query_data(&key, saved.clone());
    let invalidated = self.cache.invalidate_family(lists);
    debug!(key = %key, invalidated, "saved");
    Ok(saved)
  }

  /// Run a delete.
  ///
  /// On success the `detail` entry is purged and every key in `lists` is
  /// invalidated.
  pub async fn remove<Fut>(
    &self,
    lists: &KeyFamily,
    detail: &KeyFamily,
    request: Fut,
  ) -> Result<(), ApiError>
  where
    Fut: Future<Output = Result<(), ApiError>>,
  {
    let _pending = self.track();
    request.await.map_err(|e| {
      warn!(record = %detail, error = %e, "delete failed");
      e
    })?;

    self.cache.remove(detail);
    let invalidated = self.cache.invalidate_family(lists);
    debug!(record = %detail, invalidated, "deleted");
    Ok(())
  }

  /// Run any other write, invalidating `families` once it succeeds.
  pub async fn run<T, Fut>(&self, families: &[KeyFamily], request: Fut) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let _pending = self.track();
    let output = request.await.map_err(|e| {
      warn!(error = %e, "mutation failed");
      e
    })?;

    for family in families {
      self.cache.invalidate_family(family);
    }
    Ok(output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::QueryObserver;
  use std::sync::atomic::AtomicU32;
  use std::time::Duration;

  #[tokio::test(start_paused = true)]
  async fn test_failed_save_leaves_cache_untouched() {
    let cache = QueryCache::default();
    let list = QueryKey::list("clients", [("page", "1")]);
    cache.set_query_data(&list, vec!["acme".to_string()]);

    let coordinator = MutationCoordinator::new(cache.clone());
    let result = coordinator
      .save(
        &KeyFamily::Lists("clients"),
        async { Err::<String, _>(ApiError::from_status(422, Some("name taken".into()))) },
        |name: &String| QueryKey::detail("clients", name),
      )
      .await;

    assert_eq!(result.unwrap_err().user_message(), "name taken");
    assert!(!cache.snapshot::<Vec<String>>(&list).is_stale);
    assert!(cache
      .get_query_data::<String>(&QueryKey::detail("clients", "globex"))
      .is_none());
    assert_eq!(coordinator.pending(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_save_refreshes_detail_and_mounted_list() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut list = QueryObserver::new(
      cache.clone(),
      QueryKey::list("clients", [("page", "1")]),
      move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, ApiError>(n) }
      },
    );
    list.settle().await;

    let coordinator = MutationCoordinator::new(cache.clone());
    let saved = coordinator
      .save(
        &KeyFamily::Lists("clients"),
        async { Ok::<_, ApiError>("globex".to_string()) },
        |name: &String| QueryKey::detail("clients", name),
      )
      .await
      .unwrap();
    assert_eq!(saved, "globex");

    let detail = cache.get_query_data::<String>(&QueryKey::detail("clients", "globex"));
    assert_eq!(detail.as_deref().map(String::as_str), Some("globex"));

    let refreshed = list.settle().await;
    assert_eq!(refreshed.data.as_deref(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_mutations_are_counted() {
    let coordinator = MutationCoordinator::new(QueryCache::default());
    let slow = |ms: u64| async move {
      tokio::time::sleep(Duration::from_millis(ms)).await;
      Ok::<_, ApiError>(())
    };

    let a = {
      let coordinator = coordinator.clone();
      tokio::spawn(async move {
        coordinator
          .remove(&KeyFamily::Lists("domains"), &KeyFamily::detail("domains", 1), slow(30))
          .await
      })
    };
    let b = {
      let coordinator = coordinator.clone();
      tokio::spawn(async move {
        coordinator
          .remove(&KeyFamily::Lists("domains"), &KeyFamily::detail("domains", 2), slow(30))
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(coordinator.pending(), 2);

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();
    assert_eq!(coordinator.pending(), 0);
  }
}
