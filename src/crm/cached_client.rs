//! CRM client with transparent query caching.

use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::params::{Pagination, UrlCodec};
use crate::query::{KeyFamily, MutationCoordinator, QueryCache, QueryKey, QueryObserver};

use super::api_types::{Page, Validate};
use super::cache::Cacheable;
use super::client::{CrmClient, HttpTransport, Transport};

/// CRM client backed by a shared [`QueryCache`].
///
/// Reads go through the cache and are de-duplicated per key; writes go
/// through a [`MutationCoordinator`] so the lists and details they touch
/// are refreshed afterwards.
#[derive(Clone)]
pub struct CachedCrmClient<T = HttpTransport> {
  inner: CrmClient<T>,
  cache: QueryCache,
  mutations: MutationCoordinator,
  codec: UrlCodec,
}

impl CachedCrmClient<HttpTransport> {
  /// Create a client for the configured backend with a fresh cache.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = CrmClient::new(config)?;
    let cache = QueryCache::new(config.cache.to_cache_config());
    let codec = UrlCodec::new(config.pagination.clone());
    Ok(Self::with_parts(inner, cache, codec))
  }
}

impl<T: Transport> CachedCrmClient<T> {
  pub fn with_parts(inner: CrmClient<T>, cache: QueryCache, codec: UrlCodec) -> Self {
    let mutations = MutationCoordinator::new(cache.clone());
    Self {
      inner,
      cache,
      mutations,
      codec,
    }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn codec(&self) -> &UrlCodec {
    &self.codec
  }

  pub fn mutations(&self) -> &MutationCoordinator {
    &self.mutations
  }

  /// Handle for one record type.
  pub fn resource<E: Cacheable>(&self) -> Resource<E, T> {
    Resource {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
      mutations: self.mutations.clone(),
      codec: self.codec.clone(),
      _entity: PhantomData,
    }
  }
}

/// Cached reads and coordinated writes of one record type.
pub struct Resource<E, T = HttpTransport> {
  inner: CrmClient<T>,
  cache: QueryCache,
  mutations: MutationCoordinator,
  codec: UrlCodec,
  _entity: PhantomData<fn() -> E>,
}

impl<E, T: Clone> Clone for Resource<E, T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
      mutations: self.mutations.clone(),
      codec: self.codec.clone(),
      _entity: PhantomData,
    }
  }
}

type Fetch<D> = BoxFuture<'static, Result<D, ApiError>>;

impl<E: Cacheable, T: Transport> Resource<E, T> {
  pub fn codec(&self) -> &UrlCodec {
    &self.codec
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  fn entity() -> &'static str {
    E::entity_type().as_str()
  }

  pub fn list_key(&self, filters: &E::Filters, pagination: Pagination) -> QueryKey {
    QueryKey::list(Self::entity(), self.codec.server_query(filters, pagination))
  }

  pub fn detail_key(&self, id: u64) -> QueryKey {
    E::detail_key(id)
  }

  fn list_fetcher(
    &self,
    filters: &E::Filters,
    pagination: Pagination,
  ) -> impl Fn() -> Fetch<Page<E>> + Send + Sync + 'static {
    let inner = self.inner.clone();
    let query = self.codec.server_query(filters, pagination);
    move || {
      let inner = inner.clone();
      let query = query.clone();
      async move { inner.list::<E>(query).await }.boxed()
    }
  }

  fn detail_fetcher(&self, id: u64) -> impl Fn() -> Fetch<E> + Send + Sync + 'static {
    let inner = self.inner.clone();
    move || {
      let inner = inner.clone();
      async move { inner.get::<E>(&id.to_string()).await }.boxed()
    }
  }

  /// One page, served from the cache while fresh.
  pub async fn list(
    &self,
    filters: &E::Filters,
    pagination: Pagination,
  ) -> Result<Arc<Page<E>>, ApiError> {
    let key = self.list_key(filters, pagination);
    self
      .cache
      .fetch(&key, self.list_fetcher(filters, pagination))
      .await
  }

  /// Subscribe to one page; see [`QueryObserver`].
  pub fn observe_list(&self, filters: &E::Filters, pagination: Pagination) -> QueryObserver<Page<E>> {
    QueryObserver::new(
      self.cache.clone(),
      self.list_key(filters, pagination),
      self.list_fetcher(filters, pagination),
    )
  }

  /// Move a list observer to another page or filter set.
  pub fn retarget_list(
    &self,
    observer: &mut QueryObserver<Page<E>>,
    filters: &E::Filters,
    pagination: Pagination,
  ) {
    observer.set_key(
      self.list_key(filters, pagination),
      self.list_fetcher(filters, pagination),
    );
  }

  pub async fn detail(&self, id: u64) -> Result<Arc<E>, ApiError> {
    self
      .cache
      .fetch(&self.detail_key(id), self.detail_fetcher(id))
      .await
  }

  pub fn observe_detail(&self, id: u64) -> QueryObserver<E> {
    QueryObserver::new(
      self.cache.clone(),
      self.detail_key(id),
      self.detail_fetcher(id),
    )
  }

  /// Create a record. Invalid payloads are rejected before any request.
  pub async fn create(&self, input: E::Input) -> Result<E, ApiError> {
    input.validate()?;
    let inner = self.inner.clone();
    self
      .mutations
      .save(
        &E::lists(),
        async move { inner.create::<E>(&input).await },
        Self::saved_key,
      )
      .await
  }

  /// Replace a record.
  pub async fn update(&self, id: u64, input: E::Input) -> Result<E, ApiError> {
    input.validate()?;
    let inner = self.inner.clone();
    self
      .mutations
      .save(
        &E::lists(),
        async move { inner.update::<E>(&id.to_string(), &input).await },
        Self::saved_key,
      )
      .await
  }

  /// Move a record to another state through its sub-resource, e.g. mark an
  /// invoice paid.
  pub async fn transition(&self, id: u64, action: &str) -> Result<E, ApiError> {
    if !E::transitions().contains(&action) {
      return Err(ApiError::validation(
        "action",
        format!(
          "{} does not support {:?} (expected one of {:?})",
          E::entity_type().label(),
          action,
          E::transitions()
        ),
      ));
    }
    debug!(entity = Self::entity(), id, action, "transition");
    let inner = self.inner.clone();
    let action = action.to_string();
    self
      .mutations
      .save(
        &E::lists(),
        async move { inner.transition::<E>(&id.to_string(), &action).await },
        Self::saved_key,
      )
      .await
  }

  pub async fn delete(&self, id: u64) -> Result<(), ApiError> {
    let inner = self.inner.clone();
    let key = id.to_string();
    self
      .mutations
      .remove(&E::lists(), &KeyFamily::detail(Self::entity(), id), async {
        inner.delete::<E>(&key).await
      })
      .await
  }

  fn saved_key(record: &E) -> QueryKey {
    E::detail_key(record.cache_key())
  }
}
