//! List screens: filters and pagination held in the location, rows held in
//! the cache.

use std::sync::Arc;

use crate::crm::api_types::{Page, PageMeta};
use crate::crm::cache::Cacheable;
use crate::crm::cached_client::Resource;
use crate::crm::client::{HttpTransport, Transport};
use crate::error::ApiError;
use crate::params::{History, ListFilters, MemoryHistory, NavigationMode, Pagination, UrlState};
use crate::query::{QueryObserver, QueryResult, QueryStatus};

/// Position of the visible page within the whole result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
  pub page: u32,
  pub page_size: u32,
  pub total_items: u64,
  pub total_pages: u32,
  /// One-based index of the first visible row, 0 when there are none
  pub from: u64,
  pub to: u64,
  /// False when totals are estimated from the rows seen so far
  pub exact: bool,
  pub can_previous_page: bool,
  pub can_next_page: bool,
}

impl PageInfo {
  pub fn derive(pagination: Pagination, rows: usize, meta: Option<&PageMeta>) -> Self {
    let offset = pagination.offset();
    let rows = rows as u64;
    let (from, to) = if rows == 0 {
      (0, 0)
    } else {
      (offset + 1, offset + rows)
    };
    let page_size = u64::from(pagination.page_size.max(1));

    let (total_items, total_pages, can_next_page, exact) = match meta {
      Some(meta) => {
        let total_pages = meta.page_count();
        (
          meta.total_items,
          total_pages,
          pagination.page < total_pages,
          true,
        )
      }
      // Without totals the backend only tells us whether this page is full;
      // the count undercounts anything past the current page.
      None => {
        let total_items = offset + rows;
        let total_pages = u32::try_from(total_items.div_ceil(page_size)).unwrap_or(u32::MAX);
        (total_items, total_pages, rows >= page_size, false)
      }
    };

    Self {
      page: pagination.page,
      page_size: pagination.page_size,
      total_items,
      total_pages,
      from,
      to,
      exact,
      can_previous_page: pagination.page > 1,
      can_next_page,
    }
  }
}

/// What a list screen renders.
#[derive(Debug, Clone)]
pub struct ListView<E> {
  page: Option<Arc<Page<E>>>,
  pub status: QueryStatus,
  pub error: Option<ApiError>,
  pub is_loading: bool,
  pub is_fetching: bool,
  /// Rows belong to the previous filters or page while the current ones load
  pub is_placeholder: bool,
  /// Describes the visible rows, so it follows them while they are a
  /// placeholder
  pub info: PageInfo,
}

impl<E> ListView<E> {
  fn new(result: QueryResult<Page<E>>, current: Pagination, previous: Pagination) -> Self {
    let is_placeholder = result.is_placeholder();
    let is_loading = result.is_loading();
    let pagination = if is_placeholder { previous } else { current };
    let page = result.visible_data().cloned();
    let info = match &page {
      Some(page) => PageInfo::derive(pagination, page.rows.len(), page.meta.as_ref()),
      None => PageInfo::derive(pagination, 0, None),
    };
    Self {
      page,
      status: result.status,
      error: result.error,
      is_loading,
      is_fetching: result.is_fetching,
      is_placeholder,
      info,
    }
  }

  pub fn rows(&self) -> &[E] {
    self.page.as_deref().map(|p| p.rows.as_slice()).unwrap_or(&[])
  }

  pub fn is_empty(&self) -> bool {
    self.rows().is_empty()
  }

  pub fn error_message(&self) -> Option<String> {
    self.error.as_ref().map(ApiError::user_message)
  }
}

/// Binds one list screen to the location and the cache.
///
/// State is read from the history on construction and written back on every
/// change, so the location alone reproduces the screen. Changing filters or
/// page size returns to the first page.
pub struct ListController<E: Cacheable, T = HttpTransport, H = MemoryHistory> {
  resource: Resource<E, T>,
  history: H,
  navigation: NavigationMode,
  state: UrlState<E::Filters>,
  observer: QueryObserver<Page<E>>,
  /// Pagination of the key the observer is on
  observed: Pagination,
  /// Pagination of the placeholder rows the observer may be showing
  previous: Pagination,
}

impl<E: Cacheable, T: Transport, H: History> ListController<E, T, H> {
  pub fn new(resource: Resource<E, T>, history: H) -> Self {
    let state = resource
      .codec()
      .decode::<E::Filters>(&history.location());
    let observer = resource.observe_list(&state.filters, state.pagination);
    let observed = state.pagination;
    Self {
      resource,
      history,
      navigation: NavigationMode::default(),
      state,
      observer,
      observed,
      previous: observed,
    }
  }

  pub fn with_navigation(mut self, navigation: NavigationMode) -> Self {
    self.navigation = navigation;
    self
  }

  pub fn filters(&self) -> &E::Filters {
    &self.state.filters
  }

  pub fn pagination(&self) -> Pagination {
    self.state.pagination
  }

  pub fn history(&self) -> &H {
    &self.history
  }

  pub fn history_mut(&mut self) -> &mut H {
    &mut self.history
  }

  /// Re-read the state from the history's current location, e.g. after it
  /// moved back or forward. The history itself is left as it is.
  pub fn sync_from_location(&mut self) {
    let state = self
      .resource
      .codec()
      .decode::<E::Filters>(&self.history.location());
    if state == self.state {
      return;
    }
    self.state = state;
    self.retarget();
  }

  /// Shareable query string for the current state.
  pub fn location(&self) -> String {
    self.resource.codec().encode(&self.state)
  }

  pub fn set_filters(&mut self, filters: E::Filters) {
    let filters = filters.normalized();
    if filters == self.state.filters {
      return;
    }
    self.state.filters = filters;
    self.state.pagination.page = 1;
    self.sync();
  }

  pub fn update_filters(&mut self, update: impl FnOnce(&mut E::Filters)) {
    let mut filters = self.state.filters.clone();
    update(&mut filters);
    self.set_filters(filters);
  }

  /// Set the search term; an empty term clears it.
  pub fn set_search(&mut self, term: &str) {
    let term = term.trim();
    let term = (!term.is_empty()).then(|| term.to_string());
    self.update_filters(|filters| filters.set_search(term));
  }

  pub fn set_page(&mut self, page: u32) {
    let page = page.max(1);
    if page == self.state.pagination.page {
      return;
    }
    self.state.pagination.page = page;
    self.sync();
  }

  /// Change the page size, returning to page 1. Sizes outside the
  /// allow-list fall back to the default.
  pub fn set_page_size(&mut self, page_size: u32) {
    self.state.pagination = self.resource.codec().pagination_config().normalize(Pagination {
      page: 1,
      page_size,
    });
    self.sync();
  }

  pub fn next_page(&mut self) -> bool {
    if !self.view().info.can_next_page {
      return false;
    }
    self.set_page(self.state.pagination.page + 1);
    true
  }

  pub fn previous_page(&mut self) -> bool {
    if self.state.pagination.page <= 1 {
      return false;
    }
    self.set_page(self.state.pagination.page - 1);
    true
  }

  /// Manual retry of the current page.
  pub fn refetch(&self) -> bool {
    self.observer.refetch()
  }

  pub fn view(&self) -> ListView<E> {
    ListView::new(self.observer.result(), self.state.pagination, self.previous)
  }

  /// Wait for the current page to finish loading.
  pub async fn settled(&mut self) -> ListView<E> {
    let result = self.observer.settle().await;
    ListView::new(result, self.state.pagination, self.previous)
  }

  fn sync(&mut self) {
    let query = self.resource.codec().encode(&self.state);
    self.navigation.apply(&mut self.history, query);
    self.retarget();
  }

  fn retarget(&mut self) {
    // The observer keeps showing the old key's rows only if it had some
    if self.observer.result().data.is_some() {
      self.previous = self.observed;
    }
    self.observed = self.state.pagination;
    self
      .resource
      .retarget_list(&mut self.observer, &self.state.filters, self.state.pagination);
  }
}
