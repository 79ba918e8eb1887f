//! URL parameter codec for list state.
//!
//! Turns a query string into typed filters plus pagination and back. The
//! codec owns a whitelist of keys (the filter record's keys, `page` and
//! `pageSize`); everything else in the query string is carried through
//! untouched.
//!
//! Two encodings exist:
//! - [`UrlCodec::encode`] is the shareable one: keys at their default value
//!   are left out so links stay short.
//! - [`UrlCodec::server_query`] is what the backend and the cache key see:
//!   pagination is always explicit.

pub mod fields;
mod history;

pub use history::{History, MemoryHistory, NavigationMode};

use serde::Deserialize;
use std::fmt;
use url::form_urlencoded;

pub const PAGE_KEY: &str = "page";
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// Parsed query-string pairs, in their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
  pairs: Vec<(String, String)>,
}

impl QueryParams {
  /// Parse a query string, with or without its leading `?`.
  pub fn parse(query: &str) -> Self {
    let query = query.trim().trim_start_matches('?');
    Self {
      pairs: form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect(),
    }
  }

  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      pairs: pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }

  /// First value for `key`.
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .pairs
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }
}

/// Serialize pairs as an `application/x-www-form-urlencoded` string.
pub fn to_query_string<'a, I>(pairs: I) -> String
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  form_urlencoded::Serializer::new(String::new())
    .extend_pairs(pairs)
    .finish()
}

/// A typed filter record for one entity type.
///
/// Every field is optional; an unset field means "unfiltered". Implementors
/// list the query keys they own in `KEYS`, and `encode` must only produce
/// those keys.
pub trait ListFilters: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
  /// Query-string keys owned by this record, in encoding order
  const KEYS: &'static [&'static str];

  /// Read the owned keys. Malformed values read as unset.
  fn decode(params: &QueryParams) -> Self;

  /// Set fields only, in `KEYS` order.
  fn encode(&self) -> Vec<(&'static str, String)>;

  /// Free-text search term, for records that have one.
  fn search(&self) -> Option<&str> {
    None
  }

  /// Replace the free-text search term. Records without one ignore it.
  fn set_search(&mut self, _term: Option<String>) {}

  fn is_unfiltered(&self) -> bool {
    self == &Self::default()
  }

  /// Canonical form: what `decode(encode(self))` yields.
  fn normalized(&self) -> Self {
    Self::decode(&QueryParams::from_pairs(self.encode()))
  }
}

/// Current page and its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  /// One-based
  pub page: u32,
  pub page_size: u32,
}

impl Pagination {
  /// Number of rows before this page.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }
}

/// Default page size and the sizes a user may pick.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
  pub default_page_size: u32,
  pub page_sizes: Vec<u32>,
}

impl Default for PaginationConfig {
  fn default() -> Self {
    Self {
      default_page_size: 10,
      page_sizes: vec![10, 20, 50, 100],
    }
  }
}

impl PaginationConfig {
  pub fn defaults(&self) -> Pagination {
    Pagination {
      page: 1,
      page_size: self.default_page_size,
    }
  }

  pub fn is_allowed(&self, page_size: u32) -> bool {
    self.page_sizes.contains(&page_size)
  }

  /// Clamp to valid values: page at least 1, page size from the allow-list.
  pub fn normalize(&self, pagination: Pagination) -> Pagination {
    Pagination {
      page: pagination.page.max(1),
      page_size: if self.is_allowed(pagination.page_size) {
        pagination.page_size
      } else {
        self.default_page_size
      },
    }
  }
}

/// Everything the codec knows about a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlState<F> {
  pub filters: F,
  pub pagination: Pagination,
  /// Pairs this codec does not own, kept in their original order
  pub passthrough: Vec<(String, String)>,
}

/// Encoder/decoder between query strings and [`UrlState`].
#[derive(Debug, Clone, Default)]
pub struct UrlCodec {
  pagination: PaginationConfig,
}

impl UrlCodec {
  pub fn new(pagination: PaginationConfig) -> Self {
    Self { pagination }
  }

  pub fn pagination_config(&self) -> &PaginationConfig {
    &self.pagination
  }

  /// State at its defaults: no filters, first page, default size.
  pub fn initial<F: ListFilters>(&self) -> UrlState<F> {
    UrlState {
      filters: F::default(),
      pagination: self.pagination.defaults(),
      passthrough: Vec::new(),
    }
  }

  pub fn decode<F: ListFilters>(&self, query: &str) -> UrlState<F> {
    let params = QueryParams::parse(query);
    let defaults = self.pagination.defaults();

    let page = fields::parsed::<u32>(&params, PAGE_KEY).unwrap_or(defaults.page);
    let page_size = fields::parsed::<u32>(&params, PAGE_SIZE_KEY).unwrap_or(defaults.page_size);

    let passthrough = params
      .iter()
      .filter(|(k, _)| !Self::owns::<F>(k))
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();

    UrlState {
      filters: F::decode(&params),
      pagination: self.pagination.normalize(Pagination { page, page_size }),
      passthrough,
    }
  }

  /// Shareable query string. Keys at their default value are omitted.
  pub fn encode<F: ListFilters>(&self, state: &UrlState<F>) -> String {
    let pagination = self.pagination.normalize(state.pagination);
    let defaults = self.pagination.defaults();

    let mut pairs: Vec<(&str, String)> = state.filters.encode();
    if pagination.page != defaults.page {
      pairs.push((PAGE_KEY, pagination.page.to_string()));
    }
    if pagination.page_size != defaults.page_size {
      pairs.push((PAGE_SIZE_KEY, pagination.page_size.to_string()));
    }

    to_query_string(
      pairs
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .chain(state.passthrough.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
    )
  }

  /// Canonical form of `state`; `decode(encode(s)) == normalize(s)`.
  pub fn normalize<F: ListFilters>(&self, state: &UrlState<F>) -> UrlState<F> {
    UrlState {
      filters: state.filters.normalized(),
      pagination: self.pagination.normalize(state.pagination),
      passthrough: state.passthrough.clone(),
    }
  }

  /// Parameters sent to the backend and used as the cache key: set
  /// filters plus explicit pagination.
  pub fn server_query<F: ListFilters>(&self, filters: &F, pagination: Pagination) -> Vec<(String, String)> {
    let pagination = self.pagination.normalize(pagination);
    filters
      .encode()
      .into_iter()
      .map(|(k, v)| (k.to_string(), v))
      .chain([
        (PAGE_KEY.to_string(), pagination.page.to_string()),
        (PAGE_SIZE_KEY.to_string(), pagination.page_size.to_string()),
      ])
      .collect()
  }

  fn owns<F: ListFilters>(key: &str) -> bool {
    key == PAGE_KEY || key == PAGE_SIZE_KEY || F::KEYS.contains(&key)
  }
}
