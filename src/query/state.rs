//! Observable state of a cache entry.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::ApiError;

/// Lifecycle of a cache entry: pending until its first fetch settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No data yet, a fetch is running or about to run
  Pending,
  /// Last fetch succeeded
  Success,
  /// Last fetch failed. Earlier data, if any, is still available.
  Error,
}

/// Snapshot of a query as seen by one observer.
#[derive(Debug)]
pub struct QueryResult<T> {
  /// Data for the current key
  pub data: Option<Arc<T>>,
  /// Last good data of the key this observer watched before, kept visible
  /// while the current key has nothing to show yet
  pub previous_data: Option<Arc<T>>,
  pub status: QueryStatus,
  pub error: Option<ApiError>,
  /// A request for the current key is in flight
  pub is_fetching: bool,
  pub is_stale: bool,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QueryResult<T> {
  pub(crate) fn pending() -> Self {
    Self {
      data: None,
      previous_data: None,
      status: QueryStatus::Pending,
      error: None,
      is_fetching: false,
      is_stale: true,
      fetched_at: None,
    }
  }

  /// First load: nothing to show and a request running.
  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Pending && self.is_fetching && self.previous_data.is_none()
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  /// Showing the previous key's data in place of the current one.
  pub fn is_placeholder(&self) -> bool {
    self.data.is_none() && self.previous_data.is_some()
  }

  /// What a view should render: current data, else the previous key's.
  pub fn visible_data(&self) -> Option<&Arc<T>> {
    self.data.as_ref().or(self.previous_data.as_ref())
  }

  pub fn error_message(&self) -> Option<String> {
    self.error.as_ref().map(ApiError::user_message)
  }
}

impl<T> Clone for QueryResult<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      previous_data: self.previous_data.clone(),
      status: self.status,
      error: self.error.clone(),
      is_fetching: self.is_fetching,
      is_stale: self.is_stale,
      fetched_at: self.fetched_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pending_fetch_is_loading() {
    let mut result: QueryResult<i32> = QueryResult::pending();
    assert!(!result.is_loading());
    result.is_fetching = true;
    assert!(result.is_loading());
  }

  #[test]
  fn test_placeholder_uses_previous_data() {
    let mut result: QueryResult<i32> = QueryResult::pending();
    result.is_fetching = true;
    result.previous_data = Some(Arc::new(3));
    assert!(result.is_placeholder());
    assert!(!result.is_loading());
    assert_eq!(result.visible_data().map(|d| **d), Some(3));

    result.data = Some(Arc::new(4));
    assert!(!result.is_placeholder());
    assert_eq!(result.visible_data().map(|d| **d), Some(4));
  }
}
