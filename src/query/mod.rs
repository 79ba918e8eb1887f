//! Async query cache for list and detail data.
//!
//! This module is CRM-agnostic. It provides:
//! - a process-wide [`QueryCache`] with request de-duplication and
//!   generation-checked commits
//! - [`QueryObserver`] subscriptions with stale-while-revalidate display
//! - a [`MutationCoordinator`] that invalidates key families after writes

mod cache;
mod key;
mod mutation;
mod observer;
mod state;

pub use cache::{CacheConfig, QueryCache};
pub use key::{KeyFamily, KeyScope, QueryKey};
pub use mutation::MutationCoordinator;
pub use observer::QueryObserver;
pub use state::{QueryResult, QueryStatus};
