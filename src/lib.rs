//! Client-side state core for a small-business CRM.
//!
//! - [`params`]: list filters and pagination to and from a query string
//! - [`query`]: shared query cache with de-duplication, staleness and
//!   invalidation
//! - [`crm`]: typed REST client and cached per-type resources
//! - [`list`]: list controller binding the location to a cached page
//! - [`debounce`]: debounced search input

pub mod config;
pub mod crm;
pub mod debounce;
pub mod error;
pub mod list;
pub mod params;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
