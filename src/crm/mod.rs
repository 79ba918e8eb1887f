//! Typed client for the CRM REST backend.
//!
//! Record types, their list filters and write payloads, the transport, and
//! a cached client whose per-type [`Resource`] handles read through the
//! query cache and write through the mutation coordinator.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod filters;
pub mod types;

pub use api_types::{
  ClientInput, DomainInput, ExpenseInput, InvoiceInput, MeetingInput, Page, PageMeta, PlanInput,
  SubscriptionInput, Validate,
};
pub use cache::Cacheable;
pub use cached_client::{CachedCrmClient, Resource};
pub use client::{ApiRequest, CrmClient, HttpTransport, Transport};
pub use filters::{
  ClientFilters, DomainFilters, ExpenseFilters, InvoiceFilters, MeetingFilters, PlanFilters,
  SubscriptionFilters,
};
pub use types::{
  format_money, BillingInterval, Client, ClientStatus, Domain, DomainStatus, EntityType, Expense,
  Invoice, InvoiceStatus, Meeting, Plan, Subscription, SubscriptionStatus,
};
