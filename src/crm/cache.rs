//! Cache bindings for CRM types.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::params::ListFilters;
use crate::query::{KeyFamily, QueryKey};

use super::api_types::{
  ClientInput, DomainInput, ExpenseInput, InvoiceInput, MeetingInput, PlanInput, SubscriptionInput,
  Validate,
};
use super::filters::{
  ClientFilters, DomainFilters, ExpenseFilters, InvoiceFilters, MeetingFilters, PlanFilters,
  SubscriptionFilters,
};
use super::types::{Client, Domain, EntityType, Expense, Invoice, Meeting, Plan, Subscription};

/// A record type that can be listed, fetched and written through the cache.
pub trait Cacheable:
  Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
  /// Filter record for this type's list endpoint
  type Filters: ListFilters;
  /// Payload for create and full update
  type Input: Validate + Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static;

  fn entity_type() -> EntityType;

  /// Id used in the record's detail key and REST path.
  fn cache_key(&self) -> String;

  /// Sub-resources that can be PATCHed to move the record between states.
  fn transitions() -> &'static [&'static str] {
    &[]
  }

  fn detail_key(id: impl fmt::Display) -> QueryKey {
    QueryKey::detail(Self::entity_type().as_str(), id)
  }

  fn lists() -> KeyFamily {
    KeyFamily::Lists(Self::entity_type().as_str())
  }
}

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Client {
  type Filters = ClientFilters;
  type Input = ClientInput;

  fn entity_type() -> EntityType {
    EntityType::Client
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

impl Cacheable for Domain {
  type Filters = DomainFilters;
  type Input = DomainInput;

  fn entity_type() -> EntityType {
    EntityType::Domain
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

impl Cacheable for Invoice {
  type Filters = InvoiceFilters;
  type Input = InvoiceInput;

  fn entity_type() -> EntityType {
    EntityType::Invoice
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn transitions() -> &'static [&'static str] {
    &["paid", "sent", "cancel"]
  }
}

impl Cacheable for Subscription {
  type Filters = SubscriptionFilters;
  type Input = SubscriptionInput;

  fn entity_type() -> EntityType {
    EntityType::Subscription
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn transitions() -> &'static [&'static str] {
    &["pause", "resume", "cancel"]
  }
}

impl Cacheable for Meeting {
  type Filters = MeetingFilters;
  type Input = MeetingInput;

  fn entity_type() -> EntityType {
    EntityType::Meeting
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

impl Cacheable for Expense {
  type Filters = ExpenseFilters;
  type Input = ExpenseInput;

  fn entity_type() -> EntityType {
    EntityType::Expense
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

impl Cacheable for Plan {
  type Filters = PlanFilters;
  type Input = PlanInput;

  fn entity_type() -> EntityType {
    EntityType::Plan
  }

  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detail_key_matches_record_id() {
    let key = Invoice::detail_key(42);
    assert_eq!(key.to_string(), "invoices/42");
    assert!(KeyFamily::detail("invoices", "42").matches(&key));
    assert!(!Invoice::lists().matches(&key));
  }

  #[test]
  fn test_only_billing_records_have_transitions() {
    assert!(Client::transitions().is_empty());
    assert!(Invoice::transitions().contains(&"paid"));
    assert!(Subscription::transitions().contains(&"resume"));
  }
}
