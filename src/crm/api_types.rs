//! Wire types for the CRM REST API: response envelopes and write payloads.
//!
//! Response envelopes are kept apart from the domain types so the backend's
//! `{ data, meta }` wrapping never leaks into callers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

use super::types::{BillingInterval, ClientStatus, DomainStatus, InvoiceStatus, SubscriptionStatus};

// ============================================================================
// Response envelopes
// ============================================================================

/// Pagination totals reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
  pub page: u32,
  pub page_size: u32,
  pub total_items: u64,
  #[serde(default)]
  pub total_pages: u32,
}

impl PageMeta {
  /// Page count, derived from the item total when the backend left it out.
  pub fn page_count(&self) -> u32 {
    if self.total_pages > 0 || self.total_items == 0 {
      return self.total_pages;
    }
    let size = u64::from(self.page_size.max(1));
    u32::try_from(self.total_items.div_ceil(size)).unwrap_or(u32::MAX)
  }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
  pub rows: Vec<E>,
  /// Absent when the backend returned a bare array
  pub meta: Option<PageMeta>,
}

impl<E> Page<E> {
  pub fn new(rows: Vec<E>, meta: Option<PageMeta>) -> Self {
    Self { rows, meta }
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiList<E> {
  Paged {
    data: Vec<E>,
    #[serde(default)]
    meta: Option<PageMeta>,
  },
  Bare(Vec<E>),
}

impl<E> From<ApiList<E>> for Page<E> {
  fn from(list: ApiList<E>) -> Self {
    match list {
      ApiList::Paged { data, meta } => Page::new(data, meta),
      ApiList::Bare(rows) => Page::new(rows, None),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiRecord<E> {
  Wrapped { data: E },
  Bare(E),
}

impl<E> ApiRecord<E> {
  pub(crate) fn into_inner(self) -> E {
    match self {
      ApiRecord::Wrapped { data } | ApiRecord::Bare(data) => data,
    }
  }
}

/// Error body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
  message: Option<String>,
  error: Option<String>,
}

impl ApiErrorBody {
  pub(crate) fn into_message(self) -> Option<String> {
    self.message.or(self.error).filter(|m| !m.trim().is_empty())
  }
}

// ============================================================================
// Write payloads
// ============================================================================

/// Local checks run before a payload is sent.
pub trait Validate {
  fn validate(&self) -> Result<(), ApiError>;
}

fn require_text(field: &'static str, value: &str) -> Result<(), ApiError> {
  if value.trim().is_empty() {
    return Err(ApiError::validation(field, "must not be empty"));
  }
  Ok(())
}

fn require_currency(value: &str) -> Result<(), ApiError> {
  if value.len() != 3 || !value.bytes().all(|b| b.is_ascii_uppercase()) {
    return Err(ApiError::validation(
      "currency",
      "must be a three-letter ISO code",
    ));
  }
  Ok(())
}

fn require_positive(field: &'static str, amount_cents: i64) -> Result<(), ApiError> {
  if amount_cents <= 0 {
    return Err(ApiError::validation(field, "must be greater than zero"));
  }
  Ok(())
}

fn require_order(field: &'static str, start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ApiError> {
  match end {
    Some(end) if end < start => Err(ApiError::validation(
      field,
      format!("must not be before {}", start),
    )),
    _ => Ok(()),
  }
}

/// Host name check: dot-separated labels of letters, digits and inner
/// hyphens, at least two labels.
pub fn is_valid_host(host: &str) -> bool {
  let host = host.strip_suffix('.').unwrap_or(host);
  if host.is_empty() || host.len() > 253 {
    return false;
  }
  let labels: Vec<&str> = host.split('.').collect();
  labels.len() >= 2
    && labels.iter().all(|label| {
      !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub company: Option<String>,
  #[serde(default = "default_client_status")]
  pub status: ClientStatus,
}

fn default_client_status() -> ClientStatus {
  ClientStatus::Lead
}

impl Validate for ClientInput {
  fn validate(&self) -> Result<(), ApiError> {
    require_text("name", &self.name)?;
    if let Some(email) = &self.email {
      let valid = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
      if !valid {
        return Err(ApiError::validation("email", "is not an email address"));
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInput {
  pub client_id: u64,
  pub host: String,
  #[serde(default = "default_domain_status")]
  pub status: DomainStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub registrar: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expires_on: Option<NaiveDate>,
  #[serde(default)]
  pub auto_renew: bool,
}

fn default_domain_status() -> DomainStatus {
  DomainStatus::Pending
}

impl Validate for DomainInput {
  fn validate(&self) -> Result<(), ApiError> {
    if self.client_id == 0 {
      return Err(ApiError::validation("clientId", "is required"));
    }
    require_text("host", &self.host)?;
    if !is_valid_host(self.host.trim()) {
      return Err(ApiError::validation("host", "is not a valid host name"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
  pub client_id: u64,
  pub number: String,
  pub amount_cents: i64,
  pub currency: String,
  pub issued_on: NaiveDate,
  pub due_on: NaiveDate,
  #[serde(default = "default_invoice_status")]
  pub status: InvoiceStatus,
}

fn default_invoice_status() -> InvoiceStatus {
  InvoiceStatus::Draft
}

impl Validate for InvoiceInput {
  fn validate(&self) -> Result<(), ApiError> {
    if self.client_id == 0 {
      return Err(ApiError::validation("clientId", "is required"));
    }
    require_text("number", &self.number)?;
    require_positive("amountCents", self.amount_cents)?;
    require_currency(&self.currency)?;
    require_order("dueOn", self.issued_on, Some(self.due_on))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInput {
  pub client_id: u64,
  pub plan_id: u64,
  pub price_cents: i64,
  pub currency: String,
  pub started_on: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub renews_on: Option<NaiveDate>,
  #[serde(default = "default_subscription_status")]
  pub status: SubscriptionStatus,
}

fn default_subscription_status() -> SubscriptionStatus {
  SubscriptionStatus::Active
}

impl Validate for SubscriptionInput {
  fn validate(&self) -> Result<(), ApiError> {
    if self.client_id == 0 {
      return Err(ApiError::validation("clientId", "is required"));
    }
    if self.plan_id == 0 {
      return Err(ApiError::validation("planId", "is required"));
    }
    if self.price_cents < 0 {
      return Err(ApiError::validation("priceCents", "must not be negative"));
    }
    require_currency(&self.currency)?;
    require_order("renewsOn", self.started_on, self.renews_on)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInput {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_id: Option<u64>,
  pub title: String,
  pub starts_at: DateTime<Utc>,
  #[serde(default = "default_duration")]
  pub duration_minutes: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

fn default_duration() -> u32 {
  30
}

impl Validate for MeetingInput {
  fn validate(&self) -> Result<(), ApiError> {
    require_text("title", &self.title)?;
    if self.duration_minutes == 0 {
      return Err(ApiError::validation("durationMinutes", "must be greater than zero"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
  pub description: String,
  pub category: String,
  pub amount_cents: i64,
  pub currency: String,
  pub spent_on: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_id: Option<u64>,
}

impl Validate for ExpenseInput {
  fn validate(&self) -> Result<(), ApiError> {
    require_text("description", &self.description)?;
    require_text("category", &self.category)?;
    require_positive("amountCents", self.amount_cents)?;
    require_currency(&self.currency)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub price_cents: i64,
  pub currency: String,
  pub interval: BillingInterval,
  #[serde(default = "default_active")]
  pub active: bool,
}

fn default_active() -> bool {
  true
}

impl Validate for PlanInput {
  fn validate(&self) -> Result<(), ApiError> {
    require_text("name", &self.name)?;
    if self.price_cents < 0 {
      return Err(ApiError::validation("priceCents", "must not be negative"));
    }
    require_currency(&self.currency)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_list_envelope_with_meta() {
    let list: ApiList<u32> = serde_json::from_str(
      r#"{"data":[1,2],"meta":{"page":2,"pageSize":2,"totalItems":5,"totalPages":3}}"#,
    )
    .unwrap();
    let page = Page::from(list);
    assert_eq!(page.rows, vec![1, 2]);
    assert_eq!(page.meta.map(|m| m.total_pages), Some(3));
  }

  #[test]
  fn test_bare_array_has_no_meta() {
    let list: ApiList<u32> = serde_json::from_str("[4,5,6]").unwrap();
    let page = Page::from(list);
    assert_eq!(page.rows.len(), 3);
    assert!(page.meta.is_none());
  }

  #[test]
  fn test_page_count_fallback() {
    let meta = PageMeta {
      page: 1,
      page_size: 10,
      total_items: 21,
      total_pages: 0,
    };
    assert_eq!(meta.page_count(), 3);
  }

  #[test]
  fn test_error_body_prefers_message() {
    let body: ApiErrorBody =
      serde_json::from_str(r#"{"message":"host taken","error":"Conflict"}"#).unwrap();
    assert_eq!(body.into_message().as_deref(), Some("host taken"));

    let body: ApiErrorBody = serde_json::from_str(r#"{"error":"Bad Request"}"#).unwrap();
    assert_eq!(body.into_message().as_deref(), Some("Bad Request"));
  }

  #[test]
  fn test_host_validation() {
    assert!(is_valid_host("acme.io"));
    assert!(is_valid_host("mail.acme-corp.co.uk."));
    assert!(!is_valid_host("localhost"));
    assert!(!is_valid_host("-acme.io"));
    assert!(!is_valid_host("acme..io"));
    assert!(!is_valid_host("acme io.com"));
  }

  #[test]
  fn test_invoice_validation() {
    let mut invoice = InvoiceInput {
      client_id: 1,
      number: "INV-7".into(),
      amount_cents: 1000,
      currency: "EUR".into(),
      issued_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
      due_on: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
      status: InvoiceStatus::Draft,
    };
    assert!(invoice.validate().is_ok());

    invoice.due_on = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let err = invoice.validate().unwrap_err();
    assert!(matches!(err, ApiError::Validation { field: "dueOn", .. }));

    invoice.due_on = invoice.issued_on;
    invoice.currency = "eur".into();
    assert!(invoice.validate().is_err());
  }

  #[test]
  fn test_domain_input_defaults() {
    let input: DomainInput = serde_json::from_str(r#"{"clientId":3,"host":"acme.io"}"#).unwrap();
    assert_eq!(input.status, DomainStatus::Pending);
    assert!(input.validate().is_ok());
  }
}
