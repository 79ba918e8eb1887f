//! Domain types for the CRM backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// The record kinds exposed by the backend, one REST collection each.
///
/// Displays as its collection path segment, which doubles as the cache
/// entity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum EntityType {
  #[strum(serialize = "clients")]
  Client,
  #[strum(serialize = "domains")]
  Domain,
  #[strum(serialize = "invoices")]
  Invoice,
  #[strum(serialize = "subscriptions")]
  Subscription,
  #[strum(serialize = "meetings")]
  Meeting,
  #[strum(serialize = "expenses")]
  Expense,
  #[strum(serialize = "plans")]
  Plan,
}

impl EntityType {
  pub fn as_str(self) -> &'static str {
    self.into()
  }

  /// Singular name for messages.
  pub fn label(self) -> &'static str {
    match self {
      EntityType::Client => "client",
      EntityType::Domain => "domain",
      EntityType::Invoice => "invoice",
      EntityType::Subscription => "subscription",
      EntityType::Meeting => "meeting",
      EntityType::Expense => "expense",
      EntityType::Plan => "plan",
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ClientStatus {
  Lead,
  Active,
  Inactive,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DomainStatus {
  Pending,
  Active,
  Expired,
  Transferred,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum InvoiceStatus {
  Draft,
  Sent,
  Paid,
  Overdue,
  Cancelled,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SubscriptionStatus {
  Active,
  Paused,
  Cancelled,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BillingInterval {
  Monthly,
  Yearly,
}

/// Render an amount in minor units, e.g. `1250 EUR` as `12.50 EUR`.
pub fn format_money(amount_cents: i64, currency: &str) -> String {
  let sign = if amount_cents < 0 { "-" } else { "" };
  let abs = amount_cents.unsigned_abs();
  format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
  pub id: u64,
  pub name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub company: Option<String>,
  pub status: ClientStatus,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
  pub id: u64,
  pub client_id: u64,
  pub host: String,
  pub status: DomainStatus,
  pub registrar: Option<String>,
  pub expires_on: Option<NaiveDate>,
  #[serde(default)]
  pub auto_renew: bool,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
  pub id: u64,
  pub client_id: u64,
  pub number: String,
  pub status: InvoiceStatus,
  pub amount_cents: i64,
  pub currency: String,
  pub issued_on: NaiveDate,
  pub due_on: NaiveDate,
  pub paid_on: Option<NaiveDate>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
  pub id: u64,
  pub client_id: u64,
  pub plan_id: u64,
  pub status: SubscriptionStatus,
  pub price_cents: i64,
  pub currency: String,
  pub started_on: NaiveDate,
  pub renews_on: Option<NaiveDate>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
  pub id: u64,
  pub client_id: Option<u64>,
  pub title: String,
  pub starts_at: DateTime<Utc>,
  pub duration_minutes: u32,
  pub location: Option<String>,
  pub notes: Option<String>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
  pub id: u64,
  pub description: String,
  pub category: String,
  pub amount_cents: i64,
  pub currency: String,
  pub spent_on: NaiveDate,
  pub client_id: Option<u64>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
  pub id: u64,
  pub name: String,
  pub description: Option<String>,
  pub price_cents: i64,
  pub currency: String,
  pub interval: BillingInterval,
  #[serde(default)]
  pub active: bool,
  pub updated_at: Option<DateTime<Utc>>,
}
