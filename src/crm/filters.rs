//! Typed list filters, one record per entity type.
//!
//! Query keys are camelCase to match the backend's list endpoints, so the
//! same pairs serve both the shareable location and the REST request.

use chrono::NaiveDate;

use crate::params::fields::{self, ParamWriter};
use crate::params::{ListFilters, QueryParams};

use super::types::{ClientStatus, DomainStatus, InvoiceStatus, SubscriptionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilters {
  pub search: Option<String>,
  pub status: Option<ClientStatus>,
}

impl ListFilters for ClientFilters {
  const KEYS: &'static [&'static str] = &["search", "status"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      search: fields::text(params, "search"),
      status: fields::parsed(params, "status"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .text("search", self.search.as_deref())
      .value("status", self.status)
      .finish()
  }

  fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  fn set_search(&mut self, term: Option<String>) {
    self.search = term;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilters {
  pub search: Option<String>,
  pub client_id: Option<u64>,
  pub status: Option<DomainStatus>,
  /// Expiring within this many days
  pub expires_in: Option<u32>,
}

impl ListFilters for DomainFilters {
  const KEYS: &'static [&'static str] = &["search", "clientId", "status", "expiresIn"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      search: fields::text(params, "search"),
      client_id: fields::parsed(params, "clientId"),
      status: fields::parsed(params, "status"),
      expires_in: fields::parsed(params, "expiresIn"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .text("search", self.search.as_deref())
      .value("clientId", self.client_id)
      .value("status", self.status)
      .value("expiresIn", self.expires_in)
      .finish()
  }

  fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  fn set_search(&mut self, term: Option<String>) {
    self.search = term;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilters {
  pub search: Option<String>,
  pub client_id: Option<u64>,
  pub status: Option<InvoiceStatus>,
  /// Due within this many days
  pub due_in: Option<u32>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

impl ListFilters for InvoiceFilters {
  const KEYS: &'static [&'static str] = &["search", "clientId", "status", "dueIn", "from", "to"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      search: fields::text(params, "search"),
      client_id: fields::parsed(params, "clientId"),
      status: fields::parsed(params, "status"),
      due_in: fields::parsed(params, "dueIn"),
      from: fields::date(params, "from"),
      to: fields::date(params, "to"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .text("search", self.search.as_deref())
      .value("clientId", self.client_id)
      .value("status", self.status)
      .value("dueIn", self.due_in)
      .date("from", self.from)
      .date("to", self.to)
      .finish()
  }

  fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  fn set_search(&mut self, term: Option<String>) {
    self.search = term;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilters {
  pub client_id: Option<u64>,
  pub plan_id: Option<u64>,
  pub status: Option<SubscriptionStatus>,
}

impl ListFilters for SubscriptionFilters {
  const KEYS: &'static [&'static str] = &["clientId", "planId", "status"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      client_id: fields::parsed(params, "clientId"),
      plan_id: fields::parsed(params, "planId"),
      status: fields::parsed(params, "status"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .value("clientId", self.client_id)
      .value("planId", self.plan_id)
      .value("status", self.status)
      .finish()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingFilters {
  pub client_id: Option<u64>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

impl ListFilters for MeetingFilters {
  const KEYS: &'static [&'static str] = &["clientId", "from", "to"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      client_id: fields::parsed(params, "clientId"),
      from: fields::date(params, "from"),
      to: fields::date(params, "to"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .value("clientId", self.client_id)
      .date("from", self.from)
      .date("to", self.to)
      .finish()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilters {
  pub search: Option<String>,
  pub category: Option<String>,
  pub client_id: Option<u64>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

impl ListFilters for ExpenseFilters {
  const KEYS: &'static [&'static str] = &["search", "category", "clientId", "from", "to"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      search: fields::text(params, "search"),
      category: fields::text(params, "category"),
      client_id: fields::parsed(params, "clientId"),
      from: fields::date(params, "from"),
      to: fields::date(params, "to"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .text("search", self.search.as_deref())
      .text("category", self.category.as_deref())
      .value("clientId", self.client_id)
      .date("from", self.from)
      .date("to", self.to)
      .finish()
  }

  fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  fn set_search(&mut self, term: Option<String>) {
    self.search = term;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilters {
  pub search: Option<String>,
  pub active: Option<bool>,
}

impl ListFilters for PlanFilters {
  const KEYS: &'static [&'static str] = &["search", "active"];

  fn decode(params: &QueryParams) -> Self {
    Self {
      search: fields::text(params, "search"),
      active: fields::flag(params, "active"),
    }
  }

  fn encode(&self) -> Vec<(&'static str, String)> {
    ParamWriter::new()
      .text("search", self.search.as_deref())
      .value("active", self.active)
      .finish()
  }

  fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  fn set_search(&mut self, term: Option<String>) {
    self.search = term;
  }
}
