//! Plain-text rendering of records and list pages.

use bizdesk::crm::{
  format_money, Client, Domain, Expense, Invoice, Meeting, Plan, Subscription,
};
use bizdesk::list::{ListView, PageInfo};

const MAX_CELL: usize = 40;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
  value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// A record shown as one table row.
pub trait TableRow {
  const HEADERS: &'static [&'static str];
  fn cells(&self) -> Vec<String>;
}

impl TableRow for Client {
  const HEADERS: &'static [&'static str] = &["ID", "NAME", "COMPANY", "EMAIL", "STATUS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      or_dash(self.company.as_deref()),
      or_dash(self.email.as_deref()),
      self.status.to_string(),
    ]
  }
}

impl TableRow for Domain {
  const HEADERS: &'static [&'static str] = &["ID", "HOST", "CLIENT", "STATUS", "EXPIRES"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.host.clone(),
      self.client_id.to_string(),
      self.status.to_string(),
      or_dash(self.expires_on),
    ]
  }
}

impl TableRow for Invoice {
  const HEADERS: &'static [&'static str] = &["ID", "NUMBER", "CLIENT", "AMOUNT", "STATUS", "DUE"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.number.clone(),
      self.client_id.to_string(),
      format_money(self.amount_cents, &self.currency),
      self.status.to_string(),
      self.due_on.to_string(),
    ]
  }
}

impl TableRow for Subscription {
  const HEADERS: &'static [&'static str] = &["ID", "CLIENT", "PLAN", "PRICE", "STATUS", "RENEWS"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.client_id.to_string(),
      self.plan_id.to_string(),
      format_money(self.price_cents, &self.currency),
      self.status.to_string(),
      or_dash(self.renews_on),
    ]
  }
}

impl TableRow for Meeting {
  const HEADERS: &'static [&'static str] = &["ID", "STARTS", "TITLE", "CLIENT", "LOCATION"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.starts_at.format("%Y-%m-%d %H:%M").to_string(),
      self.title.clone(),
      or_dash(self.client_id),
      or_dash(self.location.as_deref()),
    ]
  }
}

impl TableRow for Expense {
  const HEADERS: &'static [&'static str] = &["ID", "DATE", "DESCRIPTION", "CATEGORY", "AMOUNT"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.spent_on.to_string(),
      self.description.clone(),
      self.category.clone(),
      format_money(self.amount_cents, &self.currency),
    ]
  }
}

impl TableRow for Plan {
  const HEADERS: &'static [&'static str] = &["ID", "NAME", "PRICE", "INTERVAL", "ACTIVE"];

  fn cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.name.clone(),
      format_money(self.price_cents, &self.currency),
      self.interval.to_string(),
      if self.active { "yes" } else { "no" }.to_string(),
    ]
  }
}

/// Left-aligned columns, two spaces apart.
pub fn table<R: TableRow>(rows: &[R]) -> String {
  let cells: Vec<Vec<String>> = rows
    .iter()
    .map(|row| row.cells().iter().map(|c| truncate(c, MAX_CELL)).collect())
    .collect();

  let mut widths: Vec<usize> = R::HEADERS.iter().map(|h| h.len()).collect();
  for row in &cells {
    for (width, cell) in widths.iter_mut().zip(row) {
      *width = (*width).max(cell.chars().count());
    }
  }

  let line = |values: Vec<&str>| {
    values
      .iter()
      .zip(&widths)
      .map(|(value, width)| format!("{:<width$}", value, width = *width))
      .collect::<Vec<_>>()
      .join("  ")
      .trim_end()
      .to_string()
  };

  let mut out = vec![line(R::HEADERS.to_vec())];
  out.extend(cells.iter().map(|row| line(row.iter().map(String::as_str).collect())));
  out.join("\n")
}

/// `11-20 of 25, page 2/3`, or `of at least` when totals are estimated.
pub fn footer(info: &PageInfo) -> String {
  if info.from == 0 {
    if info.total_items == 0 {
      return "no rows".to_string();
    }
    return format!(
      "page {} is past the end, {} rows in {} pages",
      info.page, info.total_items, info.total_pages
    );
  }
  let of = if info.exact { "of" } else { "of at least" };
  format!(
    "{}-{} {} {}, page {}/{}",
    info.from, info.to, of, info.total_items, info.page, info.total_pages
  )
}

pub fn list_view<R: TableRow>(view: &ListView<R>) -> String {
  if let Some(message) = view.error_message() {
    return format!("error: {}", message);
  }
  if view.is_empty() {
    return footer(&view.info);
  }
  format!("{}\n\n{}", table(view.rows()), footer(&view.info))
}
