//! Typed field readers and writers for query-string parameters.
//!
//! Readers never fail: a missing, empty or malformed value reads as `None`,
//! which every filter treats as "unfiltered".

use chrono::NaiveDate;
use std::fmt::Display;
use std::str::FromStr;

use super::QueryParams;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trimmed, non-empty text.
pub fn text(params: &QueryParams, key: &str) -> Option<String> {
  params
    .get(key)
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(String::from)
}

/// Any value parsed through `FromStr`: numbers, status enums.
pub fn parsed<T: FromStr>(params: &QueryParams, key: &str) -> Option<T> {
  params.get(key).and_then(|v| v.trim().parse().ok())
}

/// Calendar date in `YYYY-MM-DD` form.
pub fn date(params: &QueryParams, key: &str) -> Option<NaiveDate> {
  params
    .get(key)
    .and_then(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok())
}

/// `true`/`false`, also accepting `1`/`0`.
pub fn flag(params: &QueryParams, key: &str) -> Option<bool> {
  match params.get(key).map(str::trim) {
    Some("true") | Some("1") => Some(true),
    Some("false") | Some("0") => Some(false),
    _ => None,
  }
}

/// Collects the set fields of a filter record, skipping unset ones.
#[derive(Debug, Default)]
pub struct ParamWriter {
  pairs: Vec<(&'static str, String)>,
}

impl ParamWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn text(mut self, key: &'static str, value: Option<&str>) -> Self {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
      self.pairs.push((key, v.to_string()));
    }
    self
  }

  pub fn value<T: Display>(mut self, key: &'static str, value: Option<T>) -> Self {
    if let Some(v) = value {
      self.pairs.push((key, v.to_string()));
    }
    self
  }

  pub fn date(mut self, key: &'static str, value: Option<NaiveDate>) -> Self {
    if let Some(v) = value {
      self.pairs.push((key, v.format(DATE_FORMAT).to_string()));
    }
    self
  }

  pub fn finish(self) -> Vec<(&'static str, String)> {
    self.pairs
  }
}
