//! In-memory REST backend for tests.

use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::crm::client::{ApiRequest, Transport};
use crate::error::ApiError;
use crate::params::{PAGE_KEY, PAGE_SIZE_KEY};

#[derive(Default)]
struct State {
  collections: HashMap<String, Vec<Value>>,
  next_id: u64,
  requests: Vec<ApiRequest>,
  failures: VecDeque<(u16, String)>,
  delay: Duration,
  bare_lists: bool,
}

/// Collections of JSON records served over the [`Transport`] interface.
///
/// Lists honour equality filters on any record field, a `search` term over
/// string fields, and `page`/`pageSize`.
#[derive(Clone, Default)]
pub struct FakeBackend {
  state: Arc<Mutex<State>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store a record, assigning an id when it has none. Returns the id.
  pub fn insert(&self, entity: &str, mut record: Value) -> u64 {
    let mut state = self.state();
    let id = match record.get("id").and_then(Value::as_u64) {
      Some(id) => id,
      None => {
        let id = state.next_id + 1;
        record["id"] = json!(id);
        id
      }
    };
    state.next_id = state.next_id.max(id);
    state
      .collections
      .entry(entity.to_string())
      .or_default()
      .push(record);
    id
  }

  /// Every response waits this long first.
  pub fn set_delay(&self, delay: Duration) {
    self.state().delay = delay;
  }

  /// Answer lists with a bare array instead of `{ data, meta }`.
  pub fn set_bare_lists(&self, bare: bool) {
    self.state().bare_lists = bare;
  }

  /// Make the next request fail with `status`.
  pub fn fail_next(&self, status: u16, message: &str) {
    self.state().failures.push_back((status, message.to_string()));
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.state().requests.clone()
  }

  /// Number of requests with `method` to exactly `path`.
  pub fn calls(&self, method: Method, path: &str) -> usize {
    self
      .state()
      .requests
      .iter()
      .filter(|r| r.method == method && r.path() == path)
      .count()
  }

  pub fn records(&self, entity: &str) -> Vec<Value> {
    self
      .state()
      .collections
      .get(entity)
      .cloned()
      .unwrap_or_default()
  }

  fn handle(&self, request: &ApiRequest) -> Result<Value, ApiError> {
    let mut state = self.state();
    if let Some((status, message)) = state.failures.pop_front() {
      return Err(ApiError::from_status(status, Some(message)));
    }

    let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();
    match (&request.method, segments.as_slice()) {
      (m, [entity]) if *m == Method::GET => Ok(state.list(entity, &request.query)),
      (m, [entity]) if *m == Method::POST => {
        let mut record = request.body.clone().unwrap_or_else(|| json!({}));
        let id = state.next_id + 1;
        state.next_id = id;
        record["id"] = json!(id);
        state
          .collections
          .entry(entity.to_string())
          .or_default()
          .push(record.clone());
        Ok(json!({ "data": record }))
      }
      (m, [entity, id]) if *m == Method::GET => {
        let record = state.find(entity, id)?;
        Ok(json!({ "data": record.clone() }))
      }
      (m, [entity, id]) if *m == Method::PUT => {
        let record = state.find(entity, id)?;
        if let (Some(target), Some(Value::Object(fields))) =
          (record.as_object_mut(), request.body.as_ref())
        {
          for (key, value) in fields {
            if key != "id" {
              target.insert(key.clone(), value.clone());
            }
          }
        }
        Ok(json!({ "data": record.clone() }))
      }
      (m, [entity, id, action]) if *m == Method::PATCH => {
        let status = match *action {
          "paid" => "paid",
          "sent" => "sent",
          "cancel" => "cancelled",
          "pause" => "paused",
          "resume" => "active",
          other => {
            return Err(ApiError::from_status(
              400,
              Some(format!("unknown action {}", other)),
            ))
          }
        };
        let record = state.find(entity, id)?;
        record["status"] = json!(status);
        Ok(record.clone())
      }
      (m, [entity, id]) if *m == Method::DELETE => {
        state.find(entity, id)?;
        if let Some(rows) = state.collections.get_mut(*entity) {
          rows.retain(|r| !id_matches(r, id));
        }
        Ok(Value::Null)
      }
      _ => Err(ApiError::from_status(
        405,
        Some(format!("{} {}", request.method, request.path())),
      )),
    }
  }
}

fn id_matches(record: &Value, id: &str) -> bool {
  record.get("id").map(field_text).as_deref() == Some(id)
}

fn field_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

impl State {
  fn find(&mut self, entity: &str, id: &str) -> Result<&mut Value, ApiError> {
    self
      .collections
      .get_mut(entity)
      .and_then(|rows| rows.iter_mut().find(|r| id_matches(r, id)))
      .ok_or_else(|| ApiError::from_status(404, Some(format!("{} {} not found", entity, id))))
  }

  fn list(&self, entity: &str, query: &[(String, String)]) -> Value {
    let mut page = 1u64;
    let mut page_size = 10u64;
    let mut rows: Vec<&Value> = self
      .collections
      .get(entity)
      .map(|rows| rows.iter().collect())
      .unwrap_or_default();

    for (key, value) in query {
      match key.as_str() {
        PAGE_KEY => page = value.parse::<u64>().unwrap_or(1).max(1),
        PAGE_SIZE_KEY => page_size = value.parse::<u64>().unwrap_or(10).max(1),
        "search" => {
          let term = value.to_lowercase();
          rows.retain(|r| {
            r.as_object().is_some_and(|fields: &Map<String, Value>| {
              fields
                .values()
                .filter_map(Value::as_str)
                .any(|s| s.to_lowercase().contains(&term))
            })
          });
        }
        _ => rows.retain(|r| r.get(key).map_or(true, |field| field_text(field) == *value)),
      }
    }

    let total_items = rows.len() as u64;
    let total_pages = total_items.div_ceil(page_size);
    let data: Vec<Value> = rows
      .into_iter()
      .skip(((page - 1) * page_size) as usize)
      .take(page_size as usize)
      .cloned()
      .collect();

    if self.bare_lists {
      return Value::Array(data);
    }
    json!({
      "data": data,
      "meta": {
        "page": page,
        "pageSize": page_size,
        "totalItems": total_items,
        "totalPages": total_pages,
      }
    })
  }
}

impl Transport for FakeBackend {
  fn send(
    &self,
    request: ApiRequest,
  ) -> impl std::future::Future<Output = Result<Value, ApiError>> + Send {
    let backend = self.clone();
    async move {
      let delay = {
        let mut state = backend.state();
        state.requests.push(request.clone());
        state.delay
      };
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      backend.handle(&request)
    }
  }
}
