//! Cache keys and key families.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// What a key addresses within an entity type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyScope {
  /// A list query. Parameters are held sorted, so two logically identical
  /// parameter sets produce the same key whatever order they were built in.
  List(BTreeMap<String, String>),
  /// A single record by id
  Detail(String),
}

/// Composite identifier of a cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
  entity: &'static str,
  scope: KeyScope,
}

impl QueryKey {
  /// Key for a list query of `entity` with the given parameters.
  pub fn list<I, K, V>(entity: &'static str, params: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let params = params
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    Self {
      entity,
      scope: KeyScope::List(params),
    }
  }

  /// Key for a single record of `entity`.
  pub fn detail(entity: &'static str, id: impl fmt::Display) -> Self {
    Self {
      entity,
      scope: KeyScope::Detail(id.to_string()),
    }
  }

  pub fn entity(&self) -> &'static str {
    self.entity
  }

  pub fn scope(&self) -> &KeyScope {
    &self.scope
  }

  pub fn is_list(&self) -> bool {
    matches!(self.scope, KeyScope::List(_))
  }

  /// Id of the record, for detail keys.
  pub fn detail_id(&self) -> Option<&str> {
    match &self.scope {
      KeyScope::Detail(id) => Some(id),
      KeyScope::List(_) => None,
    }
  }

  /// List parameters, for list keys.
  pub fn params(&self) -> Option<&BTreeMap<String, String>> {
    match &self.scope {
      KeyScope::List(params) => Some(params),
      KeyScope::Detail(_) => None,
    }
  }

  /// Short stable fingerprint of the canonical form, used to correlate log
  /// lines for one key without printing its full parameter set.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.scope {
      KeyScope::Detail(id) => write!(f, "{}/{}", self.entity, id),
      KeyScope::List(params) => {
        write!(f, "{}", self.entity)?;
        for (i, (k, v)) in params.iter().enumerate() {
          let sep = if i == 0 { '?' } else { '&' };
          write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
      }
    }
  }
}

/// A coarser grouping of keys, used for bulk invalidation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyFamily {
  /// Every key of an entity type, lists and details
  Entity(&'static str),
  /// Every list key of an entity type
  Lists(&'static str),
  /// The detail key of one record
  Detail(&'static str, String),
}

impl KeyFamily {
  pub fn detail(entity: &'static str, id: impl fmt::Display) -> Self {
    KeyFamily::Detail(entity, id.to_string())
  }

  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      KeyFamily::Entity(entity) => key.entity == *entity,
      KeyFamily::Lists(entity) => key.entity == *entity && key.is_list(),
      KeyFamily::Detail(entity, id) => key.entity == *entity && key.detail_id() == Some(id),
    }
  }
}

impl fmt::Display for KeyFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyFamily::Entity(entity) => write!(f, "{}/*", entity),
      KeyFamily::Lists(entity) => write!(f, "{}?*", entity),
      KeyFamily::Detail(entity, id) => write!(f, "{}/{}", entity, id),
    }
  }
}
