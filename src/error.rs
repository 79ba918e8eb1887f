//! Error type shared by the transport, the query cache and the mutation path.

use thiserror::Error;

/// Structured failure of a CRM API interaction.
///
/// Cloneable so a single failed fetch can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Payload rejected locally, never sent to the backend
  #[error("invalid {field}: {message}")]
  Validation { field: &'static str, message: String },

  /// Backend answered 404
  #[error("not found{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
  NotFound { message: Option<String> },

  /// Any other non-2xx response
  #[error("request failed with status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
  Http { status: u16, message: Option<String> },

  /// Connection, TLS or timeout failure before a response arrived
  #[error("network error: {0}")]
  Network(String),

  /// Response body did not match the expected shape
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl ApiError {
  /// Build an error from a non-2xx status and the optional body message.
  pub fn from_status(status: u16, message: Option<String>) -> Self {
    if status == 404 {
      ApiError::NotFound { message }
    } else {
      ApiError::Http { status, message }
    }
  }

  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    ApiError::Validation {
      field,
      message: message.into(),
    }
  }

  /// HTTP status, if the backend produced one.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::NotFound { .. } => Some(404),
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, ApiError::Validation { .. })
  }

  /// Message suitable for a notification: the backend's own text when it
  /// sent one, otherwise the rendered error.
  pub fn user_message(&self) -> String {
    match self {
      ApiError::NotFound {
        message: Some(message),
      }
      | ApiError::Http {
        message: Some(message),
        ..
      } => message.clone(),
      other => other.to_string(),
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::Decode(e.to_string())
  }
}
