//! Error taxonomy shared by the query and mutation coordinators.

use thiserror::Error;

use crate::validate::ValidationError;

/// Failure of a read or write against the backend, or of client-side validation.
///
/// Query errors are stored in the cache entry and surfaced through
/// `QueryState`; mutation errors are returned to the caller after rollback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  /// Client-side validation failed; nothing was sent.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// The backend reported the resource as absent (HTTP 404).
  #[error("{resource} not found")]
  NotFound { resource: String },

  /// The request was not authorized (HTTP 401). Usually resolves once the
  /// token refresh running elsewhere completes.
  #[error("unauthorized")]
  Unauthorized,

  /// Network failure or any other non-success status.
  #[error("{message}")]
  Transient { status: Option<u16>, message: String },

  /// The backend answered 2xx but the envelope carried `isSuccess = false`.
  #[error("{message}")]
  Rejected { message: String },

  /// The response body did not match any known shape.
  #[error("failed to decode response: {message}")]
  Decode { message: String },

  /// The fetch was superseded or cancelled by a mutation.
  #[error("request was cancelled")]
  Cancelled,
}

impl SyncError {
  pub fn not_found(resource: impl Into<String>) -> Self {
    Self::NotFound {
      resource: resource.into(),
    }
  }

  pub fn transient(message: impl Into<String>) -> Self {
    Self::Transient {
      status: None,
      message: message.into(),
    }
  }

  pub fn rejected(message: impl Into<String>) -> Self {
    Self::Rejected {
      message: message.into(),
    }
  }

  pub fn decode(message: impl std::fmt::Display) -> Self {
    Self::Decode {
      message: message.to_string(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, Self::Unauthorized)
  }

  /// Whether the error class can ever succeed on a plain retry.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transient { .. } | Self::Unauthorized)
  }

  /// Map a reqwest failure into the taxonomy.
  pub fn from_reqwest(err: reqwest::Error) -> Self {
    if err.is_decode() {
      return Self::decode(err);
    }
    match err.status().map(|s| s.as_u16()) {
      Some(401) => Self::Unauthorized,
      Some(404) => Self::not_found(
        err
          .url()
          .map(|u| u.path().to_string())
          .unwrap_or_else(|| "resource".to_string()),
      ),
      status => Self::Transient {
        status,
        message: err.to_string(),
      },
    }
  }
}
