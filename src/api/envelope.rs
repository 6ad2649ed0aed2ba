//! The backend's uniform response envelope.

use serde::{Deserialize, Deserializer};

use crate::error::SyncError;

const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// `{ statusCode, isSuccess, errorMessages, result }`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
  #[serde(default, deserialize_with = "deserialize_status_code")]
  pub status_code: Option<String>,
  pub is_success: bool,
  #[serde(default, deserialize_with = "deserialize_null_as_empty")]
  pub error_messages: Vec<String>,
  #[serde(default = "none")]
  pub result: Option<T>,
}

fn none<T>() -> Option<T> {
  None
}

/// Older endpoints send the status code as a number.
fn deserialize_status_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Option<serde_json::Value> = Option::deserialize(deserializer)?;
  Ok(v.and_then(|v| match v {
    serde_json::Value::String(s) => Some(s),
    serde_json::Value::Number(n) => Some(n.to_string()),
    _ => None,
  }))
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Option<Vec<String>> = Option::deserialize(deserializer)?;
  Ok(v.unwrap_or_default())
}

impl<T> ApiEnvelope<T> {
  /// First server message, or a generic one.
  pub fn message(&self) -> &str {
    self
      .error_messages
      .first()
      .map(String::as_str)
      .unwrap_or(DEFAULT_ERROR_MESSAGE)
  }

  /// `isSuccess = false` is a failure regardless of the HTTP status.
  pub fn into_result(self) -> Result<Option<T>, SyncError> {
    if !self.is_success {
      return Err(SyncError::rejected(self.message()));
    }
    Ok(self.result)
  }
}

/// Either shape a response body may take.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Decoded<T> {
  Envelope(ApiEnvelope<T>),
  /// Legacy endpoints return the payload directly
  Bare(T),
}

impl<T> Decoded<T> {
  pub fn into_result(self) -> Result<Option<T>, SyncError> {
    match self {
      Self::Envelope(envelope) => envelope.into_result(),
      Self::Bare(value) => Ok(Some(value)),
    }
  }
}

/// Turn an absent result into an error for endpoints that always return one.
pub fn required<T>(value: Option<T>, what: &str) -> Result<T, SyncError> {
  value.ok_or_else(|| SyncError::decode(format!("response carried no {what}")))
}
