use serde::{Deserialize, Serialize};

use super::{required, ApiClient};
use crate::error::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
  pub token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
  pub full_name: String,
  pub user_name: String,
  pub email: String,
  pub phone_number: String,
  pub address: String,
  /// `dd/mm/yyyy`
  pub date_of_birth: String,
  pub password: String,
  /// Checked locally, never sent
  #[serde(skip_serializing)]
  pub confirm_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegisterResult {
  #[serde(default)]
  pub message: String,
}

pub async fn login(api: &ApiClient, input: &LoginRequest) -> Result<LoginResult, SyncError> {
  required(api.post("Auth/login", input).await?, "login result")
}

pub async fn register(api: &ApiClient, input: &RegisterRequest) -> Result<RegisterResult, SyncError> {
  Ok(api.post("Auth/register", input).await?.unwrap_or_default())
}
