use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub id: String,
  #[serde(default)]
  pub full_name: String,
  #[serde(default)]
  pub user_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone_number: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  /// `dd/mm/yyyy`
  #[serde(default)]
  pub date_of_birth: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProfile {
  pub full_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
  pub old_password: String,
  pub new_password: String,
  /// Checked locally, never sent
  #[serde(skip_serializing)]
  pub confirm_password: String,
}

/// `None` when the backend has no profile for the session.
pub async fn get_my_profile(api: &ApiClient) -> Result<Option<Profile>, SyncError> {
  api.get("User/my-profile").await
}

pub async fn edit_my_profile(api: &ApiClient, input: &EditProfile) -> Result<Option<Profile>, SyncError> {
  api.put("User/my-profile", input).await
}

pub async fn change_password(api: &ApiClient, input: &ChangePassword) -> Result<(), SyncError> {
  api.put::<_, IgnoredAny>("User/change-password", input).await?;
  Ok(())
}
