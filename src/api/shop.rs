use std::collections::HashMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::{required, ApiClient};
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub phone_number: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub business_type: Option<String>,
  // Socials, owner and document fields are passed through untouched
  #[serde(flatten)]
  pub extra: HashMap<String, serde_json::Value>,
}

/// Partial update; unset fields are left alone by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub business_type: Option<String>,
}

/// Application for a new shop. It starts out pending until an admin approves it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterShop {
  pub shop_name: String,
  pub shop_description: String,
  pub shop_phone_number: String,
  pub shop_address: String,
  pub business_type: String,
  pub category_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shop_avatar: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shop_banner: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ownership_document_url: Option<String>,
  pub owner_full_name: String,
  /// `yyyy-mm-dd`
  pub owner_date_of_birth: String,
  pub owner_personal_id_number: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub owner_personal_id_front_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub owner_personal_id_back_url: Option<String>,
  pub accepted_terms: bool,
}

/// `None` when the user has not registered a shop.
pub async fn get_my_shop(api: &ApiClient) -> Result<Option<Shop>, SyncError> {
  api.get("Shop/my-shop").await
}

pub async fn register(api: &ApiClient, input: &RegisterShop) -> Result<(), SyncError> {
  api.post::<_, IgnoredAny>("Shop/register", input).await?;
  Ok(())
}

pub async fn update(api: &ApiClient, id: i64, input: &ShopUpdate) -> Result<Shop, SyncError> {
  required(api.put(&format!("Shop/{}", id), input).await?, "shop")
}

pub async fn delete(api: &ApiClient, id: i64) -> Result<(), SyncError> {
  api.delete::<IgnoredAny>(&format!("Shop/{}", id)).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_unknown_fields_are_kept() {
    let shop: Shop = serde_json::from_value(json!({
      "id": 4,
      "name": "Lecom Books",
      "phoneNumber": "0901234567",
      "shopTiktok": "@lecom"
    }))
    .unwrap();
    assert_eq!(shop.phone_number.as_deref(), Some("0901234567"));
    assert_eq!(shop.extra.get("shopTiktok"), Some(&json!("@lecom")));
  }

  #[test]
  fn test_update_skips_unset_fields() {
    let body = serde_json::to_value(ShopUpdate {
      name: Some("New".into()),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(body, json!({ "name": "New" }));
  }
}
