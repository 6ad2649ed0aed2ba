use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub product_id: String,
  pub product_name: String,
  pub unit_price: f64,
  pub quantity: u32,
  pub line_total: f64,
  #[serde(default)]
  pub product_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
  #[serde(default)]
  pub user_id: String,
  #[serde(default)]
  pub items: Vec<CartItem>,
  #[serde(default)]
  pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
  pub product_id: String,
  pub quantity: u32,
}

/// A cart that does not exist yet reads as empty.
pub async fn get_cart(api: &ApiClient) -> Result<Cart, SyncError> {
  Ok(api.get("cart/").await?.unwrap_or_default())
}

pub async fn add_item(api: &ApiClient, item: &AddToCart) -> Result<(), SyncError> {
  api.post::<_, IgnoredAny>("cart/items", item).await?;
  Ok(())
}

pub async fn remove_item(api: &ApiClient, product_id: &str) -> Result<(), SyncError> {
  api.delete::<IgnoredAny>(&format!("cart/items/{}", product_id)).await?;
  Ok(())
}
