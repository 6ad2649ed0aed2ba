use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::{required, ApiClient};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
  Draft,
  Published,
  OutOfStock,
  Archived,
}

impl ProductStatus {
  pub const ALL: [ProductStatus; 4] = [Self::Draft, Self::Published, Self::OutOfStock, Self::Archived];

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|status| status.to_string().eq_ignore_ascii_case(s))
  }
}

impl fmt::Display for ProductStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Draft => "Draft",
      Self::Published => "Published",
      Self::OutOfStock => "OutOfStock",
      Self::Archived => "Archived",
    };
    f.pad(s)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
  pub url: String,
  pub order_index: u32,
  pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopProduct {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub category_id: String,
  #[serde(default)]
  pub category_name: String,
  pub price: f64,
  #[serde(default)]
  pub stock: u32,
  pub status: ProductStatus,
  #[serde(default)]
  pub last_updated_at: Option<String>,
  #[serde(default)]
  pub images: Vec<ProductImage>,
  #[serde(default)]
  pub thumbnail_url: Option<String>,
  #[serde(default)]
  pub shop_id: Option<i64>,
  #[serde(default)]
  pub shop_name: Option<String>,
}

/// Body of both create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
  pub name: String,
  pub category_id: String,
  pub description: String,
  pub price: f64,
  pub stock: u32,
  pub status: ProductStatus,
  pub images: Vec<ProductImage>,
}

#[derive(Serialize)]
struct StatusBody {
  status: ProductStatus,
}

pub async fn my_products(api: &ApiClient) -> Result<Vec<ShopProduct>, SyncError> {
  Ok(api.get("seller/products").await?.unwrap_or_default())
}

pub async fn by_id(api: &ApiClient, id: &str) -> Result<ShopProduct, SyncError> {
  required(api.get(&format!("seller/products/by-id/{}", id)).await?, "product")
}

pub async fn create(api: &ApiClient, input: &ProductInput) -> Result<ShopProduct, SyncError> {
  required(api.post("seller/products", input).await?, "product")
}

pub async fn update(api: &ApiClient, id: &str, input: &ProductInput) -> Result<ShopProduct, SyncError> {
  required(api.put(&format!("seller/products/{}", id), input).await?, "product")
}

pub async fn update_status(api: &ApiClient, id: &str, status: ProductStatus) -> Result<ShopProduct, SyncError> {
  required(
    api
      .put(&format!("seller/products/{}/status", id), &StatusBody { status })
      .await?,
    "product",
  )
}

pub async fn delete(api: &ApiClient, id: &str) -> Result<(), SyncError> {
  api.delete::<IgnoredAny>(&format!("seller/products/{}", id)).await?;
  Ok(())
}
