//! The public product catalogue.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required, ApiClient};
use crate::error::SyncError;

/// Catalogue entries share the seller-side product shape.
pub use super::shop_products::ShopProduct as Product;

/// Filters and paging for a catalogue listing. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page_size: Option<u32>,
}

impl ProductQuery {
  /// Identity parameter; blank searches count as no search.
  pub fn to_param(&self) -> Value {
    json!({
      "search": self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()),
      "categoryId": self.category_id,
      "page": self.page,
      "pageSize": self.page_size,
    })
  }
}

/// One page of the catalogue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductList {
  #[serde(default)]
  pub items: Vec<Product>,
  #[serde(default)]
  pub page: u32,
  #[serde(default)]
  pub page_size: u32,
  #[serde(default)]
  pub total_count: u64,
  #[serde(default)]
  pub total_pages: u32,
}

impl ProductList {
  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }
}

pub async fn list(api: &ApiClient, query: &ProductQuery) -> Result<ProductList, SyncError> {
  Ok(api.get_with("products", query).await?.unwrap_or_default())
}

pub async fn by_slug(api: &ApiClient, slug: &str) -> Result<Product, SyncError> {
  required(api.get(&format!("products/slug/{}", slug)).await?, "product")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_ignores_blank_search() {
    let blank = ProductQuery {
      search: Some("  ".into()),
      page: Some(1),
      ..Default::default()
    };
    let none = ProductQuery {
      page: Some(1),
      ..Default::default()
    };
    assert_eq!(blank.to_param(), none.to_param());
    assert_ne!(
      none.to_param(),
      ProductQuery {
        page: Some(2),
        ..Default::default()
      }
      .to_param()
    );
  }

  #[test]
  fn test_has_next() {
    let list = ProductList {
      page: 1,
      total_pages: 2,
      ..Default::default()
    };
    assert!(list.has_next());
    assert!(!ProductList { page: 2, ..list }.has_next());
  }
}
