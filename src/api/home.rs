use serde::Deserialize;

use super::products::Product;
use super::shop_courses::ShopCourse;
use super::ApiClient;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
}

/// Everything the home screen shows, in one read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LandingPage {
  pub top_course_categories: Vec<Category>,
  pub top_product_categories: Vec<Category>,
  pub popular_courses: Vec<ShopCourse>,
  pub best_seller_products: Vec<Product>,
}

pub async fn get_landing_page(api: &ApiClient) -> Result<LandingPage, SyncError> {
  Ok(api.get("landing-page").await?.unwrap_or_default())
}
