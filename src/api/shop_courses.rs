//! Courses a seller publishes through their shop.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{required, ApiClient};
use crate::error::SyncError;

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCourse {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub summary: String,
  #[serde(default)]
  pub category_id: String,
  #[serde(default)]
  pub category_name: String,
  #[serde(default)]
  pub shop_id: Option<i64>,
  #[serde(default)]
  pub shop_name: Option<String>,
  #[serde(default)]
  pub shop_avatar: Option<String>,
  #[serde(default)]
  pub course_thumbnail: Option<String>,
  /// 1 when the course is listed
  #[serde(default)]
  pub active: u8,
}

impl ShopCourse {
  pub fn is_active(&self) -> bool {
    self.active == 1
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
  pub title: String,
  pub slug: String,
  pub summary: String,
  pub category_id: String,
  /// The backend fills in the caller's shop when this is 0
  pub shop_id: i64,
  pub course_thumbnail: String,
}

impl NewCourse {
  /// A course for the caller's own shop with the slug derived from `title`.
  pub fn new(title: &str, summary: &str, category_id: &str, course_thumbnail: &str) -> Self {
    Self {
      title: title.to_string(),
      slug: slugify(title),
      summary: summary.to_string(),
      category_id: category_id.to_string(),
      shop_id: 0,
      course_thumbnail: course_thumbnail.to_string(),
    }
  }
}

/// Lowercase ASCII words joined by `-`, e.g. `Rust 101: Basics` -> `rust-101-basics`.
pub fn slugify(title: &str) -> String {
  NON_SLUG_RE
    .replace_all(&title.to_lowercase(), "-")
    .trim_matches('-')
    .to_string()
}

pub async fn my_courses(api: &ApiClient) -> Result<Vec<ShopCourse>, SyncError> {
  Ok(api.get("seller/courses/my").await?.unwrap_or_default())
}

pub async fn create(api: &ApiClient, input: &NewCourse) -> Result<ShopCourse, SyncError> {
  required(api.post("seller/courses", input).await?, "course")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_slugify() {
    assert_eq!(slugify("Rust 101: Basics"), "rust-101-basics");
    assert_eq!(slugify("  --Hello, World!--  "), "hello-world");
    assert_eq!(slugify("???"), "");
  }

  #[test]
  fn test_new_course_body() {
    let body = serde_json::to_value(NewCourse::new("Intro to SQL", "Tables and joins", "c1", "https://cdn/x.png")).unwrap();
    assert_eq!(
      body,
      json!({
        "title": "Intro to SQL",
        "slug": "intro-to-sql",
        "summary": "Tables and joins",
        "categoryId": "c1",
        "shopId": 0,
        "courseThumbnail": "https://cdn/x.png"
      })
    );
  }
}
