//! Posts on the demo backend. Writes are accepted but never persisted.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::{required, ApiClient};
use crate::error::SyncError;
use crate::infinite::Page;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  pub id: i64,
  pub user_id: i64,
  pub title: String,
  pub body: String,
}

impl Post {
  /// Ids below one are provisional and unknown to the server.
  pub fn is_confirmed(&self) -> bool {
    self.id > 0
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
  pub user_id: i64,
  pub title: String,
  pub body: String,
}

/// `GET /posts?_page=&_limit=`
pub async fn list(api: &ApiClient, page: u32, limit: u32) -> Result<Page<Post>, SyncError> {
  let (posts, total) = api
    .get_paged::<Post, _>("posts", &[("_page", page), ("_limit", limit)])
    .await?;
  Ok(Page::from_total(posts, page, limit, total))
}

pub async fn get(api: &ApiClient, id: i64) -> Result<Post, SyncError> {
  required(api.get(&format!("posts/{}", id)).await?, "post")
}

pub async fn create(api: &ApiClient, input: &NewPost) -> Result<Post, SyncError> {
  required(api.post("posts", input).await?, "post")
}

pub async fn delete(api: &ApiClient, id: i64) -> Result<(), SyncError> {
  api.delete::<IgnoredAny>(&format!("posts/{}", id)).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn post(id: i64) -> serde_json::Value {
    json!({ "id": id, "userId": 1, "title": format!("post {id}"), "body": "..." })
  }

  #[tokio::test]
  async fn test_list_builds_page_from_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/posts"))
      .and(query_param("_page", "3"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("x-total-count", "25")
          .set_body_json(json!([post(21), post(22), post(23), post(24), post(25)])),
      )
      .mount(&server)
      .await;

    let api = ApiClient::new(&server.uri(), None).unwrap();
    let page = list(&api, 3, 10).await.unwrap();
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.cursor, None);
    assert_eq!(page.total_count, Some(25));
  }

  #[tokio::test]
  async fn test_create_sends_camel_case() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/posts"))
      .and(wiremock::matchers::body_json(json!({ "userId": 1, "title": "t", "body": "b" })))
      .respond_with(ResponseTemplate::new(201).set_body_json(post(101)))
      .mount(&server)
      .await;

    let api = ApiClient::new(&server.uri(), None).unwrap();
    let created = create(
      &api,
      &NewPost {
        user_id: 1,
        title: "t".into(),
        body: "b".into(),
      },
    )
    .await
    .unwrap();
    assert_eq!(created.id, 101);
  }
}
