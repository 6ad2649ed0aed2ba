//! Courses the seller publishes through their shop.

use crate::api::shop_courses::{self, NewCourse, ShopCourse};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::mutation::Mutation;
use crate::query::{Query, QueryClient};
use crate::validate;

use super::keys;

pub fn courses_query(client: &QueryClient, api: &ApiClient) -> Query<Vec<ShopCourse>> {
  let api = api.clone();
  Query::new(client.clone(), keys::shop_courses(), client.query_options(), move || {
    let api = api.clone();
    async move { shop_courses::my_courses(&api).await }
  })
}

pub fn validate_new_course(input: &NewCourse) -> validate::Validation {
  validate::required("title", &input.title)?;
  validate::required("slug", &input.slug)?;
  validate::required("summary", &input.summary)?;
  validate::required("category", &input.category_id)?;
  validate::required("thumbnail", &input.course_thumbnail)
}

pub fn create_course(api: &ApiClient) -> Mutation<NewCourse, ShopCourse> {
  let api = api.clone();
  Mutation::new("create course", move |input: NewCourse| {
    let api = api.clone();
    async move { shop_courses::create(&api, &input).await }
  })
  .validate(validate_new_course)
  .invalidates(|_, _| vec![QueryFilter::Prefix(keys::shop_courses())])
  .success_message("Success", "Course created successfully!")
  .failure_title("Could not create course")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SyncError;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn course(id: &str) -> serde_json::Value {
    json!({ "id": id, "title": "Intro to SQL", "slug": "intro-to-sql", "active": 1 })
  }

  #[tokio::test]
  async fn test_courses_load_from_seller_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/seller/courses/my"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "isSuccess": true,
        "result": [course("c1"), course("c2")]
      })))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), Some("token")).unwrap();
    let client = QueryClient::default();

    let state = courses_query(&client, &api).load().await;
    let courses = state.data().unwrap();
    assert_eq!(courses.len(), 2);
    assert!(courses[0].is_active());

    // Second read is served from the cache
    courses_query(&client, &api).load().await;
  }

  #[tokio::test]
  async fn test_create_invalidates_courses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/seller/courses"))
      .and(body_partial_json(json!({ "slug": "intro-to-sql", "shopId": 0 })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "isSuccess": true,
        "result": course("c3")
      })))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), Some("token")).unwrap();
    let client = QueryClient::default();
    client.set_query_data(&keys::shop_courses(), Vec::<ShopCourse>::new());
    client.set_query_data(&keys::cart(), 1u32);

    let input = NewCourse::new("Intro to SQL", "Tables and joins", "c1", "https://cdn/x.png");
    let created = client.mutate(&create_course(&api), input).await.unwrap();
    assert_eq!(created.id, "c3");

    let store = client.store();
    assert!(store.get::<Vec<ShopCourse>>(&keys::shop_courses()).unwrap().invalidated);
    assert!(!store.get::<u32>(&keys::cart()).unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_missing_thumbnail_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), Some("token")).unwrap();
    let client = QueryClient::default();

    let input = NewCourse::new("Intro to SQL", "Tables and joins", "c1", "");
    let err = client.mutate(&create_course(&api), input).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(err.to_string(), "thumbnail is required");

    let untitled = NewCourse::new("???", "Tables and joins", "c1", "https://cdn/x.png");
    let err = client.mutate(&create_course(&api), untitled).await.unwrap_err();
    assert_eq!(err.to_string(), "slug is required");
  }
}
