//! The public catalogue: filtered listings and product pages by slug.

use crate::api::products::{self, Product, ProductList, ProductQuery};
use crate::api::ApiClient;
use crate::query::{Query, QueryClient};

use super::keys;

/// One catalogue page. Each distinct set of filters is its own cache entry.
pub fn list_query(client: &QueryClient, api: &ApiClient, params: ProductQuery) -> Query<ProductList> {
  let api = api.clone();
  Query::new(client.clone(), keys::products(&params), client.query_options(), move || {
    let api = api.clone();
    let params = params.clone();
    async move { products::list(&api, &params).await }
  })
}

/// Enabled only once there is a slug to look up.
pub fn by_slug_query(client: &QueryClient, api: &ApiClient, slug: &str) -> Query<Product> {
  let api = api.clone();
  let options = client.query_options().enabled(!slug.is_empty());
  let slug = slug.to_string();
  Query::new(client.clone(), keys::product(&slug), options, move || {
    let api = api.clone();
    let slug = slug.clone();
    async move { products::by_slug(&api, &slug).await }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{QueryFilter, QueryStatus};
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn product(slug: &str) -> serde_json::Value {
    json!({ "id": slug, "name": "Rust book", "slug": slug, "price": 30.0, "status": "Published" })
  }

  fn page(n: u32) -> ProductQuery {
    ProductQuery {
      search: Some("rust".into()),
      page: Some(n),
      page_size: Some(10),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_each_filter_set_is_cached_separately() {
    let server = MockServer::start().await;
    for n in [1u32, 2] {
      Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("search", "rust"))
        .and(query_param("page", n.to_string()))
        .and(query_param("pageSize", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "isSuccess": true,
          "result": {
            "items": [product(&format!("book-{n}"))],
            "page": n,
            "pageSize": 10,
            "totalCount": 11,
            "totalPages": 2
          }
        })))
        .expect(1)
        .mount(&server)
        .await;
    }
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();

    let first = list_query(&client, &api, page(1)).load().await;
    let second = list_query(&client, &api, page(2)).load().await;
    list_query(&client, &api, page(1)).load().await;

    assert!(first.data().unwrap().has_next());
    assert!(!second.data().unwrap().has_next());
    assert_eq!(second.data().unwrap().items[0].slug, "book-2");
    assert_eq!(client.store().matching(&QueryFilter::Prefix(keys::product_lists())).len(), 2);
  }

  #[tokio::test]
  async fn test_product_by_slug() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/products/slug/rust-book"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "isSuccess": true,
        "result": product("rust-book")
      })))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();

    let state = by_slug_query(&client, &api, "rust-book").load().await;
    assert_eq!(state.data().map(|p| p.name.as_str()), Some("Rust book"));
  }

  #[tokio::test]
  async fn test_empty_slug_stays_idle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();

    let query = by_slug_query(&client, &api, "");
    assert!(!query.options().enabled);
    let state = query.load().await;
    assert_eq!(state.status, QueryStatus::Idle);
    assert!(state.error.is_none());
  }
}
