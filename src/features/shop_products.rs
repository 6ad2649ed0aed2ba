//! The seller's own product catalogue.

use std::time::Duration;

use crate::api::shop_products::{self, ProductInput, ProductStatus, ShopProduct};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::mutation::Mutation;
use crate::query::{Query, QueryClient};
use crate::validate;

use super::keys;

const DETAIL_STALE_TIME: Duration = Duration::from_secs(2 * 60);

pub fn list_query(client: &QueryClient, api: &ApiClient) -> Query<Vec<ShopProduct>> {
  let api = api.clone();
  Query::new(client.clone(), keys::shop_products(), client.query_options(), move || {
    let api = api.clone();
    async move { shop_products::my_products(&api).await }
  })
}

pub fn detail_query(client: &QueryClient, api: &ApiClient, id: &str) -> Query<ShopProduct> {
  let api = api.clone();
  let options = client
    .query_options()
    .enabled(!id.trim().is_empty())
    .stale_time(DETAIL_STALE_TIME);
  let id = id.to_string();
  Query::new(client.clone(), keys::product_detail(&id), options, move || {
    let api = api.clone();
    let id = id.clone();
    async move { shop_products::by_id(&api, &id).await }
  })
}

pub fn validate_product(input: &ProductInput) -> validate::Validation {
  validate::required("name", &input.name)?;
  validate::required("category", &input.category_id)?;
  validate::non_negative("price", input.price)
}

fn list_filter() -> QueryFilter {
  QueryFilter::Prefix(keys::shop_products())
}

pub fn create_product(api: &ApiClient) -> Mutation<ProductInput, ShopProduct> {
  let api = api.clone();
  Mutation::new("create product", move |input: ProductInput| {
    let api = api.clone();
    async move { shop_products::create(&api, &input).await }
  })
  .validate(validate_product)
  .invalidates(|_, _| vec![list_filter()])
  .success_message("Success", "Product created")
  .failure_title("Could not create product")
}

pub fn update_product(api: &ApiClient) -> Mutation<(String, ProductInput), ShopProduct> {
  let api = api.clone();
  Mutation::new("update product", move |(id, input): (String, ProductInput)| {
    let api = api.clone();
    async move { shop_products::update(&api, &id, &input).await }
  })
  .validate(|(_, input)| validate_product(input))
  .invalidates(|_, (id, _)| vec![QueryFilter::Exact(keys::product_detail(id)), list_filter()])
  .success_message("Success", "Product updated")
  .failure_title("Could not update product")
}

pub fn update_status(api: &ApiClient) -> Mutation<(String, ProductStatus), ShopProduct> {
  let api = api.clone();
  Mutation::new("update product status", move |(id, status): (String, ProductStatus)| {
    let api = api.clone();
    async move { shop_products::update_status(&api, &id, status).await }
  })
  .invalidates(|_, _| vec![list_filter()])
  .success_message("Success", "Product status updated")
  .failure_title("Could not update status")
}

pub fn delete_product(api: &ApiClient) -> Mutation<String, ()> {
  let api = api.clone();
  Mutation::new("delete product", move |id: String| {
    let api = api.clone();
    async move { shop_products::delete(&api, &id).await }
  })
  .on_success(|_, id, txn| {
    txn.remove(&keys::product_detail(id));
  })
  .invalidates(|_, _| vec![list_filter()])
  .success_message("Success", "Product deleted")
  .failure_title("Could not delete product")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SyncError;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn product(id: &str) -> ShopProduct {
    serde_json::from_value(json!({ "id": id, "name": "Course", "price": 12.5, "status": "Draft" })).unwrap()
  }

  fn input(price: f64) -> ProductInput {
    ProductInput {
      name: "Course".into(),
      category_id: "c1".into(),
      description: String::new(),
      price,
      stock: 3,
      status: ProductStatus::Draft,
      images: Vec::new(),
    }
  }

  #[tokio::test]
  async fn test_negative_price_is_rejected_locally() {
    let api = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let client = QueryClient::default();
    let err = client.mutate(&create_product(&api), input(-1.0)).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(err.to_string(), "price must not be negative");
  }

  #[tokio::test]
  async fn test_update_invalidates_detail_and_list() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/seller/products/p1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "isSuccess": true,
        "result": { "id": "p1", "name": "Course", "price": 20.0, "status": "Published" }
      })))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();
    client.set_query_data(&keys::shop_products(), vec![product("p1"), product("p2")]);
    client.set_query_data(&keys::product_detail("p1"), product("p1"));
    client.set_query_data(&keys::product_detail("p2"), product("p2"));

    let updated = client
      .mutate(&update_product(&api), ("p1".to_string(), input(20.0)))
      .await
      .unwrap();
    assert_eq!(updated.price, 20.0);

    let store = client.store();
    assert!(store.get::<Vec<ShopProduct>>(&keys::shop_products()).unwrap().invalidated);
    assert!(store.get::<ShopProduct>(&keys::product_detail("p1")).unwrap().invalidated);
    assert!(!store.get::<ShopProduct>(&keys::product_detail("p2")).unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_delete_removes_detail() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/seller/products/p1"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();
    client.set_query_data(&keys::shop_products(), vec![product("p1")]);
    client.set_query_data(&keys::product_detail("p1"), product("p1"));

    client.mutate(&delete_product(&api), "p1".to_string()).await.unwrap();

    assert!(!client.store().contains(&keys::product_detail("p1")));
    assert!(client.store().get::<Vec<ShopProduct>>(&keys::shop_products()).unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_blank_detail_id_is_disabled() {
    let api = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let client = QueryClient::default();
    let query = detail_query(&client, &api, " ");
    assert!(!query.options().enabled);
    assert!(!query.load().await.is_loading());
  }
}
