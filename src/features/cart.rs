use crate::api::cart::{self, AddToCart, Cart};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::mutation::Mutation;
use crate::query::{Query, QueryClient};
use crate::validate;

use super::keys;

pub fn cart_query(client: &QueryClient, api: &ApiClient) -> Query<Cart> {
  let api = api.clone();
  Query::new(client.clone(), keys::cart(), client.query_options(), move || {
    let api = api.clone();
    async move { cart::get_cart(&api).await }
  })
}

pub fn add_to_cart(api: &ApiClient) -> Mutation<AddToCart, ()> {
  let api = api.clone();
  Mutation::new("add to cart", move |item: AddToCart| {
    let api = api.clone();
    async move { cart::add_item(&api, &item).await }
  })
  .validate(|item| validate::required("product", &item.product_id))
  .invalidates(|_, _| vec![QueryFilter::Prefix(keys::cart())])
  .success_message("Success", "Added to cart")
  .failure_title("Could not add to cart")
}

pub fn remove_from_cart(api: &ApiClient) -> Mutation<String, ()> {
  let api = api.clone();
  Mutation::new("remove from cart", move |product_id: String| {
    let api = api.clone();
    async move { cart::remove_item(&api, &product_id).await }
  })
  .invalidates(|_, _| vec![QueryFilter::Prefix(keys::cart())])
  .success_message("Success", "Removed from cart")
  .failure_title("Could not remove item")
}
