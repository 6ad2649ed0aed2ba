//! The seller's shop. Most accounts have none, so a missing shop is a
//! normal state and reads as `None`.

use chrono::{Local, NaiveDate};

use crate::api::shop::{self, RegisterShop, Shop, ShopUpdate};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::error::SyncError;
use crate::mutation::Mutation;
use crate::query::{absent_if_not_found, Query, QueryClient, QueryOptions, RetryPolicy};
use crate::validate;

use super::keys;

pub const MIN_SHOP_NAME_LEN: usize = 3;
pub const MIN_SHOP_DESCRIPTION_LEN: usize = 10;

/// Up to three retries; a missing shop is final.
pub fn my_shop_retry() -> RetryPolicy {
  RetryPolicy::custom(3, |_, err| !err.is_not_found() && err.is_retryable())
}

pub fn my_shop_options(client: &QueryClient) -> QueryOptions {
  client.query_options().retry(my_shop_retry())
}

async fn fetch_my_shop(api: &ApiClient) -> Result<Option<Shop>, SyncError> {
  Ok(absent_if_not_found(shop::get_my_shop(api)).await?.flatten())
}

pub fn my_shop_query(client: &QueryClient, api: &ApiClient) -> Query<Option<Shop>> {
  let api = api.clone();
  Query::new(client.clone(), keys::my_shop(), my_shop_options(client), move || {
    let api = api.clone();
    async move { fetch_my_shop(&api).await }
  })
}

pub fn validate_update(input: &ShopUpdate) -> validate::Validation {
  if let Some(name) = &input.name {
    validate::required("shop name", name)?;
  }
  if let Some(phone) = &input.phone_number {
    validate::required("phone number", phone)?;
    validate::phone_number("phone number", phone)?;
  }
  if let Some(address) = &input.address {
    validate::required("address", address)?;
  }
  Ok(())
}

/// Checks run in form order; the first failure is reported.
pub fn validate_registration(input: &RegisterShop, today: NaiveDate) -> validate::Validation {
  validate::required("shop name", &input.shop_name)?;
  validate::min_len("shop name", input.shop_name.trim(), MIN_SHOP_NAME_LEN)?;
  validate::required("shop description", &input.shop_description)?;
  validate::min_len("shop description", input.shop_description.trim(), MIN_SHOP_DESCRIPTION_LEN)?;
  validate::required("phone number", &input.shop_phone_number)?;
  validate::local_phone_number("phone number", &input.shop_phone_number)?;
  validate::required("shop address", &input.shop_address)?;
  validate::required("business type", &input.business_type)?;
  validate::required("category", &input.category_id)?;
  validate::required("owner full name", &input.owner_full_name)?;
  validate::required("owner date of birth", &input.owner_date_of_birth)?;
  validate::owner_date_of_birth("owner date of birth", &input.owner_date_of_birth, today)?;
  validate::required("personal ID number", &input.owner_personal_id_number)?;
  validate::personal_id("personal ID number", &input.owner_personal_id_number)?;
  validate::accepted("terms and conditions", input.accepted_terms)
}

/// A registered shop is pending review, so `my-shop` is refetched rather
/// than written.
pub fn register_shop(api: &ApiClient) -> Mutation<RegisterShop, ()> {
  let api = api.clone();
  Mutation::new("register shop", move |input: RegisterShop| {
    let api = api.clone();
    async move { shop::register(&api, &input).await }
  })
  .validate(|input| validate_registration(input, Local::now().date_naive()))
  .invalidates(|_, _| vec![QueryFilter::Exact(keys::my_shop())])
  .success_message(
    "Success",
    "Your shop has been registered and is pending approval. You will be notified once it is reviewed.",
  )
  .failure_title("Registration failed")
}

/// The server's copy of the shop replaces `my-shop` directly.
pub fn update_shop(api: &ApiClient) -> Mutation<(i64, ShopUpdate), Shop> {
  let api = api.clone();
  Mutation::new("update shop", move |(id, input): (i64, ShopUpdate)| {
    let api = api.clone();
    async move { shop::update(&api, id, &input).await }
  })
  .validate(|(_, input)| validate_update(input))
  .on_success(|updated, _, txn| {
    txn.set(&keys::my_shop(), Some(updated.clone()));
  })
  .success_message("Success", "Shop updated")
  .failure_title("Could not update shop")
}

/// Deleting marks the shop absent without a refetch.
pub fn delete_shop(api: &ApiClient) -> Mutation<i64, ()> {
  let api = api.clone();
  Mutation::new("delete shop", move |id: i64| {
    let api = api.clone();
    async move { shop::delete(&api, id).await }
  })
  .on_success(|_, _, txn| {
    txn.set::<Option<Shop>>(&keys::my_shop(), None);
  })
  .success_message("Success", "Shop deleted")
  .failure_title("Could not delete shop")
}
