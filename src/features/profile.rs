use std::time::Duration;

use crate::api::profile::{self, ChangePassword, EditProfile, Profile};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::error::SyncError;
use crate::mutation::Mutation;
use crate::query::{absent_if_not_found, Query, QueryClient, QueryOptions, RetryDelay, RetryPolicy};
use crate::validate::{self, MIN_PASSWORD_LEN};

use super::auth::Session;
use super::keys;

const PROFILE_STALE_TIME: Duration = Duration::from_secs(2 * 60);

pub fn my_profile_options(client: &QueryClient, session: &Session) -> QueryOptions {
  client
    .query_options()
    .enabled(session.is_authenticated())
    .stale_time(PROFILE_STALE_TIME)
    .retry(RetryPolicy::auth_aware())
    .retry_delay(RetryDelay::linear())
}

/// The signed-in user's profile. A 404 means no profile yet and is cached
/// as `None` instead of an error.
pub fn my_profile_query(client: &QueryClient, api: &ApiClient, session: &Session) -> Query<Option<Profile>> {
  let api = api.clone();
  Query::new(
    client.clone(),
    keys::my_profile(),
    my_profile_options(client, session),
    move || {
      let api = api.clone();
      async move { fetch_my_profile(&api).await }
    },
  )
}

async fn fetch_my_profile(api: &ApiClient) -> Result<Option<Profile>, SyncError> {
  Ok(absent_if_not_found(profile::get_my_profile(api)).await?.flatten())
}

pub fn validate_edit(input: &EditProfile) -> validate::Validation {
  validate::required("full name", &input.full_name)?;
  match &input.phone_number {
    Some(phone) if !phone.trim().is_empty() => validate::phone_number("phone number", phone),
    _ => Ok(()),
  }
}

pub fn edit_profile(api: &ApiClient) -> Mutation<EditProfile, Option<Profile>> {
  let api = api.clone();
  Mutation::new("edit profile", move |input: EditProfile| {
    let api = api.clone();
    async move { profile::edit_my_profile(&api, &input).await }
  })
  .validate(validate_edit)
  .invalidates(|_, _| vec![QueryFilter::Prefix(keys::my_profile())])
  .success_message("Success", "Profile updated")
  .failure_title("Could not update profile")
}

pub fn validate_password_change(input: &ChangePassword) -> validate::Validation {
  validate::required("current password", &input.old_password)?;
  validate::required("new password", &input.new_password)?;
  validate::min_len("new password", &input.new_password, MIN_PASSWORD_LEN)?;
  validate::matching("confirm password", &input.confirm_password, "new password", &input.new_password)
}

pub fn change_password(api: &ApiClient) -> Mutation<ChangePassword, ()> {
  let api = api.clone();
  Mutation::new("change password", move |input: ChangePassword| {
    let api = api.clone();
    async move { profile::change_password(&api, &input).await }
  })
  .validate(validate_password_change)
  .success_message("Success", "Password changed")
  .failure_title("Could not change password")
}
