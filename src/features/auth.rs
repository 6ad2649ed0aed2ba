//! Session state and the sign-in forms.

use chrono::{Local, NaiveDate};

use crate::api::auth::{self, LoginRequest, LoginResult, RegisterRequest, RegisterResult};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::mutation::Mutation;
use crate::validate::{self, MIN_PASSWORD_LEN};

use super::keys;

/// Who the requests are made for. Only the token's presence matters to the
/// client; user-scoped queries are enabled from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  token: Option<String>,
}

impl Session {
  pub fn new(token: Option<String>) -> Self {
    Self {
      token: token.filter(|t| !t.trim().is_empty()),
    }
  }

  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn token(&self) -> Option<&str> {
    self.token.as_deref()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }
}

pub fn validate_login(input: &LoginRequest) -> validate::Validation {
  validate::required("username", &input.username)?;
  validate::required("password", &input.password)
}

pub fn validate_register(input: &RegisterRequest, today: NaiveDate) -> validate::Validation {
  validate::required("full name", &input.full_name)?;
  validate::required("username", &input.user_name)?;
  validate::required("email", &input.email)?;
  validate::required("phone number", &input.phone_number)?;
  validate::phone_number("phone number", &input.phone_number)?;
  validate::required("address", &input.address)?;
  validate::required("date of birth", &input.date_of_birth)?;
  validate::date_of_birth("date of birth", &input.date_of_birth, today)?;
  validate::min_len("password", &input.password, MIN_PASSWORD_LEN)?;
  validate::matching("confirm password", &input.confirm_password, "password", &input.password)
}

/// Signing in makes every user-scoped query stale.
fn user_scoped() -> Vec<QueryFilter> {
  vec![
    QueryFilter::Prefix(keys::my_profile()),
    QueryFilter::Prefix(keys::my_shop()),
    QueryFilter::Prefix(keys::cart()),
    QueryFilter::Prefix(keys::shop_products()),
  ]
}

pub fn login(api: &ApiClient) -> Mutation<LoginRequest, LoginResult> {
  let api = api.clone();
  Mutation::new("login", move |input: LoginRequest| {
    let api = api.clone();
    async move { auth::login(&api, &input).await }
  })
  .validate(validate_login)
  .invalidates(|_, _| user_scoped())
  .success_message("Success", "Signed in")
  .failure_title("Login failed")
}

pub fn register(api: &ApiClient) -> Mutation<RegisterRequest, RegisterResult> {
  let api = api.clone();
  Mutation::new("register", move |input: RegisterRequest| {
    let api = api.clone();
    async move { auth::register(&api, &input).await }
  })
  .validate(|input| validate_register(input, Local::now().date_naive()))
  .success_message("Success", "Account created, you can sign in now")
  .failure_title("Registration failed")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SyncError;
  use crate::validate::ValidationKind;

  fn form() -> RegisterRequest {
    RegisterRequest {
      full_name: "Lan Nguyen".into(),
      user_name: "lan".into(),
      email: "lan@example.com".into(),
      phone_number: "0901 234 567".into(),
      address: "Hanoi".into(),
      date_of_birth: "01/02/2000".into(),
      password: "secret1".into(),
      confirm_password: "secret1".into(),
    }
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
  }

  #[test]
  fn test_session_requires_a_token() {
    assert!(!Session::anonymous().is_authenticated());
    assert!(!Session::new(Some("  ".into())).is_authenticated());
    assert_eq!(Session::new(Some("t".into())).token(), Some("t"));
  }

  #[test]
  fn test_register_validation() {
    assert_eq!(validate_register(&form(), today()), Ok(()));

    let mut short = form();
    short.password = "abc".into();
    short.confirm_password = "abc".into();
    let err = validate_register(&short, today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::TooShort { min: MIN_PASSWORD_LEN });

    let mut mismatch = form();
    mismatch.confirm_password = "secret2".into();
    let err = validate_register(&mismatch, today()).unwrap_err();
    assert_eq!(err.field, "confirm password");

    let mut young = form();
    young.date_of_birth = "02/06/2011".into();
    let err = validate_register(&young, today()).unwrap_err();
    assert!(matches!(err.kind, ValidationKind::Underage { .. }));

    let mut phone = form();
    phone.phone_number = "12ab".into();
    assert_eq!(validate_register(&phone, today()).unwrap_err().kind, ValidationKind::InvalidPhone);
  }

  #[tokio::test]
  async fn test_login_validation_skips_network() {
    let api = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let client = crate::query::QueryClient::default();
    let err = client
      .mutate(
        &login(&api),
        LoginRequest {
          username: "lan".into(),
          password: String::new(),
        },
      )
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "password is required");
    assert!(matches!(err, SyncError::Validation(_)));
  }
}
