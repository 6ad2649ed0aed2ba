//! Client-side form validation run before a mutation is dispatched.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum age for creating an account.
pub const MIN_AGE: u32 = 13;

/// Minimum age of a shop owner.
pub const MIN_OWNER_AGE: u32 = 18;

/// Birth dates implying an older age are rejected as typos.
pub const MAX_AGE: u32 = 100;

static PHONE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\+?[0-9]{9,15}$").expect("phone pattern is valid"));

static LOCAL_PHONE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^0[0-9]{9}$").expect("local phone pattern is valid"));

static PERSONAL_ID_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[0-9]{9,12}$").expect("personal id pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationKind {
  Required,
  /// The field must equal another field (confirmation inputs)
  Mismatch { other: &'static str },
  TooShort { min: usize },
  Underage { min_age: u32 },
  InvalidDate,
  InvalidPhone,
  /// Not ten digits starting with 0
  InvalidLocalPhone,
  InvalidPersonalId,
  NotAccepted,
  Negative,
}

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
  pub field: &'static str,
  pub kind: ValidationKind,
}

impl ValidationError {
  pub fn new(field: &'static str, kind: ValidationKind) -> Self {
    Self { field, kind }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      ValidationKind::Required => write!(f, "{} is required", self.field),
      ValidationKind::Mismatch { other } => write!(f, "{} does not match {}", self.field, other),
      ValidationKind::TooShort { min } => {
        write!(f, "{} must be at least {} characters", self.field, min)
      }
      ValidationKind::Underage { min_age } => {
        write!(f, "you must be at least {} years old", min_age)
      }
      ValidationKind::InvalidDate => write!(f, "{} must be a date in dd/mm/yyyy format", self.field),
      ValidationKind::InvalidPhone => write!(f, "{} is not a valid phone number", self.field),
      ValidationKind::InvalidLocalPhone => {
        write!(f, "{} must be 10 digits and start with 0", self.field)
      }
      ValidationKind::InvalidPersonalId => write!(f, "{} must be 9-12 digits", self.field),
      ValidationKind::NotAccepted => write!(f, "you must accept the {}", self.field),
      ValidationKind::Negative => write!(f, "{} must not be negative", self.field),
    }
  }
}

pub type Validation = Result<(), ValidationError>;

/// Reject empty or whitespace-only values.
pub fn required(field: &'static str, value: &str) -> Validation {
  if value.trim().is_empty() {
    return Err(ValidationError::new(field, ValidationKind::Required));
  }
  Ok(())
}

pub fn matching(field: &'static str, value: &str, other: &'static str, other_value: &str) -> Validation {
  if value != other_value {
    return Err(ValidationError::new(field, ValidationKind::Mismatch { other }));
  }
  Ok(())
}

pub fn min_len(field: &'static str, value: &str, min: usize) -> Validation {
  if value.chars().count() < min {
    return Err(ValidationError::new(field, ValidationKind::TooShort { min }));
  }
  Ok(())
}

pub fn non_negative(field: &'static str, value: f64) -> Validation {
  if value < 0.0 {
    return Err(ValidationError::new(field, ValidationKind::Negative));
  }
  Ok(())
}

/// Parse a `dd/mm/yyyy` birth date and require [`MIN_AGE`] as of `today`.
pub fn date_of_birth(field: &'static str, value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
  let dob = parse_date(field, value, "%d/%m/%Y")?;
  check_age(field, dob, today, MIN_AGE, None)?;
  Ok(dob)
}

/// Parse a `yyyy-mm-dd` birth date and require an age between
/// [`MIN_OWNER_AGE`] and [`MAX_AGE`].
pub fn owner_date_of_birth(field: &'static str, value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
  let dob = parse_date(field, value, "%Y-%m-%d")?;
  check_age(field, dob, today, MIN_OWNER_AGE, Some(MAX_AGE))?;
  Ok(dob)
}

fn parse_date(field: &'static str, value: &str, format: &str) -> Result<NaiveDate, ValidationError> {
  NaiveDate::parse_from_str(value.trim(), format).map_err(|_| ValidationError::new(field, ValidationKind::InvalidDate))
}

/// Whole years between `dob` and `today`.
fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
  let mut age = today.year() - dob.year();
  if (today.month(), today.day()) < (dob.month(), dob.day()) {
    age -= 1;
  }
  age
}

fn check_age(field: &'static str, dob: NaiveDate, today: NaiveDate, min_age: u32, max_age: Option<u32>) -> Validation {
  if dob > today {
    return Err(ValidationError::new(field, ValidationKind::InvalidDate));
  }
  let age = age_on(dob, today);
  if age < min_age as i32 {
    return Err(ValidationError::new(field, ValidationKind::Underage { min_age }));
  }
  if max_age.is_some_and(|max| age > max as i32) {
    return Err(ValidationError::new(field, ValidationKind::InvalidDate));
  }
  Ok(())
}

/// Accept digits with an optional leading `+`; spaces, dashes and dots are ignored.
pub fn phone_number(field: &'static str, value: &str) -> Validation {
  let compact: String = value
    .chars()
    .filter(|c| !matches!(c, ' ' | '-' | '.'))
    .collect();
  if !PHONE_RE.is_match(&compact) {
    return Err(ValidationError::new(field, ValidationKind::InvalidPhone));
  }
  Ok(())
}

/// Ten digits starting with `0`, e.g. `0901234567`.
pub fn local_phone_number(field: &'static str, value: &str) -> Validation {
  if !LOCAL_PHONE_RE.is_match(value.trim()) {
    return Err(ValidationError::new(field, ValidationKind::InvalidLocalPhone));
  }
  Ok(())
}

/// National ID: 9 to 12 digits.
pub fn personal_id(field: &'static str, value: &str) -> Validation {
  if !PERSONAL_ID_RE.is_match(value.trim()) {
    return Err(ValidationError::new(field, ValidationKind::InvalidPersonalId));
  }
  Ok(())
}

pub fn accepted(field: &'static str, value: bool) -> Validation {
  if !value {
    return Err(ValidationError::new(field, ValidationKind::NotAccepted));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
  }

  #[test]
  fn test_required_rejects_whitespace() {
    assert!(required("full name", "   ").is_err());
    assert!(required("full name", "Lan").is_ok());
  }

  #[test]
  fn test_mismatch_message() {
    let err = matching("confirm password", "abc123", "password", "abc124").unwrap_err();
    assert_eq!(err.to_string(), "confirm password does not match password");
  }

  #[test]
  fn test_password_length() {
    assert!(min_len("password", "12345", MIN_PASSWORD_LEN).is_err());
    assert!(min_len("password", "123456", MIN_PASSWORD_LEN).is_ok());
  }

  #[test]
  fn test_date_of_birth() {
    assert!(date_of_birth("date of birth", "14/10/2013", today()).is_ok());
    let err = date_of_birth("date of birth", "15/10/2013", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::Underage { min_age: MIN_AGE });
    let err = date_of_birth("date of birth", "2001-02-03", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::InvalidDate);
    let err = date_of_birth("date of birth", "01/01/2030", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::InvalidDate);
  }

  #[test]
  fn test_owner_date_of_birth() {
    assert!(owner_date_of_birth("owner date of birth", "2008-10-14", today()).is_ok());
    let err = owner_date_of_birth("owner date of birth", "2008-10-15", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::Underage { min_age: MIN_OWNER_AGE });
    assert_eq!(err.to_string(), "you must be at least 18 years old");
    let err = owner_date_of_birth("owner date of birth", "1920-01-01", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::InvalidDate);
    let err = owner_date_of_birth("owner date of birth", "14/10/1990", today()).unwrap_err();
    assert_eq!(err.kind, ValidationKind::InvalidDate);
  }

  #[test]
  fn test_local_phone_and_personal_id() {
    assert!(local_phone_number("phone", "0901234567").is_ok());
    assert!(local_phone_number("phone", " 0901234567 ").is_ok());
    assert!(local_phone_number("phone", "901234567").is_err());
    assert!(local_phone_number("phone", "+84901234567").is_err());
    assert!(local_phone_number("phone", "09012345678").is_err());

    assert!(personal_id("personal ID", "123456789").is_ok());
    assert!(personal_id("personal ID", "123456789012").is_ok());
    assert!(personal_id("personal ID", "12345678").is_err());
    assert!(personal_id("personal ID", "1234567890123").is_err());
    assert_eq!(
      personal_id("personal ID", "12345678a").unwrap_err().to_string(),
      "personal ID must be 9-12 digits"
    );
  }

  #[test]
  fn test_accepted() {
    assert!(accepted("terms and conditions", true).is_ok());
    assert_eq!(
      accepted("terms and conditions", false).unwrap_err().to_string(),
      "you must accept the terms and conditions"
    );
  }

  #[test]
  fn test_phone_number() {
    assert!(phone_number("phone", "+84 912-345-678").is_ok());
    assert!(phone_number("phone", "0912.345.678").is_ok());
    assert!(phone_number("phone", "12345").is_err());
    assert!(phone_number("phone", "09123abc78").is_err());
  }
}
