//! Query identities and filters used to address cache slots.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Composite key of a cached read: a resource token plus ordered parameters.
///
/// Two identities are equal iff the token and every parameter are deep-equal.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryIdentity {
  token: String,
  params: Vec<Value>,
}

impl QueryIdentity {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
      params: Vec::new(),
    }
  }

  /// Append one parameter.
  pub fn with(mut self, param: impl Into<Value>) -> Self {
    self.params.push(param.into());
    self
  }

  pub fn token(&self) -> &str {
    &self.token
  }

  pub fn params(&self) -> &[Value] {
    &self.params
  }

  /// True if `self` addresses `other` or one of its descendants,
  /// e.g. `posts` is a prefix of `posts/detail/5`.
  pub fn is_prefix_of(&self, other: &QueryIdentity) -> bool {
    self.token == other.token
      && self.params.len() <= other.params.len()
      && self.params.iter().zip(&other.params).all(|(a, b)| a == b)
  }

  /// Canonical rendering; object keys are sorted so deep-equal parameters
  /// always render identically.
  fn canonical(&self) -> String {
    let mut out = self.token.clone();
    for param in &self.params {
      out.push('\u{1f}');
      write_canonical(param, &mut out);
    }
    out
  }

  /// Stable hex digest, used as a compact log field.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
  }

  /// Human-readable form, e.g. `posts/detail/5`.
  pub fn description(&self) -> String {
    let mut out = self.token.clone();
    for param in &self.params {
      out.push('/');
      match param {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
      }
    }
    out
  }
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key], out);
      }
      out.push('}');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

impl Hash for QueryIdentity {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.canonical().hash(state);
  }
}

impl fmt::Debug for QueryIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "QueryIdentity({})", self.description())
  }
}

impl fmt::Display for QueryIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.description())
  }
}

/// Selects one or more cache entries.
#[derive(Clone)]
pub enum QueryFilter {
  /// Exactly this identity
  Exact(QueryIdentity),
  /// This identity and everything beneath it
  Prefix(QueryIdentity),
  /// Arbitrary predicate over identities
  Predicate(Arc<dyn Fn(&QueryIdentity) -> bool + Send + Sync>),
}

impl QueryFilter {
  pub fn predicate<F>(f: F) -> Self
  where
    F: Fn(&QueryIdentity) -> bool + Send + Sync + 'static,
  {
    Self::Predicate(Arc::new(f))
  }

  /// Every query whose resource token equals `token`.
  pub fn token(token: &'static str) -> Self {
    Self::predicate(move |id| id.token() == token)
  }

  pub fn matches(&self, id: &QueryIdentity) -> bool {
    match self {
      Self::Exact(target) => target == id,
      Self::Prefix(prefix) => prefix.is_prefix_of(id),
      Self::Predicate(f) => f(id),
    }
  }

  /// The identity named by an exact filter, if any.
  pub fn exact(&self) -> Option<&QueryIdentity> {
    match self {
      Self::Exact(id) => Some(id),
      _ => None,
    }
  }
}

impl From<QueryIdentity> for QueryFilter {
  fn from(id: QueryIdentity) -> Self {
    Self::Exact(id)
  }
}

impl fmt::Debug for QueryFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Exact(id) => write!(f, "Exact({})", id),
      Self::Prefix(id) => write!(f, "Prefix({})", id),
      Self::Predicate(_) => f.write_str("Predicate(..)"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashSet;

  #[test]
  fn test_deep_equality() {
    let a = QueryIdentity::new("products").with(json!({"page": 1, "search": "rust"}));
    let b = QueryIdentity::new("products").with(json!({"search": "rust", "page": 1}));
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert_eq!(a.fingerprint(), b.fingerprint());
  }

  #[test]
  fn test_different_params_differ() {
    let a = QueryIdentity::new("posts").with("detail").with(5);
    let b = QueryIdentity::new("posts").with("detail").with("5");
    assert_ne!(a, b);
  }

  #[test]
  fn test_prefix_matching() {
    let all = QueryIdentity::new("posts");
    let lists = QueryIdentity::new("posts").with("list");
    let detail = QueryIdentity::new("posts").with("detail").with(5);

    assert!(all.is_prefix_of(&lists));
    assert!(all.is_prefix_of(&detail));
    assert!(lists.is_prefix_of(&lists));
    assert!(!lists.is_prefix_of(&detail));
    assert!(!detail.is_prefix_of(&all));
  }

  #[test]
  fn test_filters() {
    let detail = QueryIdentity::new("posts").with("detail").with(5);
    assert!(QueryFilter::token("posts").matches(&detail));
    assert!(!QueryFilter::token("cart").matches(&detail));
    assert!(QueryFilter::Prefix(QueryIdentity::new("posts").with("detail")).matches(&detail));
    assert!(!QueryFilter::Exact(QueryIdentity::new("posts")).matches(&detail));
  }

  #[test]
  fn test_description() {
    let detail = QueryIdentity::new("posts").with("detail").with(5);
    assert_eq!(detail.description(), "posts/detail/5");
  }
}
