use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use super::envelope::{ApiEnvelope, Decoded};
use crate::error::SyncError;

/// Total assumed when a paged endpoint omits `x-total-count`.
pub const DEFAULT_TOTAL_COUNT: u64 = 100;
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// HTTP client for one backend.
///
/// Cheap to clone. The bearer token, if any, is attached to every request.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
    let mut base = Url::parse(base_url).map_err(|e| eyre!("Invalid API url {}: {}", base_url, e))?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let mut headers = HeaderMap::new();
    if let Some(token) = token {
      let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| eyre!("Invalid API token: {}", e))?;
      value.set_sensitive(true);
      headers.insert(AUTHORIZATION, value);
    }

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .user_agent(concat!("coursehub/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SyncError> {
    let url = self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| SyncError::transient(format!("invalid request path {}: {}", path, e)))?;
    trace!(%method, %url, "api request");
    Ok(self.http.request(method, url))
  }

  /// Send and map non-success statuses into the error taxonomy.
  async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SyncError> {
    let response = request.send().await.map_err(SyncError::from_reqwest)?;
    let status = response.status();
    debug!(status = status.as_u16(), url = %response.url(), "api response");
    if status.is_success() {
      return Ok(response);
    }

    let path = response.url().path().to_string();
    match status {
      StatusCode::UNAUTHORIZED => Err(SyncError::Unauthorized),
      StatusCode::NOT_FOUND => Err(SyncError::not_found(path)),
      _ => {
        // Prefer the server's own message when it sent an envelope
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ApiEnvelope<serde::de::IgnoredAny>>(&body)
          .ok()
          .and_then(|e| e.error_messages.into_iter().next())
          .unwrap_or_else(|| format!("{} {}", status, path));
        Err(SyncError::Transient {
          status: Some(status.as_u16()),
          message,
        })
      }
    }
  }

  async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>, SyncError> {
    let body = response.bytes().await.map_err(SyncError::from_reqwest)?;
    if body.iter().all(u8::is_ascii_whitespace) {
      return Ok(None);
    }
    serde_json::from_slice::<Decoded<T>>(&body)
      .map_err(SyncError::decode)?
      .into_result()
  }

  async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>, SyncError> {
    let response = self.send(request).await?;
    Self::decode(response).await
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SyncError> {
    self.call(self.request(Method::GET, path)?).await
  }

  pub async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<Option<T>, SyncError>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    self.call(self.request(Method::GET, path)?.query(query)).await
  }

  /// Legacy paged listing: a bare array plus the total in `x-total-count`.
  pub async fn get_paged<T, Q>(&self, path: &str, query: &Q) -> Result<(Vec<T>, u64), SyncError>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    let response = self.send(self.request(Method::GET, path)?.query(query)).await?;
    let total = response
      .headers()
      .get(TOTAL_COUNT_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse::<u64>().ok())
      .unwrap_or(DEFAULT_TOTAL_COUNT);
    let items = Self::decode::<Vec<T>>(response).await?.unwrap_or_default();
    Ok((items, total))
  }

  pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, SyncError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.call(self.request(Method::POST, path)?.json(body)).await
  }

  pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, SyncError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.call(self.request(Method::PUT, path)?.json(body)).await
  }

  pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, SyncError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.call(self.request(Method::PATCH, path)?.json(body)).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SyncError> {
    self.call(self.request(Method::DELETE, path)?).await
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient").field("base", &self.base.as_str()).finish()
  }
}
