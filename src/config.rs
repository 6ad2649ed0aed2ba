use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_GC_TIME;
use crate::query::{ClientDefaults, QueryOptions, RefetchTriggers, RetryPolicy};

pub const DEFAULT_TOKEN_ENV: &str = "COURSEHUB_TOKEN";

/// Application configuration. Every section has defaults, so an empty file
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub query: QueryConfig,
  pub mutation: MutationConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the CourseHub backend
  pub base_url: String,
  /// Base URL of the demo posts backend
  pub posts_url: String,
  /// Environment variable holding the bearer token
  pub token_env: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:5000/api/".to_string(),
      posts_url: "https://jsonplaceholder.typicode.com/".to_string(),
      token_env: DEFAULT_TOKEN_ENV.to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
  #[serde(with = "humantime_serde")]
  pub stale_time: Duration,
  /// How long unobserved entries are kept
  #[serde(with = "humantime_serde")]
  pub gc_time: Duration,
  pub retry: u32,
  pub refetch_on_mount: bool,
  pub refetch_on_focus: bool,
  pub refetch_on_reconnect: bool,
}

impl Default for QueryConfig {
  fn default() -> Self {
    let options = QueryOptions::default();
    Self {
      stale_time: options.stale_time,
      gc_time: DEFAULT_GC_TIME,
      retry: options.retry.max_retries(),
      refetch_on_mount: false,
      refetch_on_focus: false,
      refetch_on_reconnect: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
  pub retry: u32,
}

impl Default for MutationConfig {
  fn default() -> Self {
    Self { retry: 1 }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive, e.g. `info` or `coursehub=debug`
  pub level: Option<String>,
  /// Write logs here instead of stderr
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./coursehub.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/coursehub/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("coursehub.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("coursehub").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Bearer token from the configured environment variable, if set.
  pub fn api_token(&self) -> Option<String> {
    std::env::var(&self.api.token_env)
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn client_defaults(&self) -> ClientDefaults {
    let query = QueryOptions::default()
      .stale_time(self.query.stale_time)
      .retry(RetryPolicy::standard(self.query.retry))
      .refetch(RefetchTriggers {
        on_mount: self.query.refetch_on_mount,
        on_focus: self.query.refetch_on_focus,
        on_reconnect: self.query.refetch_on_reconnect,
      });
    ClientDefaults {
      query,
      gc_time: self.query.gc_time,
      mutation_retry: RetryPolicy::standard(self.mutation.retry),
      ..ClientDefaults::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.token_env, DEFAULT_TOKEN_ENV);
    assert_eq!(config.mutation.retry, 1);
    assert_eq!(config.query.gc_time, DEFAULT_GC_TIME);
    assert!(config.log.file.is_none());
  }

  #[test]
  fn test_partial_sections() {
    let config = Config::parse(
      "api:\n  base_url: https://lecom.example/api/\nquery:\n  stale_time: 90s\n  gc_time: 10m\n  refetch_on_focus: true\n",
    )
    .unwrap();
    assert_eq!(config.api.base_url, "https://lecom.example/api/");
    assert_eq!(config.api.token_env, DEFAULT_TOKEN_ENV);
    assert_eq!(config.query.stale_time, Duration::from_secs(90));

    let defaults = config.client_defaults();
    assert_eq!(defaults.query.stale_time, Duration::from_secs(90));
    assert_eq!(defaults.gc_time, Duration::from_secs(600));
    assert!(defaults.query.refetch.on_focus);
    assert!(!defaults.query.refetch.on_reconnect);
    assert_eq!(defaults.mutation_retry.max_retries(), 1);
  }

  #[test]
  fn test_unknown_duration_is_an_error() {
    assert!(Config::parse("query:\n  stale_time: soon\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/coursehub.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
