//! Process-wide tracing setup.
//!
//! Events go through a non-blocking writer to stderr, or to a log file when
//! one is configured. `COURSEHUB_LOG` overrides the filter entirely.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const FILTER_ENV: &str = "COURSEHUB_LOG";

#[derive(Debug, Clone)]
pub struct LogSettings {
  pub level: LevelFilter,
  /// Filter directive from the config file; wins over `level`
  pub directive: Option<String>,
  pub file: Option<PathBuf>,
}

impl Default for LogSettings {
  fn default() -> Self {
    Self {
      level: LevelFilter::WARN,
      directive: None,
      file: None,
    }
  }
}

impl LogSettings {
  /// `-v` count to level: warn, info, debug, then trace.
  pub fn from_verbosity(verbose: u8) -> Self {
    let level = match verbose {
      0 => LevelFilter::WARN,
      1 => LevelFilter::INFO,
      2 => LevelFilter::DEBUG,
      _ => LevelFilter::TRACE,
    };
    Self {
      level,
      ..Self::default()
    }
  }

  pub fn filter(&self) -> EnvFilter {
    if let Ok(filter) = std::env::var(FILTER_ENV) {
      return EnvFilter::new(filter);
    }
    match &self.directive {
      Some(directive) => EnvFilter::new(directive),
      None => EnvFilter::new(default_directive(self.level)),
    }
  }
}

/// Our crate at the requested level, dependencies at warn at most.
fn default_directive(level: LevelFilter) -> String {
  let deps = level.min(LevelFilter::WARN);
  format!("{},coursehub={}", deps, level).to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
  #[error("failed to open log file {path:?}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("failed to configure logger: {0}")]
  Configure(String),
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(settings: &LogSettings) -> Result<(), InitError> {
  if GUARD.get().is_some() {
    return Ok(());
  }

  let (writer, guard) = match &settings.file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| InitError::Io {
          path: path.clone(),
          source,
        })?;
      tracing_appender::non_blocking(file)
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(settings.filter())
    .with_target(settings.level >= LevelFilter::DEBUG)
    .with_ansi(settings.file.is_none())
    .with_writer(writer)
    .finish();

  tracing::subscriber::set_global_default(subscriber).map_err(|err| InitError::Configure(err.to_string()))?;
  let _ = GUARD.set(guard);
  Ok(())
}
