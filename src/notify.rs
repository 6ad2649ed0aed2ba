//! User-facing notifications raised by mutations.

#[cfg(test)]
use std::sync::Mutex;

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Success,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub level: Level,
  pub title: String,
  pub message: String,
}

impl Notification {
  pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      level: Level::Success,
      title: title.into(),
      message: message.into(),
    }
  }

  pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      level: Level::Error,
      title: title.into(),
      message: message.into(),
    }
  }
}

/// Where notifications go (an alert dialog, a status line, stderr).
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, n: Notification) {
    match n.level {
      Level::Success => info!(title = %n.title, "{}", n.message),
      Level::Error => error!(title = %n.title, "{}", n.message),
    }
  }
}

/// Prints notifications for the terminal user.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn notify(&self, n: Notification) {
    match n.level {
      Level::Success => println!("✔ {}: {}", n.title, n.message),
      Level::Error => eprintln!("✘ {}: {}", n.title, n.message),
    }
  }
}

/// Keeps every notification in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
  seen: Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
  pub fn take(&self) -> Vec<Notification> {
    std::mem::take(&mut *self.seen.lock().unwrap_or_else(|e| e.into_inner()))
  }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
  fn notify(&self, notification: Notification) {
    self
      .seen
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(notification);
  }
}
