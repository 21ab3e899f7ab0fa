/// Token styling helpers.
///
/// The `t` module stands for "tokens". Use these helpers to style
/// specific values inside info messages consistently across the CLI.
pub mod t {
  use std::fmt::Display;

  use owo_colors::OwoColorize as _;

  pub fn port(value: impl Display) -> String {
    format!("{}", value.to_string().cyan())
  }

  pub fn ok(s: impl Display) -> String {
    format!("{}", s.to_string().green())
  }

  pub fn warn(s: impl Display) -> String {
    format!("{}", s.to_string().yellow())
  }

  pub fn err(s: impl Display) -> String {
    format!("{}", s.to_string().red())
  }
}

// Routed user-facing messages: when a sink is set, macros emit events to it
// (the TUI status line); otherwise they print.
// info = neutral, success/warn/error = full-line tint.
// Use `t::*` helpers to highlight tokens in info messages only.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
  Info,
  Success,
  Warn,
  Error,
}

/// A single user-facing line, with ANSI styling preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
  pub level: LogLevel,
  pub ansi: String,
}

static SINK: Mutex<Option<Sender<LogEvent>>> = Mutex::new(None);

pub fn set_log_sink(sender: Sender<LogEvent>) {
  *SINK.lock() = Some(sender);
}

pub fn clear_log_sink() {
  *SINK.lock() = None;
}

/// Returns true when a TUI log sink is currently registered
pub fn is_sink_set() -> bool {
  SINK.lock().is_some()
}

pub fn emit(level: LogLevel, text: String) {
  if let Some(tx) = SINK.lock().clone() {
    let _ = tx.send(LogEvent { level, ansi: text });
  } else {
    match level {
      LogLevel::Info | LogLevel::Success | LogLevel::Warn => anstream::println!("{}", text),
      LogLevel::Error => anstream::eprintln!("{}", text),
    }
  }
}

#[macro_export]
macro_rules! log_info {
  ($fmt:literal $(, $args:expr )* $(,)?) => {{
    $crate::utils::log::emit(
      $crate::utils::log::LogLevel::Info,
      format!($fmt $(, $args )*)
    );
  }};
}

#[macro_export]
macro_rules! log_success {
  ($fmt:literal $(, $args:expr )* $(,)?) => {{
    $crate::utils::log::emit(
      $crate::utils::log::LogLevel::Success,
      $crate::utils::log::t::ok(format!($fmt $(, $args )*))
    );
  }};
}

#[macro_export]
macro_rules! log_warn {
  ($fmt:literal $(, $args:expr )* $(,)?) => {{
    $crate::utils::log::emit(
      $crate::utils::log::LogLevel::Warn,
      $crate::utils::log::t::warn(format!($fmt $(, $args )*))
    );
  }};
}

#[macro_export]
macro_rules! log_error {
  ($fmt:literal $(, $args:expr )* $(,)?) => {{
    $crate::utils::log::emit(
      $crate::utils::log::LogLevel::Error,
      $crate::utils::log::t::err(format!($fmt $(, $args )*))
    );
  }};
}

fn logger_builder() -> env_logger::Builder {
  let mut builder =
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
  builder.format_timestamp_millis();
  builder
}

/// Diagnostics to stderr, for commands that do not take over the terminal.
pub fn init_stderr_logger() {
  let _ = logger_builder().try_init();
}

/// Path of the diagnostics file used while the TUI owns the terminal.
///
/// # Errors
/// Returns an error if the XDG state home cannot be resolved.
pub fn state_log_path() -> Result<PathBuf> {
  let xdg = xdg::BaseDirectories::with_prefix("uartterm");
  let state_home = xdg
    .get_state_home()
    .ok_or_else(|| anyhow::anyhow!("unable to resolve XDG state home"))?;
  Ok(state_home.join("uartterm.log"))
}

/// Diagnostics appended to the state log file. Returns the file path.
///
/// # Errors
/// Returns an error if the log file cannot be created.
pub fn init_file_logger() -> Result<PathBuf> {
  let path = state_log_path()?;
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(&path)
    .with_context(|| format!("failed to open {}", path.display()))?;
  let _ = logger_builder()
    .target(env_logger::Target::Pipe(Box::new(file)))
    .write_style(env_logger::WriteStyle::Never)
    .try_init();
  Ok(path)
}
