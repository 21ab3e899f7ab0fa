use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::Parity;
use crate::pipeline::PumpSettings;
use anyhow::{Context, Result};
use owo_colors::OwoColorize as _;
use serde::Deserialize;
use toml::Value as TomlValue;

/// Known keys per section. Top-level keys are the section names.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
  ("serial", &["port", "baud_rate", "data_bits", "parity", "stop_bits"]),
  (
    "pump",
    &["flush_threshold", "idle_interval_ms", "stop_grace_ms", "flush_on_stop"],
  ),
  ("send", &["suffix", "append_suffix", "echo_prefix"]),
  ("view", &["max_lines"]),
];

/// Baud rates most UART bridges and firmware consoles use.
pub const STANDARD_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115_200];

/// Environment variable naming the port, between the CLI flag and config files.
pub const PORT_ENV: &str = "UARTTERM_PORT";

// Embed repository defaults
const DEFAULT_TOML: &str =
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/defaults/uartterm.toml"));

/// Name of the per-directory config file.
pub const PROJECT_CONFIG_FILE: &str = ".uartterm.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
  pub port: Option<String>,
  pub baud_rate: u32,
  pub data_bits: u8,
  pub parity: Parity,
  pub stop_bits: u8,
}

impl Default for SerialConfig {
  fn default() -> Self {
    Self {
      port: None,
      baud_rate: 115_200,
      data_bits: 8,
      parity: Parity::None,
      stop_bits: 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
  pub flush_threshold: usize,
  pub idle_interval_ms: u64,
  pub stop_grace_ms: u64,
  /// Flush a partial batch on disconnect instead of dropping it.
  pub flush_on_stop: bool,
}

impl Default for PumpConfig {
  fn default() -> Self {
    Self {
      flush_threshold: 10,
      idle_interval_ms: 10,
      stop_grace_ms: 1000,
      flush_on_stop: false,
    }
  }
}

impl PumpConfig {
  #[must_use]
  pub fn settings(&self) -> PumpSettings {
    PumpSettings {
      flush_threshold: self.flush_threshold,
      idle_interval: Duration::from_millis(self.idle_interval_ms),
      flush_on_stop: self.flush_on_stop,
    }
  }

  #[must_use]
  pub fn stop_grace(&self) -> Duration {
    Duration::from_millis(self.stop_grace_ms)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SendConfig {
  /// Literal marker appended to outgoing text. Not translated to CR/LF.
  pub suffix: String,
  pub append_suffix: bool,
  /// Prefix for sent text echoed into the receive view.
  pub echo_prefix: String,
}

impl Default for SendConfig {
  fn default() -> Self {
    Self {
      suffix: "<CL><RF>".to_string(),
      append_suffix: false,
      echo_prefix: "[SENT] ".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
  /// Lines kept in the receive view before the oldest are dropped.
  pub max_lines: usize,
}

impl Default for ViewConfig {
  fn default() -> Self {
    Self { max_lines: 10_000 }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TermConfig {
  #[serde(default)]
  pub serial: SerialConfig,
  #[serde(default)]
  pub pump: PumpConfig,
  #[serde(default)]
  pub send: SendConfig,
  #[serde(default)]
  pub view: ViewConfig,
}

impl TermConfig {
  /// Reject values the pipeline or the driver cannot work with.
  ///
  /// # Errors
  /// Returns an error describing the first invalid value.
  pub fn validate(&self) -> Result<()> {
    if self.serial.baud_rate == 0 {
      anyhow::bail!("serial.baud_rate must be greater than 0");
    }
    if !(5..=8).contains(&self.serial.data_bits) {
      anyhow::bail!(
        "serial.data_bits must be between 5 and 8, got {}",
        self.serial.data_bits
      );
    }
    if !matches!(self.serial.stop_bits, 1 | 2) {
      anyhow::bail!("serial.stop_bits must be 1 or 2, got {}", self.serial.stop_bits);
    }
    if self.pump.flush_threshold == 0 {
      anyhow::bail!("pump.flush_threshold must be at least 1");
    }
    if self.pump.idle_interval_ms == 0 {
      anyhow::bail!("pump.idle_interval_ms must be at least 1");
    }
    if self.view.max_lines == 0 {
      anyhow::bail!("view.max_lines must be at least 1");
    }
    Ok(())
  }

  /// Port to use when none is given on the command line: `UARTTERM_PORT`,
  /// then `serial.port`.
  #[must_use]
  pub fn configured_port(&self) -> Option<String> {
    if let Ok(port) = std::env::var(PORT_ENV)
      && !port.trim().is_empty()
    {
      return Some(port.trim().to_string());
    }
    self.serial.port.clone().filter(|p| !p.trim().is_empty())
  }

  #[must_use]
  pub fn is_standard_baud(&self) -> bool {
    STANDARD_BAUD_RATES.contains(&self.serial.baud_rate)
  }
}

/// The embedded defaults, as shipped.
#[must_use]
pub fn embedded_defaults() -> &'static str {
  DEFAULT_TOML
}

/// Resolve the global config file path.
///
/// # Errors
/// Returns an error if the XDG config home cannot be resolved.
pub fn global_config_path() -> Result<PathBuf> {
  let xdg = xdg::BaseDirectories::with_prefix("uartterm");
  let config_home = xdg
    .get_config_home()
    .ok_or_else(|| anyhow::anyhow!("unable to resolve XDG config home"))?;
  Ok(config_home.join("uartterm.toml"))
}

fn merge_values(base: &mut TomlValue, overlay: TomlValue) {
  match (base, overlay) {
    (TomlValue::Table(base_tbl), TomlValue::Table(overlay_tbl)) => {
      for (k, v) in overlay_tbl {
        match base_tbl.get_mut(&k) {
          Some(existing) => merge_values(existing, v),
          None => {
            base_tbl.insert(k, v);
          }
        }
      }
    }
    // Arrays and scalars: replace last-wins
    (base_slot, new_v) => *base_slot = new_v,
  }
}

/// Warn about unknown keys in a parsed TOML config file.
fn warn_unknown_keys(val: &TomlValue, file_path: &Path) {
  let TomlValue::Table(table) = val else {
    return;
  };
  let sections: Vec<&str> = KNOWN_KEYS.iter().map(|(name, _)| *name).collect();

  for (key, value) in table {
    let Some((_, known)) = KNOWN_KEYS.iter().find(|(name, _)| *name == key.as_str()) else {
      eprintln!(
        "{}: unknown config key '{}' in {} (did you mean one of: {}?)",
        "warning".yellow(),
        key,
        file_path.display(),
        sections.join(", ")
      );
      continue;
    };
    let TomlValue::Table(section) = value else {
      continue;
    };
    for sub in section.keys() {
      if !known.contains(&sub.as_str()) {
        eprintln!(
          "{}: unknown config key '{}.{}' in {} (known keys: {})",
          "warning".yellow(),
          key,
          sub,
          file_path.display(),
          known.join(", ")
        );
      }
    }
  }
}

fn merge_file(merged: &mut TomlValue, path: &Path) -> Result<()> {
  let data =
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let val: TomlValue =
    toml::from_str(&data).with_context(|| format!("invalid TOML in {}", path.display()))?;
  warn_unknown_keys(&val, path);
  merge_values(merged, val);
  Ok(())
}

/// Load and merge configuration from defaults, the global file and the
/// project file in `cwd`, then validate the result.
///
/// # Errors
/// Returns an error if a config file cannot be read or parsed, or if the
/// merged values are invalid.
pub fn load_config(cwd: &Path) -> Result<TermConfig> {
  // Start with embedded defaults
  let mut merged: TomlValue =
    toml::from_str(DEFAULT_TOML).context("invalid embedded default config")?;

  let xdg = xdg::BaseDirectories::with_prefix("uartterm");
  if let Some(global_path) = xdg.find_config_file("uartterm.toml") {
    merge_file(&mut merged, &global_path)?;
  }

  let project_cfg = cwd.join(PROJECT_CONFIG_FILE);
  if project_cfg.exists() {
    merge_file(&mut merged, &project_cfg)?;
  }

  // Deserialize into strongly typed config
  let merged_str = toml::to_string(&merged).context("failed to serialize merged config")?;
  let cfg: TermConfig = toml::from_str(&merged_str).context("failed to parse merged config")?;
  cfg.validate()?;
  Ok(cfg)
}
