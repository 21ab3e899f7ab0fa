use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::config::{STANDARD_BAUD_RATES, TermConfig, load_config};
use crate::device::ports::default_port;
use crate::device::{Parity, SerialParams};
use crate::log_warn;
use crate::tui;

/// Serial settings given on the command line. Unset flags keep the
/// configured values.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectArgs {
  /// Serial port to open [default: $UARTTERM_PORT, serial.port, then the first detected port]
  #[arg(short, long)]
  pub port: Option<String>,
  /// Baud rate
  #[arg(short, long)]
  pub baud: Option<u32>,
  /// Data bits per character
  #[arg(long, value_parser = clap::value_parser!(u8).range(5..=8))]
  pub data_bits: Option<u8>,
  #[arg(long, value_enum)]
  pub parity: Option<Parity>,
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
  pub stop_bits: Option<u8>,
  /// Append the send suffix to every line sent
  #[arg(long, overrides_with = "no_suffix")]
  pub suffix: bool,
  /// Send lines without the suffix
  #[arg(long, overrides_with = "suffix")]
  pub no_suffix: bool,
}

impl ConnectArgs {
  /// Layer the flags over `cfg`.
  pub fn apply(&self, cfg: &mut TermConfig) {
    if let Some(port) = &self.port {
      cfg.serial.port = Some(port.clone());
    }
    if let Some(baud) = self.baud {
      cfg.serial.baud_rate = baud;
    }
    if let Some(bits) = self.data_bits {
      cfg.serial.data_bits = bits;
    }
    if let Some(parity) = self.parity {
      cfg.serial.parity = parity;
    }
    if let Some(bits) = self.stop_bits {
      cfg.serial.stop_bits = bits;
    }
    if self.suffix {
      cfg.send.append_suffix = true;
    } else if self.no_suffix {
      cfg.send.append_suffix = false;
    }
  }
}

/// Pick the port: `--port`, then `UARTTERM_PORT` or `serial.port`, then the
/// first port the system reports.
///
/// # Errors
/// Returns an error if no port is configured and none can be found.
pub fn resolve_port(args: &ConnectArgs, cfg: &TermConfig) -> Result<String> {
  if let Some(port) = &args.port {
    return Ok(port.clone());
  }
  if let Some(port) = cfg.configured_port() {
    return Ok(port);
  }
  default_port()?
    .ok_or_else(|| anyhow::anyhow!("no serial ports found; pass --port or set UARTTERM_PORT"))
}

/// Build the open parameters from the merged configuration.
#[must_use]
pub fn serial_params(port: String, cfg: &TermConfig) -> SerialParams {
  SerialParams {
    port,
    baud_rate: cfg.serial.baud_rate,
    data_bits: cfg.serial.data_bits,
    parity: cfg.serial.parity,
    stop_bits: cfg.serial.stop_bits,
  }
}

pub fn run(cwd: &Path, args: &ConnectArgs) -> Result<()> {
  let mut cfg = load_config(cwd)?;
  args.apply(&mut cfg);
  cfg.validate()?;

  if !cfg.is_standard_baud() {
    let standard: Vec<String> = STANDARD_BAUD_RATES.iter().map(ToString::to_string).collect();
    log_warn!(
      "{} baud is not a standard rate ({}); the adapter may not support it",
      cfg.serial.baud_rate,
      standard.join(", ")
    );
  }

  let port = resolve_port(args, &cfg)?;
  tui::run(&cfg, serial_params(port, &cfg))
}
