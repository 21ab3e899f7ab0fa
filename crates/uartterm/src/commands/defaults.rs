use std::io::{self, Write};

use anyhow::Result;

use crate::config::embedded_defaults;
use crate::log_info;

pub fn run() -> Result<()> {
  log_info!("Embedded uartterm defaults (read-only)");
  let mut stdout = io::stdout().lock();
  writeln!(stdout, "{}", embedded_defaults())?;
  Ok(())
}
