use anyhow::Result;

use crate::device::ports::{PortInfo, list_ports};
use crate::log_info;
use crate::utils::log::t;
use crate::utils::term::print_table;

pub fn run() -> Result<()> {
  let ports = list_ports()?;
  if ports.is_empty() {
    log_info!("No serial ports found");
    return Ok(());
  }
  print_table(&["PORT", "TYPE", "DESCRIPTION"], &rows(&ports));
  Ok(())
}

fn rows(ports: &[PortInfo]) -> Vec<Vec<String>> {
  ports
    .iter()
    .map(|p| vec![t::port(&p.name), p.kind.to_string(), p.description.clone()])
    .collect()
}
