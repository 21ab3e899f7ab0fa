//! Byte source: the serial device and the thread that watches it for input.

pub mod connection;
pub mod memory;
pub mod port;
pub mod ports;

use serde::Deserialize;
use serialport::{DataBits, Parity as SpParity, StopBits};
use std::fmt;

pub use connection::{Connection, PortSlot, on_data_available};
pub use port::RawPort;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
  #[error("failed to open {port}: {source}")]
  Open {
    port: String,
    #[source]
    source: serialport::Error,
  },
  #[error("failed to list serial ports: {0}")]
  Enumerate(#[source] serialport::Error),
  #[error("read failed: {0}")]
  Read(#[source] std::io::Error),
  #[error("write failed: {0}")]
  Write(#[source] std::io::Error),
  #[error("port is not open")]
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
  #[default]
  None,
  Odd,
  Even,
}

impl Parity {
  fn letter(self) -> char {
    match self {
      Parity::None => 'N',
      Parity::Odd => 'O',
      Parity::Even => 'E',
    }
  }
}

/// Everything needed to open a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialParams {
  pub port: String,
  pub baud_rate: u32,
  pub data_bits: u8,
  pub parity: Parity,
  pub stop_bits: u8,
}

impl SerialParams {
  /// 8N1 at `baud_rate`.
  #[must_use]
  pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
    Self {
      port: port.into(),
      baud_rate,
      data_bits: 8,
      parity: Parity::None,
      stop_bits: 1,
    }
  }
}

impl fmt::Display for SerialParams {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} @ {} {}{}{}",
      self.port,
      self.baud_rate,
      self.data_bits,
      self.parity.letter(),
      self.stop_bits
    )
  }
}

pub(crate) fn to_serialport_parity(p: Parity) -> SpParity {
  match p {
    Parity::None => SpParity::None,
    Parity::Odd => SpParity::Odd,
    Parity::Even => SpParity::Even,
  }
}

pub(crate) fn to_serialport_data_bits(bits: u8) -> DataBits {
  match bits {
    5 => DataBits::Five,
    6 => DataBits::Six,
    7 => DataBits::Seven,
    _ => DataBits::Eight,
  }
}

pub(crate) fn to_serialport_stop_bits(bits: u8) -> StopBits {
  match bits {
    2 => StopBits::Two,
    _ => StopBits::One,
  }
}
