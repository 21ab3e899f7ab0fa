use crate::device::{
  DeviceError, SerialParams, to_serialport_data_bits, to_serialport_parity,
  to_serialport_stop_bits,
};
use serialport::{FlowControl, SerialPort};
use std::io;
use std::time::Duration;

/// Read timeout for the driver. Reads only ask for bytes the driver already
/// reported, so this only matters if the device vanishes mid-read.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Minimal driver surface the connection needs.
pub trait RawPort: Send {
  /// Number of bytes waiting in the driver's receive buffer.
  ///
  /// # Errors
  /// Returns an error when the driver cannot be queried (e.g. unplugged).
  fn bytes_to_read(&mut self) -> io::Result<usize>;

  /// # Errors
  /// Returns the driver's read error.
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

  /// Write all of `bytes` and flush.
  ///
  /// # Errors
  /// Returns the driver's write error.
  fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

  /// Read everything the driver currently holds without waiting for more.
  ///
  /// # Errors
  /// Returns the driver's error; a timeout ends the read with what was read.
  fn read_available(&mut self) -> io::Result<Vec<u8>> {
    let available = self.bytes_to_read()?;
    if available == 0 {
      return Ok(Vec::new());
    }
    let mut buf = vec![0_u8; available];
    let mut filled = 0;
    while filled < available {
      match self.read(&mut buf[filled..]) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(err) if err.kind() == io::ErrorKind::TimedOut => break,
        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
        Err(err) => return Err(err),
      }
    }
    buf.truncate(filled);
    Ok(buf)
  }
}

impl RawPort for Box<dyn SerialPort> {
  fn bytes_to_read(&mut self) -> io::Result<usize> {
    let count = SerialPort::bytes_to_read(self.as_ref()).map_err(io::Error::from)?;
    Ok(usize::try_from(count).unwrap_or(usize::MAX))
  }

  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    io::Read::read(self.as_mut(), buf)
  }

  fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
    io::Write::write_all(self.as_mut(), bytes)?;
    io::Write::flush(self.as_mut())
  }
}

/// Open the serial device described by `params`.
///
/// # Errors
/// Returns `DeviceError::Open` when the port is missing, busy, or rejects the
/// parameters.
pub fn open(params: &SerialParams) -> Result<Box<dyn SerialPort>, DeviceError> {
  serialport::new(&params.port, params.baud_rate)
    .data_bits(to_serialport_data_bits(params.data_bits))
    .parity(to_serialport_parity(params.parity))
    .stop_bits(to_serialport_stop_bits(params.stop_bits))
    .flow_control(FlowControl::None)
    .timeout(READ_TIMEOUT)
    .open()
    .map_err(|source| DeviceError::Open {
      port: params.port.clone(),
      source,
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;

  /// Driver that returns at most `step` bytes per read, like a real UART.
  struct Trickle {
    data: VecDeque<u8>,
    step: usize,
  }

  impl RawPort for Trickle {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
      Ok(self.data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
      let n = buf.len().min(self.step).min(self.data.len());
      for slot in buf.iter_mut().take(n) {
        *slot = self.data.pop_front().unwrap_or_default();
      }
      Ok(n)
    }

    fn write_all(&mut self, _bytes: &[u8]) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn read_available_collects_everything_reported() {
    let mut port = Trickle {
      data: b"hello world".iter().copied().collect(),
      step: 3,
    };
    assert_eq!(port.read_available().unwrap(), b"hello world".to_vec());
    assert!(port.read_available().unwrap().is_empty());
  }

  #[test]
  fn open_missing_port_is_an_open_error() {
    let params = SerialParams::new("/dev/uartterm-does-not-exist", 9600);
    match open(&params) {
      Err(DeviceError::Open { port, .. }) => assert_eq!(port, "/dev/uartterm-does-not-exist"),
      Err(other) => panic!("unexpected error: {other}"),
      Ok(_) => panic!("opening a missing port should fail"),
    }
  }
}
