//! In-memory port for exercising the pipeline without hardware.

use crate::device::RawPort;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Wire {
  incoming: VecDeque<u8>,
  written: Vec<u8>,
  fail_reads: usize,
  fail_writes: bool,
}

/// Port half handed to the connection.
#[derive(Debug)]
pub struct MemoryPort {
  wire: Arc<Mutex<Wire>>,
}

/// Test-side half: plays the device.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
  wire: Arc<Mutex<Wire>>,
}

impl MemoryPort {
  #[must_use]
  pub fn pair() -> (MemoryPort, MemoryRemote) {
    let wire = Arc::new(Mutex::new(Wire::default()));
    (
      MemoryPort { wire: wire.clone() },
      MemoryRemote { wire },
    )
  }
}

impl MemoryRemote {
  /// Make `bytes` available to the next read.
  pub fn feed(&self, bytes: &[u8]) {
    self.wire.lock().incoming.extend(bytes);
  }

  /// Everything the host has written so far.
  #[must_use]
  pub fn written(&self) -> Vec<u8> {
    self.wire.lock().written.clone()
  }

  /// Fail the next `count` reads. The bytes stay queued for a later read.
  pub fn fail_reads(&self, count: usize) {
    self.wire.lock().fail_reads = count;
  }

  pub fn fail_writes(&self, fail: bool) {
    self.wire.lock().fail_writes = fail;
  }

  #[must_use]
  pub fn unread(&self) -> usize {
    self.wire.lock().incoming.len()
  }
}

impl RawPort for MemoryPort {
  fn bytes_to_read(&mut self) -> io::Result<usize> {
    Ok(self.wire.lock().incoming.len())
  }

  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let mut wire = self.wire.lock();
    if wire.fail_reads > 0 {
      wire.fail_reads -= 1;
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated read failure"));
    }
    let n = buf.len().min(wire.incoming.len());
    for (slot, byte) in buf.iter_mut().zip(wire.incoming.drain(..n)) {
      *slot = byte;
    }
    Ok(n)
  }

  fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
    let mut wire = self.wire.lock();
    if wire.fail_writes {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure"));
    }
    wire.written.extend_from_slice(bytes);
    Ok(())
  }
}
