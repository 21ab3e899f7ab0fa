//! Open device handle and its receive notifications.
//!
//! The serial driver has no receive callback, so the connection runs a
//! watcher thread that polls the driver's pending-byte counter and invokes
//! the registered callback whenever it is non-zero. The port itself sits in
//! a [`PortSlot`] shared by the watcher, the write path and the owner; each
//! use checks that the port is still present, since `close` can race with
//! both.

use crate::device::{DeviceError, RawPort, SerialParams, port};
use crate::pipeline::InboundQueue;
use log::{debug, info};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

pub struct PortSlot {
  name: String,
  port: Mutex<Option<Box<dyn RawPort>>>,
}

impl PortSlot {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn is_open(&self) -> bool {
    self.port.lock().is_some()
  }

  /// Read all bytes the driver holds right now. Returns an empty vector if
  /// there are none.
  ///
  /// # Errors
  /// `DeviceError::Closed` after `close`, `DeviceError::Read` on driver errors.
  pub fn read_available(&self) -> Result<Vec<u8>, DeviceError> {
    let mut guard = self.port.lock();
    let port = guard.as_mut().ok_or(DeviceError::Closed)?;
    port.read_available().map_err(DeviceError::Read)
  }

  /// # Errors
  /// `DeviceError::Closed` after `close`, `DeviceError::Write` on driver errors.
  pub fn write(&self, bytes: &[u8]) -> Result<(), DeviceError> {
    let mut guard = self.port.lock();
    let port = guard.as_mut().ok_or(DeviceError::Closed)?;
    port.write_all(bytes).map_err(DeviceError::Write)
  }

  /// `Some(true)` when bytes are waiting, `None` once the port is closed.
  fn poll_readable(&self) -> Option<io::Result<bool>> {
    let mut guard = self.port.lock();
    let port = guard.as_mut()?;
    Some(port.bytes_to_read().map(|n| n > 0))
  }
}

struct Watcher {
  stop: Arc<AtomicBool>,
  thread: JoinHandle<()>,
}

pub struct Connection {
  slot: Arc<PortSlot>,
  watcher: Option<Watcher>,
}

impl std::fmt::Debug for Connection {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Connection")
      .field("port", &self.slot.name)
      .field("open", &self.is_open())
      .field("watching", &self.watcher.is_some())
      .finish()
  }
}

impl Connection {
  /// Open the serial device.
  ///
  /// # Errors
  /// Returns `DeviceError::Open` if the driver refuses the port or parameters.
  pub fn open(params: &SerialParams) -> Result<Self, DeviceError> {
    let port = port::open(params)?;
    info!("opened {params}");
    Ok(Self::from_port(params.port.clone(), Box::new(port)))
  }

  /// Wrap an already open port.
  #[must_use]
  pub fn from_port(name: impl Into<String>, port: Box<dyn RawPort>) -> Self {
    Self {
      slot: Arc::new(PortSlot {
        name: name.into(),
        port: Mutex::new(Some(port)),
      }),
      watcher: None,
    }
  }

  #[must_use]
  pub fn name(&self) -> &str {
    self.slot.name()
  }

  #[must_use]
  pub fn is_open(&self) -> bool {
    self.slot.is_open()
  }

  /// # Errors
  /// See [`PortSlot::read_available`].
  pub fn read_available(&self) -> Result<Vec<u8>, DeviceError> {
    self.slot.read_available()
  }

  /// # Errors
  /// See [`PortSlot::write`].
  pub fn write(&self, bytes: &[u8]) -> Result<(), DeviceError> {
    self.slot.write(bytes)
  }

  /// Invoke `callback` from the watcher thread whenever the driver reports
  /// unread bytes. Replaces any earlier registration.
  ///
  /// # Errors
  /// Returns an error if the watcher thread cannot be spawned.
  pub fn on_receivable<F>(&mut self, callback: F) -> io::Result<()>
  where
    F: FnMut(&PortSlot) + Send + 'static,
  {
    self.stop_watcher();
    let stop = Arc::new(AtomicBool::new(false));
    let slot = self.slot.clone();
    let stop_flag = stop.clone();
    let thread = thread::Builder::new()
      .name("uart-watch".to_string())
      .spawn(move || watch(&slot, &stop_flag, callback))?;
    self.watcher = Some(Watcher { stop, thread });
    Ok(())
  }

  /// Forward every receive notification into `queue`.
  ///
  /// # Errors
  /// Returns an error if the watcher thread cannot be spawned.
  pub fn forward_to(&mut self, queue: InboundQueue) -> io::Result<()> {
    self.on_receivable(move |slot| on_data_available(slot, &queue))
  }

  /// Stop notifications and release the port. Safe to call repeatedly.
  pub fn close(&mut self) {
    self.stop_watcher();
    if self.slot.port.lock().take().is_some() {
      info!("closed {}", self.slot.name);
    }
  }

  fn stop_watcher(&mut self) {
    if let Some(watcher) = self.watcher.take() {
      watcher.stop.store(true, Ordering::Relaxed);
      let _ = watcher.thread.join();
    }
  }
}

impl Drop for Connection {
  fn drop(&mut self) {
    self.close();
  }
}

fn watch<F>(slot: &PortSlot, stop: &AtomicBool, mut callback: F)
where
  F: FnMut(&PortSlot),
{
  let mut failing = false;
  while !stop.load(Ordering::Relaxed) {
    match slot.poll_readable() {
      None => break,
      Some(Ok(true)) => {
        failing = false;
        callback(slot);
      }
      Some(Ok(false)) => failing = false,
      Some(Err(err)) => {
        if !failing {
          debug!("polling {} failed: {err}", slot.name);
        }
        failing = true;
      }
    }
    thread::sleep(POLL_INTERVAL);
  }
}

/// Receive notification handler: read everything available and queue it as
/// one chunk.
///
/// Read errors are dropped here; a device that disappears is dealt with by
/// the session when the user disconnects or a write fails.
pub fn on_data_available(slot: &PortSlot, queue: &InboundQueue) {
  match slot.read_available() {
    Ok(bytes) if !bytes.is_empty() => queue.enqueue(bytes),
    Ok(_) => {}
    Err(err) => debug!("ignoring read error on {}: {err}", slot.name),
  }
}
