//! Connection lifecycle: owns the device handle, the inbound queue and the
//! pump, and sequences them.
//!
//! Connect opens the device, routes its notifications into the queue and
//! starts the pump. Teardown always stops the pump first (bounded by the
//! configured grace period) and closes the device second. Teardown runs for
//! an explicit disconnect, for a failed connect, and on drop.

use crate::config::{SendConfig, TermConfig};
use crate::device::{Connection, DeviceError, RawPort, SerialParams};
use crate::pipeline::{BatchingPump, InboundQueue, SinkHandle, StopOutcome};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
  NotConnected,
  Connected { port: String, baud_rate: u32 },
  Failed,
}

impl fmt::Display for ConnectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConnectionStatus::NotConnected => write!(f, "Not connected"),
      ConnectionStatus::Connected { port, baud_rate } => {
        write!(f, "Connected to {port} at {baud_rate}")
      }
      ConnectionStatus::Failed => write!(f, "Connection failed"),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
  #[error("connect to a serial port first")]
  NotConnected,
  #[error("nothing to send")]
  Empty,
  #[error(transparent)]
  Device(#[from] DeviceError),
}

pub struct Session {
  queue: InboundQueue,
  pump: BatchingPump,
  sink: SinkHandle,
  connection: Option<Connection>,
  stop_grace: Duration,
  send: SendConfig,
  status: ConnectionStatus,
}

impl fmt::Debug for Session {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Session")
      .field("status", &self.status)
      .field("pump", &self.pump)
      .field("connection", &self.connection)
      .finish_non_exhaustive()
  }
}

impl Session {
  #[must_use]
  pub fn new(sink: SinkHandle, config: &TermConfig) -> Self {
    let queue = InboundQueue::new();
    let pump = BatchingPump::new(queue.clone(), sink.clone(), config.pump.settings());
    Self {
      queue,
      pump,
      sink,
      connection: None,
      stop_grace: config.pump.stop_grace(),
      send: config.send.clone(),
      status: ConnectionStatus::NotConnected,
    }
  }

  #[must_use]
  pub fn status(&self) -> &ConnectionStatus {
    &self.status
  }

  #[must_use]
  pub fn is_connected(&self) -> bool {
    self.connection.as_ref().is_some_and(Connection::is_open)
  }

  #[must_use]
  pub fn pump(&self) -> &BatchingPump {
    &self.pump
  }

  #[must_use]
  pub fn queue(&self) -> &InboundQueue {
    &self.queue
  }

  #[must_use]
  pub fn append_suffix(&self) -> bool {
    self.send.append_suffix
  }

  pub fn set_append_suffix(&mut self, on: bool) {
    self.send.append_suffix = on;
  }

  #[must_use]
  pub fn suffix(&self) -> &str {
    &self.send.suffix
  }

  /// Open the serial device and start receiving. No-op when connected.
  ///
  /// # Errors
  /// Returns an error if the device cannot be opened or the background
  /// threads cannot be started; partial state is torn down first.
  pub fn connect(&mut self, params: &SerialParams) -> Result<()> {
    self.attach(params.baud_rate, || Connection::open(params))
  }

  /// Start receiving from an already open port.
  ///
  /// # Errors
  /// Returns an error if the background threads cannot be started.
  pub fn connect_port(&mut self, name: &str, baud_rate: u32, port: Box<dyn RawPort>) -> Result<()> {
    self.attach(baud_rate, move || Ok(Connection::from_port(name, port)))
  }

  /// Disconnect when connected, connect otherwise.
  ///
  /// # Errors
  /// See [`Session::connect`].
  pub fn toggle(&mut self, params: &SerialParams) -> Result<()> {
    if self.is_connected() {
      self.disconnect();
      Ok(())
    } else {
      self.connect(params)
    }
  }

  fn attach<F>(&mut self, baud_rate: u32, open: F) -> Result<()>
  where
    F: FnOnce() -> Result<Connection, DeviceError>,
  {
    if self.is_connected() {
      return Ok(());
    }
    match self.try_attach(baud_rate, open) {
      Ok(()) => Ok(()),
      Err(err) => {
        self.disconnect();
        self.status = ConnectionStatus::Failed;
        Err(err)
      }
    }
  }

  fn try_attach<F>(&mut self, baud_rate: u32, open: F) -> Result<()>
  where
    F: FnOnce() -> Result<Connection, DeviceError>,
  {
    let mut connection = open()?;
    let port = connection.name().to_string();
    connection
      .forward_to(self.queue.clone())
      .context("failed to start device watcher")?;
    self.connection = Some(connection);
    self.pump.start().context("failed to start receive pump")?;
    self.status = ConnectionStatus::Connected { port, baud_rate };
    Ok(())
  }

  /// Stop the pump, then close the device. Safe to call at any time and any
  /// number of times.
  pub fn disconnect(&mut self) {
    if self.pump.stop(self.stop_grace) == StopOutcome::TimedOut {
      warn!("receive pump did not stop in time");
    }
    if let Some(mut connection) = self.connection.take() {
      connection.close();
    }
    // Chunks the watcher queued between stopping the pump and closing.
    let stragglers = self.queue.drain_all();
    if stragglers > 0 {
      debug!("dropped {stragglers} chunks received during disconnect");
    }
    self.status = ConnectionStatus::NotConnected;
  }

  /// Write `text` to the device, with the suffix when enabled, and echo it
  /// into the receive view.
  ///
  /// The echo is queued, not awaited: this is normally called from the
  /// view's own thread.
  ///
  /// # Errors
  /// Returns `SendError` when disconnected, when `text` is empty, or when
  /// the device rejects the write.
  pub fn send(&self, text: &str) -> Result<String, SendError> {
    let connection = self
      .connection
      .as_ref()
      .filter(|c| c.is_open())
      .ok_or(SendError::NotConnected)?;
    if text.is_empty() {
      return Err(SendError::Empty);
    }

    let mut payload = text.to_string();
    if self.send.append_suffix {
      payload.push_str(&self.send.suffix);
    }
    connection.write(payload.as_bytes())?;

    let echo = format!("{}{}\n", self.send.echo_prefix, payload);
    let queued = self.sink.schedule(move |view| {
      view.append_text(&echo)?;
      view.scroll_to_end();
      Ok(())
    });
    if let Err(err) = queued {
      debug!("echo not shown: {err}");
    }
    Ok(payload)
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    self.disconnect();
  }
}
