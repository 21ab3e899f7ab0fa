//! Cooperative cancellation for the pump worker.
//!
//! A `CancelSource` owns the only sender of a rendezvous channel that never
//! carries a message. Cancelling sets the flag and drops the sender, which
//! disconnects the channel and wakes every thread blocked in
//! [`CancelToken::sleep`] or selecting on [`CancelToken::wake_receiver`].

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct CancelSource {
  flag: Arc<AtomicBool>,
  wake_tx: Option<Sender<()>>,
  wake_rx: Receiver<()>,
}

impl Default for CancelSource {
  fn default() -> Self {
    Self::new()
  }
}

impl CancelSource {
  #[must_use]
  pub fn new() -> Self {
    let (wake_tx, wake_rx) = bounded(0);
    Self {
      flag: Arc::new(AtomicBool::new(false)),
      wake_tx: Some(wake_tx),
      wake_rx,
    }
  }

  #[must_use]
  pub fn token(&self) -> CancelToken {
    CancelToken {
      flag: self.flag.clone(),
      wake: self.wake_rx.clone(),
    }
  }

  /// Raise the signal. Calling it again has no further effect.
  pub fn cancel(&mut self) {
    self.flag.store(true, Ordering::SeqCst);
    self.wake_tx.take();
  }

  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
  wake: Receiver<()>,
}

impl CancelToken {
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }

  /// Sleep for `timeout` unless cancelled first. Returns `true` when cancelled.
  #[must_use]
  pub fn sleep(&self, timeout: Duration) -> bool {
    match self.wake.recv_timeout(timeout) {
      Err(RecvTimeoutError::Disconnected) => true,
      Ok(()) | Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
    }
  }

  /// Receiver that becomes ready (disconnected) once the source is cancelled
  /// or dropped. Meant for `crossbeam_channel::select!`.
  #[must_use]
  pub fn wake_receiver(&self) -> &Receiver<()> {
    &self.wake
  }
}
