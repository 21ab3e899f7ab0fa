use crossbeam_channel::{Receiver, Sender, unbounded};

/// Bytes delivered by a single device notification.
pub type Chunk = Vec<u8>;

/// Unbounded FIFO between the device notification and the pump.
///
/// Any number of producers may enqueue concurrently through clones of the
/// queue. Dequeuing is meant for a single consumer (the pump worker); the
/// queue does not enforce that.
#[derive(Debug, Clone)]
pub struct InboundQueue {
  tx: Sender<Chunk>,
  rx: Receiver<Chunk>,
}

impl Default for InboundQueue {
  fn default() -> Self {
    Self::new()
  }
}

impl InboundQueue {
  #[must_use]
  pub fn new() -> Self {
    let (tx, rx) = unbounded();
    Self { tx, rx }
  }

  /// Append a chunk. Never blocks.
  pub fn enqueue(&self, chunk: Chunk) {
    // The queue owns a receiver, so the channel can never be disconnected.
    let _ = self.tx.send(chunk);
  }

  /// Take the oldest chunk, or `None` when nothing is waiting.
  #[must_use]
  pub fn try_dequeue(&self) -> Option<Chunk> {
    self.rx.try_recv().ok()
  }

  /// Discard everything currently queued. Returns the number of chunks dropped.
  pub fn drain_all(&self) -> usize {
    std::iter::from_fn(|| self.rx.try_recv().ok()).count()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.rx.is_empty()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.rx.len()
  }
}
