//! Batching pump: the single consumer of the inbound queue.
//!
//! The worker drains the queue into a batch and hands the batch to the view.
//! A batch is flushed when it holds `flush_threshold` chunks, or as soon as
//! more data is already waiting, or when the queue is found empty. The last
//! rule bounds latency for interactive traffic; the first two collapse bursts
//! of small chunks into fewer view updates. A partial UTF-8 character still
//! held after two idle passes in a row is shown as U+FFFD.
//!
//! Each flush waits for the view to finish the append, so a slow view
//! throttles the worker instead of letting memory grow. Every wait the
//! worker performs is cancellable, which keeps `stop` bounded.

use crate::pipeline::cancel::{CancelSource, CancelToken};
use crate::pipeline::queue::InboundQueue;
use crate::pipeline::sink::{SinkError, SinkHandle};
use crate::pipeline::text::Utf8Carry;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_FLUSH_THRESHOLD: usize = 10;
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpState {
  #[default]
  Idle,
  Running,
  StopRequested,
  Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSettings {
  /// Chunks accumulated before a flush is forced.
  pub flush_threshold: usize,
  /// Sleep between polls of an empty queue.
  pub idle_interval: Duration,
  /// On cancel, hand the partial batch and whatever is still queued to the
  /// view instead of dropping them.
  pub flush_on_stop: bool,
}

impl Default for PumpSettings {
  fn default() -> Self {
    Self {
      flush_threshold: DEFAULT_FLUSH_THRESHOLD,
      idle_interval: DEFAULT_IDLE_INTERVAL,
      flush_on_stop: false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
  /// The pump was not running; nothing happened.
  NotRunning,
  /// The worker observed cancellation and exited within the grace period.
  Exited,
  /// The grace period elapsed first; the worker was left to exit on its own.
  TimedOut,
}

pub struct BatchingPump {
  queue: InboundQueue,
  sink: SinkHandle,
  settings: PumpSettings,
  state: Arc<Mutex<PumpState>>,
  worker: Option<Worker>,
}

struct Worker {
  cancel: CancelSource,
  /// Disconnects when the worker thread returns.
  exited: Receiver<()>,
  thread: JoinHandle<()>,
}

impl std::fmt::Debug for BatchingPump {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BatchingPump")
      .field("settings", &self.settings)
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}

impl BatchingPump {
  #[must_use]
  pub fn new(queue: InboundQueue, sink: SinkHandle, settings: PumpSettings) -> Self {
    Self {
      queue,
      sink,
      settings,
      state: Arc::new(Mutex::new(PumpState::Idle)),
      worker: None,
    }
  }

  #[must_use]
  pub fn state(&self) -> PumpState {
    *self.state.lock()
  }

  #[must_use]
  pub fn is_running(&self) -> bool {
    self.state() == PumpState::Running
  }

  #[must_use]
  pub fn settings(&self) -> PumpSettings {
    self.settings
  }

  /// Launch the worker. Does nothing if it is already running.
  ///
  /// # Errors
  /// Returns an error if the worker thread cannot be spawned.
  pub fn start(&mut self) -> std::io::Result<()> {
    if self.is_running() {
      return Ok(());
    }

    let cancel = CancelSource::new();
    let (exited_tx, exited) = bounded::<()>(0);
    let ctx = WorkerCtx {
      queue: self.queue.clone(),
      sink: self.sink.clone(),
      settings: self.settings,
      cancel: cancel.token(),
      state: self.state.clone(),
    };

    *self.state.lock() = PumpState::Running;
    let spawned = thread::Builder::new()
      .name("uart-pump".to_string())
      .spawn(move || {
        ctx.run();
        drop(exited_tx);
      });
    match spawned {
      Ok(thread) => {
        self.worker = Some(Worker {
          cancel,
          exited,
          thread,
        });
        debug!("pump started");
        Ok(())
      }
      Err(err) => {
        *self.state.lock() = PumpState::Idle;
        Err(err)
      }
    }
  }

  /// Cancel the worker and wait up to `grace` for it to exit.
  ///
  /// Whatever happens, the inbound queue is drained and the state ends as
  /// `Stopped`. Calling it when the pump is not running does nothing.
  pub fn stop(&mut self, grace: Duration) -> StopOutcome {
    let Some(mut worker) = self.worker.take() else {
      return StopOutcome::NotRunning;
    };

    *self.state.lock() = PumpState::StopRequested;
    worker.cancel.cancel();

    let outcome = match worker.exited.recv_timeout(grace) {
      Err(RecvTimeoutError::Timeout) => {
        warn!(
          "pump worker did not exit within {}ms; continuing shutdown",
          grace.as_millis()
        );
        StopOutcome::TimedOut
      }
      Ok(()) | Err(RecvTimeoutError::Disconnected) => {
        let _ = worker.thread.join();
        StopOutcome::Exited
      }
    };

    let dropped = self.queue.drain_all();
    if dropped > 0 {
      debug!("discarded {dropped} queued chunks on stop");
    }
    *self.state.lock() = PumpState::Stopped;
    outcome
  }
}

impl Drop for BatchingPump {
  fn drop(&mut self) {
    self.stop(DEFAULT_STOP_GRACE);
  }
}

#[derive(Debug, Default)]
struct Batch {
  bytes: Vec<u8>,
  chunks: usize,
}

impl Batch {
  fn push(&mut self, chunk: &[u8]) {
    self.bytes.extend_from_slice(chunk);
    self.chunks += 1;
  }

  fn chunks(&self) -> usize {
    self.chunks
  }

  fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Take the contents and reset the batch in one step.
  fn take(&mut self) -> Vec<u8> {
    self.chunks = 0;
    std::mem::take(&mut self.bytes)
  }
}

struct WorkerCtx {
  queue: InboundQueue,
  sink: SinkHandle,
  settings: PumpSettings,
  cancel: CancelToken,
  state: Arc<Mutex<PumpState>>,
}

/// What one pass over the queue did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
  /// A chunk was added to the batch and kept there.
  Batched,
  /// A chunk was added and the batch was handed to the view.
  Flushed,
  /// The queue was empty.
  Empty,
}

impl WorkerCtx {
  fn run(self) {
    let mut batch = Batch::default();
    let mut decoder = Utf8Carry::new();
    let mut was_idle = false;

    while !self.cancel.is_cancelled() {
      if self.step(&mut batch, &mut decoder) != Step::Empty {
        was_idle = false;
        continue;
      }
      if !batch.is_empty() {
        self.flush(&mut batch, &mut decoder);
      } else if was_idle && decoder.pending_len() > 0 {
        // The rest of the character never came.
        self.emit(decoder.finish());
      }
      was_idle = true;
      if self.cancel.sleep(self.settings.idle_interval) {
        break;
      }
    }

    if self.settings.flush_on_stop {
      while let Some(chunk) = self.queue.try_dequeue() {
        batch.push(&chunk);
      }
      let mut text = decoder.decode(&batch.take());
      text.push_str(&decoder.finish());
      if !text.is_empty() {
        // Not awaited: stop must stay bounded even if the view is stalled.
        if let Err(err) = self.sink.append_and_scroll(text) {
          debug!("final flush skipped: {err}");
        }
      }
    }

    let mut state = self.state.lock();
    if *state == PumpState::StopRequested {
      *state = PumpState::Stopped;
    }
    debug!("pump worker exited");
  }

  /// Move at most one chunk into the batch, flushing when it reaches the
  /// threshold or when more data is already waiting.
  fn step(&self, batch: &mut Batch, decoder: &mut Utf8Carry) -> Step {
    let Some(chunk) = self.queue.try_dequeue() else {
      return Step::Empty;
    };
    batch.push(&chunk);
    if batch.chunks() >= self.settings.flush_threshold || !self.queue.is_empty() {
      self.flush(batch, decoder);
      Step::Flushed
    } else {
      Step::Batched
    }
  }

  fn flush(&self, batch: &mut Batch, decoder: &mut Utf8Carry) {
    let text = decoder.decode(&batch.take());
    self.emit(text);
  }

  fn emit(&self, text: String) {
    if text.is_empty() {
      return;
    }
    let result = self
      .sink
      .append_and_scroll(text)
      .and_then(|pending| pending.wait_or_cancel(&self.cancel));
    match result {
      Ok(_) => {}
      Err(SinkError::Gone) => debug!("view is gone; dropping batch"),
      Err(err) => self.report(&err),
    }
  }

  /// Show a failed flush inline in the view and carry on.
  fn report(&self, err: &SinkError) {
    warn!("flush to view failed: {err}");
    let line = format!("[Processing error: {err}]\n");
    let result = self
      .sink
      .schedule(move |view| view.append_text(&line))
      .and_then(|pending| pending.wait_or_cancel(&self.cancel));
    if let Err(err) = result {
      debug!("could not report flush error: {err}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pipeline::sink::{self, SinkHost, TextView};
  use std::time::Instant;

  #[derive(Default)]
  struct Recorder {
    flushes: Vec<String>,
  }

  impl TextView for Recorder {
    fn append_text(&mut self, text: &str) -> Result<(), SinkError> {
      self.flushes.push(text.to_string());
      Ok(())
    }

    fn scroll_to_end(&mut self) {}
  }

  fn pump_with_host(settings: PumpSettings) -> (BatchingPump, InboundQueue, SinkHost) {
    let queue = InboundQueue::new();
    let (handle, host) = sink::channel();
    (BatchingPump::new(queue.clone(), handle, settings), queue, host)
  }

  fn pump_until(host: &SinkHost, view: &mut Recorder, want: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while view.flushes.concat() != want && Instant::now() < deadline {
      host.run_for(view, Duration::from_millis(10));
    }
  }

  fn worker_ctx(settings: PumpSettings) -> (WorkerCtx, InboundQueue, SinkHost, CancelSource) {
    let queue = InboundQueue::new();
    let (sink, host) = sink::channel();
    let cancel = CancelSource::new();
    let ctx = WorkerCtx {
      queue: queue.clone(),
      sink,
      settings,
      cancel: cancel.token(),
      state: Arc::new(Mutex::new(PumpState::Running)),
    };
    (ctx, queue, host, cancel)
  }

  fn spawn_view(host: SinkHost, want: &'static str) -> thread::JoinHandle<Recorder> {
    thread::spawn(move || {
      let mut view = Recorder::default();
      pump_until(&host, &mut view, want);
      view
    })
  }

  #[test]
  fn step_holds_chunks_until_threshold() {
    let (ctx, queue, host, _cancel) = worker_ctx(PumpSettings {
      flush_threshold: 3,
      ..PumpSettings::default()
    });
    let ui = spawn_view(host, "abc");
    let mut batch = Batch::default();
    let mut decoder = Utf8Carry::new();

    queue.enqueue(b"a".to_vec());
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Batched);
    assert_eq!(batch.chunks(), 1);
    queue.enqueue(b"b".to_vec());
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Batched);
    assert_eq!(batch.chunks(), 2);
    queue.enqueue(b"c".to_vec());
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Flushed);
    assert_eq!(batch.chunks(), 0);
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Empty);

    assert_eq!(ui.join().unwrap().flushes, vec!["abc".to_string()]);
  }

  #[test]
  fn step_flushes_each_chunk_while_more_are_waiting() {
    let (ctx, queue, host, _cancel) = worker_ctx(PumpSettings::default());
    let ui = spawn_view(host, "xy");
    let mut batch = Batch::default();
    let mut decoder = Utf8Carry::new();

    for chunk in [b"x", b"y", b"z"] {
      queue.enqueue(chunk.to_vec());
    }
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Flushed);
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Flushed);
    // Last chunk with nothing behind it stays batched for the idle flush.
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Batched);
    assert_eq!(batch.chunks(), 1);

    assert_eq!(
      ui.join().unwrap().flushes,
      vec!["x".to_string(), "y".to_string()]
    );
  }

  #[test]
  fn threshold_of_one_flushes_every_chunk() {
    let (ctx, queue, host, _cancel) = worker_ctx(PumpSettings {
      flush_threshold: 1,
      ..PumpSettings::default()
    });
    let ui = spawn_view(host, "pq");
    let mut batch = Batch::default();
    let mut decoder = Utf8Carry::new();

    queue.enqueue(b"p".to_vec());
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Flushed);
    queue.enqueue(b"q".to_vec());
    assert_eq!(ctx.step(&mut batch, &mut decoder), Step::Flushed);
    assert_eq!(batch.chunks(), 0);

    assert_eq!(ui.join().unwrap().flushes, vec!["p".to_string(), "q".to_string()]);
  }

  #[test]
  fn abandoned_partial_character_reaches_the_view_when_idle() {
    let (mut pump, queue, host) = pump_with_host(PumpSettings::default());
    let mut view = Recorder::default();
    pump.start().unwrap();

    queue.enqueue(b"ok\xC3".to_vec());
    pump_until(&host, &mut view, "ok\u{fffd}");
    assert_eq!(
      view.flushes,
      vec!["ok".to_string(), "\u{fffd}".to_string()]
    );
    pump.stop(DEFAULT_STOP_GRACE);
  }

  #[test]
  fn start_twice_keeps_one_worker() {
    let (mut pump, _queue, _host) = pump_with_host(PumpSettings::default());
    assert_eq!(pump.state(), PumpState::Idle);
    pump.start().unwrap();
    pump.start().unwrap();
    assert!(pump.is_running());
    assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::Exited);
    assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::NotRunning);
    assert_eq!(pump.state(), PumpState::Stopped);
  }

  #[test]
  fn stop_before_start_is_a_no_op() {
    let (mut pump, queue, _host) = pump_with_host(PumpSettings::default());
    queue.enqueue(b"kept".to_vec());
    assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::NotRunning);
    assert_eq!(pump.state(), PumpState::Idle);
    assert_eq!(queue.len(), 1);
  }

  #[test]
  fn restart_after_stop_uses_fresh_cancellation() {
    let (mut pump, queue, host) = pump_with_host(PumpSettings::default());
    let mut view = Recorder::default();

    pump.start().unwrap();
    pump.stop(DEFAULT_STOP_GRACE);
    pump.start().unwrap();
    assert!(pump.is_running());

    queue.enqueue(b"again".to_vec());
    pump_until(&host, &mut view, "again");
    assert_eq!(view.flushes.concat(), "again");
    pump.stop(DEFAULT_STOP_GRACE);
  }

  #[test]
  fn lone_chunk_is_flushed_while_idle() {
    let (mut pump, queue, host) = pump_with_host(PumpSettings::default());
    let mut view = Recorder::default();
    pump.start().unwrap();

    queue.enqueue(b"ping".to_vec());
    pump_until(&host, &mut view, "ping");
    assert_eq!(view.flushes, vec!["ping".to_string()]);
    pump.stop(DEFAULT_STOP_GRACE);
  }

  #[test]
  fn failing_view_gets_inline_error_and_loop_continues() {
    struct Flaky {
      failed_once: bool,
      text: String,
    }
    impl TextView for Flaky {
      fn append_text(&mut self, text: &str) -> Result<(), SinkError> {
        if !self.failed_once && text == "bad" {
          self.failed_once = true;
          return Err(SinkError::Failed("view rejected text".to_string()));
        }
        self.text.push_str(text);
        Ok(())
      }
      fn scroll_to_end(&mut self) {}
    }

    let (mut pump, queue, host) = pump_with_host(PumpSettings::default());
    let mut view = Flaky {
      failed_once: false,
      text: String::new(),
    };
    pump.start().unwrap();

    queue.enqueue(b"bad".to_vec());
    let deadline = Instant::now() + Duration::from_secs(5);
    while !view.text.contains("Processing error") && Instant::now() < deadline {
      host.run_for(&mut view, Duration::from_millis(10));
    }
    queue.enqueue(b"good".to_vec());
    while !view.text.ends_with("good") && Instant::now() < deadline {
      host.run_for(&mut view, Duration::from_millis(10));
    }

    assert_eq!(
      view.text,
      "[Processing error: view rejected text]\ngood"
    );
    pump.stop(DEFAULT_STOP_GRACE);
  }

  #[test]
  fn batch_take_resets_counter() {
    let mut batch = Batch::default();
    batch.push(b"ab");
    batch.push(b"c");
    assert_eq!(batch.chunks(), 2);
    assert_eq!(batch.take(), b"abc".to_vec());
    assert_eq!(batch.chunks(), 0);
    assert!(batch.is_empty());
  }
}
