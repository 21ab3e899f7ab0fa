//! Marshaling of display updates onto the thread that owns the view.
//!
//! The view is not `Send`-shared: it lives on one thread (the TUI loop, or a
//! test harness thread) which drives a [`SinkHost`]. Other threads hold a
//! [`SinkHandle`] and call [`SinkHandle::schedule`], which queues a closure
//! and returns a [`Pending`] completion. The host runs the closure against
//! the view and sends the result back on a one-shot ack channel.

use crate::pipeline::cancel::CancelToken;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::time::{Duration, Instant};

/// A text display that can be appended to.
pub trait TextView {
  /// Append `text` at the end of the view.
  ///
  /// # Errors
  /// Returns an error when the view cannot take the text.
  fn append_text(&mut self, text: &str) -> Result<(), SinkError>;

  fn scroll_to_end(&mut self);

  fn clear(&mut self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
  /// The host side was dropped; nothing will run the job.
  #[error("display is no longer accepting updates")]
  Gone,
  #[error("{0}")]
  Failed(String),
}

pub type ViewJob = Box<dyn FnOnce(&mut dyn TextView) -> Result<(), SinkError> + Send>;

struct Scheduled {
  job: ViewJob,
  done: Sender<Result<(), SinkError>>,
}

/// Create a connected handle/host pair.
#[must_use]
pub fn channel() -> (SinkHandle, SinkHost) {
  let (tx, rx) = unbounded();
  (SinkHandle { tx }, SinkHost { rx })
}

/// Sending side, cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct SinkHandle {
  tx: Sender<Scheduled>,
}

impl std::fmt::Debug for SinkHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SinkHandle")
      .field("queued", &self.tx.len())
      .finish()
  }
}

impl SinkHandle {
  /// Queue `job` to run on the view's thread.
  ///
  /// # Errors
  /// Returns `SinkError::Gone` when the host has been dropped.
  pub fn schedule<F>(&self, job: F) -> Result<Pending, SinkError>
  where
    F: FnOnce(&mut dyn TextView) -> Result<(), SinkError> + Send + 'static,
  {
    let (done, rx) = bounded(1);
    self
      .tx
      .send(Scheduled {
        job: Box::new(job),
        done,
      })
      .map_err(|_| SinkError::Gone)?;
    Ok(Pending { rx })
  }

  /// Queue an append followed by a scroll to the end.
  ///
  /// # Errors
  /// Returns `SinkError::Gone` when the host has been dropped.
  pub fn append_and_scroll(&self, text: String) -> Result<Pending, SinkError> {
    self.schedule(move |view| {
      view.append_text(&text)?;
      view.scroll_to_end();
      Ok(())
    })
  }
}

/// Outcome of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waited {
  Done,
  Cancelled,
}

/// Completion of a scheduled job.
#[derive(Debug)]
#[must_use = "dropping a Pending does not cancel the job, it only stops waiting for it"]
pub struct Pending {
  rx: Receiver<Result<(), SinkError>>,
}

impl Pending {
  /// Block until the job has run.
  ///
  /// # Errors
  /// Returns the job's error, or `SinkError::Gone` if the host dropped it.
  pub fn wait(self) -> Result<(), SinkError> {
    self.rx.recv().map_err(|_| SinkError::Gone)?
  }

  /// Block until the job has run or `cancel` fires, whichever comes first.
  ///
  /// # Errors
  /// Returns the job's error, or `SinkError::Gone` if the host dropped it.
  pub fn wait_or_cancel(self, cancel: &CancelToken) -> Result<Waited, SinkError> {
    crossbeam_channel::select! {
      recv(self.rx) -> res => match res {
        Ok(Ok(())) => Ok(Waited::Done),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(SinkError::Gone),
      },
      recv(cancel.wake_receiver()) -> _ => Ok(Waited::Cancelled),
    }
  }
}

/// Receiving side, driven by the thread that owns the view.
pub struct SinkHost {
  rx: Receiver<Scheduled>,
}

impl std::fmt::Debug for SinkHost {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SinkHost")
      .field("queued", &self.rx.len())
      .finish()
  }
}

impl SinkHost {
  /// Run every job queued so far. Returns the number of jobs run.
  pub fn run_pending(&self, view: &mut dyn TextView) -> usize {
    let mut count = 0;
    while let Ok(scheduled) = self.rx.try_recv() {
      run_one(view, scheduled);
      count += 1;
    }
    count
  }

  /// Run jobs as they arrive until `deadline`. Returns the number of jobs run.
  pub fn run_until(&self, view: &mut dyn TextView, deadline: Instant) -> usize {
    let mut count = 0;
    while let Ok(scheduled) = self.rx.recv_deadline(deadline) {
      run_one(view, scheduled);
      count += 1;
    }
    count
  }

  /// Run jobs as they arrive for at most `timeout`.
  pub fn run_for(&self, view: &mut dyn TextView, timeout: Duration) -> usize {
    self.run_until(view, Instant::now() + timeout)
  }

  /// Number of jobs waiting to run.
  #[must_use]
  pub fn queued(&self) -> usize {
    self.rx.len()
  }
}

fn run_one(view: &mut dyn TextView, scheduled: Scheduled) {
  let result = (scheduled.job)(view);
  // The scheduler may have stopped waiting (cancelled or fire-and-forget).
  let _ = scheduled.done.send(result);
}
