#![allow(dead_code)]
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uartterm::pipeline::{SinkError, SinkHost, TextView};

pub const WAIT: Duration = Duration::from_secs(5);

/// Root for temp dirs so tests never touch the real config locations.
pub fn tmp_root() -> PathBuf {
  let root = std::env::temp_dir().join("uartterm-tests");
  std::fs::create_dir_all(&root).expect("create tmp root");
  root
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if cond() {
      return true;
    }
    thread::sleep(Duration::from_millis(2));
  }
  cond()
}

#[derive(Debug, Default)]
struct Recorded {
  text: String,
  appends: Vec<String>,
  scrolls: usize,
}

/// View that records what it is given, readable from the test thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
  inner: Arc<Mutex<Recorded>>,
}

impl RecordingView {
  pub fn text(&self) -> String {
    self.inner.lock().text.clone()
  }

  /// Every `append_text` call in order, one entry per flush or echo.
  pub fn appends(&self) -> Vec<String> {
    self.inner.lock().appends.clone()
  }

  pub fn scrolls(&self) -> usize {
    self.inner.lock().scrolls
  }
}

impl TextView for RecordingView {
  fn append_text(&mut self, text: &str) -> Result<(), SinkError> {
    let mut rec = self.inner.lock();
    rec.text.push_str(text);
    rec.appends.push(text.to_string());
    Ok(())
  }

  fn scroll_to_end(&mut self) {
    self.inner.lock().scrolls += 1;
  }

  fn clear(&mut self) {
    self.inner.lock().text.clear();
  }
}

/// Plays the UI thread: owns the view and runs scheduled jobs until dropped.
/// While paused it runs nothing, like a UI that is stuck.
pub struct ViewThread {
  view: RecordingView,
  paused: Arc<AtomicBool>,
  stop: Arc<AtomicBool>,
  thread: Option<JoinHandle<()>>,
}

impl ViewThread {
  pub fn spawn(host: SinkHost) -> Self {
    Self::spawn_with(host, false)
  }

  pub fn spawn_paused(host: SinkHost) -> Self {
    Self::spawn_with(host, true)
  }

  fn spawn_with(host: SinkHost, paused: bool) -> Self {
    let view = RecordingView::default();
    let paused = Arc::new(AtomicBool::new(paused));
    let stop = Arc::new(AtomicBool::new(false));
    let thread = {
      let mut view = view.clone();
      let paused = paused.clone();
      let stop = stop.clone();
      thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
          if paused.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
            continue;
          }
          host.run_for(&mut view, Duration::from_millis(5));
        }
      })
    };
    Self {
      view,
      paused,
      stop,
      thread: Some(thread),
    }
  }

  pub fn view(&self) -> &RecordingView {
    &self.view
  }

  pub fn resume(&self) {
    self.paused.store(false, Ordering::SeqCst);
  }

  pub fn wait_for_text(&self, want: &str) -> bool {
    wait_until(WAIT, || self.view.text() == want)
  }
}

impl Drop for ViewThread {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::SeqCst);
    if let Some(thread) = self.thread.take() {
      let _ = thread.join();
    }
  }
}
