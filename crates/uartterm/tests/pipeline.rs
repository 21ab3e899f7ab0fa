use std::thread;
use std::time::{Duration, Instant};

use uartterm::pipeline::pump::DEFAULT_STOP_GRACE;
use uartterm::pipeline::sink;
use uartterm::pipeline::{BatchingPump, InboundQueue, PumpSettings, PumpState, StopOutcome};

mod common;
use common::{ViewThread, WAIT, wait_until};

fn pump(settings: PumpSettings) -> (BatchingPump, InboundQueue, sink::SinkHost) {
  let queue = InboundQueue::new();
  let (handle, host) = sink::channel();
  (BatchingPump::new(queue.clone(), handle, settings), queue, host)
}

#[test]
fn hello_world_arrives_in_order_and_queue_is_empty_after_stop() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();

  queue.enqueue(b"He".to_vec());
  queue.enqueue(b"llo".to_vec());
  queue.enqueue(b" World".to_vec());

  assert!(ui.wait_for_text("Hello World"), "got {:?}", ui.view().text());
  assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::Exited);
  assert_eq!(pump.state(), PumpState::Stopped);
  assert!(queue.is_empty());
  assert!(ui.view().scrolls() >= 1);
}

#[test]
fn twelve_single_byte_chunks_arrive_in_order() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();

  let bytes = b"0123456789ab";
  for b in bytes {
    queue.enqueue(vec![*b]);
  }

  assert!(ui.wait_for_text("0123456789ab"));
  let appends = ui.view().appends();
  assert!(appends.len() >= 2, "{appends:?}");
  // One byte per chunk, so no flush may carry more than the threshold.
  assert!(appends.iter().all(|a| (1..=10).contains(&a.len())), "{appends:?}");
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn backlog_is_flushed_without_holding_chunks_back() {
  let (mut pump, queue, host) = pump(PumpSettings {
    flush_threshold: 10,
    ..PumpSettings::default()
  });
  let ui = ViewThread::spawn(host);

  // Ten chunks queued before the worker dequeues anything.
  for c in b'A'..=b'J' {
    queue.enqueue(vec![c]);
  }
  pump.start().unwrap();

  assert!(ui.wait_for_text("ABCDEFGHIJ"));
  let expected: Vec<String> = (b'A'..=b'J').map(|c| char::from(c).to_string()).collect();
  assert_eq!(ui.view().appends(), expected);
  assert!(queue.is_empty());
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn lone_chunk_is_shown_promptly() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();
  thread::sleep(Duration::from_millis(30));

  let sent = Instant::now();
  queue.enqueue(b"$ ".to_vec());
  assert!(ui.wait_for_text("$ "));
  assert!(sent.elapsed() < Duration::from_millis(200), "{:?}", sent.elapsed());
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn trailing_lead_byte_is_shown_as_replacement_when_line_goes_quiet() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();

  queue.enqueue(b"ok\xC3".to_vec());
  assert!(ui.wait_for_text("ok\u{fffd}"), "got {:?}", ui.view().text());
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn concurrent_producers_keep_their_order() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();

  let producers: Vec<_> = (0..4)
    .map(|id| {
      let queue = queue.clone();
      thread::spawn(move || {
        for seq in 0..100 {
          queue.enqueue(format!("{id}:{seq};").into_bytes());
          if seq % 10 == 0 {
            thread::yield_now();
          }
        }
      })
    })
    .collect();
  for p in producers {
    p.join().unwrap();
  }

  let expected_len: usize = (0..4)
    .flat_map(|id| (0..100).map(move |seq| format!("{id}:{seq};").len()))
    .sum();
  assert!(wait_until(WAIT, || ui.view().text().len() == expected_len));

  let text = ui.view().text();
  let mut last = [None::<u32>; 4];
  for record in text.split(';').filter(|r| !r.is_empty()) {
    let (id, seq) = record.split_once(':').unwrap();
    let id: usize = id.parse().unwrap();
    let seq: u32 = seq.parse().unwrap();
    if let Some(prev) = last[id] {
      assert_eq!(seq, prev + 1, "producer {id} out of order");
    }
    last[id] = Some(seq);
  }
  assert_eq!(last, [Some(99); 4]);
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn stop_is_bounded_when_the_view_never_answers() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let _ui = ViewThread::spawn_paused(host);
  pump.start().unwrap();

  queue.enqueue(b"stuck".to_vec());
  assert!(wait_until(WAIT, || queue.is_empty()));
  queue.enqueue(b"behind".to_vec());

  let started = Instant::now();
  let outcome = pump.stop(Duration::from_millis(500));
  assert!(started.elapsed() < Duration::from_secs(2));
  assert_eq!(outcome, StopOutcome::Exited);
  assert_eq!(pump.state(), PumpState::Stopped);
  assert!(queue.is_empty());
}

#[test]
fn unflushed_data_is_dropped_on_stop_by_default() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn_paused(host);
  pump.start().unwrap();

  // The worker flushes "a" and blocks waiting for the paused view.
  queue.enqueue(b"a".to_vec());
  assert!(wait_until(WAIT, || queue.is_empty()));
  thread::sleep(Duration::from_millis(50));
  queue.enqueue(b"bc".to_vec());

  pump.stop(DEFAULT_STOP_GRACE);
  ui.resume();

  assert!(ui.wait_for_text("a"));
  thread::sleep(Duration::from_millis(50));
  assert_eq!(ui.view().text(), "a");
}

#[test]
fn flush_on_stop_hands_pending_data_to_the_view() {
  let (mut pump, queue, host) = pump(PumpSettings {
    flush_on_stop: true,
    ..PumpSettings::default()
  });
  let ui = ViewThread::spawn_paused(host);
  pump.start().unwrap();

  queue.enqueue(b"a".to_vec());
  assert!(wait_until(WAIT, || queue.is_empty()));
  thread::sleep(Duration::from_millis(50));
  queue.enqueue(b"bc".to_vec());

  let started = Instant::now();
  assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::Exited);
  assert!(started.elapsed() < Duration::from_secs(2));
  ui.resume();

  assert!(ui.wait_for_text("abc"), "got {:?}", ui.view().text());
}

#[test]
fn utf8_split_across_chunks_is_reassembled() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);
  pump.start().unwrap();

  let bytes = "température 25°C".as_bytes();
  for b in bytes {
    queue.enqueue(vec![*b]);
    thread::sleep(Duration::from_millis(1));
  }

  assert!(ui.wait_for_text("température 25°C"));
  assert!(!ui.view().text().contains('\u{fffd}'));
  pump.stop(DEFAULT_STOP_GRACE);
}

#[test]
fn stopped_pump_can_be_started_again() {
  let (mut pump, queue, host) = pump(PumpSettings::default());
  let ui = ViewThread::spawn(host);

  pump.start().unwrap();
  queue.enqueue(b"one ".to_vec());
  assert!(ui.wait_for_text("one "));
  assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::Exited);
  assert_eq!(pump.stop(DEFAULT_STOP_GRACE), StopOutcome::NotRunning);

  pump.start().unwrap();
  assert!(pump.is_running());
  queue.enqueue(b"two".to_vec());
  assert!(ui.wait_for_text("one two"));
  pump.stop(DEFAULT_STOP_GRACE);
}
