use std::io::{self, IsTerminal as _};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, unbounded};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::debug;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};

use super::help_bar::{self, HELP_ITEMS};
use super::receive_view::ReceiveView;
use super::send_input::{SendInputOutcome, SendInputState};
use super::status_bar;
use crate::config::TermConfig;
use crate::device::SerialParams;
use crate::pipeline::{SinkHost, TextView as _, sink};
use crate::session::{SendError, Session};
use crate::utils::log::{LogEvent, clear_log_sink, init_file_logger, set_log_sink, t};
use crate::utils::term::restore_terminal_state;
use crate::{log_error, log_info, log_success};

/// Time spent applying view updates between two frames.
const FRAME: Duration = Duration::from_millis(16);
const PAGE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
  Continue,
  Quit,
}

struct AppState {
  view: ReceiveView,
  input: SendInputState,
  session: Session,
  params: SerialParams,
  message: Option<LogEvent>,
}

impl AppState {
  fn draw(&self, f: &mut ratatui::Frame) {
    let help_lines = help_bar::layout_lines(HELP_ITEMS, f.area().width);
    let help_rows = help_lines.len().try_into().unwrap_or(1_u16).clamp(1, 3);

    let [receive, send, status, help] = Layout::vertical([
      Constraint::Fill(1),
      Constraint::Length(3),
      Constraint::Length(1),
      Constraint::Length(help_rows),
    ])
    .areas(f.area());

    self.view.draw(f, receive);
    let suffix = self
      .session
      .append_suffix()
      .then_some(self.session.suffix());
    self.input.draw(f, send, suffix);
    status_bar::draw(f, status, self.session.status(), self.message.as_ref());
    help_bar::draw(f, help);
  }

  fn handle_key(&mut self, key: KeyEvent) -> Flow {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
      match key.code {
        KeyCode::Char('c') => return Flow::Quit,
        KeyCode::Char('o') => self.toggle_connection(),
        KeyCode::Char('t') => self.toggle_suffix(),
        KeyCode::Char('l') => self.view.clear(),
        _ => {}
      }
      return Flow::Continue;
    }

    match key.code {
      KeyCode::PageUp => self.view.scroll_up(PAGE),
      KeyCode::PageDown => self.view.scroll_down(PAGE),
      KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => self.view.scroll_up(1),
      KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => self.view.scroll_down(1),
      KeyCode::End => self.view.scroll_to_bottom(),
      _ => match self.input.handle_key(key) {
        SendInputOutcome::Submit(text) => self.send(&text),
        SendInputOutcome::Continue | SendInputOutcome::Cleared => {}
      },
    }
    Flow::Continue
  }

  fn connect(&mut self) {
    match self.session.connect(&self.params) {
      Ok(()) => log_success!("Connected to {} at {}", self.params.port, self.params.baud_rate),
      Err(err) => log_error!("Connection failed: {:#}", err),
    }
  }

  fn toggle_connection(&mut self) {
    if self.session.is_connected() {
      self.session.disconnect();
      log_info!("Disconnected from {}", t::port(&self.params.port));
    } else {
      self.connect();
    }
  }

  fn toggle_suffix(&mut self) {
    let on = !self.session.append_suffix();
    self.session.set_append_suffix(on);
    if on {
      log_info!("Appending {} to sent text", t::port(self.session.suffix()));
    } else {
      log_info!("Sending text without suffix");
    }
  }

  fn send(&mut self, text: &str) {
    match self.session.send(text) {
      Ok(_) => self.input.clear(),
      Err(SendError::Empty) => {}
      Err(err) => log_error!("Send failed: {}", err),
    }
  }
}

/// Entry point for the terminal UI.
pub fn run(config: &TermConfig, params: SerialParams) -> Result<()> {
  if !io::stdout().is_terminal() {
    log_info!("The terminal UI requires a TTY; try 'uartterm ports' or a real terminal");
    return Ok(());
  }

  let log_path = init_file_logger()?;
  debug!("diagnostics go to {}", log_path.display());

  enable_raw_mode().context("enable raw mode")?;
  let mut stdout = io::stdout();
  crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)
    .context("enter alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("create terminal")?;

  let res = ui_loop(&mut terminal, config, params);

  let out = terminal.backend_mut();
  crossterm::execute!(out, crossterm::terminal::LeaveAlternateScreen).ok();
  disable_raw_mode().ok();
  restore_terminal_state();

  res
}

fn ui_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  config: &TermConfig,
  params: SerialParams,
) -> Result<()> {
  let (sink, host) = sink::channel();
  let mut state = AppState {
    view: ReceiveView::new(config.view.max_lines),
    input: SendInputState::new(),
    session: Session::new(sink, config),
    params,
    message: None,
  };

  let (log_tx, log_rx) = unbounded::<LogEvent>();
  set_log_sink(log_tx);

  state.connect();

  let res = event_loop(terminal, &mut state, &host, &log_rx);

  clear_log_sink();
  state.session.disconnect();
  res
}

fn event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  state: &mut AppState,
  host: &SinkHost,
  log_rx: &Receiver<LogEvent>,
) -> Result<()> {
  loop {
    while let Ok(ev) = log_rx.try_recv() {
      state.message = Some(ev);
    }

    terminal.draw(|f| state.draw(f))?;

    // The pump waits for each flush, so keep answering until the next frame.
    host.run_until(&mut state.view, Instant::now() + FRAME);

    while event::poll(Duration::ZERO)? {
      if let Event::Key(key) = event::read()?
        && key.kind != KeyEventKind::Release
        && state.handle_key(key) == Flow::Quit
      {
        return Ok(());
      }
    }
  }
}
