use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::prelude::Stylize;
use ratatui::style::Color;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

/// Outcome of handling a key in the send line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendInputOutcome {
  /// Continue editing, no action taken.
  Continue,
  /// User pressed Enter with the current text.
  Submit(String),
  /// User cleared the line with Esc.
  Cleared,
}

/// Single-line editor for outgoing text.
#[derive(Clone, Debug, Default)]
pub struct SendInputState {
  pub input: String,
}

impl SendInputState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn clear(&mut self) {
    self.input.clear();
  }

  /// Draw the send line. `suffix` is shown on the right while it is being
  /// appended to outgoing text.
  pub fn draw(&self, f: &mut ratatui::Frame, area: Rect, suffix: Option<&str>) {
    let right = match suffix {
      Some(s) => Line::from(format!(" +{s} ")).fg(Color::Green),
      None => Line::from(" no suffix ").fg(Color::DarkGray),
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .title(Line::from(" Send "))
      .title(right.right_aligned());
    let input_area = block.inner(area);
    f.render_widget(block, area);

    let text = if self.input.is_empty() {
      Line::from(Span::raw("Type text and press Enter").fg(Color::Gray))
    } else {
      Line::from(self.input.as_str())
    };
    f.render_widget(Paragraph::new(text), input_area);

    let typed = u16::try_from(self.input.chars().count()).unwrap_or(u16::MAX);
    let max_x = input_area.x + input_area.width.saturating_sub(1);
    let cx = input_area.x.saturating_add(typed).min(max_x);
    f.set_cursor_position((cx, input_area.y));
  }

  /// Handle basic editing keys. Callers intercept control shortcuts first.
  pub fn handle_key(&mut self, key: KeyEvent) -> SendInputOutcome {
    match key.code {
      KeyCode::Esc => {
        self.input.clear();
        SendInputOutcome::Cleared
      }
      KeyCode::Enter => SendInputOutcome::Submit(self.input.clone()),
      KeyCode::Backspace => {
        self.input.pop();
        SendInputOutcome::Continue
      }
      KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.input.push(c);
        SendInputOutcome::Continue
      }
      _ => SendInputOutcome::Continue,
    }
  }
}
