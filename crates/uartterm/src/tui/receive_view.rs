use std::collections::VecDeque;

use ratatui::layout::Rect;
use ratatui::prelude::Stylize;
use ratatui::style::Color;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::pipeline::{SinkError, TextView};
use crate::utils::term::strip_ansi_control_codes;

const TAB: &str = "    ";

/// Scrollback of everything received and sent.
///
/// The last line is the one still being written to. `scroll` counts lines
/// from the bottom; 0 means the view follows new output.
#[derive(Debug)]
pub struct ReceiveView {
  lines: VecDeque<String>,
  max_lines: usize,
  scroll: usize,
}

impl ReceiveView {
  pub fn new(max_lines: usize) -> Self {
    Self {
      lines: VecDeque::from([String::new()]),
      max_lines: max_lines.max(1),
      scroll: 0,
    }
  }

  pub fn scroll_up(&mut self, rows: usize) {
    let max = self.lines.len().saturating_sub(1);
    self.scroll = self.scroll.saturating_add(rows).min(max);
  }

  pub fn scroll_down(&mut self, rows: usize) {
    self.scroll = self.scroll.saturating_sub(rows);
  }

  pub fn scroll_to_bottom(&mut self) {
    self.scroll = 0;
  }

  pub fn is_following(&self) -> bool {
    self.scroll == 0
  }

  #[cfg(test)]
  fn text(&self) -> String {
    self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
  }

  fn push_char(&mut self, c: char) -> bool {
    match c {
      '\n' => {
        self.lines.push_back(String::new());
        return true;
      }
      // CR LF pairs may be split across appends; LF alone ends the line.
      '\r' => {}
      '\t' => self.current().push_str(TAB),
      c if c.is_control() => {}
      c => self.current().push(c),
    }
    false
  }

  fn current(&mut self) -> &mut String {
    if self.lines.is_empty() {
      self.lines.push_back(String::new());
    }
    let last = self.lines.len() - 1;
    &mut self.lines[last]
  }

  pub fn draw(&self, f: &mut ratatui::Frame, area: Rect) {
    let title = if self.is_following() {
      Line::from(" Receive ")
    } else {
      Line::from(format!(" Receive (scrolled {} lines) ", self.scroll)).fg(Color::Yellow)
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let content_h = usize::from(area.height.saturating_sub(2));
    let start = compute_start(self.lines.len(), content_h, self.scroll);
    let visible: Vec<Line> = self
      .lines
      .iter()
      .skip(start)
      .take(content_h)
      .map(|l| Line::from(l.as_str()))
      .collect();
    f.render_widget(Paragraph::new(visible).block(block), area);
  }
}

impl TextView for ReceiveView {
  fn append_text(&mut self, text: &str) -> Result<(), SinkError> {
    let mut new_lines = 0;
    for c in strip_ansi_control_codes(text).chars() {
      if self.push_char(c) {
        new_lines += 1;
      }
    }
    // Keep a scrolled-back viewport anchored on the same lines.
    if self.scroll > 0 {
      self.scroll += new_lines;
    }
    while self.lines.len() > self.max_lines {
      self.lines.pop_front();
    }
    self.scroll = self.scroll.min(self.lines.len().saturating_sub(1));
    Ok(())
  }

  fn scroll_to_end(&mut self) {
    // Auto-follow pauses while the user has scrolled back.
    if self.is_following() {
      self.scroll = 0;
    }
  }

  fn clear(&mut self) {
    self.lines = VecDeque::from([String::new()]);
    self.scroll = 0;
  }
}

fn compute_start(total_lines: usize, content_h: usize, scroll: usize) -> usize {
  total_lines.saturating_sub(content_h.saturating_add(scroll))
}
