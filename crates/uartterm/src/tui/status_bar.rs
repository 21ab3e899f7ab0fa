use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::session::ConnectionStatus;
use crate::utils::log::{LogEvent, LogLevel};
use crate::utils::term::strip_ansi_control_codes;

fn status_color(status: &ConnectionStatus) -> Color {
  match status {
    ConnectionStatus::NotConnected => Color::Gray,
    ConnectionStatus::Connected { .. } => Color::Green,
    ConnectionStatus::Failed => Color::Red,
  }
}

fn level_color(level: LogLevel) -> Color {
  match level {
    LogLevel::Info => Color::Reset,
    LogLevel::Success => Color::Green,
    LogLevel::Warn => Color::Yellow,
    LogLevel::Error => Color::Red,
  }
}

/// Last routed message as plain text styled by level.
fn message_span(message: &LogEvent) -> Span<'static> {
  Span::styled(
    strip_ansi_control_codes(&message.ansi),
    Style::default().fg(level_color(message.level)),
  )
}

/// Connection status on the left, last message on the right.
pub fn draw(f: &mut ratatui::Frame, area: Rect, status: &ConnectionStatus, message: Option<&LogEvent>) {
  let status_text = format!(" {status} ");
  let status_width = u16::try_from(status_text.chars().count()).unwrap_or(u16::MAX);
  let [left, right] =
    Layout::horizontal([Constraint::Length(status_width), Constraint::Fill(1)]).areas(area);

  let status_span = Span::styled(
    status_text,
    Style::default().fg(Color::Black).bg(status_color(status)),
  );
  f.render_widget(Paragraph::new(Line::from(status_span)), left);

  if let Some(message) = message {
    let line = Line::from(vec![Span::raw(" "), message_span(message)]);
    f.render_widget(Paragraph::new(line), right);
  }
}
