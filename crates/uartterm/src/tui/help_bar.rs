use ratatui::layout::{Alignment, Rect};
use ratatui::prelude::Stylize;
use ratatui::style::Color;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

/// Help items to display in the TUI.
pub const HELP_ITEMS: &[&str] = &[
  "Send: ⏎",
  "Connect/Disconnect: C-o",
  "Suffix: C-t",
  "Clear view: C-l",
  "Clear input: Esc",
  "Scroll: PgUp/PgDn",
  "Follow: End",
  "Quit: C-c",
];

/// Draw the help bar with smart item-boundary wrapping.
pub fn draw(f: &mut ratatui::Frame, area: Rect) {
  let lines: Vec<Line> = layout_lines(HELP_ITEMS, area.width)
    .into_iter()
    .map(|ln| ln.fg(Color::Blue))
    .collect();
  f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

/// Build help lines from discrete items without breaking an item across lines.
pub fn layout_lines<'a>(items: &'a [&'a str], width: u16) -> Vec<Line<'a>> {
  let w = usize::from(width.max(1));
  let sep = " | ";
  let sep_len = sep.chars().count();
  let mut lines: Vec<Line> = Vec::new();
  let mut cur_len = 0_usize;
  let mut cur_spans: Vec<Span> = Vec::new();

  for item in items {
    let item_len = item.chars().count();
    if cur_len == 0 {
      cur_spans.push(Span::raw(*item));
      cur_len = item_len;
      continue;
    }

    if cur_len + sep_len + item_len <= w {
      cur_spans.push(Span::raw(sep));
      cur_spans.push(Span::raw(*item));
      cur_len += sep_len + item_len;
    } else {
      lines.push(Line::from(cur_spans));
      cur_spans = vec![Span::raw(*item)];
      cur_len = item_len;
    }
  }

  if !cur_spans.is_empty() {
    lines.push(Line::from(cur_spans));
  }
  lines
}
