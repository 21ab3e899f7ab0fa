use owo_colors::OwoColorize as _;
use regex::Regex;
use std::io::{self, Write};
use std::sync::OnceLock;

fn ansi_regex() -> &'static Regex {
  static ANSI_RE: OnceLock<Regex> = OnceLock::new();
  ANSI_RE.get_or_init(|| {
    Regex::new(
      r"(?x)
      \x1B\[[0-?]*[ -/]*[@-~]    # CSI sequence
      |                            # or
      \x1B\][^\x07\x1B]*(?:\x07|\x1B\\)  # OSC sequence terminated by BEL or ST
    ",
    )
    .expect("valid ANSI regex")
  })
}

/// Disable bracketed paste and focus reporting a crashed session may have left on.
pub fn restore_terminal_state() {
  let mut stdout = io::stdout().lock();
  let _ = stdout.write_all(b"\x1b[?2004l\x1b[?1004l");
  let _ = stdout.flush();
}

/// Print a simple table to stdout.
/// Column widths are derived from headers and the visible length of cells.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
  for line in render_table(headers, rows) {
    anstream::println!("{line}");
  }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
  let cols = headers.len();
  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in rows {
    for (i, cell) in row.iter().enumerate().take(cols) {
      widths[i] = widths[i].max(visible_len(cell));
    }
  }

  let mut lines = Vec::with_capacity(rows.len() + 1);
  let header_cells: Vec<String> = headers.iter().map(|h| (*h).to_string()).collect();
  lines.push(format!("{}", join_padded(&header_cells, &widths).dimmed()));
  for row in rows {
    lines.push(join_padded(row, &widths));
  }
  lines
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
  let mut line = String::new();
  for (i, cell) in cells.iter().enumerate().take(widths.len()) {
    line.push_str(cell);
    if i + 1 < widths.len() {
      let spaces = widths[i].saturating_sub(visible_len(cell)) + 1;
      line.push_str(&" ".repeat(spaces));
    }
  }
  line
}

pub fn strip_ansi_control_codes(input: &str) -> String {
  ansi_regex().replace_all(input, "").into_owned()
}

fn visible_len(s: &str) -> usize {
  strip_ansi_control_codes(s).chars().count()
}
