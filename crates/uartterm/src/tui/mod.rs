//! Terminal front-end: receive view, send line, status line and help bar.
//! The UI loop owns the receive view and runs the pump's view updates.

mod app;
mod help_bar;
mod receive_view;
mod send_input;
mod status_bar;

pub(crate) use app::run;
