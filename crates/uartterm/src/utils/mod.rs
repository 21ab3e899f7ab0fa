pub mod log;
pub mod term;
