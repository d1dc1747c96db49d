//! Small shared helpers.

pub mod time;

pub use time::format_countdown;
