//! Recovery/timeout scheduler.
//!
//! Two jobs: bound every hardware/network wait with a timeout race
//! ([`run_with_timeout`]), and drive the post-terminal countdown that
//! returns the kiosk to a scanning-ready state ([`RestartScheduler`]).

pub mod restart;
pub mod timeout;

pub use restart::{CountdownEvent, RestartPlan, RestartScheduler};
pub use timeout::{run_with_timeout, Raced};
