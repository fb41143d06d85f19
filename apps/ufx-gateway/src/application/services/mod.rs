//! Application services.

mod poll_scheduler;

pub use poll_scheduler::{PollOperation, PollScheduler};
