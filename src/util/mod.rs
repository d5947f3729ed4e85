//! Small process-wide helpers

pub mod rate_limit;
pub mod time;
