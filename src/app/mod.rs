//! Shared application wiring

mod state;

pub use state::{AppState, SessionRegistry};
