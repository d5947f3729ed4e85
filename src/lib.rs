//! Tag Arena - authoritative simulation and netcode for a real-time ball-tag game
//!
//! The server side runs one [`game::GameRoom`] that owns the world and steps
//! it at a fixed rate. The `client` tree holds what a game client needs to
//! hide latency: input prediction with replay, snapshot interpolation and
//! an offline mode that runs the same simulation locally.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
