//! Game simulation modules

pub mod ai;
pub mod input;
pub mod physics;
pub mod possession;
pub mod room;
pub mod scoring;
pub mod sim;
pub mod snapshot;
pub mod tuning;
pub mod world;

pub use input::{DirectionalInput, InputFrame};
pub use room::{GameRoom, JoinAck, RoomCommand, RoomHandle, RoomSettings};
pub use snapshot::{BallSnapshot, PlayerSnapshot, WorldSnapshot};
pub use tuning::Tuning;
pub use world::{PlayerId, World};
