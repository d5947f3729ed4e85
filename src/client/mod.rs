//! Client-side netcode
//!
//! [`ClientSession`] handles the online path, pairing [`Predictor`] for
//! the local player with [`SnapshotBuffer`] for everyone else. [`LocalGame`]
//! runs the same simulation offline.

pub mod interpolation;
pub mod offline;
pub mod prediction;
pub mod session;

pub use interpolation::SnapshotBuffer;
pub use offline::LocalGame;
pub use prediction::{PendingInput, PredictedBody, Predictor};
pub use session::{ClientSession, Controls};
