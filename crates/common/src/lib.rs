//! Shared identifiers and the persisted snapshot format.
//!
//! Everything here is plain data: the kernel produces and consumes these
//! types, persistence encodes them, and neither depends on the other's
//! internals.

pub mod types;

pub use glam::Vec2;
pub use types::{ObjectId, ObjectSnapshot, WorldId, WorldSnapshot};
