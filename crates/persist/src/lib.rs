//! Persistence: content-hashed snapshots and a directory-backed store.
//!
//! # Invariants
//! - A snapshot's hash covers its tick and every object entry; `verify` fails
//!   on any change to either.
//! - Store files are written once and never rewritten; `world.meta.json` is
//!   the only file updated in place.
//! - Schema-version mismatches fail closed.

pub mod codec;
pub mod error;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use snapshot::{SnapshotFile, SNAPSHOT_VERSION};
pub use store::{SnapshotEntry, WorldMeta, WorldStore};
