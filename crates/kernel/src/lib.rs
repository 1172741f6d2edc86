//! World kernel: object lifecycle, components, references and queries.
//!
//! # Invariants
//! - Object ids are allocated from a counter that only increases and are never reused.
//! - An object is owned by at most one world; removal clears the back-reference
//!   before the object leaves the live table.
//! - Hook failures are reported, never propagated; one failing hook does not
//!   stop the rest of a step.
//! - `purge` and `step` only run from outside hooks.

pub mod behavior;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod object;
pub mod query;
pub mod reference;
pub mod template;
pub mod world;

pub use behavior::{AsAny, Behavior};
pub use component::{Component, ComponentBox, ComponentTable, DynComponent};
pub use config::WorldConfig;
pub use context::HookContext;
pub use error::{HookFailure, HookKind, Owner, WorldError};
pub use object::{TemplateMeta, WorldObject};
pub use query::Query;
pub use reference::ObjectRef;
pub use template::{Template, TemplateRegistry};
pub use world::{HookHandler, LoadReport, StepReport, World, WorldEvent};
pub use worldkit_common::{ObjectId, ObjectSnapshot, Vec2, WorldId, WorldSnapshot};
