//! # Entity Component System
//!
//! Handle-based storage for per-entity data.
//!
//! ## Design Philosophy
//!
//! - Entity handles are slot indices with generation counters
//! - One sparse set per component type, packed for iteration
//! - Stores sit behind a type-erased registry owned by the world
//! - Tags are zero-sized components that route entities between passes

mod component;
mod entity;
mod registry;
mod storage;
mod world;

pub(crate) use component::short_name;
pub use component::{Component, Tag};
pub use entity::{Entities, Entity};
pub use registry::{ComponentId, ComponentInfo, ComponentRegistry};
pub use storage::{ErasedStore, SparseSet};
pub use world::World;
