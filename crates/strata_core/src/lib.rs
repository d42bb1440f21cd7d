//! # Strata Core
//!
//! Entity/component storage core for tag-driven processing pipelines:
//! - Generational entity handles with FIFO slot recycling
//! - Sparse-set stores with O(1) insert, remove and lookup
//! - Smallest-set-first intersection queries, sequential or on rayon
//! - Tag consumption/production and deferred command buffers
//!
//! ## Architecture Rules
//!
//! 1. **Callbacks never see the world** - structural change is deferred
//! 2. **Tags are the only pipeline state** - an entity is in a stage while it
//!    carries that stage's tag
//! 3. **Misuse is an error, not UB** - stale handles and unregistered types
//!    come back as [`EcsError`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::prelude::*;
//!
//! let mut world = World::new();
//! world.register::<Chunk>()?;
//! world.register::<NeedsMesh>()?;
//! world.register::<MeshReady>()?;
//!
//! let chunk = world.create()?;
//! world.add(chunk, Chunk::default())?;
//! world.add_default::<NeedsMesh>(chunk)?;
//!
//! world.par_for_each_add_tag::<(Chunk, NeedsMesh), MeshReady, _>(|_, (chunk, _)| {
//!     chunk.remesh();
//! })?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod query;

pub use config::WorldConfig;
pub use ecs::{
    Component, ComponentId, ComponentInfo, ComponentRegistry, Entities, Entity, ErasedStore,
    SparseSet, Tag, World,
};
pub use error::{EcsError, EcsResult};
pub use query::{CommandBuffer, Query};

/// Common imports for collaborators.
pub mod prelude {
    pub use crate::{
        CommandBuffer, Component, EcsError, EcsResult, Entity, Tag, World, WorldConfig,
    };
}
