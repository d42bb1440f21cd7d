//! # Traversal Passes
//!
//! Every pass runs in two phases:
//!
//! 1. **Traversal**: the smallest store of the query drives; each candidate
//!    is probed in every other store and the callback runs for full matches.
//!    Parallel passes split the driver across rayon workers and join before
//!    returning.
//! 2. **Post-phase** (single-threaded): consume the query's input tags, add
//!    the output tag, replay deferred commands. In that order.
//!
//! Callbacks only ever see their own entity's values and, for command
//! passes, a shared [`CommandBuffer`]. Structural change during a traversal
//! is therefore impossible.
//!
//! ```rust,ignore
//! world.par_for_each_add_tag::<(Chunk, NeedsMesh), MeshReady, _>(|_, (chunk, _)| {
//!     chunk.mesh = build_mesh(&chunk.voxels);
//! })?;
//! ```

#![allow(unsafe_code)]

use rayon::prelude::*;

use super::commands::CommandBuffer;
use super::fetch::Query;
use crate::ecs::{Entity, Tag, World};
use crate::error::EcsResult;

/// Entities visited by a traversal.
struct Visited {
    count: usize,
    /// Filled only when the post-phase needs it.
    matched: Vec<Entity>,
}

impl World {
    /// Runs `f` for every entity holding all of `Q`'s types.
    ///
    /// Returns the number of entities visited.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotRegistered`](crate::EcsError::NotRegistered) or
    /// [`EcsError::DuplicateQueryComponent`](crate::EcsError::DuplicateQueryComponent).
    pub fn for_each<Q, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> FnMut(Entity, Q::Item<'w>),
    {
        let result = self.visit::<Q, _>(false, f).map(|visited| visited.count);
        self.guard(result)
    }

    /// Like [`World::for_each`], then removes every tag type of `Q` from the
    /// visited entities.
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each`].
    pub fn for_each_consume<Q, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> FnMut(Entity, Q::Item<'w>),
    {
        let result = self
            .visit::<Q, _>(true, f)
            .and_then(|visited| self.post_phase::<Q, ()>(visited, None));
        self.guard(result)
    }

    /// Like [`World::for_each_consume`], then adds `O` to the visited
    /// entities. `Q` should not include `O`.
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each`], plus `NotRegistered` for `O`.
    pub fn for_each_add_tag<Q, O, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        O: Tag,
        F: for<'w> FnMut(Entity, Q::Item<'w>),
    {
        let result = self
            .registry
            .id_of::<O>()
            .and_then(|_| self.visit::<Q, _>(true, f))
            .and_then(|visited| self.post_phase::<Q, O>(visited, None));
        self.guard(result)
    }

    /// Like [`World::for_each_consume`], with a command buffer replayed after
    /// the tags are consumed.
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each`], plus the first failed command.
    pub fn for_each_with_commands<Q, F>(&mut self, mut f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> FnMut(Entity, &CommandBuffer, Q::Item<'w>),
    {
        let commands = CommandBuffer::new();
        let result = self
            .visit::<Q, _>(true, |entity, item| f(entity, &commands, item))
            .and_then(|visited| self.post_phase::<Q, ()>(visited, Some(commands)));
        self.guard(result)
    }

    /// Parallel [`World::for_each`]. Callbacks run on worker threads in no
    /// particular order; the call returns once all of them have finished.
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each`].
    pub fn par_for_each<Q, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> Fn(Entity, Q::Item<'w>) + Send + Sync,
    {
        let result = self.par_visit::<Q, _>(false, f).map(|visited| visited.count);
        self.guard(result)
    }

    /// Parallel [`World::for_each_consume`].
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each`].
    pub fn par_for_each_consume<Q, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> Fn(Entity, Q::Item<'w>) + Send + Sync,
    {
        let result = self
            .par_visit::<Q, _>(true, f)
            .and_then(|visited| self.post_phase::<Q, ()>(visited, None));
        self.guard(result)
    }

    /// Parallel [`World::for_each_add_tag`].
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each_add_tag`].
    pub fn par_for_each_add_tag<Q, O, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        O: Tag,
        F: for<'w> Fn(Entity, Q::Item<'w>) + Send + Sync,
    {
        let result = self
            .registry
            .id_of::<O>()
            .and_then(|_| self.par_visit::<Q, _>(true, f))
            .and_then(|visited| self.post_phase::<Q, O>(visited, None));
        self.guard(result)
    }

    /// Parallel [`World::for_each_with_commands`]. The buffer is shared by
    /// all workers.
    ///
    /// # Errors
    ///
    /// Same as [`World::for_each_with_commands`].
    pub fn par_for_each_with_commands<Q, F>(&mut self, f: F) -> EcsResult<usize>
    where
        Q: Query,
        F: for<'w> Fn(Entity, &CommandBuffer, Q::Item<'w>) + Send + Sync,
    {
        let commands = CommandBuffer::new();
        let result = self
            .par_visit::<Q, _>(true, |entity, item| f(entity, &commands, item))
            .and_then(|visited| self.post_phase::<Q, ()>(visited, Some(commands)));
        self.guard(result)
    }

    fn visit<Q, F>(&mut self, collect: bool, mut f: F) -> EcsResult<Visited>
    where
        Q: Query,
        F: for<'w> FnMut(Entity, Q::Item<'w>),
    {
        let columns = Q::columns(&mut self.registry)?;
        let driver = Q::driver(&columns);

        let mut visited = Visited {
            count: 0,
            matched: Vec::new(),
        };
        for &entity in driver {
            // SAFETY: driver entities are distinct, and the previous item was
            // moved into `f`, which cannot keep it past the call.
            if let Some(item) = unsafe { Q::fetch(&columns, entity) } {
                f(entity, item);
                visited.count += 1;
                if collect {
                    visited.matched.push(entity);
                }
            }
        }

        tracing::trace!(
            query = std::any::type_name::<Q>(),
            visited = visited.count,
            driver = driver.len(),
            "sequential pass"
        );
        Ok(visited)
    }

    fn par_visit<Q, F>(&mut self, collect: bool, f: F) -> EcsResult<Visited>
    where
        Q: Query,
        F: for<'w> Fn(Entity, Q::Item<'w>) + Send + Sync,
    {
        let min_len = self.config.min_parallel_batch;
        let pool = self.pool.as_ref();
        let columns = Q::columns(&mut self.registry)?;
        let driver = Q::driver(&columns);

        if driver.is_empty() {
            return Ok(Visited {
                count: 0,
                matched: Vec::new(),
            });
        }

        let columns = &columns;
        let f = &f;
        let probe = move |entity: Entity| {
            // SAFETY: `Query` is sealed and every driver is the owner list of
            // a sparse set, so its entities are distinct. Each one is visited
            // by exactly one worker, and each column maps distinct entities
            // to distinct values, so no two live items alias.
            match unsafe { Q::fetch(columns, entity) } {
                Some(item) => {
                    f(entity, item);
                    true
                }
                None => false,
            }
        };

        let run = move || {
            let candidates = driver.par_iter().with_min_len(min_len).copied();
            if collect {
                let matched: Vec<Entity> = candidates.filter(|&entity| probe(entity)).collect();
                Visited {
                    count: matched.len(),
                    matched,
                }
            } else {
                Visited {
                    count: candidates.filter(|&entity| probe(entity)).count(),
                    matched: Vec::new(),
                }
            }
        };

        let visited = match pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        tracing::trace!(
            query = std::any::type_name::<Q>(),
            visited = visited.count,
            driver = driver.len(),
            dedicated_pool = pool.is_some(),
            "parallel pass"
        );
        Ok(visited)
    }

    /// Consumes input tags, adds the output tag, replays commands.
    fn post_phase<Q, O>(
        &mut self,
        visited: Visited,
        commands: Option<CommandBuffer>,
    ) -> EcsResult<usize>
    where
        Q: Query,
        O: OutputTag,
    {
        Q::consume_tags(&mut self.registry, &visited.matched)?;
        O::add_to(self, &visited.matched)?;
        if let Some(commands) = commands {
            self.replay(commands)?;
        }
        Ok(visited.count)
    }
}

/// Output of a pass: a real tag, or nothing.
trait OutputTag {
    fn add_to(world: &mut World, matched: &[Entity]) -> EcsResult<()>;
}

impl<O: Tag> OutputTag for O {
    fn add_to(world: &mut World, matched: &[Entity]) -> EcsResult<()> {
        let store = world.registry.store_mut::<O>()?;
        for &entity in matched {
            if !store.contains(entity) {
                store.insert(entity, O::default())?;
            }
        }
        Ok(())
    }
}

/// No output tag.
impl OutputTag for () {
    fn add_to(_: &mut World, _: &[Entity]) -> EcsResult<()> {
        Ok(())
    }
}
