//! # Command Buffers
//!
//! Deferred structural changes recorded during a pass.
//!
//! Callbacks never get the world, so destroying an entity or attaching a
//! component from inside a pass goes through a [`CommandBuffer`]. The buffer
//! is replayed in recording order once the traversal has joined. Within a
//! parallel pass the recording order between workers is unspecified.

use parking_lot::Mutex;

use crate::ecs::{Component, Entity, World};
use crate::error::EcsResult;

type Deferred = Box<dyn FnOnce(&mut World) -> EcsResult<()> + Send>;

enum Command {
    Destroy(Entity),
    Apply(Deferred),
}

/// Thread-safe queue of deferred structural changes.
///
/// # Example
///
/// ```rust,ignore
/// world.par_for_each_with_commands::<(Health,), _>(|entity, commands, (health,)| {
///     if health.0 == 0 {
///         commands.destroy(entity);
///     }
/// })?;
/// ```
#[derive(Default)]
pub struct CommandBuffer {
    commands: Mutex<Vec<Command>>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues destruction of `entity`.
    ///
    /// The entity stays valid and readable until the buffer is replayed.
    pub fn destroy(&self, entity: Entity) {
        self.commands.lock().push(Command::Destroy(entity));
    }

    /// Queues attaching `value` to `entity`.
    pub fn insert<T: Component>(&self, entity: Entity, value: T) {
        self.push(Box::new(move |world: &mut World| world.add_unguarded(entity, value)));
    }

    /// Queues detaching `T` from `entity`. The removed value is dropped.
    pub fn remove<T: Component>(&self, entity: Entity) {
        self.push(Box::new(move |world: &mut World| {
            world.remove_unguarded::<T>(entity).map(drop)
        }));
    }

    fn push(&self, deferred: Deferred) {
        self.commands.lock().push(Command::Apply(deferred));
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("queued", &self.len())
            .finish()
    }
}

impl World {
    /// Replays a buffer recorded outside a pass.
    ///
    /// Returns the number of commands replayed.
    ///
    /// # Errors
    ///
    /// The first failed command. Later commands still run.
    pub fn apply_commands(&mut self, commands: CommandBuffer) -> EcsResult<usize> {
        let result = self.replay(commands);
        self.guard(result)
    }

    pub(crate) fn replay(&mut self, commands: CommandBuffer) -> EcsResult<usize> {
        let commands = commands.commands.into_inner();
        let total = commands.len();
        let mut first_error = None;

        for command in commands {
            let result = match command {
                Command::Destroy(entity) => self.destroy_unguarded(entity),
                Command::Apply(deferred) => deferred(self),
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "deferred command failed");
                first_error.get_or_insert(err);
            }
        }

        tracing::trace!(commands = total, "replayed command buffer");
        first_error.map_or(Ok(total), Err)
    }
}
