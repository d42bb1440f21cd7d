//! # Entity Management
//!
//! Entities are lightweight handles consisting of:
//! - A slot index into the per-type sparse arrays
//! - A generation counter for safe slot reuse

use std::collections::VecDeque;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::error::{EcsError, EcsResult};

/// Opaque handle identifying a logical object.
///
/// A handle is valid while its slot is alive and the slot's generation
/// matches the handle's generation. Destroying an entity bumps the slot's
/// generation, so every copy of the old handle becomes stale.
///
/// The layout is two plain `u32`s, so handle slices can be cast with
/// `bytemuck` and uploaded next to per-instance render data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(C)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Null handle. Never valid in any world.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Creates a handle from its raw parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
    }

    /// Packs the handle into a `u64`.
    ///
    /// - Lower 32 bits: slot index
    /// - Upper 32 bits: generation
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Unpacks a handle produced by [`Entity::to_bits`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

/// Per-slot bookkeeping.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Hands out, recycles and validates [`Entity`] handles.
///
/// Freed slots go to the back of a FIFO queue, so a slot rests for a while
/// before it is reused and generations grow evenly across slots.
///
/// A slot whose generation cannot be incremented any further is retired: it
/// is never handed out again. This caps the number of times one slot can be
/// recycled at `u32::MAX`.
#[derive(Debug)]
pub struct Entities {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    alive: usize,
    retired: usize,
    limit: u32,
}

impl Entities {
    /// Creates an allocator that never holds more than `limit` slots.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero or `u32::MAX` (the null slot index).
    #[must_use]
    pub fn new(limit: u32, initial_capacity: usize) -> Self {
        assert!(limit > 0, "Entity limit must be greater than zero");
        assert!(limit < u32::MAX, "Slot index u32::MAX is reserved for the null entity");

        Self {
            slots: Vec::with_capacity(initial_capacity),
            free: VecDeque::new(),
            alive: 0,
            retired: 0,
            limit,
        }
    }

    /// Creates a new entity, reusing a freed slot when one is available.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExceeded`] when every slot is alive or
    /// retired and the slot limit is reached.
    pub fn create(&mut self) -> EcsResult<Entity> {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(!slot.alive, "free list holds a live slot");
            slot.alive = true;
            self.alive += 1;
            return Ok(Entity::new(index, slot.generation));
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|index| *index < self.limit)
            .ok_or(EcsError::EntityCapacityExceeded { limit: self.limit })?;

        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.alive += 1;

        Ok(Entity::new(index, 0))
    }

    /// Destroys an entity, freeing its slot for reuse.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if the handle is stale, null or was
    /// already destroyed.
    pub fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        if !self.is_valid(entity) {
            return Err(EcsError::InvalidEntity(entity));
        }

        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        self.alive -= 1;

        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free.push_back(entity.index());
            }
            None => {
                self.retired += 1;
                tracing::warn!(
                    slot = entity.index(),
                    retired = self.retired,
                    "entity slot exhausted its generations and is retired"
                );
            }
        }

        Ok(())
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Returns the current generation of a slot, or `None` if the slot was
    /// never handed out.
    #[inline]
    #[must_use]
    pub fn generation(&self, index: u32) -> Option<u32> {
        self.slots.get(index as usize).map(|slot| slot.generation)
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive
    }

    /// Returns the number of slots ever handed out.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of slots retired after generation exhaustion.
    #[inline]
    #[must_use]
    pub const fn retired_count(&self) -> usize {
        self.retired
    }

    /// Iterates over all live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().zip(0u32..).filter_map(|(slot, index)| {
            slot.alive.then(|| Entity::new(index, slot.generation))
        })
    }

    /// Pushes a slot to the end of its generation range. Test hook for the
    /// exhaustion path.
    #[cfg(test)]
    pub(crate) fn force_generation(&mut self, index: u32, generation: u32) {
        self.slots[index as usize].generation = generation;
    }
}
