//! # Component Storage
//!
//! One sparse set per component type.
//!
//! The set keeps three co-indexed arrays:
//! - `dense`: component values, packed with no holes
//! - `dense_to_entity`: the owner handle of each dense value
//! - `sparse`: per entity slot, the dense index of its value (or `None`)
//!
//! Insert appends. Remove swaps the last value into the hole and patches the
//! moved value's sparse entry, so every structural operation is O(1) and
//! iteration always walks contiguous memory.

use std::any::Any;

use super::component::{short_name, Component};
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Sparse-set storage for a single component type.
///
/// # Example
///
/// ```rust,ignore
/// let mut healths: SparseSet<Health> = SparseSet::new();
/// healths.insert(entity, Health(100))?;
/// assert_eq!(healths.get(entity)?.0, 100);
/// ```
#[derive(Debug)]
pub struct SparseSet<T> {
    /// Packed component values.
    dense: Vec<T>,
    /// Owner of each dense value.
    dense_to_entity: Vec<Entity>,
    /// Entity slot to dense index.
    sparse: Vec<Option<u32>>,
}

impl<T: Component> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> SparseSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dense: Vec::new(),
            dense_to_entity: Vec::new(),
            sparse: Vec::new(),
        }
    }

    /// Creates an empty set with room for `entities` slots.
    #[must_use]
    pub fn with_capacity(entities: usize) -> Self {
        Self {
            dense: Vec::new(),
            dense_to_entity: Vec::new(),
            sparse: Vec::with_capacity(entities),
        }
    }

    /// Dense index of `entity`'s value, if the set holds one for this exact
    /// handle.
    #[inline]
    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let index = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.dense_to_entity[index] == entity).then_some(index)
    }

    /// Attaches a value to an entity.
    ///
    /// If the slot still holds a value owned by an older generation of the
    /// same slot, that value is dropped and replaced.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentAlreadyPresent`] if `entity` already has a value.
    pub fn insert(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let slot = entity.index() as usize;

        if let Some(Some(index)) = self.sparse.get(slot).copied() {
            let index = index as usize;
            if self.dense_to_entity[index] == entity {
                return Err(EcsError::ComponentAlreadyPresent {
                    entity,
                    component: short_name::<T>(),
                });
            }
            // Stale owner left behind by a slot that was recycled
            self.dense[index] = value;
            self.dense_to_entity[index] = entity;
            return Ok(());
        }

        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, None);
        }

        // Dense length never exceeds the slot count, which fits in u32.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.dense.len() as u32;
        self.dense.push(value);
        self.dense_to_entity.push(entity);
        self.sparse[slot] = Some(index);

        Ok(())
    }

    /// Attaches `T::default()` to an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentAlreadyPresent`] if `entity` already has a value.
    pub fn insert_default(&mut self, entity: Entity) -> EcsResult<()>
    where
        T: Default,
    {
        self.insert(entity, T::default())
    }

    /// Detaches and returns an entity's value.
    ///
    /// The value that was last in dense order moves into the freed position.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if `entity` has no value.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<T> {
        self.remove_if_present(entity)
            .ok_or_else(|| EcsError::ComponentMissing {
                entity,
                component: short_name::<T>(),
            })
    }

    /// Detaches an entity's value if it has one.
    pub fn remove_if_present(&mut self, entity: Entity) -> Option<T> {
        let index = self.dense_index(entity)?;

        let value = self.dense.swap_remove(index);
        self.dense_to_entity.swap_remove(index);
        self.sparse[entity.index() as usize] = None;

        // Patch the entry of the value that moved into the hole
        if let Some(moved) = self.dense_to_entity.get(index) {
            #[allow(clippy::cast_possible_truncation)]
            let patched = Some(index as u32);
            self.sparse[moved.index() as usize] = patched;
        }

        Some(value)
    }

    /// Returns a reference to an entity's value.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if `entity` has no value.
    #[inline]
    pub fn get(&self, entity: Entity) -> EcsResult<&T> {
        match self.dense_index(entity) {
            Some(index) => Ok(&self.dense[index]),
            None => Err(EcsError::ComponentMissing {
                entity,
                component: short_name::<T>(),
            }),
        }
    }

    /// Returns a mutable reference to an entity's value.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if `entity` has no value.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        match self.dense_index(entity) {
            Some(index) => Ok(&mut self.dense[index]),
            None => Err(EcsError::ComponentMissing {
                entity,
                component: short_name::<T>(),
            }),
        }
    }

    /// Checks if an entity has a value in this set.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Returns the number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if the set holds no values.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Owners in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.dense_to_entity
    }

    /// Values in dense order.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.dense
    }

    /// Iterates over `(owner, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.dense_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Drops every stored value.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.dense_to_entity.clear();
        self.sparse.clear();
    }

    /// Verifies the dense/sparse cross-links.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.dense.len() != self.dense_to_entity.len() {
            return false;
        }

        let linked = self
            .sparse
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|index| (slot, index as usize)))
            .all(|(slot, index)| {
                self.dense_to_entity
                    .get(index)
                    .is_some_and(|owner| owner.index() as usize == slot)
            });

        let occupied = self.sparse.iter().filter(|entry| entry.is_some()).count();

        linked && occupied == self.dense.len()
    }

    /// Splits the set for column access: owners, sparse map, values.
    #[inline]
    pub(crate) fn parts_mut(&mut self) -> (&[Entity], &[Option<u32>], &mut [T]) {
        (&self.dense_to_entity, &self.sparse, &mut self.dense)
    }
}

/// Type-erased view of a [`SparseSet`].
///
/// The registry keeps one boxed store per component type and reaches the
/// concrete set through `Any` when the type is known again.
pub trait ErasedStore: Any + Send + Sync {
    /// Short name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if `entity` has a value in this store.
    fn contains(&self, entity: Entity) -> bool;

    /// Drops `entity`'s value if present. Returns whether one was dropped.
    fn remove_if_present(&mut self, entity: Entity) -> bool;

    /// Drops every stored value.
    fn clear(&mut self);

    /// Upcast for downcasting to the concrete set.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete set.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for SparseSet<T> {
    fn component_name(&self) -> &'static str {
        short_name::<T>()
    }

    fn len(&self) -> usize {
        SparseSet::len(self)
    }

    fn contains(&self, entity: Entity) -> bool {
        SparseSet::contains(self, entity)
    }

    fn remove_if_present(&mut self, entity: Entity) -> bool {
        SparseSet::remove_if_present(self, entity).is_some()
    }

    fn clear(&mut self) {
        SparseSet::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_insert_get() {
        let mut set = SparseSet::new();
        set.insert(e(5), Health(50)).unwrap();
        set.insert(e(1), Health(10)).unwrap();

        assert_eq!(set.get(e(5)).unwrap(), &Health(50));
        assert_eq!(set.get(e(1)).unwrap(), &Health(10));
        assert_eq!(set.len(), 2);
        assert_eq!(set.entities(), &[e(5), e(1)]);
        assert!(set.is_consistent());

        set.get_mut(e(1)).unwrap().0 = 11;
        assert_eq!(set.get(e(1)).unwrap(), &Health(11));
    }

    #[test]
    fn test_double_insert_rejected() {
        let mut set = SparseSet::new();
        set.insert(e(0), Health(1)).unwrap();

        let err = set.insert(e(0), Health(2)).unwrap_err();
        assert_eq!(
            err,
            EcsError::ComponentAlreadyPresent {
                entity: e(0),
                component: "Health",
            }
        );
        assert_eq!(set.get(e(0)).unwrap(), &Health(1));
    }

    #[test]
    fn test_missing_component() {
        let mut set: SparseSet<Health> = SparseSet::new();
        assert!(matches!(set.get(e(3)), Err(EcsError::ComponentMissing { .. })));
        assert!(matches!(set.remove(e(3)), Err(EcsError::ComponentMissing { .. })));
        assert_eq!(set.remove_if_present(e(3)), None);
        assert!(!set.contains(e(3)));
    }

    #[test]
    fn test_swap_remove_patches_moved() {
        let mut set = SparseSet::new();
        for i in 0..4 {
            set.insert(e(i), Health(i)).unwrap();
        }

        // Removing the first value moves the last into its place
        assert_eq!(set.remove(e(0)).unwrap(), Health(0));
        assert_eq!(set.entities(), &[e(3), e(1), e(2)]);
        assert_eq!(set.get(e(3)).unwrap(), &Health(3));
        assert!(!set.contains(e(0)));
        assert!(set.is_consistent());

        // Removing the last value moves nothing
        assert_eq!(set.remove(e(2)).unwrap(), Health(2));
        assert_eq!(set.entities(), &[e(3), e(1)]);
        assert!(set.is_consistent());
    }

    #[test]
    fn test_stale_handle_does_not_read_new_owner() {
        let mut set = SparseSet::new();
        let old = Entity::new(7, 0);
        let new = Entity::new(7, 1);

        set.insert(new, Health(70)).unwrap();
        assert!(!set.contains(old));
        assert!(set.get(old).is_err());
        assert_eq!(set.remove_if_present(old), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_replaces_stale_owner() {
        let mut set = SparseSet::new();
        set.insert(Entity::new(2, 0), Health(1)).unwrap();
        set.insert(Entity::new(2, 1), Health(2)).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get(Entity::new(2, 1)).unwrap(), &Health(2));
        assert!(set.is_consistent());
    }

    #[test]
    fn test_insert_default_and_clear() {
        let mut set: SparseSet<Health> = SparseSet::with_capacity(8);
        set.insert_default(e(4)).unwrap();
        assert_eq!(set.values(), &[Health(0)]);

        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(e(4)));
        assert!(set.is_consistent());
    }

    #[test]
    fn test_erased_store() {
        let mut store: Box<dyn ErasedStore> = Box::new(SparseSet::<Health>::new());
        store
            .as_any_mut()
            .downcast_mut::<SparseSet<Health>>()
            .unwrap()
            .insert(e(1), Health(5))
            .unwrap();

        assert_eq!(store.component_name(), "Health");
        assert_eq!(store.len(), 1);
        assert!(store.contains(e(1)));
        assert!(store.remove_if_present(e(1)));
        assert!(!store.remove_if_present(e(1)));
        assert!(store.is_empty());
        assert!(store.as_any().downcast_ref::<SparseSet<u32>>().is_none());
    }
}
