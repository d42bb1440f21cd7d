//! # Component Registry
//!
//! Maps each component type to a stable [`ComponentId`] and owns one boxed
//! [`ErasedStore`] per type. Ids are handed out in registration order and are
//! never reassigned.

use std::any::TypeId;
use std::collections::HashMap;

use super::component::{short_name, Component};
use super::entity::Entity;
use super::storage::{ErasedStore, SparseSet};
use crate::error::{EcsError, EcsResult};

/// Stable per-world component type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Returns the id as a registry index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metadata recorded at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Registry id.
    pub id: ComponentId,
    /// Short type name.
    pub name: &'static str,
    /// Zero-payload marker type.
    pub is_tag: bool,
    /// Size of one value in bytes.
    pub size: usize,
}

/// Registry of component types and their stores.
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
    stores: Vec<Box<dyn ErasedStore>>,
    capacity: usize,
    entity_capacity: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    ///
    /// `entity_capacity` pre-sizes the sparse array of every new store.
    #[must_use]
    pub fn new(capacity: usize, entity_capacity: usize) -> Self {
        Self {
            ids: HashMap::with_capacity(capacity),
            infos: Vec::with_capacity(capacity),
            stores: Vec::with_capacity(capacity),
            capacity,
            entity_capacity,
        }
    }

    /// Registers `T` and creates its store.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyRegistered`] if `T` was registered before
    /// - [`EcsError::RegistryFull`] if every id is taken
    /// - [`EcsError::TagWithPayload`] if `T` is flagged as a tag but is not
    ///   zero-sized
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        // Consuming passes drop tag values, so a tag must carry nothing.
        if T::IS_TAG && std::mem::size_of::<T>() != 0 {
            return Err(EcsError::TagWithPayload(short_name::<T>()));
        }

        let type_id = TypeId::of::<T>();
        if self.ids.contains_key(&type_id) {
            return Err(EcsError::AlreadyRegistered(short_name::<T>()));
        }

        let full = EcsError::RegistryFull {
            capacity: self.capacity,
        };
        if self.stores.len() >= self.capacity {
            return Err(full);
        }
        let id = ComponentId(u32::try_from(self.stores.len()).map_err(|_| full)?);

        let info = ComponentInfo {
            id,
            name: short_name::<T>(),
            is_tag: T::IS_TAG,
            size: std::mem::size_of::<T>(),
        };

        self.ids.insert(type_id, id);
        self.infos.push(info);
        self.stores
            .push(Box::new(SparseSet::<T>::with_capacity(self.entity_capacity)));

        tracing::debug!(
            component = info.name,
            id = id.0,
            tag = info.is_tag,
            size = info.size,
            "registered component type"
        );

        Ok(id)
    }

    /// Returns the id of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the id of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotRegistered`] if `T` was never registered.
    #[inline]
    pub fn id_of<T: Component>(&self) -> EcsResult<ComponentId> {
        self.component_id::<T>()
            .ok_or_else(|| EcsError::NotRegistered(short_name::<T>()))
    }

    /// Returns the metadata of a registered type.
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Iterates over all registered types in registration order.
    pub fn infos(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns `true` if no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Returns the typed store of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotRegistered`] if `T` was never registered.
    pub fn store<T: Component>(&self) -> EcsResult<&SparseSet<T>> {
        let id = self.id_of::<T>()?;
        self.stores[id.index()]
            .as_any()
            .downcast_ref::<SparseSet<T>>()
            .ok_or_else(|| EcsError::NotRegistered(short_name::<T>()))
    }

    /// Returns the typed store of `T` mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotRegistered`] if `T` was never registered.
    pub fn store_mut<T: Component>(&mut self) -> EcsResult<&mut SparseSet<T>> {
        let id = self.id_of::<T>()?;
        self.stores[id.index()]
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .ok_or_else(|| EcsError::NotRegistered(short_name::<T>()))
    }

    /// Returns the erased store behind an id.
    #[must_use]
    pub fn erased(&self, id: ComponentId) -> Option<&dyn ErasedStore> {
        self.stores.get(id.index()).map(|store| &**store)
    }

    /// Borrows `N` distinct stores mutably at once.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateQueryComponent`] if an id appears twice.
    pub(crate) fn stores_disjoint_mut<const N: usize>(
        &mut self,
        ids: [ComponentId; N],
    ) -> EcsResult<[&mut Box<dyn ErasedStore>; N]> {
        let indices = ids.map(ComponentId::index);
        self.stores.get_disjoint_mut(indices).map_err(|_| {
            let name = duplicate_name(&ids, &self.infos);
            EcsError::DuplicateQueryComponent(name)
        })
    }

    /// Drops `entity`'s value from every store. Returns how many were dropped.
    pub fn remove_entity(&mut self, entity: Entity) -> usize {
        self.stores
            .iter_mut()
            .map(|store| store.remove_if_present(entity))
            .filter(|removed| *removed)
            .count()
    }

    /// Destroys every store exactly once, in registration order.
    pub fn shutdown(self) {
        for (info, store) in self.infos.iter().zip(self.stores) {
            tracing::trace!(
                component = info.name,
                values = store.len(),
                "dropping component store"
            );
            drop(store);
        }
    }
}

/// Name of the first id that appears twice.
fn duplicate_name(ids: &[ComponentId], infos: &[ComponentInfo]) -> &'static str {
    ids.iter()
        .enumerate()
        .find(|(i, id)| ids[..*i].contains(id))
        .and_then(|(_, id)| infos.get(id.index()))
        .map_or("<unknown>", |info| info.name)
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.infos.iter().map(|i| i.name).collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Tag;

    #[derive(Debug, Default, PartialEq)]
    struct Position(f32, f32);
    impl Component for Position {}

    #[derive(Debug, Default, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Default)]
    struct Ready;
    impl Tag for Ready {}

    #[test]
    fn test_ids_in_registration_order() {
        let mut registry = ComponentRegistry::new(8, 0);
        let a = registry.register::<Position>().unwrap();
        let b = registry.register::<Health>().unwrap();
        let c = registry.register::<Ready>().unwrap();

        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert_eq!(registry.component_id::<Health>(), Some(b));
        assert_eq!(registry.len(), 3);

        let info = registry.info(c).unwrap();
        assert_eq!(info.name, "Ready");
        assert!(info.is_tag);
        assert_eq!(info.size, 0);
        assert_eq!(registry.infos().count(), 3);

        let e = Entity::new(0, 0);
        registry.store_mut::<Ready>().unwrap().insert(e, Ready).unwrap();
        assert!(registry.erased(c).unwrap().contains(e));
    }

    #[test]
    fn test_register_errors() {
        let mut registry = ComponentRegistry::new(1, 0);
        registry.register::<Position>().unwrap();

        assert_eq!(
            registry.register::<Position>(),
            Err(EcsError::AlreadyRegistered("Position"))
        );
        assert_eq!(
            registry.register::<Health>(),
            Err(EcsError::RegistryFull { capacity: 1 })
        );
        assert_eq!(
            registry.store::<Health>().unwrap_err(),
            EcsError::NotRegistered("Health")
        );
    }

    #[test]
    fn test_tag_with_payload_rejected() {
        #[derive(Debug, Default)]
        struct Stamped(u64);
        impl Tag for Stamped {}

        #[derive(Debug)]
        struct Flagged(u8);
        impl Component for Flagged {
            const IS_TAG: bool = true;
        }

        let mut registry = ComponentRegistry::new(4, 0);
        assert_eq!(
            registry.register::<Stamped>(),
            Err(EcsError::TagWithPayload("Stamped"))
        );
        assert_eq!(
            registry.register::<Flagged>(),
            Err(EcsError::TagWithPayload("Flagged"))
        );
        assert!(registry.is_empty());
        assert_eq!(std::mem::size_of_val(&Stamped(0).0), 8);
        assert_eq!(Flagged(3).0, 3);
    }

    #[test]
    fn test_typed_store_access() {
        let mut registry = ComponentRegistry::new(4, 16);
        registry.register::<Health>().unwrap();
        let e = Entity::new(3, 0);

        registry.store_mut::<Health>().unwrap().insert(e, Health(9)).unwrap();
        assert_eq!(registry.store::<Health>().unwrap().get(e).unwrap(), &Health(9));

        let id = registry.id_of::<Health>().unwrap();
        assert!(registry.erased(id).unwrap().contains(e));
    }

    #[test]
    fn test_remove_entity_purges_all_stores() {
        let mut registry = ComponentRegistry::new(4, 0);
        registry.register::<Position>().unwrap();
        registry.register::<Health>().unwrap();
        let e = Entity::new(0, 0);
        let other = Entity::new(1, 0);

        registry.store_mut::<Position>().unwrap().insert(e, Position(1.0, 2.0)).unwrap();
        registry.store_mut::<Health>().unwrap().insert(e, Health(1)).unwrap();
        registry.store_mut::<Health>().unwrap().insert(other, Health(2)).unwrap();

        assert_eq!(registry.remove_entity(e), 2);
        assert_eq!(registry.remove_entity(e), 0);
        assert!(registry.store::<Position>().unwrap().is_empty());
        assert_eq!(registry.store::<Health>().unwrap().len(), 1);
    }

    #[test]
    fn test_disjoint_stores() {
        let mut registry = ComponentRegistry::new(4, 0);
        let p = registry.register::<Position>().unwrap();
        let h = registry.register::<Health>().unwrap();

        let [a, b] = registry.stores_disjoint_mut([p, h]).unwrap();
        assert_eq!(a.component_name(), "Position");
        assert_eq!(b.component_name(), "Health");

        assert_eq!(
            registry.stores_disjoint_mut([h, p, h]).err(),
            Some(EcsError::DuplicateQueryComponent("Health"))
        );
    }
}
