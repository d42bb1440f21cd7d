//! # Query Fetching
//!
//! Turns a tuple of component types into per-entity `&mut` tuples.
//!
//! A query borrows every requested store mutably for the length of a pass and
//! views each one as a [`Column`]. The column with the fewest values drives
//! the traversal; every other column is probed through its sparse array.

#![allow(unsafe_code)]

use std::marker::PhantomData;

use crate::ecs::{short_name, Component, ComponentRegistry, Entity, ErasedStore, SparseSet};
use crate::error::{EcsError, EcsResult};

/// Raw view of one store for the length of a pass.
///
/// Holds the owner and sparse arrays by shared reference and the values by
/// pointer, so disjoint values can be handed out as `&mut` to several
/// threads at once. Only reachable through [`Query::Columns`].
pub struct Column<'w, T> {
    entities: &'w [Entity],
    sparse: &'w [Option<u32>],
    dense: *mut T,
    len: usize,
    _marker: PhantomData<&'w mut [T]>,
}

// SAFETY: a column only hands out `&mut T` to values selected by distinct
// entities (see `Query::fetch`), so sharing it across threads moves `T`
// values between threads (`T: Send`) and never aliases them.
unsafe impl<T: Send + Sync> Send for Column<'_, T> {}
// SAFETY: as above.
unsafe impl<T: Send + Sync> Sync for Column<'_, T> {}

impl<'w, T: Component> Column<'w, T> {
    fn new(set: &'w mut SparseSet<T>) -> Self {
        let (entities, sparse, dense) = set.parts_mut();
        Self {
            entities,
            sparse,
            len: dense.len(),
            dense: dense.as_mut_ptr(),
            _marker: PhantomData,
        }
    }

    /// Owners in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'w [Entity] {
        self.entities
    }

    /// Dense index of `entity`'s value, if this column holds one.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, entity: Entity) -> Option<usize> {
        let index = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.entities[index] == entity).then_some(index)
    }

    /// # Safety
    ///
    /// `index` must come from [`Column::dense_index`], and no other reference
    /// to the same value may be alive for `'w`.
    #[inline]
    unsafe fn get_mut(&self, index: usize) -> &'w mut T {
        debug_assert!(index < self.len, "dense index out of bounds");
        &mut *self.dense.add(index)
    }
}

mod sealed {
    /// Restricts [`Query`](super::Query) to the tuple impls below.
    pub trait Sealed {}
}

/// A set of component types traversed together.
///
/// Implemented for tuples of 1 to 8 distinct [`Component`] types. Each
/// matched entity yields one `&mut` per type.
///
/// The trait is sealed. Parallel passes rely on [`Query::driver`] yielding
/// each entity at most once, which only the tuple impls guarantee.
///
/// ```compile_fail
/// use strata_core::prelude::*;
/// use strata_core::{ComponentRegistry, Query};
///
/// #[derive(Debug)]
/// struct Data(u32);
/// impl Component for Data {}
///
/// struct Repeat;
///
/// impl Query for Repeat {
///     type Item<'w> = <(Data,) as Query>::Item<'w>;
///     type Columns<'w> = <(Data,) as Query>::Columns<'w>;
///
///     fn columns(registry: &mut ComponentRegistry) -> EcsResult<Self::Columns<'_>> {
///         <(Data,)>::columns(registry)
///     }
///
///     fn driver<'w>(columns: &Self::Columns<'w>) -> &'w [Entity] {
///         <(Data,)>::driver(columns)
///     }
///
///     unsafe fn fetch<'w>(columns: &Self::Columns<'w>, entity: Entity) -> Option<Self::Item<'w>> {
///         <(Data,)>::fetch(columns, entity)
///     }
///
///     fn consume_tags(registry: &mut ComponentRegistry, matched: &[Entity]) -> EcsResult<()> {
///         <(Data,)>::consume_tags(registry, matched)
///     }
/// }
/// ```
pub trait Query: sealed::Sealed {
    /// Per-entity item: one `&mut` per component type.
    type Item<'w>;

    /// Borrowed stores for the length of a pass.
    type Columns<'w>: Sync;

    /// Borrows every store the query touches.
    ///
    /// # Errors
    ///
    /// - [`EcsError::NotRegistered`] for an unregistered type
    /// - [`EcsError::DuplicateQueryComponent`] if a type appears twice
    fn columns(registry: &mut ComponentRegistry) -> EcsResult<Self::Columns<'_>>;

    /// Owners of the smallest column. The first one wins ties.
    fn driver<'w>(columns: &Self::Columns<'w>) -> &'w [Entity];

    /// Fetches `entity`'s item, or `None` if any column lacks it.
    ///
    /// # Safety
    ///
    /// No item previously fetched for the same `entity` from `columns` may
    /// still be alive.
    unsafe fn fetch<'w>(columns: &Self::Columns<'w>, entity: Entity) -> Option<Self::Item<'w>>;

    /// Removes every tag type of the query from each matched entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentMissing`] if a matched entity lost a tag.
    fn consume_tags(registry: &mut ComponentRegistry, matched: &[Entity]) -> EcsResult<()>;
}

fn downcast<T: Component>(store: &mut Box<dyn ErasedStore>) -> EcsResult<&mut SparseSet<T>> {
    store
        .as_any_mut()
        .downcast_mut::<SparseSet<T>>()
        .ok_or_else(|| EcsError::NotRegistered(short_name::<T>()))
}

macro_rules! impl_query {
    ($(($name:ident, $col:ident)),+) => {
        impl<$($name: Component),+> sealed::Sealed for ($($name,)+) {}

        impl<$($name: Component),+> Query for ($($name,)+) {
            type Item<'w> = ($(&'w mut $name,)+);
            type Columns<'w> = ($(Column<'w, $name>,)+);

            fn columns(registry: &mut ComponentRegistry) -> EcsResult<Self::Columns<'_>> {
                let ids = [$(registry.id_of::<$name>()?),+];
                let [$($col),+] = registry.stores_disjoint_mut(ids)?;
                Ok(($(Column::new(downcast::<$name>($col)?),)+))
            }

            fn driver<'w>(columns: &Self::Columns<'w>) -> &'w [Entity] {
                let ($($col,)+) = columns;
                [$($col.entities()),+]
                    .into_iter()
                    .min_by_key(|entities| entities.len())
                    .unwrap_or_default()
            }

            unsafe fn fetch<'w>(
                columns: &Self::Columns<'w>,
                entity: Entity,
            ) -> Option<Self::Item<'w>> {
                let ($($col,)+) = columns;
                $(let $col = ($col, $col.dense_index(entity)?);)+
                Some(($($col.0.get_mut($col.1),)+))
            }

            fn consume_tags(
                registry: &mut ComponentRegistry,
                matched: &[Entity],
            ) -> EcsResult<()> {
                $(
                    if $name::IS_TAG {
                        let store = registry.store_mut::<$name>()?;
                        for &entity in matched {
                            store.remove(entity)?;
                        }
                    }
                )+
                Ok(())
            }
        }
    };
}

impl_query!((A, a));
impl_query!((A, a), (B, b));
impl_query!((A, a), (B, b), (C, c));
impl_query!((A, a), (B, b), (C, c), (D, d));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f), (G, g), (H, h));
