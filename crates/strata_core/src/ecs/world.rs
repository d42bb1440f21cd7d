//! # ECS World
//!
//! The central container for all entities and components.
//!
//! The world owns the handle allocator, the component registry, its
//! configuration and (optionally) a dedicated worker pool for parallel
//! passes. Every structural change goes through it, so a destroyed entity is
//! purged from every store before its slot can be reused.

use super::component::Component;
use super::entity::{Entities, Entity};
use super::registry::{ComponentId, ComponentInfo, ComponentRegistry};
use super::storage::SparseSet;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// The ECS World - container for all entity state.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register::<Position>()?;
///
/// let entity = world.create()?;
/// world.add(entity, Position::new(1.0, 2.0, 3.0))?;
/// ```
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) entities: Entities,
    pub(crate) registry: ComponentRegistry,
    /// Dedicated pool for parallel passes. `None` uses the global pool.
    pub(crate) pool: Option<rayon::ThreadPool>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default(), None)
    }

    /// Creates a world from a configuration.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidConfig`] if the config fails validation
    /// - [`EcsError::WorkerPool`] if the worker pool cannot be started
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;

        let pool = config
            .worker_threads
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("strata-worker-{i}"))
                    .build()
                    .map_err(|e| EcsError::WorkerPool(e.to_string()))
            })
            .transpose()?;

        Ok(Self::build(config, pool))
    }

    fn build(config: WorldConfig, pool: Option<rayon::ThreadPool>) -> Self {
        tracing::debug!(
            max_component_types = config.max_component_types,
            max_entities = config.max_entities,
            worker_threads = ?config.worker_threads,
            assert_contracts = config.assert_contracts,
            "world created"
        );

        Self {
            entities: Entities::new(config.max_entities, config.initial_entity_capacity),
            registry: ComponentRegistry::new(
                config.max_component_types,
                config.initial_entity_capacity,
            ),
            config,
            pool,
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Routes a result through checked mode.
    pub(crate) fn guard<T>(&self, result: EcsResult<T>) -> EcsResult<T> {
        guard(self.config.assert_contracts, result)
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Registers a component type. Must happen before first use of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyRegistered`] or [`EcsError::RegistryFull`].
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        let result = self.registry.register::<T>();
        self.guard(result)
    }

    /// Returns the id of `T`, if registered.
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.registry.component_id::<T>()
    }

    /// Returns the metadata of `T`, if registered.
    #[must_use]
    pub fn component_info<T: Component>(&self) -> Option<&ComponentInfo> {
        self.registry
            .component_id::<T>()
            .and_then(|id| self.registry.info(id))
    }

    /// Returns the registry.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates a new entity with no components.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExceeded`] when the slot limit is reached.
    pub fn create(&mut self) -> EcsResult<Entity> {
        let result = self.entities.create();
        self.guard(result)
    }

    /// Destroys an entity and drops all of its components.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if the handle is stale or null.
    pub fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        let result = self.destroy_unguarded(entity);
        self.guard(result)
    }

    pub(crate) fn destroy_unguarded(&mut self, entity: Entity) -> EcsResult<()> {
        self.check(entity)?;
        self.registry.remove_entity(entity);
        self.entities.destroy(entity)
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Returns the handle allocator.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &Entities {
        &self.entities
    }

    #[inline]
    fn check(&self, entity: Entity) -> EcsResult<()> {
        if self.entities.is_valid(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches a component to an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`], [`EcsError::NotRegistered`] or
    /// [`EcsError::ComponentAlreadyPresent`].
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let result = self.add_unguarded(entity, value);
        self.guard(result)
    }

    pub(crate) fn add_unguarded<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        self.check(entity)?;
        self.registry.store_mut::<T>()?.insert(entity, value)
    }

    /// Attaches `T::default()` to an entity. The usual way to set a tag.
    ///
    /// # Errors
    ///
    /// Same as [`World::add`].
    pub fn add_default<T: Component + Default>(&mut self, entity: Entity) -> EcsResult<()> {
        self.add(entity, T::default())
    }

    /// Detaches and returns a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`], [`EcsError::NotRegistered`] or
    /// [`EcsError::ComponentMissing`].
    pub fn remove<T: Component>(&mut self, entity: Entity) -> EcsResult<T> {
        let result = self.remove_unguarded::<T>(entity);
        self.guard(result)
    }

    pub(crate) fn remove_unguarded<T: Component>(&mut self, entity: Entity) -> EcsResult<T> {
        self.check(entity)?;
        self.registry.store_mut::<T>()?.remove(entity)
    }

    /// Detaches a component if the entity has one.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] or [`EcsError::NotRegistered`].
    pub fn remove_if_present<T: Component>(&mut self, entity: Entity) -> EcsResult<Option<T>> {
        let result = self
            .check(entity)
            .and_then(|()| self.registry.store_mut::<T>())
            .map(|store| store.remove_if_present(entity));
        self.guard(result)
    }

    /// Returns a reference to a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`], [`EcsError::NotRegistered`] or
    /// [`EcsError::ComponentMissing`].
    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        let result = self
            .check(entity)
            .and_then(|()| self.registry.store::<T>())
            .and_then(|store| store.get(entity));
        self.guard(result)
    }

    /// Returns a mutable reference to a component.
    ///
    /// # Errors
    ///
    /// Same as [`World::get`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let assert_contracts = self.config.assert_contracts;
        let result = match self.check(entity) {
            Ok(()) => self
                .registry
                .store_mut::<T>()
                .and_then(|store| store.get_mut(entity)),
            Err(err) => Err(err),
        };
        guard(assert_contracts, result)
    }

    /// Checks if an entity has a component.
    ///
    /// Returns `false` for invalid handles and unregistered types.
    ///
    /// # Panics
    ///
    /// In checked mode, if `T` was never registered.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match self.registry.store::<T>() {
            Ok(store) => self.entities.is_valid(entity) && store.contains(entity),
            Err(err) => self.guard(Err::<bool, _>(err)).unwrap_or(false),
        }
    }

    /// Returns the read-only store of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotRegistered`] if `T` was never registered.
    pub fn store<T: Component>(&self) -> EcsResult<&SparseSet<T>> {
        let result = self.registry.store::<T>();
        self.guard(result)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tears the world down, dropping every store exactly once in
    /// registration order.
    pub fn shutdown(self) {
        tracing::info!(
            stores = self.registry.len(),
            entities = self.entities.alive_count(),
            "shutting down world"
        );
        self.registry.shutdown();
    }
}

/// Panics on contract violations when checked mode is on.
///
/// # Panics
///
/// When `assert_contracts` is set and `result` holds a contract violation.
pub(crate) fn guard<T>(assert_contracts: bool, result: EcsResult<T>) -> EcsResult<T> {
    if assert_contracts {
        if let Err(err) = &result {
            assert!(!err.is_contract_violation(), "contract violation: {err}");
        }
    }
    result
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.alive_count())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}
