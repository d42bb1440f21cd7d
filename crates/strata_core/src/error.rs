//! # Storage Error Types
//!
//! Every error the storage core can report.
//!
//! Most variants are *contract violations*: they mean the caller broke a rule
//! of the API (stale handle, unregistered type, double insert, ...), not that
//! something went wrong at runtime. [`EcsError::is_contract_violation`] tells
//! the two groups apart.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the storage core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle is stale, null, or was never handed out by this world.
    #[error("invalid entity handle {0}")]
    InvalidEntity(Entity),

    /// No more entity slots can be handed out.
    ///
    /// A capacity condition, not a contract violation: checked mode still
    /// returns it.
    #[error("entity capacity exhausted: limit is {limit} slots")]
    EntityCapacityExceeded {
        /// Configured slot limit.
        limit: u32,
    },

    /// The component type was registered twice.
    #[error("component type {0} is already registered")]
    AlreadyRegistered(&'static str),

    /// The component type was used before registration.
    #[error("component type {0} is not registered")]
    NotRegistered(&'static str),

    /// Every registry slot is taken.
    #[error("component registry is full: capacity {capacity} types")]
    RegistryFull {
        /// Configured registry capacity.
        capacity: usize,
    },

    /// Insert into an entity that already holds the component.
    #[error("entity {entity} already has component {component}")]
    ComponentAlreadyPresent {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Read or removal of a component the entity does not hold.
    #[error("entity {entity} has no component {component}")]
    ComponentMissing {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// A tag type that is not zero-sized.
    #[error("tag type {0} must be zero-sized")]
    TagWithPayload(&'static str),

    /// The same component type appears twice in one query.
    #[error("component type requested more than once in query {0}")]
    DuplicateQueryComponent(&'static str),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dedicated worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl EcsError {
    /// Returns `true` when the error indicates a bug in the caller.
    ///
    /// Identity misuse, registry misuse and store misuse are all contract
    /// violations. Running out of entity slots, configuration failures and
    /// worker-pool failures are not.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            Self::EntityCapacityExceeded { .. } | Self::InvalidConfig(_) | Self::WorkerPool(_)
        )
    }
}

/// Result type for storage operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_classification() {
        assert!(EcsError::InvalidEntity(Entity::NULL).is_contract_violation());
        assert!(EcsError::NotRegistered("Position").is_contract_violation());
        assert!(EcsError::ComponentMissing {
            entity: Entity::NULL,
            component: "Position",
        }
        .is_contract_violation());
        assert!(EcsError::TagWithPayload("Stamped").is_contract_violation());
        assert!(!EcsError::EntityCapacityExceeded { limit: 4 }.is_contract_violation());
        assert!(!EcsError::InvalidConfig("bad".into()).is_contract_violation());
        assert!(!EcsError::WorkerPool("no threads".into()).is_contract_violation());
    }

    #[test]
    fn test_error_messages() {
        let err = EcsError::ComponentAlreadyPresent {
            entity: Entity::NULL,
            component: "Health",
        };
        assert_eq!(
            err.to_string(),
            format!("entity {} already has component Health", Entity::NULL)
        );
        assert_eq!(
            EcsError::RegistryFull { capacity: 4 }.to_string(),
            "component registry is full: capacity 4 types"
        );
    }
}
