//! # World Configuration
//!
//! Sizing and threading knobs for a [`World`](crate::World).
//!
//! Configs are loaded once at startup, either built in code or parsed from a
//! TOML table:
//!
//! ```toml
//! max_component_types = 32
//! worker_threads = 4
//! assert_contracts = true
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Configuration for a world.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Maximum number of component types that can be registered.
    pub max_component_types: usize,
    /// Entity slots reserved up front.
    pub initial_entity_capacity: usize,
    /// Maximum number of entity slots ever handed out.
    pub max_entities: u32,
    /// Size of a dedicated worker pool for parallel passes.
    /// `None` runs parallel passes on the global rayon pool.
    pub worker_threads: Option<usize>,
    /// Smallest number of driver entities a parallel job is split into.
    pub min_parallel_batch: usize,
    /// Panic on contract violations instead of returning them.
    pub assert_contracts: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_component_types: 64,
            initial_entity_capacity: 1024,
            max_entities: u32::MAX - 1, // u32::MAX is the null slot
            worker_threads: None,
            min_parallel_batch: 64,
            assert_contracts: false,
        }
    }
}

impl WorldConfig {
    /// Server config: large up-front reservation, fixed worker pool.
    ///
    /// Sized for ~100K live entities with a pool that leaves headroom for the
    /// network and persistence threads.
    #[must_use]
    pub const fn server() -> Self {
        Self {
            max_component_types: 128,
            initial_entity_capacity: 131_072,
            max_entities: u32::MAX - 1,
            worker_threads: Some(8),
            min_parallel_batch: 256, // Amortizes per-job overhead on big stores
            assert_contracts: false,
        }
    }

    /// Parses a config from a TOML table. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on malformed TOML, unknown keys, or values
    /// rejected by [`WorldConfig::validate`].
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_component_types == 0 {
            return Err(EcsError::InvalidConfig(
                "max_component_types must be greater than zero".into(),
            ));
        }
        if self.max_entities == 0 || self.max_entities == u32::MAX {
            return Err(EcsError::InvalidConfig(format!(
                "max_entities must be in 1..={}",
                u32::MAX - 1
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(EcsError::InvalidConfig(
                "worker_threads must be greater than zero when set".into(),
            ));
        }
        if self.min_parallel_batch == 0 {
            return Err(EcsError::InvalidConfig(
                "min_parallel_batch must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
