//! # World Configuration
//!
//! Limits fixed when a [`World`](crate::World) is created. Loaded once at
//! startup, from code or from a TOML file:
//!
//! ```toml
//! max_entities = 250000
//! max_components = 32
//! page_size = 4096
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::{DEFAULT_PAGE_SIZE, MAX_COMPONENTS};
use crate::error::{EcsError, EcsResult};

/// Default living-entity limit.
pub const DEFAULT_MAX_ENTITIES: usize = 1_000_000;

/// Default initial dense capacity of each store.
pub const DEFAULT_DENSE_RESERVE: usize = 100;

/// Store limits. Not mutable once a world is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Maximum number of simultaneously alive entities.
    pub max_entities: usize,
    /// Maximum number of registrable component types (at most 64).
    pub max_components: usize,
    /// Sparse slots per page in every store.
    pub page_size: usize,
    /// Dense entries reserved up front in every store.
    pub dense_reserve: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_components: MAX_COMPONENTS,
            page_size: DEFAULT_PAGE_SIZE,
            dense_reserve: DEFAULT_DENSE_RESERVE,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on a parse error or an invalid value.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| EcsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the file can't be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|err| EcsError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks every limit is usable.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_entities == 0 {
            return Err(EcsError::InvalidConfig(
                "max_entities must be greater than zero".into(),
            ));
        }
        if self.max_components == 0 || self.max_components > MAX_COMPONENTS {
            return Err(EcsError::InvalidConfig(format!(
                "max_components must be in 1..={MAX_COMPONENTS}, got {}",
                self.max_components
            )));
        }
        if self.page_size == 0 {
            return Err(EcsError::InvalidConfig(
                "page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
