//! # ECS World
//!
//! The central container: entity allocator, component registry and the
//! debug name table. Attach/detach live in `protocol.rs`, iteration in
//! `query.rs`.
//!
//! Every fallible operation comes in two forms: `try_*` returns
//! [`EcsResult`], the plain form treats the error as fatal.

use std::collections::HashMap;

use super::component::{Component, ComponentId, ComponentMask, ComponentSet};
use super::entity::{EntityAllocator, EntityId, EntityState};
use super::registry::ComponentRegistry;
use super::storage::SparseSet;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult, OrFatal};

/// Name reported for entities created without one.
pub const DEFAULT_ENTITY_NAME: &str = "Entity";

/// The ECS World - owner of every entity and component.
///
/// # Destroy policy
///
/// Destroying an entity removes it from every store it has a component in
/// before its identifier is recycled, so a reissued identifier never
/// inherits stale components.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register::<Position, ()>();
/// world.register::<Velocity, (Position,)>();
///
/// let e = world.create();
/// world.attach::<Position, ()>(e, Position { x: 0.0, y: 0.0 });
/// world.attach::<Velocity, (Position,)>(e, Velocity { x: 1.0, y: 1.0 });
/// ```
#[derive(Debug)]
pub struct World {
    pub(crate) entities: EntityAllocator,
    pub(crate) registry: ComponentRegistry,
    /// Debug labels given at creation.
    names: HashMap<EntityId, String>,
    config: WorldConfig,
}

impl World {
    /// Creates a world with the default [`WorldConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Creates a world with the given limits.
    ///
    /// # Panics
    ///
    /// Fatal if the configuration is invalid.
    #[must_use]
    #[track_caller]
    pub fn with_config(config: WorldConfig) -> Self {
        Self::try_with_config(config).or_fatal()
    }

    /// Creates a world with the given limits.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration is invalid.
    pub fn try_with_config(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            entities: EntityAllocator::new(config.max_entities),
            registry: ComponentRegistry::with_limits(
                config.max_components,
                config.page_size,
                config.dense_reserve,
            ),
            names: HashMap::new(),
            config,
        }
    }

    /// The limits this world was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The component registry.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Creates an entity.
    ///
    /// # Panics
    ///
    /// Fatal if the living-entity limit is reached.
    #[track_caller]
    pub fn create(&mut self) -> EntityId {
        self.try_create().or_fatal()
    }

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityLimitReached`].
    pub fn try_create(&mut self) -> EcsResult<EntityId> {
        let id = self.entities.create()?;
        tracing::debug!(entity = %id, "created entity");
        Ok(id)
    }

    /// Creates an entity with a debug label.
    ///
    /// # Panics
    ///
    /// Fatal if the living-entity limit is reached.
    #[track_caller]
    pub fn create_named(&mut self, name: impl Into<String>) -> EntityId {
        self.try_create_named(name).or_fatal()
    }

    /// Creates an entity with a debug label. An empty label is not stored.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityLimitReached`].
    pub fn try_create_named(&mut self, name: impl Into<String>) -> EcsResult<EntityId> {
        let id = self.entities.create()?;
        let name = name.into();
        tracing::debug!(entity = %id, name = %name, "created entity");
        if !name.is_empty() {
            self.names.insert(id, name);
        }
        Ok(id)
    }

    /// Destroys an entity, removing all of its components.
    ///
    /// Dependency ordering is not checked: the whole entity goes away.
    /// Must not be called while iterating; see [`Commands`](super::Commands)
    /// and [`flag_for_destroy`](Self::flag_for_destroy).
    ///
    /// # Panics
    ///
    /// Fatal if `id` is null, never issued, or already destroyed.
    #[track_caller]
    pub fn destroy(&mut self, id: EntityId) {
        self.try_destroy(id).or_fatal();
    }

    /// Destroys an entity, removing all of its components.
    ///
    /// # Errors
    ///
    /// [`EcsError::NullEntity`], [`EcsError::EntityOutOfRange`] or
    /// [`EcsError::DeadEntity`].
    pub fn try_destroy(&mut self, id: EntityId) -> EcsResult<()> {
        let mask = self.entities.record(id)?.mask;
        let removed = self.registry.sweep(id, mask);
        debug_assert_eq!(removed, mask.len(), "component mask out of sync with stores");

        self.entities.destroy(id)?;
        let name = self.names.remove(&id);
        tracing::debug!(
            entity = %id,
            name = name.as_deref().unwrap_or(DEFAULT_ENTITY_NAME),
            components = removed,
            "destroyed entity"
        );
        Ok(())
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    /// Number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Number of identifiers ever issued.
    #[inline]
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        self.entities.high_water_mark()
    }

    /// Live entities in ID order, optionally leaving out flagged ones.
    #[must_use]
    pub fn alive(&self, include_flagged: bool) -> Vec<EntityId> {
        self.entities
            .iter_alive()
            .filter(|(_, record)| include_flagged || record.state != EntityState::Flagged)
            .map(|(id, _)| id)
            .collect()
    }

    /// Debug label of an entity, `"Entity"` if none was given.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive.
    #[track_caller]
    pub fn entity_name(&self, id: EntityId) -> &str {
        self.try_entity_name(id).or_fatal()
    }

    /// Debug label of an entity, `"Entity"` if none was given.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive.
    pub fn try_entity_name(&self, id: EntityId) -> EcsResult<&str> {
        self.entities.validate(id)?;
        Ok(self
            .names
            .get(&id)
            .map_or(DEFAULT_ENTITY_NAME, String::as_str))
    }

    /// Renders `['name', ID: n]` for diagnostics. Works on any ID.
    #[must_use]
    pub fn describe(&self, id: EntityId) -> String {
        let name = self
            .names
            .get(&id)
            .map_or(DEFAULT_ENTITY_NAME, String::as_str);
        if id.is_null() {
            format!("['{name}', ID: NULL]")
        } else {
            format!("['{name}', ID: {}]", id.raw())
        }
    }

    // =========================================================================
    // Deferred destruction
    // =========================================================================

    /// Marks or unmarks an entity for the next [`destroy_flagged`](Self::destroy_flagged).
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive.
    #[track_caller]
    pub fn flag_for_destroy(&mut self, id: EntityId, flag: bool) {
        self.try_flag_for_destroy(id, flag).or_fatal();
    }

    /// Marks or unmarks an entity for the next [`destroy_flagged`](Self::destroy_flagged).
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive.
    pub fn try_flag_for_destroy(&mut self, id: EntityId, flag: bool) -> EcsResult<()> {
        let record = self.entities.record_mut(id)?;
        record.state = if flag {
            EntityState::Flagged
        } else {
            EntityState::Alive
        };
        Ok(())
    }

    /// Checks if an entity is alive and flagged.
    #[must_use]
    pub fn is_flagged(&self, id: EntityId) -> bool {
        self.entities
            .record(id)
            .is_ok_and(|record| record.state == EntityState::Flagged)
    }

    /// Destroys every flagged entity. Returns how many were destroyed.
    pub fn destroy_flagged(&mut self) -> usize {
        let flagged: Vec<EntityId> = self
            .entities
            .iter_alive()
            .filter(|(_, record)| record.state == EntityState::Flagged)
            .map(|(id, _)| id)
            .collect();
        for id in &flagged {
            self.destroy(*id);
        }
        flagged.len()
    }

    /// Destroys every entity. Registrations are kept; identifiers restart at 0.
    pub fn clear(&mut self) {
        self.registry.clear_stores();
        self.entities.clear();
        self.names.clear();
        tracing::debug!("cleared world");
    }

    // =========================================================================
    // Registration and direct access
    // =========================================================================

    /// Registers `T`, requiring the types in `R` to be attached first.
    ///
    /// # Panics
    ///
    /// Fatal if `T` is already registered, the type limit is reached, or a
    /// member of `R` is unregistered.
    #[track_caller]
    pub fn register<T: Component, R: ComponentSet>(&mut self) -> ComponentId {
        self.try_register::<T, R>().or_fatal()
    }

    /// Registers `T`, requiring the types in `R` to be attached first.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register`].
    pub fn try_register<T: Component, R: ComponentSet>(&mut self) -> EcsResult<ComponentId> {
        self.registry.register::<T, R>()
    }

    /// Bit position of `T`, or `None` if unregistered.
    #[inline]
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.registry.id_of::<T>()
    }

    /// Checks if an entity holds `T`.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive or `T` is unregistered.
    #[track_caller]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.try_has::<T>(id).or_fatal()
    }

    /// Checks if an entity holds `T`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive or `T` is unregistered.
    pub fn try_has<T: Component>(&self, id: EntityId) -> EcsResult<bool> {
        let bit = self.registry.require_id::<T>()?;
        Ok(self.entities.record(id)?.mask.contains(bit))
    }

    /// Checks if an entity holds every type in `S`.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive or a member of `S` is unregistered.
    #[track_caller]
    pub fn has_all<S: ComponentSet>(&self, id: EntityId) -> bool {
        self.try_has_all::<S>(id).or_fatal()
    }

    /// Checks if an entity holds every type in `S`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive or a member of `S` is unregistered.
    pub fn try_has_all<S: ComponentSet>(&self, id: EntityId) -> EcsResult<bool> {
        let mask = self.registry.mask_of::<S>()?;
        Ok(self.entities.record(id)?.mask.contains_all(mask))
    }

    /// Mask of the components attached to an entity.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive.
    #[track_caller]
    pub fn component_mask(&self, id: EntityId) -> ComponentMask {
        self.entities.record(id).or_fatal().mask
    }

    /// Type names of the components attached to an entity, in bit order.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive.
    #[track_caller]
    pub fn component_names(&self, id: EntityId) -> Vec<&'static str> {
        self.registry.names(self.component_mask(id)).collect()
    }

    /// Gets an entity's `T`.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive, `T` is unregistered, or not attached.
    #[track_caller]
    pub fn get<T: Component>(&self, id: EntityId) -> &T {
        self.try_get::<T>(id).or_fatal()
    }

    /// Gets an entity's `T`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive, `T` is unregistered, or not attached.
    pub fn try_get<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        self.entities.validate(id)?;
        self.registry
            .store::<T>()?
            .get(id)
            .ok_or(EcsError::NotAttached {
                entity: id,
                component: std::any::type_name::<T>(),
            })
    }

    /// Gets an entity's `T` mutably.
    ///
    /// # Panics
    ///
    /// Fatal if `id` is not alive, `T` is unregistered, or not attached.
    #[track_caller]
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> &mut T {
        self.try_get_mut::<T>(id).or_fatal()
    }

    /// Gets an entity's `T` mutably.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not alive, `T` is unregistered, or not attached.
    pub fn try_get_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        self.entities.validate(id)?;
        self.registry
            .store_mut::<T>()?
            .get_mut(id)
            .ok_or(EcsError::NotAttached {
                entity: id,
                component: std::any::type_name::<T>(),
            })
    }

    /// Read-only access to the store of `T`.
    ///
    /// # Panics
    ///
    /// Fatal if `T` is unregistered.
    #[track_caller]
    pub fn pool<T: Component>(&self) -> &SparseSet<T> {
        self.try_pool::<T>().or_fatal()
    }

    /// Read-only access to the store of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`].
    pub fn try_pool<T: Component>(&self) -> EcsResult<&SparseSet<T>> {
        self.registry.store::<T>()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32, i32);
    #[derive(Debug, PartialEq)]
    struct Tag;

    #[test]
    fn test_world_creation() {
        let world = World::new();
        assert_eq!(world.alive_count(), 0);
        assert_eq!(world.config(), &WorldConfig::default());
        assert!(world.registry().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = WorldConfig {
            page_size: 0,
            ..WorldConfig::default()
        };
        assert!(matches!(
            World::try_with_config(config),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_create_destroy() {
        let mut world = World::new();
        let a = world.create();
        let b = world.create();
        assert!(world.is_alive(a));
        assert_eq!(world.alive_count(), 2);

        world.destroy(a);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(b));
        assert_eq!(world.alive_count(), 1);

        // Recycled before the high-water mark moves.
        assert_eq!(world.create(), a);
        assert_eq!(world.high_water_mark(), 2);
    }

    #[test]
    fn test_entity_limit() {
        let mut world = World::with_config(WorldConfig {
            max_entities: 1,
            ..WorldConfig::default()
        });
        world.create();
        assert_eq!(
            world.try_create(),
            Err(EcsError::EntityLimitReached { limit: 1 })
        );
    }

    #[test]
    #[should_panic(expected = "entity limit exceeded")]
    fn test_entity_limit_is_fatal() {
        let mut world = World::with_config(WorldConfig {
            max_entities: 1,
            ..WorldConfig::default()
        });
        world.create();
        world.create();
    }

    #[test]
    #[should_panic(expected = "NULL entity cannot be operated on")]
    fn test_destroy_null_is_fatal() {
        let mut world = World::new();
        world.destroy(EntityId::NULL);
    }

    #[test]
    #[should_panic(expected = "attempting to access dead entity")]
    fn test_double_destroy_is_fatal() {
        let mut world = World::new();
        let e = world.create();
        world.destroy(e);
        world.destroy(e);
    }

    #[test]
    fn test_names() {
        let mut world = World::new();
        let player = world.create_named("player");
        let anon = world.create();
        let empty = world.create_named("");

        assert_eq!(world.entity_name(player), "player");
        assert_eq!(world.entity_name(anon), "Entity");
        assert_eq!(world.entity_name(empty), "Entity");
        assert_eq!(world.describe(player), format!("['player', ID: {}]", player.raw()));

        world.destroy(player);
        assert!(world.try_entity_name(player).is_err());
        let reused = world.create();
        assert_eq!(reused, player);
        assert_eq!(world.entity_name(reused), "Entity");
    }

    #[test]
    fn test_destroy_sweeps_components() {
        let mut world = World::new();
        world.register::<Position, ()>();
        world.register::<Tag, (Position,)>();

        let e = world.create();
        world.attach::<Position, ()>(e, Position(1, 2));
        world.attach::<Tag, (Position,)>(e, Tag);
        let other = world.create();
        world.attach::<Position, ()>(other, Position(3, 4));

        world.destroy(e);
        assert_eq!(world.pool::<Position>().len(), 1);
        assert!(world.pool::<Tag>().is_empty());
        assert_eq!(world.get::<Position>(other), &Position(3, 4));

        let reused = world.create();
        assert_eq!(reused, e);
        assert!(!world.has::<Position>(reused));
        assert!(world.component_mask(reused).is_empty());
    }

    #[test]
    fn test_flag_and_destroy_flagged() {
        let mut world = World::new();
        let ids: Vec<_> = (0..5).map(|_| world.create()).collect();

        world.flag_for_destroy(ids[1], true);
        world.flag_for_destroy(ids[3], true);
        world.flag_for_destroy(ids[4], true);
        world.flag_for_destroy(ids[4], false);
        assert!(world.is_flagged(ids[1]));
        assert!(!world.is_flagged(ids[4]));

        assert_eq!(world.alive(false), vec![ids[0], ids[2], ids[4]]);
        assert_eq!(world.alive(true).len(), 5);

        assert_eq!(world.destroy_flagged(), 2);
        assert_eq!(world.alive(true), vec![ids[0], ids[2], ids[4]]);
        assert_eq!(world.destroy_flagged(), 0);
    }

    #[test]
    fn test_get_errors() {
        let mut world = World::new();
        let e = world.create();
        assert!(matches!(
            world.try_get::<Position>(e),
            Err(EcsError::Unregistered { .. })
        ));

        world.register::<Position, ()>();
        assert!(matches!(
            world.try_get::<Position>(e),
            Err(EcsError::NotAttached { entity, .. }) if entity == e
        ));

        world.attach::<Position, ()>(e, Position(0, 0));
        world.get_mut::<Position>(e).0 = 9;
        assert_eq!(world.get::<Position>(e), &Position(9, 0));
    }

    #[test]
    #[should_panic(expected = "has no component")]
    fn test_get_missing_is_fatal() {
        let mut world = World::new();
        world.register::<Position, ()>();
        let e = world.create();
        let _ = world.get::<Position>(e);
    }

    #[test]
    fn test_component_names() {
        let mut world = World::new();
        world.register::<Position, ()>();
        world.register::<Tag, ()>();
        let e = world.create();
        world.attach::<Tag, ()>(e, Tag);
        world.attach::<Position, ()>(e, Position(0, 0));

        let names = world.component_names(e);
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("Position"));
        assert!(names[1].ends_with("Tag"));
    }

    #[test]
    fn test_clear_keeps_registrations() {
        let mut world = World::new();
        world.register::<Position, ()>();
        let e = world.create();
        world.attach::<Position, ()>(e, Position(1, 1));

        world.clear();
        assert_eq!(world.alive_count(), 0);
        assert!(world.pool::<Position>().is_empty());
        assert!(world.component_id::<Position>().is_some());
        assert_eq!(world.create(), EntityId::new(0));
    }
}
