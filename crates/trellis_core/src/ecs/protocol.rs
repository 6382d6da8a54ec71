//! # Attach / Detach
//!
//! Components are added and removed only through these two operations,
//! which check the dependency masks recorded at registration before they
//! touch a store.
//!
//! Every call site restates the dependency list it expects:
//!
//! ```rust,ignore
//! world.attach::<Velocity, (Position,)>(e, Velocity::default()); // requires Position
//! world.detach::<Velocity, ()>(e);                              // nothing requires Velocity
//! world.detach::<Position, (Velocity,)>(e);                     // Velocity requires Position
//! ```
//!
//! A list that differs from the registration is rejected even if the entity
//! would otherwise pass the check.

use std::any::type_name;

use super::component::{Component, ComponentMask, ComponentSet};
use super::entity::EntityId;
use super::world::World;
use crate::error::{EcsError, EcsResult, OrFatal};

impl World {
    /// Attaches `value` to `id`. `R` must equal `T`'s registered prerequisites.
    ///
    /// An unregistered `T` is registered on the spot with no prerequisites.
    ///
    /// # Panics
    ///
    /// Fatal on any error [`try_attach`](Self::try_attach) reports.
    #[track_caller]
    pub fn attach<T: Component, R: ComponentSet>(&mut self, id: EntityId, value: T) -> &mut T {
        self.try_attach::<T, R>(id, value).or_fatal()
    }

    /// Attaches `value` to `id`. `R` must equal `T`'s registered prerequisites.
    ///
    /// # Errors
    ///
    /// - the entity is null, never issued, or dead
    /// - [`EcsError::AlreadyAttached`]
    /// - [`EcsError::RequiredMismatch`] if `R` differs from the registration
    /// - [`EcsError::MissingRequired`] if the entity lacks a member of `R`
    /// - [`EcsError::Unregistered`] if a member of `R` isn't registered
    ///
    /// Nothing is changed when an error is returned.
    pub fn try_attach<T: Component, R: ComponentSet>(
        &mut self,
        id: EntityId,
        value: T,
    ) -> EcsResult<&mut T> {
        let component = type_name::<T>();
        let held = self.entities.record(id)?.mask;
        let supplied = self.registry.mask_of::<R>()?;

        let (bit, declared) = match self.registry.info_of::<T>() {
            Ok(info) => (Some(info.id), info.required),
            Err(_) => (None, ComponentMask::EMPTY),
        };

        if bit.is_some_and(|bit| held.contains(bit)) {
            return Err(EcsError::AlreadyAttached { entity: id, component });
        }
        if supplied != declared {
            return Err(EcsError::RequiredMismatch {
                component,
                declared,
                supplied,
            });
        }
        let missing = declared.difference(held);
        if !missing.is_empty() {
            return Err(EcsError::MissingRequired {
                entity: id,
                component,
                missing,
            });
        }

        let bit = match bit {
            Some(bit) => bit,
            None => self.registry.register::<T, ()>()?,
        };
        self.entities.record_mut(id)?.mask.insert(bit);
        tracing::debug!(entity = %id, component, "attached component");

        let store = self.registry.store_mut::<T>()?;
        Ok(store.set(id, value))
    }

    /// Detaches `T` from `id` and returns it. `S` must equal the set of types
    /// that require `T`.
    ///
    /// # Panics
    ///
    /// Fatal on any error [`try_detach`](Self::try_detach) reports.
    #[track_caller]
    pub fn detach<T: Component, S: ComponentSet>(&mut self, id: EntityId) -> T {
        self.try_detach::<T, S>(id).or_fatal()
    }

    /// Detaches `T` from `id` and returns it. `S` must equal the set of types
    /// that require `T`.
    ///
    /// # Errors
    ///
    /// - the entity is null, never issued, or dead
    /// - [`EcsError::Unregistered`] if `T` or a member of `S` isn't registered
    /// - [`EcsError::NotAttached`]
    /// - [`EcsError::DependentsMismatch`] if `S` differs from the registrations
    /// - [`EcsError::DependentsPresent`] if the entity still holds a member of `S`
    ///
    /// Nothing is changed when an error is returned.
    pub fn try_detach<T: Component, S: ComponentSet>(&mut self, id: EntityId) -> EcsResult<T> {
        let component = type_name::<T>();
        let held = self.entities.record(id)?.mask;
        let info = *self.registry.info_of::<T>()?;

        if !held.contains(info.id) {
            return Err(EcsError::NotAttached { entity: id, component });
        }
        let supplied = self.registry.mask_of::<S>()?;
        if supplied != info.dependents {
            return Err(EcsError::DependentsMismatch {
                component,
                declared: info.dependents,
                supplied,
            });
        }
        let present = held.intersection(info.dependents);
        if !present.is_empty() {
            return Err(EcsError::DependentsPresent {
                entity: id,
                component,
                present,
            });
        }

        let value = self
            .registry
            .store_mut::<T>()?
            .remove(id)
            .ok_or(EcsError::NotAttached { entity: id, component })?;
        self.entities.record_mut(id)?.mask.remove(info.id);
        tracing::debug!(entity = %id, component, "detached component");
        Ok(value)
    }
}
