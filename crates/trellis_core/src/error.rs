//! # Store Error Types
//!
//! Every misuse the store can detect. The plain API treats each of these as
//! fatal (see [`OrFatal`]); the `try_*` API hands them back unchanged.

use thiserror::Error;

use crate::ecs::{ComponentMask, EntityId};

/// Errors that can occur when operating on a [`World`](crate::World).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The null sentinel identifier was passed to an operation.
    #[error("NULL entity cannot be operated on")]
    NullEntity,

    /// The identifier was never issued by the allocator.
    #[error("invalid entity ID out of bounds: {id} (high-water mark {high_water})")]
    EntityOutOfRange {
        /// The offending identifier.
        id: EntityId,
        /// Number of identifiers ever issued.
        high_water: u64,
    },

    /// The identifier was issued but has since been destroyed.
    #[error("attempting to access dead entity {0}")]
    DeadEntity(EntityId),

    /// Creating another entity would exceed the configured limit.
    #[error("entity limit exceeded: {limit} alive")]
    EntityLimitReached {
        /// Configured maximum of living entities.
        limit: usize,
    },

    /// Registering another component type would exceed the configured limit.
    #[error("exceeded max number of registered components ({limit})")]
    ComponentLimitReached {
        /// Configured maximum of component types.
        limit: usize,
    },

    /// The component type has already been registered.
    #[error("component '{component}' already registered")]
    AlreadyRegistered {
        /// Type name of the component.
        component: &'static str,
    },

    /// The component type was used before being registered.
    #[error("attempting to operate on unregistered component '{component}'")]
    Unregistered {
        /// Type name of the component.
        component: &'static str,
    },

    /// The entity already holds this component.
    #[error("{entity} already has component '{component}' added")]
    AlreadyAttached {
        /// The entity.
        entity: EntityId,
        /// Type name of the component.
        component: &'static str,
    },

    /// The entity does not hold this component.
    #[error("{entity} has no component '{component}'")]
    NotAttached {
        /// The entity.
        entity: EntityId,
        /// Type name of the component.
        component: &'static str,
    },

    /// The required list given at the call site differs from the registration.
    #[error("'{component}' required components mismatch: declared {declared}, supplied {supplied}")]
    RequiredMismatch {
        /// Type name of the component being attached.
        component: &'static str,
        /// Mask recorded at registration.
        declared: ComponentMask,
        /// Mask built from the call site.
        supplied: ComponentMask,
    },

    /// The entity lacks one or more prerequisites of the component.
    #[error("{entity} is missing required components {missing} for '{component}'")]
    MissingRequired {
        /// The entity.
        entity: EntityId,
        /// Type name of the component being attached.
        component: &'static str,
        /// Prerequisites the entity does not hold.
        missing: ComponentMask,
    },

    /// The sustained list given at the call site differs from the registration.
    #[error("'{component}' sustained components mismatch: declared {declared}, supplied {supplied}")]
    DependentsMismatch {
        /// Type name of the component being detached.
        component: &'static str,
        /// Dependents mask recorded through registrations.
        declared: ComponentMask,
        /// Mask built from the call site.
        supplied: ComponentMask,
    },

    /// Components depending on this one are still attached.
    #[error("{entity} must first remove dependents {present} of '{component}'")]
    DependentsPresent {
        /// The entity.
        entity: EntityId,
        /// Type name of the component being detached.
        component: &'static str,
        /// Dependents still attached.
        present: ComponentMask,
    },

    /// A query named the same component type twice.
    #[error("component '{component}' appears more than once in a query")]
    DuplicateQueryComponent {
        /// Type name of the component.
        component: &'static str,
    },

    /// A sibling lookup missed during iteration.
    #[error("{entity} missing sibling component '{component}' during iteration")]
    MissingSibling {
        /// The entity owning the main component.
        entity: EntityId,
        /// Type name of the sibling component.
        component: &'static str,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Terminates on a detected misuse.
///
/// Emits the error on the diagnostic channel, then panics. With the
/// workspace's `panic = "abort"` profiles the panic ends the process.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(err: EcsError) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(error = %err, %location, "fatal store misuse");
    panic!("[trellis error]: {err}");
}

/// Converts a store result into its value or a fatal termination.
pub trait OrFatal<T> {
    /// Returns the value, or calls [`fatal`] with the error.
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for EcsResult<T> {
    #[inline]
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::AlreadyAttached {
            entity: EntityId::new(3),
            component: "Position",
        };
        assert_eq!(err.to_string(), "Entity(3) already has component 'Position' added");

        let err = EcsError::EntityLimitReached { limit: 10 };
        assert_eq!(err.to_string(), "entity limit exceeded: 10 alive");
    }

    #[test]
    fn test_or_fatal_passes_values_through() {
        let ok: EcsResult<u32> = Ok(7);
        assert_eq!(ok.or_fatal(), 7);
    }

    #[test]
    #[should_panic(expected = "NULL entity cannot be operated on")]
    fn test_or_fatal_panics_on_error() {
        let err: EcsResult<u32> = Err(EcsError::NullEntity);
        let _ = err.or_fatal();
    }
}
