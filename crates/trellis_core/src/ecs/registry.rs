//! # Component Registry
//!
//! Owns one [`SparseSet`] per registered component type, indexed by the
//! type's bit position, together with its dependency masks:
//!
//! - `required`: types that must be attached before this one
//! - `dependents`: types that declared this one as required (the reverse
//!   edge), which must be detached before this one
//!
//! Both edges are fixed-width bitsets, so membership tests are O(1).

use std::any::TypeId;
use std::collections::HashMap;

use super::component::{Component, ComponentId, ComponentKey, ComponentMask, ComponentSet, MAX_COMPONENTS};
use super::entity::EntityId;
use super::storage::{ErasedStore, SparseSet, DEFAULT_PAGE_SIZE};
use crate::error::{EcsError, EcsResult};

/// Registration data of one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Bit position of the type.
    pub id: ComponentId,
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Types that must be attached before this one.
    pub required: ComponentMask,
    /// Types that require this one.
    pub dependents: ComponentMask,
}

/// One registered type: its info and its store.
///
/// The store is `None` only while a query has it checked out.
struct ComponentSlot {
    info: ComponentInfo,
    store: Option<Box<dyn ErasedStore>>,
}

/// Registry of component types and their stores.
pub struct ComponentRegistry {
    /// Indexed by bit position.
    slots: Vec<ComponentSlot>,
    /// Type identity to bit position.
    by_type: HashMap<TypeId, ComponentId>,
    /// Maximum number of registrable types.
    max_components: usize,
    /// Page size for new stores.
    page_size: usize,
    /// Initial dense capacity for new stores.
    dense_reserve: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry with default store settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(MAX_COMPONENTS, DEFAULT_PAGE_SIZE, 0)
    }

    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `max_components` - Type limit, clamped to [`MAX_COMPONENTS`]
    /// * `page_size` - Sparse page size of every store
    /// * `dense_reserve` - Initial dense capacity of every store
    #[must_use]
    pub fn with_limits(max_components: usize, page_size: usize, dense_reserve: usize) -> Self {
        Self {
            slots: Vec::new(),
            by_type: HashMap::new(),
            max_components: max_components.min(MAX_COMPONENTS),
            page_size,
            dense_reserve,
        }
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Configured type limit.
    #[inline]
    #[must_use]
    pub const fn max_components(&self) -> usize {
        self.max_components
    }

    /// Registers `T` with the prerequisites `R` and creates its store.
    ///
    /// `T`'s bit is broadcast into the `dependents` mask of every type in `R`.
    ///
    /// # Errors
    ///
    /// [`EcsError::AlreadyRegistered`], [`EcsError::ComponentLimitReached`],
    /// or [`EcsError::Unregistered`] if a member of `R` isn't registered.
    pub fn register<T: Component, R: ComponentSet>(&mut self) -> EcsResult<ComponentId> {
        let key = ComponentKey::of::<T>();
        if self.by_type.contains_key(&key.type_id) {
            return Err(EcsError::AlreadyRegistered { component: key.name });
        }
        if self.slots.len() >= self.max_components {
            return Err(EcsError::ComponentLimitReached {
                limit: self.max_components,
            });
        }
        let required = self.mask_of::<R>()?;

        // Below max_components, which is at most 64.
        let id = ComponentId::new(self.slots.len() as u8);
        let mut store = SparseSet::<T>::with_page_size(self.page_size);
        store.reserve(self.dense_reserve);

        self.slots.push(ComponentSlot {
            info: ComponentInfo {
                id,
                name: key.name,
                required,
                dependents: ComponentMask::EMPTY,
            },
            store: Some(Box::new(store)),
        });
        self.by_type.insert(key.type_id, id);

        for prerequisite in required {
            self.slots[prerequisite.index()].info.dependents.insert(id);
        }

        tracing::debug!(component = key.name, bit = id.bit(), %required, "registered component");
        Ok(id)
    }

    /// Bit position of `T`, or `None` if unregistered.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Bit position of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` isn't registered.
    pub fn require_id<T: Component>(&self) -> EcsResult<ComponentId> {
        self.id_of::<T>().ok_or(EcsError::Unregistered {
            component: std::any::type_name::<T>(),
        })
    }

    /// Builds the mask of a type list. Every member must be registered.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] naming the first unregistered member.
    pub fn mask_of<S: ComponentSet>(&self) -> EcsResult<ComponentMask> {
        let mut mask = ComponentMask::EMPTY;
        let mut unregistered = None;
        S::visit(&mut |key| match self.by_type.get(&key.type_id) {
            Some(id) => {
                mask.insert(*id);
            }
            None => {
                unregistered.get_or_insert(key.name);
            }
        });
        match unregistered {
            Some(component) => Err(EcsError::Unregistered { component }),
            None => Ok(mask),
        }
    }

    /// Registration data of the type at `id`.
    #[inline]
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.slots.get(id.index()).map(|slot| &slot.info)
    }

    /// Registration data of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` isn't registered.
    pub fn info_of<T: Component>(&self) -> EcsResult<&ComponentInfo> {
        let id = self.require_id::<T>()?;
        Ok(&self.slots[id.index()].info)
    }

    /// Iterates over every registration in bit order.
    pub fn infos(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.slots.iter().map(|slot| &slot.info)
    }

    /// Names of the types whose bits are set in `mask`.
    pub fn names(&self, mask: ComponentMask) -> impl Iterator<Item = &'static str> + '_ {
        mask.iter()
            .filter_map(|id| self.info(id))
            .map(|info| info.name)
    }

    /// Store of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` isn't registered, or
    /// [`EcsError::DuplicateQueryComponent`] while a query has the store
    /// checked out.
    pub fn store<T: Component>(&self) -> EcsResult<&SparseSet<T>> {
        let id = self.require_id::<T>()?;
        self.slots[id.index()]
            .store
            .as_deref()
            .and_then(|store| store.as_any().downcast_ref::<SparseSet<T>>())
            .ok_or(EcsError::DuplicateQueryComponent {
                component: std::any::type_name::<T>(),
            })
    }

    /// Store of `T`, mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`] if `T` isn't registered, or
    /// [`EcsError::DuplicateQueryComponent`] while a query has the store
    /// checked out.
    pub fn store_mut<T: Component>(&mut self) -> EcsResult<&mut SparseSet<T>> {
        let id = self.require_id::<T>()?;
        self.slots[id.index()]
            .store
            .as_deref_mut()
            .and_then(|store| store.as_any_mut().downcast_mut::<SparseSet<T>>())
            .ok_or(EcsError::DuplicateQueryComponent {
                component: std::any::type_name::<T>(),
            })
    }

    /// Store of `T`, registering `T` without prerequisites on first use.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register) when registration is needed.
    pub fn store_or_register<T: Component>(&mut self) -> EcsResult<&mut SparseSet<T>> {
        if self.id_of::<T>().is_none() {
            self.register::<T, ()>()?;
        }
        self.store_mut::<T>()
    }

    /// Checks the store of `T` out of the registry.
    ///
    /// Used by queries to hold several stores mutably at once. The store must
    /// be handed back with [`restore`](Self::restore).
    ///
    /// # Errors
    ///
    /// [`EcsError::Unregistered`], or [`EcsError::DuplicateQueryComponent`] if
    /// it is already checked out.
    pub(crate) fn take<T: Component>(&mut self) -> EcsResult<Box<SparseSet<T>>> {
        let id = self.require_id::<T>()?;
        let name = std::any::type_name::<T>();
        let store = self.slots[id.index()]
            .store
            .take()
            .ok_or(EcsError::DuplicateQueryComponent { component: name })?;
        match store.into_any().downcast::<SparseSet<T>>() {
            Ok(store) => Ok(store),
            // TypeId keyed, so the downcast can't miss.
            Err(_) => unreachable!("store of '{name}' has a different type"),
        }
    }

    /// Returns a store checked out with [`take`](Self::take).
    pub(crate) fn restore<T: Component>(&mut self, store: Box<SparseSet<T>>) {
        if let Some(id) = self.id_of::<T>() {
            self.slots[id.index()].store = Some(store);
        }
    }

    /// Removes `id` from the stores of every type in `mask`.
    ///
    /// Returns the number of values removed.
    pub fn sweep(&mut self, id: EntityId, mask: ComponentMask) -> usize {
        let mut removed = 0;
        for bit in mask {
            if let Some(store) = self.slots.get_mut(bit.index()).and_then(|slot| slot.store.as_deref_mut()) {
                if store.remove_entity(id) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Checks, through the erased store, if the type at `bit` holds `id`.
    #[must_use]
    pub fn holds(&self, bit: ComponentId, id: EntityId) -> bool {
        self.slots
            .get(bit.index())
            .and_then(|slot| slot.store.as_deref())
            .is_some_and(|store| store.contains_entity(id))
    }

    /// Empties every store. Registrations are kept.
    pub fn clear_stores(&mut self) {
        for store in self.slots.iter_mut().filter_map(|slot| slot.store.as_deref_mut()) {
            store.clear();
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.slots.iter().map(|slot| slot.info).collect::<Vec<_>>())
            .field("max_components", &self.max_components)
            .field("page_size", &self.page_size)
            .finish()
    }
}
