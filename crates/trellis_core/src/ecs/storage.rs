//! # Component Storage
//!
//! Paged sparse-set storage, one instance per component type.
//!
//! ```text
//! sparse pages:  [page 0][  None  ][page 2] ...   id -> dense slot
//! dense:         [ C0 ][ C1 ][ C2 ] ...            packed values
//! dense_to_id:   [ e7 ][ e2 ][e2041] ...           slot -> id
//! ```
//!
//! - Insert, lookup and delete are O(1)
//! - Delete swaps the last dense element into the hole, so dense order is
//!   not stable across deletes
//! - Sparse pages are allocated on first use of an ID in their range, which
//!   bounds memory for large but clustered ID spaces

use std::any::Any;

use super::entity::EntityId;

/// Default number of sparse slots per page.
pub const DEFAULT_PAGE_SIZE: usize = 1_000;

/// Sparse slot value meaning "no mapping". Never a valid dense index.
const TOMBSTONE: usize = usize::MAX;

/// Sparse-set mapping entity IDs to densely packed values.
///
/// # Invariants
///
/// - `dense.len() == dense_to_entity.len()`
/// - for every ID `e` whose sparse slot holds `i != TOMBSTONE`,
///   `dense_to_entity[i] == e`
///
/// # Example
///
/// ```rust,ignore
/// let mut set: SparseSet<f32> = SparseSet::new();
/// set.set(EntityId::new(4), 1.5);
/// assert_eq!(set.get(EntityId::new(4)), Some(&1.5));
/// ```
#[derive(Clone, Debug)]
pub struct SparseSet<T> {
    /// Lazily allocated pages of dense indices.
    pages: Vec<Option<Box<[usize]>>>,
    /// Packed values.
    dense: Vec<T>,
    /// Owner of each dense slot.
    dense_to_entity: Vec<EntityId>,
    /// Sparse slots per page.
    page_size: usize,
}

impl<T> SparseSet<T> {
    /// Creates an empty set with [`DEFAULT_PAGE_SIZE`] pages.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty set with a custom page size.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size > 0, "Page size must be greater than zero");
        Self {
            pages: Vec::new(),
            dense: Vec::new(),
            dense_to_entity: Vec::new(),
            page_size,
        }
    }

    /// Reserves room for `additional` more dense entries.
    pub fn reserve(&mut self, additional: usize) {
        self.dense.reserve(additional);
        self.dense_to_entity.reserve(additional);
    }

    /// Splits an ID into (page, offset). `None` if the ID can't be addressed.
    #[inline]
    fn locate(&self, id: EntityId) -> Option<(usize, usize)> {
        let raw = usize::try_from(id.raw()).ok()?;
        Some((raw / self.page_size, raw % self.page_size))
    }

    /// Dense index of `id`, or `None` if absent. Never allocates.
    #[inline]
    fn dense_index(&self, id: EntityId) -> Option<usize> {
        let (page, offset) = self.locate(id)?;
        let slot = *self.pages.get(page)?.as_ref()?.get(offset)?;
        (slot != TOMBSTONE).then_some(slot)
    }

    /// Points the sparse slot of `id` at `index`, allocating its page if needed.
    fn set_dense_index(&mut self, id: EntityId, index: usize) {
        let Some((page, offset)) = self.locate(id) else {
            panic!("{id} cannot be addressed by a sparse page");
        };
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let page_size = self.page_size;
        let slots = self.pages[page].get_or_insert_with(|| vec![TOMBSTONE; page_size].into_boxed_slice());
        slots[offset] = index;
    }

    /// Stores `value` for `id`, overwriting in place if present.
    ///
    /// # Returns
    ///
    /// Mutable reference to the stored value.
    ///
    /// # Panics
    ///
    /// Panics if `id` is [`EntityId::NULL`].
    pub fn set(&mut self, id: EntityId, value: T) -> &mut T {
        assert!(!id.is_null(), "NULL entity cannot be stored");

        if let Some(index) = self.dense_index(id) {
            self.dense[index] = value;
            self.dense_to_entity[index] = id;
            return &mut self.dense[index];
        }

        let index = self.dense.len();
        self.set_dense_index(id, index);
        self.dense.push(value);
        self.dense_to_entity.push(id);
        &mut self.dense[index]
    }

    /// Gets the value stored for `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.dense_index(id).map(|index| &self.dense[index])
    }

    /// Gets the value stored for `id` mutably.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.dense_index(id).map(|index| &mut self.dense[index])
    }

    /// Checks if `id` has a value.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.dense_index(id).is_some()
    }

    /// Removes the value of `id` by swapping the last element into its slot.
    ///
    /// Returns `None` (and changes nothing) if `id` has no value.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let index = self.dense_index(id)?;
        let back = self.dense_to_entity[self.dense_to_entity.len() - 1];

        // Repoint the back element first; if it is `id` itself the
        // tombstone written next wins.
        self.set_dense_index(back, index);
        self.set_dense_index(id, TOMBSTONE);

        self.dense_to_entity.swap_remove(index);
        Some(self.dense.swap_remove(index))
    }

    /// Removes the value of `id`, treating absence as fatal.
    ///
    /// # Panics
    ///
    /// Panics if `id` has no value.
    #[track_caller]
    pub fn delete(&mut self, id: EntityId) -> T {
        match self.remove(id) {
            Some(value) => value,
            None => panic!("Trying to delete non-existent {id} in sparse set"),
        }
    }

    /// Drops every entry and releases the sparse pages.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.dense_to_entity.clear();
        self.pages.clear();
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Checks if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// The entity owning dense slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn dense_entity(&self, index: usize) -> EntityId {
        self.dense_to_entity[index]
    }

    /// The packed values, in dense order.
    #[inline]
    #[must_use]
    pub fn dense(&self) -> &[T] {
        &self.dense
    }

    /// The packed values, mutably. Order and length can't change through it.
    #[inline]
    pub fn dense_mut(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// Owners of the packed values, index-aligned with [`dense`](Self::dense).
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.dense_to_entity
    }

    /// Iterates over `(EntityId, &T)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.dense_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Iterates over `(EntityId, &mut T)` in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.dense_to_entity.iter().copied().zip(self.dense.iter_mut())
    }

    /// Sparse slots per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of sparse pages currently allocated.
    #[must_use]
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`SparseSet`].
///
/// Only the operations that don't need the value type go through here:
/// sweeping an entity out, clearing, and downcasting back to the concrete
/// set. Reads and writes always use the concrete type.
pub trait ErasedStore: Any {
    /// Removes the entity's value if present. Returns whether it was present.
    fn remove_entity(&mut self, id: EntityId) -> bool;

    /// Checks if the entity has a value.
    fn contains_entity(&self, id: EntityId) -> bool;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Checks if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    fn clear(&mut self);

    /// Converts to Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts to mutable Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Converts the box to Any for by-value downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: 'static> ErasedStore for SparseSet<T> {
    fn remove_entity(&mut self, id: EntityId) -> bool {
        self.remove(id).is_some()
    }

    fn contains_entity(&self, id: EntityId) -> bool {
        self.contains(id)
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn clear(&mut self) {
        self.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
