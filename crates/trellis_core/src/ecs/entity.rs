//! # Entity Management
//!
//! Entities are bare integer identifiers. Freed identifiers are recycled
//! as-is (no generation counter), so a stale copy of a destroyed ID may
//! alias a later entity; the allocator only guarantees that no two live
//! entities share an ID.

use std::fmt;

use super::component::ComponentMask;
use crate::error::{EcsError, EcsResult};

/// Unique identifier for a live entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Index of this entity in per-entity tables.
    #[inline]
    pub(crate) fn index(self) -> usize {
        // Live IDs are bounded by `max_entities`, which fits in usize.
        self.0 as usize
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(NULL)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

/// Lifecycle state of an issued identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EntityState {
    /// Sitting on the free list.
    #[default]
    Free,
    /// Alive.
    Alive,
    /// Alive, marked for destruction by the next sweep.
    Flagged,
}

/// Per-identifier bookkeeping.
///
/// Tracks which components are attached via a bitmask, so prerequisite and
/// dependent checks never touch a store.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityRecord {
    /// Bitmask of attached components.
    pub mask: ComponentMask,
    /// Whether this identifier is currently in use.
    pub state: EntityState,
}

impl EntityRecord {
    /// Whether this identifier is alive (flagged or not).
    #[inline]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !matches!(self.state, EntityState::Free)
    }
}

/// Issues and recycles entity identifiers.
///
/// New identifiers come from the free list first (last freed, first
/// reissued), otherwise from the high-water mark.
#[derive(Debug)]
pub struct EntityAllocator {
    /// One record per identifier ever issued.
    records: Vec<EntityRecord>,
    /// Identifiers available for reuse.
    free: Vec<EntityId>,
    /// Number of currently alive entities.
    alive_count: usize,
    /// Maximum number of simultaneously alive entities.
    max_alive: usize,
}

impl EntityAllocator {
    /// Creates an allocator that allows at most `max_alive` living entities.
    ///
    /// # Panics
    ///
    /// Panics if `max_alive` is zero.
    #[must_use]
    pub fn new(max_alive: usize) -> Self {
        assert!(max_alive > 0, "Entity limit must be greater than zero");
        Self {
            records: Vec::new(),
            free: Vec::new(),
            alive_count: 0,
            max_alive,
        }
    }

    /// Number of identifiers ever issued; every valid ID is below it.
    #[inline]
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        self.records.len() as u64
    }

    /// Number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Configured living-entity limit.
    #[inline]
    #[must_use]
    pub const fn max_alive(&self) -> usize {
        self.max_alive
    }

    /// Number of identifiers waiting to be recycled.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Issues an identifier, preferring recycled ones.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityLimitReached`] if the living-entity limit is hit.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        if self.alive_count >= self.max_alive {
            return Err(EcsError::EntityLimitReached {
                limit: self.max_alive,
            });
        }

        let id = if let Some(id) = self.free.pop() {
            id
        } else {
            let id = EntityId::new(self.high_water_mark());
            if id.is_null() {
                return Err(EcsError::EntityLimitReached {
                    limit: self.max_alive,
                });
            }
            self.records.push(EntityRecord::default());
            id
        };

        self.records[id.index()] = EntityRecord {
            mask: ComponentMask::EMPTY,
            state: EntityState::Alive,
        };
        self.alive_count += 1;
        Ok(id)
    }

    /// Returns an identifier to the free list.
    ///
    /// The caller is responsible for the entity's components; the record's
    /// mask is reset here.
    ///
    /// # Errors
    ///
    /// Fails if the identifier is null, never issued, or already free.
    pub fn destroy(&mut self, id: EntityId) -> EcsResult<()> {
        self.validate(id)?;
        self.records[id.index()] = EntityRecord::default();
        self.free.push(id);
        self.alive_count -= 1;
        Ok(())
    }

    /// Checks that `id` names a live entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::NullEntity`], [`EcsError::EntityOutOfRange`] or
    /// [`EcsError::DeadEntity`].
    pub fn validate(&self, id: EntityId) -> EcsResult<()> {
        self.record(id).map(|_| ())
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.validate(id).is_ok()
    }

    /// Returns the record of a live entity.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn record(&self, id: EntityId) -> EcsResult<&EntityRecord> {
        if id.is_null() {
            return Err(EcsError::NullEntity);
        }
        let slot = usize::try_from(id.raw())
            .ok()
            .and_then(|index| self.records.get(index));
        match slot {
            None => Err(EcsError::EntityOutOfRange {
                id,
                high_water: self.high_water_mark(),
            }),
            Some(record) if !record.is_alive() => Err(EcsError::DeadEntity(id)),
            Some(record) => Ok(record),
        }
    }

    /// Returns the mutable record of a live entity.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn record_mut(&mut self, id: EntityId) -> EcsResult<&mut EntityRecord> {
        self.validate(id)?;
        Ok(&mut self.records[id.index()])
    }

    /// Iterates over live identifiers and their records, in ID order.
    pub fn iter_alive(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_alive())
            .map(|(index, record)| (EntityId::new(index as u64), record))
    }

    /// Forgets every identifier.
    pub fn clear(&mut self) {
        self.records.clear();
        self.free.clear();
        self.alive_count = 0;
    }
}
