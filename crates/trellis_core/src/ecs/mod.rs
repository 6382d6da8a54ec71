//! # Entity Component System
//!
//! Sparse-set storage with declared component dependencies.
//!
//! ## Design
//!
//! - Entity IDs are plain recycled integers, no generation counters
//! - Each component type owns one paged sparse set with a packed dense array
//! - Attach/detach are checked against the dependency masks given at registration
//! - Iteration walks the main type's dense array; siblings are sparse lookups

mod commands;
mod component;
mod entity;
mod protocol;
mod query;
mod registry;
mod storage;
mod world;

pub use commands::Commands;
pub use component::{
    Component, ComponentId, ComponentKey, ComponentMask, ComponentSet, MaskIter, MAX_COMPONENTS,
};
pub use entity::{EntityAllocator, EntityId, EntityRecord, EntityState};
pub use query::{Query1, Query2, Query3, Query4};
pub use registry::{ComponentInfo, ComponentRegistry};
pub use storage::{ErasedStore, SparseSet, DEFAULT_PAGE_SIZE};
pub use world::{World, DEFAULT_ENTITY_NAME};
