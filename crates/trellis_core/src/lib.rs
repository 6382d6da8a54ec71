//! # TRELLIS Core
//!
//! In-memory entity-component store built on paged sparse sets:
//! - O(1) attach, lookup and swap-remove per component type
//! - Declared dependencies between component types, checked on every
//!   attach and detach
//! - Iteration over a main component's packed array with direct sibling
//!   lookups
//!
//! ## Misuse Is Fatal
//!
//! Every detected misuse (dead entity, double attach, dependency violation,
//! limits) terminates through [`error::fatal`]. Each operation also has a
//! `try_*` form returning [`EcsResult`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use trellis_core::World;
//!
//! struct Position { x: f32, y: f32 }
//! struct Velocity { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! world.register::<Position, ()>();
//! world.register::<Velocity, (Position,)>();
//!
//! let e = world.create();
//! world.attach::<Position, ()>(e, Position { x: 0.0, y: 0.0 });
//! world.attach::<Velocity, (Position,)>(e, Velocity { x: 1.0, y: 1.0 });
//!
//! world.query::<Velocity>().with::<Position>().for_each(|vel, pos| {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! });
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    Commands, Component, ComponentId, ComponentMask, ComponentSet, EntityId, Query1, Query2,
    Query3, Query4, SparseSet, World,
};
pub use error::{EcsError, EcsResult, OrFatal};
