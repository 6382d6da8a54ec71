//! # Deferred Commands
//!
//! Structural changes can't be made while a query holds the world. They are
//! recorded into a [`Commands`] buffer instead and applied, in order, once
//! traversal ends.

use std::fmt;

use super::component::{Component, ComponentSet};
use super::entity::EntityId;
use super::world::World;
use crate::error::{EcsResult, OrFatal};

type Deferred = Box<dyn FnOnce(&mut World) -> EcsResult<()>>;

enum Command {
    Destroy(EntityId),
    Flag(EntityId, bool),
    Apply(&'static str, Deferred),
}

/// Buffer of world mutations to apply later.
///
/// # Example
///
/// ```rust,ignore
/// world.query::<Health>().for_each_deferred(|id, health, commands| {
///     if health.0 <= 0 {
///         commands.destroy(id);
///     }
/// });
/// ```
#[derive(Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Checks if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Records [`World::destroy`].
    pub fn destroy(&mut self, id: EntityId) {
        self.queue.push(Command::Destroy(id));
    }

    /// Records [`World::flag_for_destroy`].
    pub fn flag_for_destroy(&mut self, id: EntityId, flag: bool) {
        self.queue.push(Command::Flag(id, flag));
    }

    /// Records [`World::attach`].
    pub fn attach<T: Component, R: ComponentSet>(&mut self, id: EntityId, value: T) {
        self.queue.push(Command::Apply(
            "attach",
            Box::new(move |world: &mut World| world.try_attach::<T, R>(id, value).map(|_| ())),
        ));
    }

    /// Records [`World::detach`]. The detached value is dropped.
    pub fn detach<T: Component, S: ComponentSet>(&mut self, id: EntityId) {
        self.queue.push(Command::Apply(
            "detach",
            Box::new(move |world: &mut World| world.try_detach::<T, S>(id).map(drop)),
        ));
    }

    /// Records an arbitrary mutation.
    pub fn push<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> EcsResult<()> + 'static,
    {
        self.queue.push(Command::Apply("custom", Box::new(f)));
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.queue.iter().map(|command| match command {
                Command::Destroy(id) => format!("destroy {id}"),
                Command::Flag(id, flag) => format!("flag {id} {flag}"),
                Command::Apply(kind, _) => (*kind).to_string(),
            }))
            .finish()
    }
}

impl World {
    /// Applies every recorded command in order.
    ///
    /// # Panics
    ///
    /// Fatal on the first command that fails.
    #[track_caller]
    pub fn apply(&mut self, commands: Commands) {
        self.try_apply(commands).or_fatal();
    }

    /// Applies recorded commands in order, stopping at the first failure.
    ///
    /// Commands before the failing one stay applied.
    ///
    /// # Errors
    ///
    /// The error of the first failing command.
    pub fn try_apply(&mut self, commands: Commands) -> EcsResult<()> {
        for (index, command) in commands.queue.into_iter().enumerate() {
            match command {
                Command::Destroy(id) => {
                    tracing::trace!(index, entity = %id, "applying deferred destroy");
                    self.try_destroy(id)?;
                }
                Command::Flag(id, flag) => {
                    tracing::trace!(index, entity = %id, flag, "applying deferred flag");
                    self.try_flag_for_destroy(id, flag)?;
                }
                Command::Apply(kind, f) => {
                    tracing::trace!(index, kind, "applying deferred command");
                    f(self)?;
                }
            }
        }
        Ok(())
    }
}
