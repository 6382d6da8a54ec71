//! # Queries
//!
//! Iteration walks the dense array of a main component and resolves each
//! sibling by a direct sparse lookup on the owning entity. No per-entity
//! type dispatch happens inside the loop.
//!
//! ```rust,ignore
//! world.query::<Velocity>().with::<Position>().for_each(|vel, pos| {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! });
//! ```
//!
//! A query borrows the world mutably for its whole lifetime, so structural
//! changes during traversal are rejected at compile time. Use
//! `for_each_deferred` to record them in [`Commands`] instead.
//!
//! Entities flagged for destruction are passed over unless the query is
//! built with `include_flagged()`, matching `World::alive(false)`.
//!
//! Order follows the main store's dense array, which is reordered by every
//! removal.

use std::any::type_name;
use std::marker::PhantomData;

use super::commands::Commands;
use super::component::Component;
use super::entity::{EntityId, EntityState};
use super::registry::ComponentRegistry;
use super::storage::SparseSet;
use super::world::World;
use crate::error::{EcsError, EcsResult, OrFatal};

impl World {
    /// Starts a query over every entity holding `M`.
    #[must_use]
    pub fn query<M: Component>(&mut self) -> Query1<'_, M> {
        Query1 {
            world: self,
            include_flagged: false,
            marker: PhantomData,
        }
    }
}

/// Which entities a traversal passes over.
#[derive(Clone, Copy, Debug)]
struct Visit {
    /// Skip holders lacking a sibling instead of failing.
    skip_missing: bool,
    /// Visit entities flagged for destruction.
    include_flagged: bool,
}

/// Checks the store of `T` out for the duration of `f`.
///
/// The store is handed back whatever `f` returns.
fn with_taken<T, R>(
    registry: &mut ComponentRegistry,
    f: impl FnOnce(&mut ComponentRegistry, &mut SparseSet<T>) -> EcsResult<R>,
) -> EcsResult<R>
where
    T: Component,
{
    let mut store = registry.take::<T>()?;
    let result = f(registry, &mut *store);
    registry.restore(store);
    result
}

/// Nests [`with_taken`] once per `(type, binding)` pair.
macro_rules! with_stores {
    ($registry:expr, [], $body:expr) => {{
        let _ = &$registry;
        $body
    }};
    ($registry:expr, [($ty:ty, $store:ident) $(, ($rest_ty:ty, $rest_store:ident))*], $body:expr) => {
        with_taken::<$ty, _>($registry, |registry, $store| {
            with_stores!(registry, [$(($rest_ty, $rest_store)),*], $body)
        })
    };
}

macro_rules! impl_query {
    (
        $(#[$meta:meta])*
        $name:ident<$main:ident $(, $sib:ident => $store:ident, $val:ident)*>
    ) => {
        $(#[$meta])*
        pub struct $name<'w, $main $(, $sib)*> {
            world: &'w mut World,
            include_flagged: bool,
            marker: PhantomData<fn() -> ($main, $($sib,)*)>,
        }

        impl<'w, $main: Component $(, $sib: Component)*> $name<'w, $main $(, $sib)*> {
            /// Also visits entities flagged for destruction.
            #[must_use]
            pub fn include_flagged(mut self) -> Self {
                self.include_flagged = true;
                self
            }

            fn visit(&self, skip_missing: bool) -> Visit {
                Visit {
                    skip_missing,
                    include_flagged: self.include_flagged,
                }
            }

            /// Visits every holder of the main component.
            ///
            /// With `visit.skip_missing`, entities lacking a sibling are
            /// passed over; otherwise the first miss ends traversal with
            /// [`EcsError::MissingSibling`].
            fn run<F>(world: &mut World, visit: Visit, mut f: F) -> EcsResult<()>
            where
                F: FnMut(EntityId, &mut $main $(, &mut $sib)*),
            {
                let entities = &world.entities;
                with_stores!(&mut world.registry, [($main, main_store) $(, ($sib, $store))*], {
                    for (id, main) in main_store.iter_mut() {
                        if !visit.include_flagged
                            && entities
                                .record(id)
                                .is_ok_and(|record| record.state == EntityState::Flagged)
                        {
                            continue;
                        }
                        $(
                            let Some($val) = $store.get_mut(id) else {
                                if visit.skip_missing {
                                    continue;
                                }
                                return Err(EcsError::MissingSibling {
                                    entity: id,
                                    component: type_name::<$sib>(),
                                });
                            };
                        )*
                        f(id, main $(, $val)*);
                    }
                    Ok(())
                })
            }

            /// Calls `f` with the components of every holder of the main
            /// component.
            ///
            /// # Panics
            ///
            /// Fatal if a type is unregistered or repeated, or a holder
            /// lacks a sibling.
            #[track_caller]
            pub fn for_each<F>(self, f: F)
            where
                F: FnMut(&mut $main $(, &mut $sib)*),
            {
                self.try_for_each(f).or_fatal();
            }

            /// Calls `f` with the components of every holder of the main
            /// component.
            ///
            /// # Errors
            ///
            /// [`EcsError::Unregistered`], [`EcsError::DuplicateQueryComponent`]
            /// or [`EcsError::MissingSibling`]. Calls made before a miss stay
            /// made.
            pub fn try_for_each<F>(self, mut f: F) -> EcsResult<()>
            where
                F: FnMut(&mut $main $(, &mut $sib)*),
            {
                let visit = self.visit(false);
                Self::run(self.world, visit, |_, main $(, $val)*| f(main $(, $val)*))
            }

            /// Like [`for_each`](Self::for_each), also passing the entity.
            ///
            /// # Panics
            ///
            /// Fatal if a type is unregistered or repeated, or a holder
            /// lacks a sibling.
            #[track_caller]
            pub fn for_each_with_id<F>(self, f: F)
            where
                F: FnMut(EntityId, &mut $main $(, &mut $sib)*),
            {
                self.try_for_each_with_id(f).or_fatal();
            }

            /// Like [`try_for_each`](Self::try_for_each), also passing the entity.
            ///
            /// # Errors
            ///
            /// Same as [`try_for_each`](Self::try_for_each).
            pub fn try_for_each_with_id<F>(self, f: F) -> EcsResult<()>
            where
                F: FnMut(EntityId, &mut $main $(, &mut $sib)*),
            {
                let visit = self.visit(false);
                Self::run(self.world, visit, f)
            }

            /// Visits only the entities holding the main component and every
            /// sibling. A missing sibling is not an error.
            ///
            /// # Panics
            ///
            /// Fatal if a type is unregistered or repeated.
            #[track_caller]
            pub fn for_each_matching<F>(self, f: F)
            where
                F: FnMut(EntityId, &mut $main $(, &mut $sib)*),
            {
                self.try_for_each_matching(f).or_fatal();
            }

            /// Visits only the entities holding the main component and every
            /// sibling.
            ///
            /// # Errors
            ///
            /// [`EcsError::Unregistered`] or [`EcsError::DuplicateQueryComponent`].
            pub fn try_for_each_matching<F>(self, f: F) -> EcsResult<()>
            where
                F: FnMut(EntityId, &mut $main $(, &mut $sib)*),
            {
                let visit = self.visit(true);
                Self::run(self.world, visit, f)
            }

            /// Like [`for_each_with_id`](Self::for_each_with_id), with a
            /// [`Commands`] buffer applied to the world after traversal.
            ///
            /// # Panics
            ///
            /// Fatal on a traversal error or a failing command.
            #[track_caller]
            pub fn for_each_deferred<F>(self, f: F)
            where
                F: FnMut(EntityId, &mut $main, $(&mut $sib,)* &mut Commands),
            {
                self.try_for_each_deferred(f).or_fatal();
            }

            /// Like [`try_for_each_with_id`](Self::try_for_each_with_id), with a
            /// [`Commands`] buffer applied to the world after traversal.
            ///
            /// Nothing is applied if traversal fails.
            ///
            /// # Errors
            ///
            /// A traversal error, or the first failing command.
            pub fn try_for_each_deferred<F>(self, mut f: F) -> EcsResult<()>
            where
                F: FnMut(EntityId, &mut $main, $(&mut $sib,)* &mut Commands),
            {
                let visit = self.visit(false);
                let world = self.world;
                let mut commands = Commands::new();
                Self::run(world, visit, |id, main $(, $val)*| {
                    f(id, main, $($val,)* &mut commands);
                })?;
                world.try_apply(commands)
            }

            /// Entities holding the main component and every sibling, in
            /// iteration order.
            ///
            /// # Panics
            ///
            /// Fatal if a type is unregistered or repeated.
            #[track_caller]
            #[must_use]
            pub fn ids(self) -> Vec<EntityId> {
                self.try_ids().or_fatal()
            }

            /// Entities holding the main component and every sibling, in
            /// iteration order.
            ///
            /// # Errors
            ///
            /// [`EcsError::Unregistered`] or [`EcsError::DuplicateQueryComponent`].
            pub fn try_ids(self) -> EcsResult<Vec<EntityId>> {
                let visit = self.visit(true);
                let mut ids = Vec::new();
                Self::run(self.world, visit, |id, _ $(, $val)*| {
                    $( let _ = $val; )*
                    ids.push(id);
                })?;
                Ok(ids)
            }
        }
    };
}

impl_query!(
    /// Query over a main component.
    Query1<M>
);
impl_query!(
    /// Query over a main component and one sibling.
    Query2<M, A => a_store, a>
);
impl_query!(
    /// Query over a main component and two siblings.
    Query3<M, A => a_store, a, B => b_store, b>
);
impl_query!(
    /// Query over a main component and three siblings.
    Query4<M, A => a_store, a, B => b_store, b, C => c_store, c>
);

impl<'w, M: Component> Query1<'w, M> {
    /// Adds a sibling component.
    #[must_use]
    pub fn with<A: Component>(self) -> Query2<'w, M, A> {
        Query2 {
            world: self.world,
            include_flagged: self.include_flagged,
            marker: PhantomData,
        }
    }
}

impl<'w, M: Component, A: Component> Query2<'w, M, A> {
    /// Adds a sibling component.
    #[must_use]
    pub fn with<B: Component>(self) -> Query3<'w, M, A, B> {
        Query3 {
            world: self.world,
            include_flagged: self.include_flagged,
            marker: PhantomData,
        }
    }
}

impl<'w, M: Component, A: Component, B: Component> Query3<'w, M, A, B> {
    /// Adds a sibling component.
    #[must_use]
    pub fn with<C: Component>(self) -> Query4<'w, M, A, B, C> {
        Query4 {
            world: self.world,
            include_flagged: self.include_flagged,
            marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Velocity {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Mass(u32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Charge(i8);

    fn motion_world(count: i32) -> (World, Vec<EntityId>) {
        let mut world = World::new();
        world.register::<Position, ()>();
        world.register::<Velocity, (Position,)>();
        let ids = (0..count)
            .map(|i| {
                let e = world.create();
                world.attach::<Position, ()>(e, Position { x: i, y: 0 });
                world.attach::<Velocity, (Position,)>(e, Velocity { x: 1, y: i });
                e
            })
            .collect();
        (world, ids)
    }

    #[test]
    fn test_single_component_query() {
        let (mut world, ids) = motion_world(5);
        let mut seen = Vec::new();
        world.query::<Position>().for_each_with_id(|id, pos| {
            pos.y = 7;
            seen.push(id);
        });
        assert_eq!(seen, ids);
        assert!(world.pool::<Position>().dense().iter().all(|p| p.y == 7));
    }

    #[test]
    fn test_sibling_query_mutates_both() {
        let (mut world, ids) = motion_world(3);
        world.query::<Velocity>().with::<Position>().for_each(|vel, pos| {
            pos.x += vel.x;
            pos.y += vel.y;
            vel.x = 0;
        });
        for (i, id) in ids.iter().enumerate() {
            let i = i32::try_from(i).unwrap();
            assert_eq!(world.get::<Position>(*id), &Position { x: i + 1, y: i });
            assert_eq!(world.get::<Velocity>(*id).x, 0);
        }
    }

    #[test]
    fn test_missing_sibling() {
        let (mut world, ids) = motion_world(3);
        world.register::<Mass, ()>();
        world.attach::<Mass, ()>(ids[0], Mass(5));
        world.attach::<Mass, ()>(ids[2], Mass(6));

        let err = world
            .query::<Position>()
            .with::<Mass>()
            .try_for_each(|_, _| {})
            .unwrap_err();
        assert!(matches!(err, EcsError::MissingSibling { entity, .. } if entity == ids[1]));
        // Stores were handed back.
        assert_eq!(world.pool::<Mass>().len(), 2);
        assert_eq!(world.pool::<Position>().len(), 3);

        let matching = world.query::<Position>().with::<Mass>().ids();
        assert_eq!(matching, vec![ids[0], ids[2]]);

        let mut total = 0;
        world
            .query::<Position>()
            .with::<Mass>()
            .for_each_matching(|_, _, mass| total += mass.0);
        assert_eq!(total, 11);
    }

    #[test]
    #[should_panic(expected = "missing sibling component")]
    fn test_missing_sibling_is_fatal() {
        let (mut world, ids) = motion_world(2);
        world.register::<Mass, ()>();
        world.attach::<Mass, ()>(ids[1], Mass(1));
        world.query::<Position>().with::<Mass>().for_each(|_, _| {});
    }

    #[test]
    fn test_query_validation() {
        let (mut world, _) = motion_world(1);
        assert!(matches!(
            world.query::<Position>().with::<Position>().try_ids(),
            Err(EcsError::DuplicateQueryComponent { .. })
        ));
        assert!(matches!(
            world.query::<Position>().with::<Mass>().try_ids(),
            Err(EcsError::Unregistered { .. })
        ));
        assert!(matches!(
            world.query::<Mass>().try_ids(),
            Err(EcsError::Unregistered { .. })
        ));
        // Every store is back after failed queries.
        assert_eq!(world.query::<Velocity>().with::<Position>().ids().len(), 1);
    }

    #[test]
    fn test_four_way_query() {
        let (mut world, ids) = motion_world(4);
        world.register::<Mass, ()>();
        world.register::<Charge, ()>();
        for (i, id) in ids.iter().enumerate() {
            world.attach::<Mass, ()>(*id, Mass(u32::try_from(i).unwrap()));
            if i % 2 == 0 {
                world.attach::<Charge, ()>(*id, Charge(-1));
            }
        }

        let mut visited = 0;
        world
            .query::<Charge>()
            .with::<Mass>()
            .with::<Velocity>()
            .with::<Position>()
            .for_each(|charge, mass, vel, pos| {
                pos.x = i32::from(charge.0) * i32::try_from(mass.0).unwrap();
                vel.y = -1;
                visited += 1;
            });
        assert_eq!(visited, 2);
        assert_eq!(world.get::<Position>(ids[2]).x, -2);
        assert_eq!(world.get::<Velocity>(ids[1]).y, 1);
    }

    #[test]
    fn test_deferred_destroy() {
        let (mut world, ids) = motion_world(6);
        world
            .query::<Position>()
            .for_each_deferred(|id, pos, commands| {
                if pos.x % 2 == 1 {
                    commands.destroy(id);
                }
            });
        assert_eq!(world.alive_count(), 3);
        assert_eq!(world.pool::<Position>().len(), 3);
        assert_eq!(world.pool::<Velocity>().len(), 3);
        assert!(world.is_alive(ids[0]));
        assert!(!world.is_alive(ids[1]));
    }

    #[test]
    fn test_deferred_detach_with_sibling() {
        let (mut world, ids) = motion_world(3);
        world
            .query::<Velocity>()
            .with::<Position>()
            .for_each_deferred(|id, vel, _, commands| {
                if vel.y > 0 {
                    commands.detach::<Velocity, ()>(id);
                }
            });
        assert_eq!(world.pool::<Velocity>().len(), 1);
        assert!(world.has::<Velocity>(ids[0]));
    }

    #[test]
    fn test_flagged_entities_skipped_by_default() {
        let (mut world, ids) = motion_world(4);
        world.flag_for_destroy(ids[0], true);
        world.flag_for_destroy(ids[2], true);

        assert_eq!(world.query::<Position>().ids(), vec![ids[1], ids[3]]);
        assert_eq!(
            world.query::<Velocity>().with::<Position>().ids(),
            vec![ids[1], ids[3]]
        );

        let mut touched = 0;
        world.query::<Position>().for_each(|pos| {
            pos.y = 9;
            touched += 1;
        });
        assert_eq!(touched, 2);
        assert_eq!(world.get::<Position>(ids[0]).y, 0);

        world.flag_for_destroy(ids[2], false);
        assert_eq!(world.query::<Position>().ids(), vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn test_include_flagged() {
        let (mut world, ids) = motion_world(3);
        world.flag_for_destroy(ids[1], true);

        assert_eq!(world.query::<Position>().include_flagged().ids(), ids);
        assert_eq!(
            world
                .query::<Position>()
                .with::<Velocity>()
                .include_flagged()
                .ids(),
            ids
        );
        // The switch survives adding siblings.
        assert_eq!(
            world
                .query::<Position>()
                .include_flagged()
                .with::<Velocity>()
                .ids()
                .len(),
            3
        );
    }

    #[test]
    fn test_flagged_entity_missing_sibling_is_not_fatal() {
        let (mut world, ids) = motion_world(2);
        world.register::<Mass, ()>();
        world.attach::<Mass, ()>(ids[1], Mass(3));
        world.flag_for_destroy(ids[0], true);

        // ids[0] lacks Mass but is flagged, so it is never looked at.
        let mut total = 0;
        world
            .query::<Position>()
            .with::<Mass>()
            .for_each(|_, mass| total += mass.0);
        assert_eq!(total, 3);
        assert!(matches!(
            world.query::<Position>().with::<Mass>().include_flagged().try_ids(),
            Ok(found) if found == vec![ids[1]]
        ));
    }

    #[test]
    fn test_empty_store_query() {
        let mut world = World::new();
        world.register::<Position, ()>();
        let mut calls = 0;
        world.query::<Position>().for_each(|_| calls += 1);
        assert_eq!(calls, 0);
        assert!(world.query::<Position>().ids().is_empty());
    }
}
