//! Integration tests for queries over the dense arrays.

use std::collections::HashSet;

use trellis_core::{EntityId, World};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: i64,
    y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: i64,
    y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frozen;

fn populated(count: i64) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    world.register::<Position, ()>();
    world.register::<Velocity, (Position,)>();
    world.register::<Frozen, ()>();
    let ids = (0..count)
        .map(|i| {
            let e = world.create();
            world.attach::<Position, ()>(e, Position { x: i, y: -i });
            if i % 3 != 0 {
                world.attach::<Velocity, (Position,)>(e, Velocity { x: 1, y: 2 });
            }
            e
        })
        .collect();
    (world, ids)
}

#[test]
fn test_every_holder_visited_once() {
    let (mut world, ids) = populated(3_000);

    // Punch holes so the dense order is shuffled by swap-removes.
    for id in ids.iter().step_by(7) {
        world.destroy(*id);
    }

    let mut seen = HashSet::new();
    world.query::<Position>().for_each_with_id(|id, _| {
        assert!(seen.insert(id), "{id} visited twice");
    });
    let expected: HashSet<_> = ids.iter().copied().filter(|id| world.is_alive(*id)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_iteration_follows_dense_order() {
    let (mut world, ids) = populated(10);
    world.destroy(ids[0]);

    let order = world.query::<Position>().ids();
    assert_eq!(order, world.pool::<Position>().entities().to_vec());
    // The last element moved into the hole.
    assert_eq!(order[0], ids[9]);
}

#[test]
fn test_sibling_walk_updates_positions() {
    let (mut world, ids) = populated(30);
    for _ in 0..3 {
        world
            .query::<Velocity>()
            .with::<Position>()
            .for_each(|vel, pos| {
                pos.x += vel.x;
                pos.y += vel.y;
            });
    }

    for (i, id) in (0_i64..).zip(&ids) {
        let pos = world.get::<Position>(*id);
        if i % 3 == 0 {
            assert_eq!(*pos, Position { x: i, y: -i });
        } else {
            assert_eq!(*pos, Position { x: i + 3, y: -i + 6 });
        }
    }
}

#[test]
fn test_matching_filter_on_optional_tag() {
    let (mut world, ids) = populated(12);
    for id in ids.iter().take(4) {
        world.attach::<Frozen, ()>(*id, Frozen);
    }

    let frozen_movers = world.query::<Velocity>().with::<Frozen>().ids();
    assert_eq!(frozen_movers, vec![ids[1], ids[2]]);

    let mut moved = Vec::new();
    world
        .query::<Position>()
        .with::<Velocity>()
        .for_each_matching(|id, _, _| moved.push(id));
    assert_eq!(moved.len(), 8);
}

#[test]
fn test_deferred_attach_during_iteration() {
    let (mut world, ids) = populated(9);
    world
        .query::<Position>()
        .for_each_deferred(|id, pos, commands| {
            if pos.x >= 6 {
                commands.attach::<Frozen, ()>(id, Frozen);
            }
        });
    assert_eq!(world.pool::<Frozen>().len(), 3);
    assert!(world.has::<Frozen>(ids[8]));
    assert!(!world.has::<Frozen>(ids[5]));
}
