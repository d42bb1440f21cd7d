//! Randomized invariant checks against a simple model.
//!
//! Every run uses a fixed seed, so failures reproduce.

use std::collections::{BTreeSet, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Mass(u64);
impl Component for Mass {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Charge(i64);
impl Component for Charge {}

#[derive(Debug, Default)]
struct Marked;
impl Tag for Marked {}

/// What the world should hold for one live entity.
#[derive(Debug, Default, Clone)]
struct Expected {
    mass: Option<u64>,
    charge: Option<i64>,
    marked: bool,
}

fn new_world() -> World {
    let mut world = World::with_config(WorldConfig {
        min_parallel_batch: 8,
        ..WorldConfig::default()
    })
    .unwrap();
    world.register::<Mass>().unwrap();
    world.register::<Charge>().unwrap();
    world.register::<Marked>().unwrap();
    world
}

fn check(world: &World, live: &HashMap<Entity, Expected>, dead: &[Entity]) {
    assert_eq!(world.entity_count(), live.len());

    for (&entity, expected) in live {
        assert!(world.is_valid(entity), "{entity} should be valid");
        assert_eq!(world.get::<Mass>(entity).ok().map(|m| m.0), expected.mass);
        assert_eq!(world.get::<Charge>(entity).ok().map(|c| c.0), expected.charge);
        assert_eq!(world.has::<Marked>(entity), expected.marked);
    }
    for &entity in dead {
        assert!(!world.is_valid(entity), "{entity} should be stale");
        assert!(!world.has::<Mass>(entity));
    }

    assert!(world.store::<Mass>().unwrap().is_consistent());
    assert!(world.store::<Charge>().unwrap().is_consistent());
    assert!(world.store::<Marked>().unwrap().is_consistent());

    let alive: BTreeSet<Entity> = world.entities().iter().collect();
    assert_eq!(alive, live.keys().copied().collect::<BTreeSet<_>>());
}

#[test]
fn test_random_structural_mutation() {
    for seed in [1, 7, 42] {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut world = new_world();
        let mut live: HashMap<Entity, Expected> = HashMap::new();
        let mut dead: Vec<Entity> = Vec::new();

        for step in 0..2_000 {
            let handles: Vec<Entity> = live.keys().copied().collect();
            let pick = |rng: &mut ChaCha8Rng| handles[rng.gen_range(0..handles.len())];

            match rng.gen_range(0..10) {
                0..=2 => {
                    let entity = world.create().unwrap();
                    assert!(!dead.contains(&entity), "reused handle {entity}");
                    live.insert(entity, Expected::default());
                }
                3 if !handles.is_empty() => {
                    let entity = pick(&mut rng);
                    world.destroy(entity).unwrap();
                    live.remove(&entity);
                    dead.push(entity);
                }
                4 | 5 if !handles.is_empty() => {
                    let entity = pick(&mut rng);
                    let value = rng.gen::<u64>();
                    let expected = live.get_mut(&entity).unwrap();
                    let result = world.add(entity, Mass(value));
                    if expected.mass.is_some() {
                        assert!(result.is_err());
                    } else {
                        result.unwrap();
                        expected.mass = Some(value);
                    }
                }
                6 if !handles.is_empty() => {
                    let entity = pick(&mut rng);
                    let expected = live.get_mut(&entity).unwrap();
                    let removed = world.remove_if_present::<Mass>(entity).unwrap();
                    assert_eq!(removed.map(|m| m.0), expected.mass.take());
                }
                7 if !handles.is_empty() => {
                    let entity = pick(&mut rng);
                    let value = rng.gen_range(-100..100);
                    let expected = live.get_mut(&entity).unwrap();
                    if expected.charge.is_none() {
                        world.add(entity, Charge(value)).unwrap();
                        expected.charge = Some(value);
                    } else {
                        let removed = world.remove::<Charge>(entity).unwrap();
                        assert_eq!(Some(removed.0), expected.charge.take());
                    }
                }
                8 if !handles.is_empty() => {
                    let entity = pick(&mut rng);
                    let expected = live.get_mut(&entity).unwrap();
                    if !expected.marked {
                        world.add(entity, Marked).unwrap();
                        expected.marked = true;
                    }
                }
                _ => {}
            }

            if step % 100 == 0 {
                check(&world, &live, &dead);
            }
        }

        check(&world, &live, &dead);
    }
}

#[test]
fn test_intersection_is_exact() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    // Both size orders: small Mass store, then small Charge store
    for mass_ratio in [0.1, 0.9] {
        let mut world = new_world();
        let mut expected = BTreeSet::new();

        for _ in 0..1_000 {
            let entity = world.create().unwrap();
            let has_mass = rng.gen_bool(mass_ratio);
            let has_charge = rng.gen_bool(0.5);
            if has_mass {
                world.add(entity, Mass(1)).unwrap();
            }
            if has_charge {
                world.add(entity, Charge(1)).unwrap();
            }
            if has_mass && has_charge {
                expected.insert(entity);
            }
        }

        let mut seen = Vec::new();
        let visited = world
            .for_each::<(Mass, Charge), _>(|entity, (mass, charge)| {
                mass.0 += 1;
                charge.0 -= 1;
                seen.push(entity);
            })
            .unwrap();

        assert_eq!(visited, expected.len());
        let unique: BTreeSet<Entity> = seen.iter().copied().collect();
        assert_eq!(unique.len(), seen.len(), "entity visited twice");
        assert_eq!(unique, expected);

        // The reversed tuple and the parallel pass agree
        let par = world
            .par_for_each::<(Charge, Mass), _>(|_, (charge, mass)| {
                assert_eq!((mass.0, charge.0), (2, 0));
            })
            .unwrap();
        assert_eq!(par, expected.len());
    }
}

#[test]
fn test_stale_handles_never_revalidate() {
    let mut world = new_world();
    let mut stale = Vec::new();

    // Churn a handful of slots many times over
    for _ in 0..200 {
        let batch: Vec<Entity> = (0..5).map(|_| world.create().unwrap()).collect();
        for &entity in &batch {
            world.add(entity, Mass(u64::from(entity.generation()))).unwrap();
            world.destroy(entity).unwrap();
        }
        stale.extend(batch);
    }

    assert!(world.entities().slot_count() <= 5);
    assert!(stale.iter().all(|&entity| !world.is_valid(entity)));
    assert!(world.store::<Mass>().unwrap().is_empty());

    let fresh = world.create().unwrap();
    assert!(!stale.contains(&fresh));
    assert!(world.get::<Mass>(stale[0]).is_err());
}

#[test]
fn test_parallel_consume_marks_every_match_once() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut world = new_world();
    let mut marked = BTreeSet::new();

    for _ in 0..2_000 {
        let entity = world.create().unwrap();
        world.add(entity, Mass(0)).unwrap();
        if rng.gen_bool(0.3) {
            world.add(entity, Marked).unwrap();
            marked.insert(entity);
        }
    }

    let visited = world
        .par_for_each_consume::<(Mass, Marked), _>(|_, (mass, _)| mass.0 += 1)
        .unwrap();

    assert_eq!(visited, marked.len());
    assert!(world.store::<Marked>().unwrap().is_empty());
    for (entity, mass) in world.store::<Mass>().unwrap().iter() {
        assert_eq!(mass.0, u64::from(marked.contains(&entity)));
    }
}
