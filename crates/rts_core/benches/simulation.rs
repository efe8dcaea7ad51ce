//! Simulation benchmarks for rts_core.
//!
//! Run with: `cargo bench -p rts_core`

#![allow(missing_docs)]

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rts_core::entity::{Building, EntityId, PlayerEntityCommon, Unit, UnitKind};
use rts_core::grid::{position_to_grid, Grid, TerrainCost};
use rts_core::interfaces::NullSink;
use rts_core::math::{Fixed, Vec2Fixed};
use rts_core::player::{FactionId, Player, PlayerId};
use rts_core::production::{BlueprintRegistry, ProductionState};
use rts_core::simulation::Simulation;

fn build_unit(player_id: PlayerId, faction_id: FactionId, x: i32, y: i32) -> Unit {
    let position = Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y));
    Unit {
        common: PlayerEntityCommon {
            id: EntityId::new(0),
            player_id,
            faction_id,
            position,
            health: 100,
            max_health: 100,
            cover: Fixed::ZERO,
            visibility_radius: Fixed::from_num(6),
            known_enemies: Default::default(),
            enemy_assigned_by_player: None,
            targeted_enemy: None,
            immortal: false,
        },
        kind: UnitKind::Vehicle,
        unit_type: "scout".to_string(),
        current_node: position_to_grid(position),
        reserved_node: None,
        facing_direction: 0,
        turret_facing_direction: None,
        virtual_angle: Fixed::ZERO,
        max_speed: Fixed::from_num(10),
        rotation_speed: Fixed::from_num(180),
        path: Default::default(),
        awaited_path: None,
        path_wait_deadline: None,
        armour: 0,
        attack_radius: Fixed::ZERO,
        weapons: Vec::new(),
        permanent_units_group: None,
        navigating_group: None,
        outside: true,
        forced_destination: false,
    }
}

fn build_command_center(player_id: PlayerId, faction_id: FactionId, x: i32, y: i32) -> Building {
    let position = Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y));
    let mut occupied_nodes = HashSet::new();
    occupied_nodes.insert(position_to_grid(position));
    Building {
        common: PlayerEntityCommon {
            id: EntityId::new(0),
            player_id,
            faction_id,
            position,
            health: 1000,
            max_health: 1000,
            cover: Fixed::ZERO,
            visibility_radius: Fixed::from_num(8),
            known_enemies: Default::default(),
            enemy_assigned_by_player: None,
            targeted_enemy: None,
            immortal: false,
        },
        building_type: "command_center".to_string(),
        occupied_nodes,
        energy_consumption: 0,
        energy_production: 0,
        power_ratio: Fixed::ONE,
        production: Some(ProductionState::default()),
        extractor: None,
        research: None,
        garrison: None,
        deployment_point: None,
        spawn_point: position,
        armour: 10,
        weapons: Vec::new(),
        attack_radius: Fixed::ZERO,
    }
}

/// Build a two-faction skirmish with `units_per_side` scouts a side, on a
/// 64x64 flat grid, ready to tick.
fn bench_simulation(units_per_side: u32) -> Simulation {
    let columns = 64;
    let rows = 64;
    let grid = Grid::new(columns, rows, vec![TerrainCost::Ground; (columns * rows) as usize]);
    let mut sim = Simulation::new(grid, BlueprintRegistry::default(), 42);

    for side in 0..2u32 {
        let player_id = PlayerId::new(side);
        let faction_id = FactionId::new(side);
        sim.add_player(Player::new(player_id, faction_id, (200, 60, 60)));
        sim.spawn_building(build_command_center(player_id, faction_id, 4 + side as i32 * 56, 32));
        for i in 0..units_per_side {
            let x = 6 + side as i32 * 52 + (i % 10) as i32;
            let y = 30 + (i / 10) as i32;
            sim.spawn_unit(build_unit(player_id, faction_id, x, y));
        }
    }
    sim.declare_war(FactionId::new(0), FactionId::new(1)).expect("declare_war");
    sim
}

fn tick_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_tick");
    for &units_per_side in &[10u32, 50, 200] {
        group.bench_function(format!("{units_per_side}_units_per_side"), |b| {
            b.iter_batched(
                || bench_simulation(units_per_side),
                |mut sim| {
                    let mut render = NullSink;
                    let mut audio = NullSink;
                    for _ in 0..60 {
                        sim.tick(black_box(&mut render), black_box(&mut audio));
                    }
                    black_box(sim.tick_count())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn quadtree_query_throughput(c: &mut Criterion) {
    use rts_core::quadtree::{IndexedEntity, QuadTree, Rect};

    let bounds = Rect::new(Fixed::from_num(2000), Fixed::from_num(2000), Fixed::from_num(4000), Fixed::from_num(4000));
    c.bench_function("quadtree_insert_and_query_1000", |b| {
        b.iter(|| {
            let mut tree = QuadTree::new(bounds);
            for i in 0..1000u64 {
                tree.insert(IndexedEntity {
                    id: EntityId::new(i),
                    faction_id: FactionId::new((i % 2) as u32),
                    position: Vec2Fixed::new(Fixed::from_num((i % 200) as i32 * 20), Fixed::from_num((i / 200) as i32 * 20)),
                });
            }
            let mut hostile = HashSet::new();
            hostile.insert(FactionId::new(1));
            let found = tree.find_visible_entities_in_circle(
                Fixed::from_num(2000),
                Fixed::from_num(2000),
                Fixed::from_num(500),
                &hostile,
            );
            black_box(found.len())
        });
    });
}

criterion_group!(benches, tick_throughput, quadtree_query_throughput);
criterion_main!(benches);
