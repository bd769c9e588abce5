//! Simulation benchmarks for brawl_core.
//!
//! Run with: `cargo bench -p brawl_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use brawl_core::collision::{overlaps, Shape};
use brawl_core::decision::{BehaviorProfile, Snapshot, UtilityScorer};
use brawl_core::math::{ArenaBounds, Fixed, Vec2Fixed};
use brawl_test_utils::fixtures::{duel, team_fight};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Whole-tick cost for a duel and for growing team fights.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("duel_60_ticks", |b| {
        b.iter_batched(
            || duel(1, 200),
            |mut sim| {
                for _ in 0..60 {
                    black_box(sim.step());
                }
                sim
            },
            criterion::BatchSize::SmallInput,
        )
    });

    let mut group = c.benchmark_group("team_fight_60_ticks");
    for per_team in [2u64, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(per_team), &per_team, |b, &n| {
            b.iter_batched(
                || team_fight(1, n),
                |mut sim| {
                    for _ in 0..60 {
                        black_box(sim.step());
                    }
                    sim
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

/// Decision and overlap hot paths in isolation.
pub fn component_benchmark(c: &mut Criterion) {
    let sim = team_fight(1, 4);
    let snapshot = Snapshot::capture(sim.combatants(), 0, 0, ArenaBounds::default());
    let mut scorer = UtilityScorer::new(1);
    c.bench_function("utility_select", |b| {
        b.iter(|| scorer.select(black_box(&BehaviorProfile::Defensive), black_box(&snapshot)))
    });

    let rect = Shape::Rect {
        center: Vec2Fixed::from_ints(100, 100),
        half_extents: Vec2Fixed::from_ints(40, 25),
        heading: Vec2Fixed::from_ints(3, 4).normalize(),
    };
    let circle = Shape::Circle {
        center: Vec2Fixed::from_ints(130, 120),
        radius: Fixed::from_num(22),
    };
    c.bench_function("overlap_rect_circle", |b| {
        b.iter(|| overlaps(black_box(&rect), black_box(&circle)))
    });
}

criterion_group!(benches, simulation_benchmark, component_benchmark);
criterion_main!(benches);
