use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use gc_bridge::{
    FieldDimensions, ObservedRobot, RobotPopulationReconciler, RobotState, TeamTargets, Vec2,
    WorldSnapshot,
};

fn snapshot(robots: u32) -> WorldSnapshot {
    let team = |offset: f64| -> Vec<ObservedRobot> {
        (0..robots)
            .map(|id| ObservedRobot {
                id,
                state: RobotState::at(Vec2::new(id as f64 * 0.3, offset)),
            })
            .collect()
    };
    WorldSnapshot {
        field: FieldDimensions {
            x_length: 12.0,
            y_length: 9.0,
            boundary_buffer: 0.3,
        },
        blue: team(1.0),
        yellow: team(-1.0),
    }
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for robots in [6u32, 11, 16] {
        group.bench_with_input(BenchmarkId::new("shrink_then_grow", robots), &robots, |b, &robots| {
            let full = snapshot(robots);
            let reduced = snapshot(robots / 2);
            b.iter_batched(
                RobotPopulationReconciler::new,
                |mut reconciler| {
                    let half = (robots / 2) as usize;
                    reconciler.reconcile(&full, TeamTargets { blue: half, yellow: half });
                    reconciler.reconcile(
                        &reduced,
                        TeamTargets {
                            blue: robots as usize,
                            yellow: robots as usize,
                        },
                    )
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(reconcile_benches, bench_reconcile);
criterion_main!(reconcile_benches);
