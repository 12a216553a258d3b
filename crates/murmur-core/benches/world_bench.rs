use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use glam::Vec3;
use murmur_core::{
    ConsistencyMode, MovementInput, MovementOutput, MovementPolicy, MurmurConfig, WorldState,
};
use std::time::Duration;

/// Minimal steering load: pull toward the nearest neighbor and hold altitude.
struct PursuitPolicy;

impl MovementPolicy for PursuitPolicy {
    fn kind(&self) -> &'static str {
        "bench.pursuit"
    }

    fn steer(&self, input: &MovementInput<'_>) -> MovementOutput {
        let mut acceleration = Vec3::new(0.0, (60.0 - input.position.y) * 0.2, 0.0);
        if let Some(nearest) = input.nearby.first() {
            let offset = nearest.position - input.position;
            if offset.length() > 0.0 {
                acceleration += offset.normalize() * 3.0;
            }
        }
        MovementOutput::accelerate(acceleration)
    }
}

fn bench_world_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_tick");
    let samples: usize = std::env::var("MURMUR_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(20);
    let measure: u64 = std::env::var("MURMUR_BENCH_MEASURE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(8);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(measure));

    let ticks: usize = std::env::var("MURMUR_BENCH_TICKS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(32);
    let agents_list: Vec<usize> = std::env::var("MURMUR_BENCH_AGENTS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![500, 2_000, 5_000]);

    for &agents in &agents_list {
        for (label, consistency) in [
            ("live", ConsistencyMode::SequentialLive),
            ("barrier", ConsistencyMode::SnapshotBarrier),
        ] {
            group.bench_function(format!("{label}_agents{agents}_ticks{ticks}"), |b| {
                b.iter_batched(
                    || {
                        let config = MurmurConfig {
                            rng_seed: Some(0xBEEF),
                            consistency,
                            history_capacity: 1,
                            ..MurmurConfig::default()
                        };
                        let mut world =
                            WorldState::with_policy(config, Box::new(PursuitPolicy))
                                .expect("world");
                        world.create_population(agents);
                        world
                    },
                    |mut world| {
                        for _ in 0..ticks {
                            world.tick(1.0 / 60.0);
                        }
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_world_ticks);
criterion_main!(benches);
