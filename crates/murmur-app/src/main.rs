use anyhow::Result;
use murmur_core::{ConsistencyMode, MurmurConfig, WorldState};
use murmur_flock::{FlockPolicy, FlockSettings};
use tracing::{info, warn};

/// Upstream ceiling applied to every frame delta before it reaches the core.
const MAX_DELTA_TIME: f32 = 0.1;
/// Nominal frame delta for the headless loop.
const FRAME_DELTA_TIME: f32 = 1.0 / 60.0;

fn main() -> Result<()> {
    init_tracing();
    let mut world = bootstrap_world()?;
    let ticks = env_usize("MURMUR_TICKS", 600);

    info!(
        agents = world.agent_count(),
        ticks,
        mode = ?world.config().consistency,
        "Starting murmur simulation shell"
    );

    let dt = FRAME_DELTA_TIME.min(MAX_DELTA_TIME);
    for _ in 0..ticks {
        let summary = world.tick(dt);
        if summary.tick.0.is_multiple_of(120) {
            info!(
                tick = summary.tick.0,
                agents = summary.agent_count,
                mean_speed = summary.mean_speed,
                max_speed = summary.max_speed,
                "tick summary",
            );
        }
    }

    if let Some(summary) = world.history().last() {
        info!(
            tick = summary.tick.0,
            mean_speed = summary.mean_speed,
            "Simulation finished",
        );
    } else {
        warn!("Simulation finished without recording any tick summaries");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_world() -> Result<WorldState> {
    let config = MurmurConfig {
        entity_count: env_usize("MURMUR_AGENTS", 500),
        rng_seed: std::env::var("MURMUR_SEED")
            .ok()
            .and_then(|s| s.parse::<u64>().ok()),
        consistency: match std::env::var("MURMUR_MODE").ok().as_deref() {
            Some("barrier") => ConsistencyMode::SnapshotBarrier,
            _ => ConsistencyMode::SequentialLive,
        },
        ..MurmurConfig::default()
    };
    info!(config = %serde_json::to_string(&config)?, "Resolved configuration");

    let policy = FlockPolicy::new(FlockSettings::default());
    let mut world = WorldState::with_policy(config, Box::new(policy))?;
    let count = world.config().entity_count;
    world.create_population(count);
    Ok(world)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
