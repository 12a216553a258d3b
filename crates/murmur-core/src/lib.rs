//! Core types shared across the murmur workspace.

use glam::Vec3;
use murmur_index::{NeighborhoodIndex, UniformGridIndex};
use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::warn;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Convenience alias for associating side data with agents.
pub type AgentMap<T> = SecondaryMap<AgentId, T>;

/// Distance below which a neighbor belongs to the close tier.
pub const CLOSE_RANGE: f32 = 20.0;
/// Hard ceiling on agent speed, enforced after every integration.
pub const MAX_SPEED: f32 = 50.0;
/// Sub-cap on close-tier neighbors, independent of the configured cap.
pub const CLOSE_TIER_LIMIT: usize = 7;
/// Number of samples the terrain collaborator returns per query.
pub const TERRAIN_SAMPLE_COUNT: usize = 5;
/// Speed below which the previous facing is retained instead of re-derived.
pub const FACING_SPEED_FLOOR: f32 = 0.1;

/// Fraction of the terrain extent covered by the horizontal spawn band.
const SPAWN_EXTENT_RATIO: f32 = 0.4;

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Scalar fields for a single agent used when inserting or snapshotting from the SoA store.
///
/// `facing` is the render-facing cache fed to the transform-sync collaborator;
/// it is never part of a policy's input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentData {
    pub position: Vec3,
    pub velocity: Vec3,
    pub facing: Vec3,
}

impl AgentData {
    /// Creates a new agent payload with the provided scalar fields.
    #[must_use]
    pub const fn new(position: Vec3, velocity: Vec3, facing: Vec3) -> Self {
        Self {
            position,
            velocity,
            facing,
        }
    }
}

impl Default for AgentData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            facing: Vec3::NEG_Z,
        }
    }
}

/// Collection of per-agent columns for hot-path iteration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AgentColumns {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    facings: Vec<Vec3>,
}

impl AgentColumns {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            facings: Vec::with_capacity(capacity),
        }
    }

    /// Number of active rows in the columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no active rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve additional capacity in each backing vector.
    pub fn reserve(&mut self, additional: usize) {
        self.positions.reserve(additional);
        self.velocities.reserve(additional);
        self.facings.reserve(additional);
    }

    /// Remove all rows while retaining capacity.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.facings.clear();
    }

    /// Push a new row onto each column.
    pub fn push(&mut self, agent: AgentData) {
        self.positions.push(agent.position);
        self.velocities.push(agent.velocity);
        self.facings.push(agent.facing);
        self.debug_assert_coherent();
    }

    /// Swap-remove the row at `index` and return its scalar fields.
    pub fn swap_remove(&mut self, index: usize) -> AgentData {
        let removed = AgentData {
            position: self.positions.swap_remove(index),
            velocity: self.velocities.swap_remove(index),
            facing: self.facings.swap_remove(index),
        };
        self.debug_assert_coherent();
        removed
    }

    /// Return a copy of the scalar fields at `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentData {
        AgentData {
            position: self.positions[index],
            velocity: self.velocities[index],
            facing: self.facings[index],
        }
    }

    /// Write the scalar fields at `index`.
    pub fn write(&mut self, index: usize, agent: AgentData) {
        self.positions[index] = agent.position;
        self.velocities[index] = agent.velocity;
        self.facings[index] = agent.facing;
    }

    /// Immutable access to the positions slice.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Mutable access to the positions slice.
    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    /// Immutable access to the velocities slice.
    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Mutable access to the velocities slice.
    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    /// Immutable access to the facing directions.
    #[must_use]
    pub fn facings(&self) -> &[Vec3] {
        &self.facings
    }

    /// Mutable access to the facing directions.
    #[must_use]
    pub fn facings_mut(&mut self) -> &mut [Vec3] {
        &mut self.facings
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.velocities.len());
        debug_assert_eq!(self.positions.len(), self.facings.len());
    }
}

/// Dense SoA storage with generational handles for agent access.
///
/// Dense indices are stable within a tick and used to exclude the observer
/// from its own neighbor query; they are not stable across a reset.
#[derive(Debug)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    columns: AgentColumns,
}

impl Default for AgentArena {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            columns: AgentColumns::new(),
        }
    }

    /// Create an arena with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            columns: AgentColumns::with_capacity(capacity),
        }
    }

    /// Number of active agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when no agents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reserve space for additional agents.
    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.handles.reserve(additional);
        self.columns.reserve(additional);
    }

    /// Iterate over active agent handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Borrow the underlying column storage.
    #[must_use]
    pub fn columns(&self) -> &AgentColumns {
        &self.columns
    }

    /// Mutably borrow the underlying column storage.
    #[must_use]
    pub fn columns_mut(&mut self) -> &mut AgentColumns {
        &mut self.columns
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns the handle stored at dense index `index`, if in range.
    #[must_use]
    pub fn handle_at(&self, index: usize) -> Option<AgentId> {
        self.handles.get(index).copied()
    }

    /// Returns true if `id` refers to a live agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: AgentData) -> AgentId {
        let index = self.columns.len();
        self.columns.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id` returning its scalar data if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentData> {
        let index = self.slots.remove(id)?;
        let removed = self.columns.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(removed)
    }

    /// Produce a copy of the scalar data for `id`.
    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> Option<AgentData> {
        let index = self.index_of(id)?;
        Some(self.columns.snapshot(index))
    }

    /// Clear all stored agents.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.columns.clear();
    }
}

/// Partial key-value update produced by a movement policy.
pub type VariablePatch = HashMap<String, f32>;

/// Open-ended named scalar store carried by each agent across ticks.
///
/// Keys are not interpreted by the core; a policy's variable patch is the
/// only writer besides population initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentVariables {
    values: HashMap<String, f32>,
}

impl AgentVariables {
    /// Create an empty variable store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a variable, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    /// Write a single variable, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: f32) {
        self.values.insert(key.into(), value);
    }

    /// Merge a patch: patch entries overwrite on key collision, keys absent
    /// from the patch are left untouched.
    pub fn merge(&mut self, patch: VariablePatch) {
        self.values.extend(patch);
    }

    /// Number of stored variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no variables are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over stored key/value pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One neighbor as seen by an observer during a single tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NearbyAgent {
    pub position: Vec3,
    pub velocity: Vec3,
    pub distance: f32,
}

/// Terrain surface classification reported by the sampling collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SurfaceKind {
    #[default]
    Field,
    Lake,
    Hedgerow,
    Tree,
}

/// One terrain probe result forwarded opaquely to the movement policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TerrainSample {
    pub height: f32,
    pub surface: SurfaceKind,
    pub normal: Vec3,
}

impl Default for TerrainSample {
    fn default() -> Self {
        Self {
            height: 0.0,
            surface: SurfaceKind::Field,
            normal: Vec3::Y,
        }
    }
}

/// Terrain sampling collaborator queried once per agent per tick.
pub trait TerrainSampler: Send + Sync {
    /// Probe the terrain around an agent. The core forwards the returned
    /// samples to the movement policy without inspecting them.
    fn sample(&self, position: Vec3, velocity: Vec3) -> Vec<TerrainSample>;
}

/// Stub sampler: flat field at height zero with an up-facing normal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl TerrainSampler for FlatTerrain {
    fn sample(&self, _position: Vec3, _velocity: Vec3) -> Vec<TerrainSample> {
        vec![TerrainSample::default(); TERRAIN_SAMPLE_COUNT]
    }
}

/// Everything a movement policy sees for one agent on one tick.
#[derive(Debug)]
pub struct MovementInput<'a> {
    pub position: Vec3,
    pub velocity: Vec3,
    pub variables: &'a AgentVariables,
    pub nearby: &'a [NearbyAgent],
    pub terrain: &'a [TerrainSample],
    pub delta_time: f32,
}

/// Acceleration chosen by a movement policy, plus an optional variable patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementOutput {
    pub acceleration: Vec3,
    pub variable_patch: Option<VariablePatch>,
}

impl MovementOutput {
    /// Output with the given acceleration and no patch.
    #[must_use]
    pub fn accelerate(acceleration: Vec3) -> Self {
        Self {
            acceleration,
            variable_patch: None,
        }
    }
}

/// Externally supplied movement behavior, invoked exactly once per agent per tick.
///
/// The `&self` receiver enforces the no-mutation contract; the variable patch
/// is the only approved channel for carrying state between ticks.
pub trait MovementPolicy: Send + Sync {
    /// Static identifier of the policy implementation.
    fn kind(&self) -> &'static str;

    /// Choose an acceleration for one agent.
    fn steer(&self, input: &MovementInput<'_>) -> MovementOutput;
}

/// Policy installed until a real one is bound; produces no acceleration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoverPolicy;

impl MovementPolicy for HoverPolicy {
    fn kind(&self) -> &'static str {
        "core.hover"
    }

    fn steer(&self, _input: &MovementInput<'_>) -> MovementOutput {
        MovementOutput::default()
    }
}

/// Select a bounded, tier-prioritized neighbor list from raw candidates.
///
/// Candidates carry `(distance, dense index)` and must already be filtered to
/// the perception radius with the observer excluded. Close tier (distance at
/// most [`CLOSE_RANGE`]) is admitted first, ascending by distance, up to
/// `min(cap, CLOSE_TIER_LIMIT)`; leftover capacity is filled from the outer
/// tier in ascending order. Close-tier overflow is dropped even though it is
/// nearer than admitted outer entries.
fn select_neighbors(
    candidates: Vec<(OrderedFloat<f32>, usize)>,
    cap: usize,
    positions: &[Vec3],
    velocities: &[Vec3],
) -> Vec<NearbyAgent> {
    if cap == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let (mut close, mut outer): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|(distance, _)| distance.into_inner() <= CLOSE_RANGE);
    close.sort_unstable_by_key(|(distance, _)| *distance);
    outer.sort_unstable_by_key(|(distance, _)| *distance);

    let close_take = cap.min(CLOSE_TIER_LIMIT).min(close.len());
    let outer_take = (cap - close_take).min(outer.len());

    close[..close_take]
        .iter()
        .chain(&outer[..outer_take])
        .map(|&(distance, idx)| NearbyAgent {
            position: positions[idx],
            velocity: velocities[idx],
            distance: distance.into_inner(),
        })
        .collect()
}

/// Neighbor perception query over live column slices.
///
/// Linear scan over every other agent; `exclude` is the observer's dense
/// index, so an agent sharing the observer's coordinates is still reported.
#[must_use]
pub fn perceive(
    observer: Vec3,
    exclude: usize,
    positions: &[Vec3],
    velocities: &[Vec3],
    radius: f32,
    cap: usize,
) -> Vec<NearbyAgent> {
    let mut candidates = Vec::new();
    for (idx, other) in positions.iter().enumerate() {
        if idx == exclude {
            continue;
        }
        let distance = observer.distance(*other);
        if distance <= radius {
            candidates.push((OrderedFloat(distance), idx));
        }
    }
    select_neighbors(candidates, cap, positions, velocities)
}

/// Advance one agent by `dt`, returning `(position, velocity, facing)`.
///
/// Semi-implicit Euler: velocity first, capped at [`MAX_SPEED`] with
/// direction preserved, then position from the new velocity. A `dt` of zero
/// is an exact bitwise no-op on position and velocity. Facing is re-derived
/// from the velocity direction only above [`FACING_SPEED_FLOOR`]; below it
/// the previous facing is retained.
#[must_use]
pub fn integrate(
    position: Vec3,
    velocity: Vec3,
    facing: Vec3,
    acceleration: Vec3,
    dt: f32,
) -> (Vec3, Vec3, Vec3) {
    if dt <= 0.0 {
        return (position, velocity, facing);
    }
    let velocity = (velocity + acceleration * dt).clamp_length_max(MAX_SPEED);
    let position = position + velocity * dt;
    let facing = if velocity.length() > FACING_SPEED_FLOOR {
        velocity.normalize()
    } else {
        facing
    };
    (position, velocity, facing)
}

/// Consistency model for same-tick neighbor reads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConsistencyMode {
    /// Agents update in place in index order; an observer sees post-update
    /// state for lower indices and pre-update state for higher indices.
    #[default]
    SequentialLive,
    /// Every agent perceives the same pre-tick snapshot; updates commit
    /// after all policies have run.
    SnapshotBarrier,
}

/// Per-agent transform published to the rendering collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentTransform {
    pub position: Vec3,
    pub facing: Vec3,
}

/// Batch of transforms for one completed tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformBatch {
    pub tick: Tick,
    pub transforms: Vec<AgentTransform>,
}

/// Transform-sync sink invoked once after each tick.
pub trait TransformSync: Send {
    fn on_tick(&mut self, batch: &TransformBatch);
}

/// No-op transform sink.
#[derive(Debug, Default)]
pub struct NullTransformSync;

impl TransformSync for NullTransformSync {
    fn on_tick(&mut self, _batch: &TransformBatch) {}
}

/// Summary emitted after each tick and retained in bounded history.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    pub mean_speed: f32,
    pub max_speed: f32,
}

/// Errors that can occur when constructing or reconfiguring world state.
#[derive(Debug, Error)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a murmur world.
///
/// Close-range threshold and max speed are fixed core constants, not
/// configuration; see [`CLOSE_RANGE`] and [`MAX_SPEED`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MurmurConfig {
    /// World extent in world units; the spawn band covers the middle 80%.
    pub terrain_size: f32,
    /// Current population size; updated by `create_population`.
    pub entity_count: usize,
    /// Radius within which other agents are perceptible.
    pub perception_radius: f32,
    /// Maximum neighbor-list length handed to the movement policy.
    pub max_entity_perception: usize,
    /// Lower bound of the uniform spawn height band.
    pub spawn_height_min: f32,
    /// Upper bound of the uniform spawn height band.
    pub spawn_height_max: f32,
    /// Half-range of the uniform per-axis initial velocity.
    pub spawn_speed: f32,
    /// Same-tick neighbor-read consistency model.
    pub consistency: ConsistencyMode,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    /// Cell edge length for the snapshot-barrier grid index.
    pub grid_cell_size: f32,
}

impl Default for MurmurConfig {
    fn default() -> Self {
        Self {
            terrain_size: 1_000.0,
            entity_count: 500,
            perception_radius: 50.0,
            max_entity_perception: 12,
            spawn_height_min: 20.0,
            spawn_height_max: 100.0,
            spawn_speed: 2.0,
            consistency: ConsistencyMode::SequentialLive,
            rng_seed: None,
            history_capacity: 256,
            grid_cell_size: 50.0,
        }
    }
}

impl MurmurConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        if !(self.terrain_size.is_finite() && self.terrain_size > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "terrain_size must be positive",
            ));
        }
        if !(self.perception_radius.is_finite() && self.perception_radius > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "perception_radius must be positive",
            ));
        }
        if self.max_entity_perception == 0 {
            return Err(WorldStateError::InvalidConfig(
                "max_entity_perception must be nonzero",
            ));
        }
        if !(self.spawn_height_min.is_finite()
            && self.spawn_height_max.is_finite()
            && self.spawn_height_min < self.spawn_height_max)
        {
            return Err(WorldStateError::InvalidConfig(
                "spawn height band must be a non-empty range",
            ));
        }
        if !(self.spawn_speed.is_finite() && self.spawn_speed > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "spawn_speed must be positive",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "history_capacity must be nonzero",
            ));
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "grid_cell_size must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Commands accepted by the world between ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ControlCommand {
    CreatePopulation(usize),
    RandomizePopulation,
    SetPerceptionRadius(f32),
    SetMaxEntityPerception(usize),
    Tick(f32),
}

/// Apply a control command to the world.
pub fn apply_control_command(
    world: &mut WorldState,
    command: ControlCommand,
) -> Result<(), WorldStateError> {
    match command {
        ControlCommand::CreatePopulation(count) => {
            world.create_population(count);
            Ok(())
        }
        ControlCommand::RandomizePopulation => {
            world.randomize_population();
            Ok(())
        }
        ControlCommand::SetPerceptionRadius(radius) => world.set_perception_radius(radius),
        ControlCommand::SetMaxEntityPerception(cap) => world.set_max_entity_perception(cap),
        ControlCommand::Tick(delta_time) => {
            world.tick(delta_time);
            Ok(())
        }
    }
}

/// Per-agent result computed against the pre-tick snapshot in barrier mode.
struct AgentStep {
    data: AgentData,
    patch: Option<VariablePatch>,
}

/// Aggregate world state driving the simulation.
///
/// `&mut self` on [`WorldState::tick`], [`WorldState::randomize_population`],
/// and [`WorldState::create_population`] is the tick-boundary gate: exactly
/// one tick-driving thread exists, and population mutation can never
/// interleave with an in-flight tick.
pub struct WorldState {
    config: MurmurConfig,
    tick: Tick,
    rng: SmallRng,
    agents: AgentArena,
    variables: AgentMap<AgentVariables>,
    index: UniformGridIndex,
    policy: Box<dyn MovementPolicy>,
    terrain: Box<dyn TerrainSampler>,
    transform_sync: Box<dyn TransformSync>,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .field("policy", &self.policy.kind())
            .finish()
    }
}

impl WorldState {
    /// Instantiate a new world with the supplied configuration and a hover
    /// policy, flat terrain, and no transform sink.
    pub fn new(config: MurmurConfig) -> Result<Self, WorldStateError> {
        Self::with_policy(config, Box::new(HoverPolicy))
    }

    /// Instantiate a new world with the supplied configuration and policy.
    pub fn with_policy(
        config: MurmurConfig,
        policy: Box<dyn MovementPolicy>,
    ) -> Result<Self, WorldStateError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let index = UniformGridIndex::new(config.grid_cell_size);
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            rng,
            agents: AgentArena::new(),
            variables: AgentMap::new(),
            index,
            policy,
            terrain: Box::new(FlatTerrain),
            transform_sync: Box::new(NullTransformSync),
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &MurmurConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick_count(&self) -> Tick {
        self.tick
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Read-only access to the agent arena.
    #[must_use]
    pub fn agents(&self) -> &AgentArena {
        &self.agents
    }

    /// Mutable access to the agent arena.
    #[must_use]
    pub fn agents_mut(&mut self) -> &mut AgentArena {
        &mut self.agents
    }

    /// Borrow the variable store for a specific agent.
    #[must_use]
    pub fn agent_variables(&self, id: AgentId) -> Option<&AgentVariables> {
        self.variables.get(id)
    }

    /// Mutably borrow the variable store for a specific agent.
    #[must_use]
    pub fn agent_variables_mut(&mut self, id: AgentId) -> Option<&mut AgentVariables> {
        self.variables.get_mut(id)
    }

    /// Replace the movement policy from the next tick onward.
    pub fn set_policy(&mut self, policy: Box<dyn MovementPolicy>) {
        self.policy = policy;
    }

    /// Replace the terrain sampling collaborator.
    pub fn set_terrain_sampler(&mut self, terrain: Box<dyn TerrainSampler>) {
        self.terrain = terrain;
    }

    /// Replace the transform-sync sink.
    pub fn set_transform_sync(&mut self, transform_sync: Box<dyn TransformSync>) {
        self.transform_sync = transform_sync;
    }

    /// Update the perception radius used from the next tick onward.
    pub fn set_perception_radius(&mut self, radius: f32) -> Result<(), WorldStateError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "perception_radius must be positive",
            ));
        }
        self.config.perception_radius = radius;
        Ok(())
    }

    /// Update the neighbor cap used from the next tick onward.
    pub fn set_max_entity_perception(&mut self, cap: usize) -> Result<(), WorldStateError> {
        if cap == 0 {
            return Err(WorldStateError::InvalidConfig(
                "max_entity_perception must be nonzero",
            ));
        }
        self.config.max_entity_perception = cap;
        Ok(())
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Spawn a single agent with explicit scalar data and an empty variable map.
    pub fn spawn_agent(&mut self, agent: AgentData) -> AgentId {
        let id = self.agents.insert(agent);
        self.variables.insert(id, AgentVariables::new());
        id
    }

    fn random_spawn_data(&mut self) -> AgentData {
        let half = self.config.terrain_size * SPAWN_EXTENT_RATIO;
        let height_min = self.config.spawn_height_min;
        let height_max = self.config.spawn_height_max;
        let speed = self.config.spawn_speed;
        let position = Vec3::new(
            self.rng.random_range(-half..half),
            self.rng.random_range(height_min..height_max),
            self.rng.random_range(-half..half),
        );
        let velocity = Vec3::new(
            self.rng.random_range(-speed..speed),
            self.rng.random_range(-speed..speed),
            self.rng.random_range(-speed..speed),
        );
        let facing = if velocity.length() > 0.0 {
            velocity.normalize()
        } else {
            Vec3::NEG_Z
        };
        AgentData::new(position, velocity, facing)
    }

    /// Replace the population with `count` freshly randomized agents.
    ///
    /// Dense indices from before this call are invalidated; every agent
    /// starts with an empty variable map.
    pub fn create_population(&mut self, count: usize) {
        self.agents.clear();
        self.variables.clear();
        self.agents.reserve(count);
        self.config.entity_count = count;
        for _ in 0..count {
            let data = self.random_spawn_data();
            self.spawn_agent(data);
        }
    }

    /// Re-randomize position and velocity of every existing agent.
    ///
    /// Population size and per-agent variable maps are untouched.
    pub fn randomize_population(&mut self) {
        for idx in 0..self.agents.len() {
            let data = self.random_spawn_data();
            self.agents.columns_mut().write(idx, data);
        }
    }

    /// Execute one simulation tick, returning its summary.
    ///
    /// A non-finite or non-positive `delta_time` is coerced to zero, which
    /// leaves every position and velocity bitwise untouched.
    pub fn tick(&mut self, delta_time: f32) -> TickSummary {
        let dt = if delta_time.is_finite() && delta_time > 0.0 {
            delta_time
        } else {
            0.0
        };

        match self.config.consistency {
            ConsistencyMode::SequentialLive => self.tick_sequential_live(dt),
            ConsistencyMode::SnapshotBarrier => self.tick_snapshot_barrier(dt),
        }

        self.tick = self.tick.next();
        let summary = self.summarize();
        self.publish_transforms();
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    fn tick_sequential_live(&mut self, dt: f32) {
        let count = self.agents.len();
        let radius = self.config.perception_radius;
        let cap = self.config.max_entity_perception;
        let fallback = AgentVariables::new();

        for idx in 0..count {
            let snapshot = self.agents.columns().snapshot(idx);
            let nearby = {
                let columns = self.agents.columns();
                perceive(
                    snapshot.position,
                    idx,
                    columns.positions(),
                    columns.velocities(),
                    radius,
                    cap,
                )
            };
            let terrain = self.terrain.sample(snapshot.position, snapshot.velocity);
            let Some(id) = self.agents.handle_at(idx) else {
                continue;
            };

            let output = {
                let variables = self.variables.get(id).unwrap_or(&fallback);
                let input = MovementInput {
                    position: snapshot.position,
                    velocity: snapshot.velocity,
                    variables,
                    nearby: &nearby,
                    terrain: &terrain,
                    delta_time: dt,
                };
                self.policy.steer(&input)
            };

            let acceleration = sanitize_acceleration(output.acceleration, idx, self.policy.kind());
            let (position, velocity, facing) = integrate(
                snapshot.position,
                snapshot.velocity,
                snapshot.facing,
                acceleration,
                dt,
            );
            self.agents
                .columns_mut()
                .write(idx, AgentData::new(position, velocity, facing));

            if let Some(patch) = output.variable_patch {
                if let Some(variables) = self.variables.get_mut(id) {
                    merge_sanitized_patch(variables, patch, idx, self.policy.kind());
                }
            }
        }
    }

    fn tick_snapshot_barrier(&mut self, dt: f32) {
        let count = self.agents.len();
        if count == 0 {
            return;
        }

        let positions: Vec<Vec3> = self.agents.columns().positions().to_vec();
        let velocities: Vec<Vec3> = self.agents.columns().velocities().to_vec();
        let facings: Vec<Vec3> = self.agents.columns().facings().to_vec();
        let handles: Vec<AgentId> = self.agents.iter_handles().collect();

        let position_triples: Vec<[f32; 3]> = positions.iter().map(|p| p.to_array()).collect();
        if let Err(error) = self.index.rebuild(&position_triples) {
            warn!(%error, "neighborhood index rebuild failed; skipping tick body");
            return;
        }

        let radius_sq = self.config.perception_radius * self.config.perception_radius;
        let cap = self.config.max_entity_perception;
        let index = &self.index;
        let policy = &self.policy;
        let terrain = &self.terrain;
        let variables = &self.variables;
        let fallback = AgentVariables::new();

        let steps: Vec<AgentStep> = (0..count)
            .into_par_iter()
            .map(|idx| {
                let position = positions[idx];
                let velocity = velocities[idx];

                let mut candidates: Vec<(OrderedFloat<f32>, usize)> = Vec::new();
                index.neighbors_within(idx, radius_sq, &mut |other_idx, dist_sq| {
                    candidates.push((OrderedFloat(dist_sq.into_inner().sqrt()), other_idx));
                });
                let nearby = select_neighbors(candidates, cap, &positions, &velocities);
                let terrain_samples = terrain.sample(position, velocity);
                let agent_variables = variables.get(handles[idx]).unwrap_or(&fallback);

                let input = MovementInput {
                    position,
                    velocity,
                    variables: agent_variables,
                    nearby: &nearby,
                    terrain: &terrain_samples,
                    delta_time: dt,
                };
                let output = policy.steer(&input);
                let acceleration = sanitize_acceleration(output.acceleration, idx, policy.kind());
                let (position, velocity, facing) =
                    integrate(position, velocity, facings[idx], acceleration, dt);
                AgentStep {
                    data: AgentData::new(position, velocity, facing),
                    patch: output.variable_patch,
                }
            })
            .collect();

        for (idx, step) in steps.into_iter().enumerate() {
            self.agents.columns_mut().write(idx, step.data);
            if let Some(patch) = step.patch {
                if let Some(agent_variables) = self.variables.get_mut(handles[idx]) {
                    merge_sanitized_patch(agent_variables, patch, idx, self.policy.kind());
                }
            }
        }
    }

    fn summarize(&self) -> TickSummary {
        let agent_count = self.agents.len();
        let mut total_speed = 0.0f32;
        let mut max_speed = 0.0f32;
        for velocity in self.agents.columns().velocities() {
            let speed = velocity.length();
            total_speed += speed;
            max_speed = max_speed.max(speed);
        }
        let mean_speed = if agent_count > 0 {
            total_speed / agent_count as f32
        } else {
            0.0
        };
        TickSummary {
            tick: self.tick,
            agent_count,
            mean_speed,
            max_speed,
        }
    }

    fn publish_transforms(&mut self) {
        let columns = self.agents.columns();
        let transforms: Vec<AgentTransform> = columns
            .positions()
            .iter()
            .zip(columns.facings())
            .map(|(&position, &facing)| AgentTransform { position, facing })
            .collect();
        let batch = TransformBatch {
            tick: self.tick,
            transforms,
        };
        self.transform_sync.on_tick(&batch);
    }
}

fn sanitize_acceleration(acceleration: Vec3, agent_index: usize, policy_kind: &str) -> Vec3 {
    if acceleration.is_finite() {
        acceleration
    } else {
        warn!(
            agent_index,
            policy = policy_kind,
            "non-finite acceleration from policy; substituting zero"
        );
        Vec3::ZERO
    }
}

fn merge_sanitized_patch(
    variables: &mut AgentVariables,
    patch: VariablePatch,
    agent_index: usize,
    policy_kind: &str,
) {
    for (key, value) in patch {
        if value.is_finite() {
            variables.set(key, value);
        } else {
            warn!(
                agent_index,
                policy = policy_kind,
                key = key.as_str(),
                "non-finite variable patch entry dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_agent(seed: u32) -> AgentData {
        AgentData {
            position: Vec3::new(seed as f32, seed as f32 + 30.0, -(seed as f32)),
            velocity: Vec3::new(seed as f32 * 0.1, 0.0, -(seed as f32) * 0.1),
            facing: Vec3::NEG_Z,
        }
    }

    fn world_with(config: MurmurConfig) -> WorldState {
        WorldState::new(config).expect("world")
    }

    #[test]
    fn insert_allocates_unique_handles() {
        let mut arena = AgentArena::new();
        let a = arena.insert(sample_agent(0));
        let b = arena.insert(sample_agent(1));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert!(arena.contains(a));
        assert!(arena.contains(b));
    }

    #[test]
    fn remove_keeps_dense_storage_coherent() {
        let mut arena = AgentArena::new();
        let a = arena.insert(sample_agent(0));
        let b = arena.insert(sample_agent(1));
        let c = arena.insert(sample_agent(2));

        let removed = arena.remove(b).expect("agent removed");
        assert_eq!(removed.position, sample_agent(1).position);
        assert_eq!(arena.len(), 2);
        assert!(arena.contains(a));
        assert!(arena.contains(c));
        assert!(!arena.contains(b));
        assert_eq!(arena.index_of(c), Some(1));

        let d = arena.insert(sample_agent(3));
        assert_ne!(
            b, d,
            "generational handles should not be reused immediately"
        );
    }

    #[test]
    fn variable_patch_overwrites_on_collision_only() {
        let mut variables = AgentVariables::new();
        variables.set("a", 1.0);

        let mut patch = VariablePatch::new();
        patch.insert("a".to_string(), 2.0);
        patch.insert("b".to_string(), 3.0);
        variables.merge(patch);

        assert_eq!(variables.get("a"), Some(2.0));
        assert_eq!(variables.get("b"), Some(3.0));
        assert_eq!(variables.len(), 2);
    }

    #[test]
    fn integrate_caps_speed_preserving_direction() {
        let (_, velocity, _) = integrate(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -49.0),
            Vec3::NEG_Z,
            Vec3::new(0.0, 0.0, -500.0),
            0.1,
        );
        assert!((velocity.length() - MAX_SPEED).abs() < 1e-3);
        assert!(velocity.z < 0.0);
        assert_eq!(velocity.x, 0.0);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn integrate_zero_dt_is_bitwise_noop() {
        let position = Vec3::new(1.25, 33.7, -8.5);
        let velocity = Vec3::new(-0.75, 2.5, 4.125);
        let facing = Vec3::new(0.0, 0.0, 1.0);
        let (p, v, f) = integrate(position, velocity, facing, Vec3::new(9.0, -4.0, 2.0), 0.0);
        assert_eq!(p, position);
        assert_eq!(v, velocity);
        assert_eq!(f, facing);
    }

    #[test]
    fn integrate_retains_facing_when_nearly_stationary() {
        let facing = Vec3::X;
        let (_, velocity, new_facing) = integrate(
            Vec3::ZERO,
            Vec3::ZERO,
            facing,
            Vec3::new(0.0, 0.0, -0.5),
            0.1,
        );
        assert!(velocity.length() <= FACING_SPEED_FLOOR);
        assert_eq!(new_facing, facing);
    }

    #[test]
    fn integrate_derives_facing_from_velocity_direction() {
        let (_, _, facing) = integrate(
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(0.0, 0.0, -30.0),
            0.1,
        );
        assert!((facing - Vec3::NEG_Z).length() < 1e-5);
    }

    fn line_of_agents(distances: &[f32]) -> (Vec<Vec3>, Vec<Vec3>) {
        // Observer occupies index 0 at the origin.
        let mut positions = vec![Vec3::new(0.0, 50.0, 0.0)];
        positions.extend(
            distances
                .iter()
                .map(|d| Vec3::new(*d, 50.0, 0.0)),
        );
        let velocities = vec![Vec3::ZERO; positions.len()];
        (positions, velocities)
    }

    #[test]
    fn perceive_returns_nearest_in_order_and_excludes_observer() {
        let (positions, velocities) =
            line_of_agents(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 3);

        assert_eq!(nearby.len(), 3);
        let distances: Vec<f32> = nearby.iter().map(|n| n.distance).collect();
        assert_eq!(distances, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn perceive_excludes_observer_even_at_identical_coordinates() {
        let positions = vec![Vec3::new(0.0, 50.0, 0.0), Vec3::new(0.0, 50.0, 0.0)];
        let velocities = vec![Vec3::ZERO; 2];
        let nearby = perceive(positions[0], 0, &positions, &velocities, 10.0, 4);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].distance, 0.0);
    }

    #[test]
    fn perceive_drops_agents_beyond_radius() {
        let (positions, velocities) = line_of_agents(&[5.0, 49.0, 51.0, 200.0]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 10);

        assert_eq!(nearby.len(), 2);
        assert!(nearby.iter().all(|n| n.distance <= 50.0));
    }

    #[test]
    fn close_tier_is_capped_at_seven_and_starves_outer_tier() {
        // Nine close-tier agents and two outer-tier agents, cap of ten.
        let (positions, velocities) = line_of_agents(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, // close tier
            25.0, 30.0, // outer tier
        ]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 10);

        assert_eq!(nearby.len(), 9);
        let distances: Vec<f32> = nearby.iter().map(|n| n.distance).collect();
        assert_eq!(
            distances,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 25.0, 30.0],
            "seven nearest close-tier entries, then the outer tier; close-tier \
             agents at 8 and 9 are dropped by the sub-cap"
        );
    }

    #[test]
    fn close_tier_take_respects_small_caps() {
        let (positions, velocities) = line_of_agents(&[1.0, 2.0, 3.0, 4.0, 25.0]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 2);

        let distances: Vec<f32> = nearby.iter().map(|n| n.distance).collect();
        assert_eq!(distances, vec![1.0, 2.0]);
    }

    #[test]
    fn tiers_are_sorted_ascending_within_themselves() {
        let (positions, velocities) = line_of_agents(&[19.0, 3.0, 11.0, 45.0, 22.0, 30.0]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 6);

        let distances: Vec<f32> = nearby.iter().map(|n| n.distance).collect();
        assert_eq!(distances, vec![3.0, 11.0, 19.0, 22.0, 30.0, 45.0]);
    }

    #[test]
    fn under_full_result_is_not_an_error() {
        let (positions, velocities) = line_of_agents(&[4.0]);
        let nearby = perceive(positions[0], 0, &positions, &velocities, 50.0, 12);
        assert_eq!(nearby.len(), 1);

        let none = perceive(Vec3::splat(10_000.0), usize::MAX, &positions, &velocities, 50.0, 12);
        assert!(none.is_empty());
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let bad_radius = MurmurConfig {
            perception_radius: 0.0,
            ..MurmurConfig::default()
        };
        assert!(matches!(
            bad_radius.validate(),
            Err(WorldStateError::InvalidConfig(_))
        ));

        let bad_cap = MurmurConfig {
            max_entity_perception: 0,
            ..MurmurConfig::default()
        };
        assert!(bad_cap.validate().is_err());

        let bad_band = MurmurConfig {
            spawn_height_min: 100.0,
            spawn_height_max: 20.0,
            ..MurmurConfig::default()
        };
        assert!(bad_band.validate().is_err());

        assert!(MurmurConfig::default().validate().is_ok());
    }

    #[test]
    fn create_population_spawns_within_bounds() {
        let config = MurmurConfig {
            terrain_size: 1_000.0,
            rng_seed: Some(7),
            ..MurmurConfig::default()
        };
        let mut world = world_with(config);
        world.create_population(200);
        assert_eq!(world.agent_count(), 200);

        for position in world.agents().columns().positions() {
            assert!((-400.0..=400.0).contains(&position.x), "x={}", position.x);
            assert!((-400.0..=400.0).contains(&position.z), "z={}", position.z);
            assert!((20.0..=100.0).contains(&position.y), "y={}", position.y);
        }
    }

    #[test]
    fn randomize_population_keeps_count_and_variables() {
        let config = MurmurConfig {
            rng_seed: Some(11),
            ..MurmurConfig::default()
        };
        let mut world = world_with(config);
        world.create_population(32);

        let id = world.agents().handle_at(5).expect("handle");
        world
            .agent_variables_mut(id)
            .expect("variables")
            .set("memory", 42.5);
        let before: Vec<Vec3> = world.agents().columns().positions().to_vec();

        world.randomize_population();

        assert_eq!(world.agent_count(), 32);
        assert_eq!(
            world.agent_variables(id).and_then(|v| v.get("memory")),
            Some(42.5)
        );
        let after = world.agents().columns().positions();
        assert!(
            before.iter().zip(after).any(|(a, b)| a != b),
            "randomize should move at least one agent"
        );
        for position in after {
            assert!((-400.0..=400.0).contains(&position.x));
            assert!((20.0..=100.0).contains(&position.y));
        }
    }

    #[test]
    fn control_commands_drive_the_world() {
        let config = MurmurConfig {
            rng_seed: Some(3),
            ..MurmurConfig::default()
        };
        let mut world = world_with(config);

        apply_control_command(&mut world, ControlCommand::CreatePopulation(10)).expect("create");
        assert_eq!(world.agent_count(), 10);

        apply_control_command(&mut world, ControlCommand::SetPerceptionRadius(80.0))
            .expect("radius");
        assert_eq!(world.config().perception_radius, 80.0);

        apply_control_command(&mut world, ControlCommand::SetMaxEntityPerception(4)).expect("cap");
        assert_eq!(world.config().max_entity_perception, 4);

        assert!(apply_control_command(&mut world, ControlCommand::SetPerceptionRadius(-1.0)).is_err());
        assert!(apply_control_command(&mut world, ControlCommand::SetMaxEntityPerception(0)).is_err());

        apply_control_command(&mut world, ControlCommand::RandomizePopulation).expect("randomize");
        apply_control_command(&mut world, ControlCommand::Tick(0.016)).expect("tick");
        assert_eq!(world.tick_count(), Tick(1));
    }

    #[test]
    fn flat_terrain_returns_fixed_sample_count() {
        let samples = FlatTerrain.sample(Vec3::new(1.0, 50.0, 2.0), Vec3::NEG_Z);
        assert_eq!(samples.len(), TERRAIN_SAMPLE_COUNT);
        for sample in samples {
            assert_eq!(sample.height, 0.0);
            assert_eq!(sample.surface, SurfaceKind::Field);
            assert_eq!(sample.normal, Vec3::Y);
        }
    }

    #[test]
    fn non_finite_policy_output_is_neutralized() {
        struct BrokenPolicy;

        impl MovementPolicy for BrokenPolicy {
            fn kind(&self) -> &'static str {
                "test.broken"
            }

            fn steer(&self, _input: &MovementInput<'_>) -> MovementOutput {
                let mut patch = VariablePatch::new();
                patch.insert("bad".to_string(), f32::NAN);
                patch.insert("good".to_string(), 1.0);
                MovementOutput {
                    acceleration: Vec3::new(f32::NAN, 0.0, 0.0),
                    variable_patch: Some(patch),
                }
            }
        }

        let config = MurmurConfig {
            rng_seed: Some(5),
            ..MurmurConfig::default()
        };
        let mut world = WorldState::with_policy(config, Box::new(BrokenPolicy)).expect("world");
        let id = world.spawn_agent(AgentData {
            position: Vec3::new(0.0, 50.0, 0.0),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            facing: Vec3::X,
        });

        world.tick(0.1);

        let snapshot = world.agents().snapshot(id).expect("snapshot");
        assert!(snapshot.position.is_finite());
        assert!(snapshot.velocity.is_finite());
        assert_eq!(snapshot.velocity, Vec3::new(1.0, 0.0, 0.0));

        let variables = world.agent_variables(id).expect("variables");
        assert_eq!(variables.get("good"), Some(1.0));
        assert_eq!(variables.get("bad"), None);
    }
}
