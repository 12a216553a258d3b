//! Reference flocking policy for the murmur simulation.
//!
//! Classic separation / alignment / cohesion steering over the bounded
//! neighbor list, plus an altitude-hold term fed by the terrain samples and a
//! deterministic wander term whose phase is carried between ticks through the
//! variable patch channel.

use glam::Vec3;
use murmur_core::{MovementInput, MovementOutput, MovementPolicy, SurfaceKind, VariablePatch};
use serde::{Deserialize, Serialize};

/// Variable key storing the wander oscillator phase, in radians.
pub const WANDER_PHASE: &str = "wander_phase";

/// Tunable weights and radii for [`FlockPolicy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FlockSettings {
    /// Strength of the push away from close neighbors.
    pub separation_weight: f32,
    /// Strength of the pull toward the mean neighbor velocity.
    pub alignment_weight: f32,
    /// Strength of the pull toward the neighbor centroid.
    pub cohesion_weight: f32,
    /// Distance under which separation engages.
    pub separation_radius: f32,
    /// Preferred flight height above the sampled terrain.
    pub preferred_altitude: f32,
    /// Vertical correction gain toward the preferred altitude.
    pub altitude_gain: f32,
    /// Extra climb applied while any sample ahead is water.
    pub lake_repulsion: f32,
    /// Amplitude of the horizontal wander oscillation.
    pub wander_strength: f32,
    /// Wander phase advance in radians per second.
    pub wander_rate: f32,
    /// Ceiling on the combined acceleration magnitude.
    pub max_acceleration: f32,
}

impl Default for FlockSettings {
    fn default() -> Self {
        Self {
            separation_weight: 5.0,
            alignment_weight: 2.0,
            cohesion_weight: 1.0,
            separation_radius: 10.0,
            preferred_altitude: 60.0,
            altitude_gain: 0.5,
            lake_repulsion: 8.0,
            wander_strength: 1.5,
            wander_rate: 0.6,
            max_acceleration: 25.0,
        }
    }
}

/// Boids-style movement policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlockPolicy {
    settings: FlockSettings,
}

impl FlockPolicy {
    /// Build a policy with the provided settings.
    #[must_use]
    pub fn new(settings: FlockSettings) -> Self {
        Self { settings }
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &FlockSettings {
        &self.settings
    }

    fn separation(&self, input: &MovementInput<'_>) -> Vec3 {
        let radius = self.settings.separation_radius;
        let mut push = Vec3::ZERO;
        for neighbor in input.nearby {
            if neighbor.distance >= radius || neighbor.distance <= 0.0 {
                continue;
            }
            let away = (input.position - neighbor.position) / neighbor.distance;
            push += away * (1.0 - neighbor.distance / radius);
        }
        push * self.settings.separation_weight
    }

    fn alignment_and_cohesion(&self, input: &MovementInput<'_>) -> Vec3 {
        if input.nearby.is_empty() {
            return Vec3::ZERO;
        }
        let inverse_len = 1.0 / input.nearby.len() as f32;
        let mut mean_velocity = Vec3::ZERO;
        let mut centroid = Vec3::ZERO;
        for neighbor in input.nearby {
            mean_velocity += neighbor.velocity;
            centroid += neighbor.position;
        }
        mean_velocity *= inverse_len;
        centroid *= inverse_len;

        let mut steer = (mean_velocity - input.velocity) * self.settings.alignment_weight;
        let to_center = centroid - input.position;
        if to_center.length() > 0.0 {
            steer += to_center.normalize() * self.settings.cohesion_weight;
        }
        steer
    }

    fn altitude_hold(&self, input: &MovementInput<'_>) -> Vec3 {
        let Some(ground) = input.terrain.first() else {
            return Vec3::ZERO;
        };
        let target = ground.height + self.settings.preferred_altitude;
        let mut lift = (target - input.position.y) * self.settings.altitude_gain;
        if input
            .terrain
            .iter()
            .any(|sample| sample.surface == SurfaceKind::Lake)
        {
            lift += self.settings.lake_repulsion;
        }
        Vec3::new(0.0, lift, 0.0)
    }

    fn wander(&self, input: &MovementInput<'_>) -> (Vec3, f32) {
        let phase = input.variables.get(WANDER_PHASE).unwrap_or(0.0);
        let next_phase =
            (phase + self.settings.wander_rate * input.delta_time) % std::f32::consts::TAU;
        let offset = Vec3::new(
            next_phase.cos() * self.settings.wander_strength,
            0.0,
            next_phase.sin() * self.settings.wander_strength,
        );
        (offset, next_phase)
    }
}

impl MovementPolicy for FlockPolicy {
    fn kind(&self) -> &'static str {
        "flock.boids"
    }

    fn steer(&self, input: &MovementInput<'_>) -> MovementOutput {
        let (wander_offset, next_phase) = self.wander(input);
        let acceleration = (self.separation(input)
            + self.alignment_and_cohesion(input)
            + self.altitude_hold(input)
            + wander_offset)
            .clamp_length_max(self.settings.max_acceleration);

        let mut patch = VariablePatch::new();
        patch.insert(WANDER_PHASE.to_string(), next_phase);
        MovementOutput {
            acceleration,
            variable_patch: Some(patch),
        }
    }
}
