//! Spatial indexing abstractions for agent neighborhood queries.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
///
/// An index is rebuilt from a position snapshot and then queried per agent.
/// Implementations must report exact squared distances and must never visit
/// the querying agent itself; visit order is unspecified, so callers that
/// need ordering sort on the reported distance.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from agent positions.
    fn rebuild(&mut self, positions: &[[f32; 3]]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` within the provided squared radius.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

/// Uniform grid index bucketing agents on the horizontal (x, z) plane.
///
/// The flight band is shallow relative to the terrain extent, so cells
/// partition only the horizontal plane; height still contributes to every
/// reported squared distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing agents.
    pub cell_size: f32,
    #[serde(skip)]
    positions: Vec<[f32; 3]>,
    #[serde(skip)]
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            positions: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// Number of indexed positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when no positions are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    fn cell_of(&self, position: &[f32; 3]) -> (i32, i32) {
        (
            (position[0] / self.cell_size).floor() as i32,
            (position[2] / self.cell_size).floor() as i32,
        )
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[[f32; 3]]) -> Result<(), IndexError> {
        if self.cell_size <= 0.0 || !self.cell_size.is_finite() {
            return Err(IndexError::InvalidConfig(
                "cell_size must be positive and finite",
            ));
        }
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        for (idx, position) in self.positions.iter().enumerate() {
            let cell = (
                (position[0] / self.cell_size).floor() as i32,
                (position[2] / self.cell_size).floor() as i32,
            );
            self.buckets.entry(cell).or_default().push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&point) = self.positions.get(agent_idx) else {
            return;
        };
        if radius_sq < 0.0 {
            return;
        }
        let radius = radius_sq.sqrt();
        let reach = (radius / self.cell_size).ceil() as i32;
        let center = self.cell_of(&point);

        for cx in (center.0 - reach)..=(center.0 + reach) {
            for cz in (center.1 - reach)..=(center.1 + reach) {
                let Some(bucket) = self.buckets.get(&(cx, cz)) else {
                    continue;
                };
                for &idx in bucket {
                    if idx == agent_idx {
                        continue;
                    }
                    let other = self.positions[idx];
                    let dx = other[0] - point[0];
                    let dy = other[1] - point[1];
                    let dz = other[2] - point[2];
                    let dist_sq = dx * dx + dy * dy + dz * dz;
                    if dist_sq <= radius_sq {
                        visitor(idx, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }
}
