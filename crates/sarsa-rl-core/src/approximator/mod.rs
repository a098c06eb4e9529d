//! Linear value-function approximators over discretized state spaces
//!
//! Both approximators store one parameter per `(cell, action)` pair and guard
//! the parameters with one lock per action. An update for action `a` holds the
//! lock of `a` (and of every neighbour its action kernel touches) for the
//! duration of a scalar read-modify-write, so updates to different actions
//! proceed in parallel. Multi-action predictions lock one action at a time and
//! are therefore not a single consistent snapshot.

mod state_aggregation;
mod tile_coding;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{ActionValueFunction, Result};

pub use state_aggregation::StateAggregation;
pub use tile_coding::TileCoding;

/// Configuration of a [`StateAggregation`] approximator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateAggregationConfig {
    /// Number of discrete actions
    pub number_of_actions: usize,
    /// Step size (learning rate)
    pub step_size: f64,
    /// Segments per state dimension
    pub segments: Vec<usize>,
    /// Lower state bounds
    pub min_values: Vec<f64>,
    /// Upper state bounds
    pub max_values: Vec<f64>,
    /// Smoothing weights `[w0, w1, ...]`; `wk` weights actions `±k` away
    pub action_kernel: Vec<f64>,
    /// Lower bound of the uniform random initialization
    pub init_min_value: f64,
    /// Upper bound of the uniform random initialization
    pub init_max_value: f64,
}

impl Default for StateAggregationConfig {
    fn default() -> Self {
        Self {
            number_of_actions: 2,
            step_size: 1e-3,
            segments: vec![10],
            min_values: vec![0.0],
            max_values: vec![1.0],
            action_kernel: vec![1.0],
            init_min_value: 0.0,
            init_max_value: 0.0,
        }
    }
}

/// Configuration of a [`TileCoding`] approximator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileCodingConfig {
    /// Base grid shared by all tilings
    #[serde(flatten)]
    pub base: StateAggregationConfig,
    /// Number of tiling layers
    pub tilings: usize,
    /// Per-dimension displacement of successive layers, in tile units
    pub displacement: Vec<usize>,
}

impl Default for TileCodingConfig {
    fn default() -> Self {
        let base = StateAggregationConfig::default();
        let displacement = (0..base.segments.len()).map(|i| 2 * i + 1).collect();
        Self {
            base,
            tilings: 4,
            displacement,
        }
    }
}

/// Selects one of the approximator strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproximatorConfig {
    /// Single uniform grid
    StateAggregation(StateAggregationConfig),
    /// Several offset grids averaged together
    TileCoding(TileCodingConfig),
}

impl Default for ApproximatorConfig {
    fn default() -> Self {
        Self::StateAggregation(StateAggregationConfig::default())
    }
}

impl ApproximatorConfig {
    /// Build the configured approximator
    pub fn build(&self) -> Result<Approximator> {
        match self {
            Self::StateAggregation(config) => {
                StateAggregation::new(config).map(Approximator::StateAggregation)
            }
            Self::TileCoding(config) => TileCoding::new(config).map(Approximator::TileCoding),
        }
    }
}

/// Value-function approximator chosen at construction time
#[derive(Debug)]
pub enum Approximator {
    /// Uniform state aggregation
    StateAggregation(StateAggregation),
    /// Tile coding over several state aggregations
    TileCoding(TileCoding),
}

impl Approximator {
    /// Predict a single state-action value.
    ///
    /// Only state aggregation provides this entry point; tile coding reports
    /// `NotImplemented` and must be driven through [`ActionValueFunction::predict`].
    pub fn predict_action(&self, state: &[f64], action: usize) -> Result<f64> {
        match self {
            Self::StateAggregation(sa) => sa.predict_action(state, action),
            Self::TileCoding(_) => Err(crate::RLError::NotImplemented(
                "single-action prediction on tile coding",
            )),
        }
    }

    /// Update a single state-action value, see [`Self::predict_action`].
    pub fn update_action(&self, state: &[f64], action: usize, target: f64) -> Result<f64> {
        match self {
            Self::StateAggregation(sa) => sa.update(state, action, target),
            Self::TileCoding(_) => Err(crate::RLError::NotImplemented(
                "single-action update on tile coding",
            )),
        }
    }

    /// Total number of scalar parameters
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::StateAggregation(sa) => sa.parameter_count(),
            Self::TileCoding(tc) => tc.parameter_count(),
        }
    }

    /// Raw little-endian parameter block, in table order
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::StateAggregation(sa) => sa.to_bytes(),
            Self::TileCoding(tc) => tc.to_bytes(),
        }
    }

    /// Replace all parameters from a raw block; `false` on size mismatch
    pub fn load_bytes(&self, bytes: &[u8]) -> bool {
        match self {
            Self::StateAggregation(sa) => sa.load_bytes(bytes),
            Self::TileCoding(tc) => tc.load_bytes(bytes),
        }
    }
}

impl ActionValueFunction for Approximator {
    fn number_of_actions(&self) -> usize {
        match self {
            Self::StateAggregation(sa) => sa.number_of_actions(),
            Self::TileCoding(tc) => tc.number_of_actions(),
        }
    }

    fn state_dimension(&self) -> usize {
        match self {
            Self::StateAggregation(sa) => sa.state_dimension(),
            Self::TileCoding(tc) => tc.state_dimension(),
        }
    }

    fn predict(&self, state: &[f64], actions: &[usize]) -> Result<Vec<f64>> {
        match self {
            Self::StateAggregation(sa) => sa.predict(state, actions),
            Self::TileCoding(tc) => tc.predict(state, actions),
        }
    }

    fn update(&self, state: &[f64], action: usize, target: f64) -> Result<f64> {
        match self {
            Self::StateAggregation(sa) => sa.update(state, action, target),
            Self::TileCoding(tc) => tc.update(state, action, target),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        save_block(path, &self.to_bytes())
    }

    fn load(&self, path: &Path) -> Result<bool> {
        Ok(load_block(path, |bytes| self.load_bytes(bytes)))
    }
}

impl From<StateAggregation> for Approximator {
    fn from(sa: StateAggregation) -> Self {
        Self::StateAggregation(sa)
    }
}

impl From<TileCoding> for Approximator {
    fn from(tc: TileCoding) -> Self {
        Self::TileCoding(tc)
    }
}

/// Lock a parameter column; a poisoned column still holds valid floats.
fn lock_column(column: &Mutex<Vec<f64>>) -> MutexGuard<'_, Vec<f64>> {
    column.lock().unwrap_or_else(PoisonError::into_inner)
}

fn save_block(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to save parameters");
        e.into()
    })
}

fn load_block(path: &Path, apply: impl FnOnce(&[u8]) -> bool) -> bool {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "parameters not loaded, keeping current values");
            return false;
        }
    };
    let loaded = apply(&bytes);
    if loaded {
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "parameters loaded");
    } else {
        tracing::warn!(
            path = %path.display(),
            bytes = bytes.len(),
            "parameter file does not match table size, keeping current values"
        );
    }
    loaded
}
