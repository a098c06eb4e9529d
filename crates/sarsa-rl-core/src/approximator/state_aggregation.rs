//! Uniform state aggregation with optional action smoothing

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rand::Rng;

use super::{load_block, lock_column, save_block, StateAggregationConfig};
use crate::{ActionValueFunction, DiscreteSpace, Grid, RLError, Result};

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// Tabular approximator over a uniform grid.
///
/// Parameters are stored action-major: column `a` holds the value of action
/// `a` for every grid cell, and each column sits behind its own lock. The
/// action kernel spreads predictions and updates over neighbouring actions;
/// neighbours are clamped to the action range, so at the edges the clamped
/// neighbour is counted once per kernel side it stands in for.
#[derive(Debug)]
pub struct StateAggregation {
    grid: Grid,
    actions: DiscreteSpace,
    step_size: f64,
    action_kernel: Vec<f64>,
    columns: Vec<Mutex<Vec<f64>>>,
}

type Columns<'a> = Vec<(usize, MutexGuard<'a, Vec<f64>>)>;

impl StateAggregation {
    /// Create a new state aggregation, randomly initialized with `thread_rng`
    pub fn new(config: &StateAggregationConfig) -> Result<Self> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Create a new state aggregation drawing initial values from `rng`
    pub fn with_rng<R: Rng>(config: &StateAggregationConfig, rng: &mut R) -> Result<Self> {
        let grid = Grid::new(
            config.segments.clone(),
            config.min_values.clone(),
            config.max_values.clone(),
        )?;
        if config.number_of_actions == 0 {
            return Err(RLError::InvalidArgument(
                "approximator needs at least one action".to_string(),
            ));
        }
        if config.action_kernel.is_empty() {
            return Err(RLError::InvalidArgument("action kernel is empty".to_string()));
        }
        if !config.step_size.is_finite() {
            return Err(RLError::InvalidArgument(format!(
                "step size {} is not finite",
                config.step_size
            )));
        }
        let (lo, hi) = (config.init_min_value, config.init_max_value);
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            return Err(RLError::InvalidArgument(format!(
                "invalid initialization range [{lo}, {hi}]"
            )));
        }

        let cells = grid.cells();
        let columns = (0..config.number_of_actions)
            .map(|_| {
                let column = if lo == hi {
                    vec![lo; cells]
                } else {
                    (0..cells).map(|_| rng.gen_range(lo..=hi)).collect()
                };
                Mutex::new(column)
            })
            .collect();

        Ok(Self {
            grid,
            actions: DiscreteSpace::new(config.number_of_actions),
            step_size: config.step_size,
            action_kernel: config.action_kernel.clone(),
            columns,
        })
    }

    /// Total number of scalar parameters (cells x actions)
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.grid.cells() * self.actions.n
    }

    /// Snapshot of the parameter table in table order
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.parameter_count());
        for column in &self.columns {
            out.extend_from_slice(&lock_column(column));
        }
        out
    }

    /// Predict the value of one action
    pub fn predict_action(&self, state: &[f64], action: usize) -> Result<f64> {
        self.validate(state, std::slice::from_ref(&action))?;
        let cell = self.grid.flat_index(state)?;
        let taps = self.kernel_taps(action);
        let columns = self.lock_taps(&taps);
        Ok(Self::weighted_value(&columns, &taps, cell))
    }

    /// Raw little-endian parameter block
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.parameter_count() * F64_BYTES);
        for column in &self.columns {
            for v in lock_column(column).iter() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        bytes
    }

    /// Replace the parameter table from a raw block.
    ///
    /// Returns `false`, leaving the table untouched, if the block size does
    /// not match the table.
    pub fn load_bytes(&self, bytes: &[u8]) -> bool {
        if bytes.len() != self.parameter_count() * F64_BYTES {
            return false;
        }
        let column_bytes = self.grid.cells() * F64_BYTES;
        for (column, chunk) in self.columns.iter().zip(bytes.chunks_exact(column_bytes)) {
            let mut column = lock_column(column);
            for (v, raw) in column.iter_mut().zip(chunk.chunks_exact(F64_BYTES)) {
                let mut buf = [0u8; F64_BYTES];
                buf.copy_from_slice(raw);
                *v = f64::from_le_bytes(buf);
            }
        }
        true
    }

    fn validate(&self, state: &[f64], actions: &[usize]) -> Result<()> {
        if state.len() != self.grid.dim() {
            return Err(RLError::DimensionMismatch {
                expected: self.grid.dim(),
                actual: state.len(),
            });
        }
        actions.iter().try_for_each(|&a| self.actions.check(a))
    }

    /// `(action, weight)` pairs contributing to `action`, duplicates kept.
    fn kernel_taps(&self, action: usize) -> Vec<(usize, f64)> {
        let last = self.actions.n - 1;
        let mut taps = Vec::with_capacity(2 * self.action_kernel.len() - 1);
        taps.push((action, self.action_kernel[0]));
        for (k, &w) in self.action_kernel.iter().enumerate().skip(1) {
            taps.push(((action + k).min(last), w));
            taps.push((action.saturating_sub(k), w));
        }
        taps
    }

    /// Lock every column named in `taps`, in ascending action order.
    fn lock_taps(&self, taps: &[(usize, f64)]) -> Columns<'_> {
        let mut actions: Vec<usize> = taps.iter().map(|&(a, _)| a).collect();
        actions.sort_unstable();
        actions.dedup();
        actions
            .into_iter()
            .map(|a| (a, lock_column(&self.columns[a])))
            .collect()
    }

    fn column_slot(columns: &Columns<'_>, action: usize) -> usize {
        columns
            .binary_search_by_key(&action, |(a, _)| *a)
            .unwrap_or_else(|_| unreachable!("column {action} was locked with its taps"))
    }

    fn weighted_value(columns: &Columns<'_>, taps: &[(usize, f64)], cell: usize) -> f64 {
        taps.iter()
            .map(|&(a, w)| w * columns[Self::column_slot(columns, a)].1[cell])
            .sum()
    }
}

impl ActionValueFunction for StateAggregation {
    fn number_of_actions(&self) -> usize {
        self.actions.n
    }

    fn state_dimension(&self) -> usize {
        self.grid.dim()
    }

    fn predict(&self, state: &[f64], actions: &[usize]) -> Result<Vec<f64>> {
        self.validate(state, actions)?;
        let cell = self.grid.flat_index(state)?;
        Ok(actions
            .iter()
            .map(|&action| {
                let taps = self.kernel_taps(action);
                let columns = self.lock_taps(&taps);
                Self::weighted_value(&columns, &taps, cell)
            })
            .collect())
    }

    fn update(&self, state: &[f64], action: usize, target: f64) -> Result<f64> {
        self.validate(state, std::slice::from_ref(&action))?;
        let cell = self.grid.flat_index(state)?;
        let taps = self.kernel_taps(action);
        let mut columns = self.lock_taps(&taps);

        let error = target - Self::weighted_value(&columns, &taps, cell);
        for &(a, w) in &taps {
            let slot = Self::column_slot(&columns, a);
            columns[slot].1[cell] += w * error * self.step_size;
        }
        Ok(error)
    }

    fn save(&self, path: &Path) -> Result<()> {
        save_block(path, &self.to_bytes())
    }

    fn load(&self, path: &Path) -> Result<bool> {
        Ok(load_block(path, |bytes| self.load_bytes(bytes)))
    }
}
