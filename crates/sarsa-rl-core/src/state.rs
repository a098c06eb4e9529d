//! Continuous state spaces and their uniform discretization

use crate::{RLError, Result};

/// Uniform grid over a bounded, continuous state space.
///
/// Every dimension `i` is split into `segments[i]` equally wide segments
/// between `min_values[i]` and `max_values[i]`. States outside the bounds are
/// clamped into the first or last segment. The grid is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    segments: Vec<usize>,
    min_values: Vec<f64>,
    segment_width: Vec<f64>,
}

impl Grid {
    /// Create a new grid
    pub fn new(segments: Vec<usize>, min_values: Vec<f64>, max_values: Vec<f64>) -> Result<Self> {
        if segments.is_empty() {
            return Err(RLError::InvalidArgument(
                "grid needs at least one dimension".to_string(),
            ));
        }
        for len in [min_values.len(), max_values.len()] {
            if len != segments.len() {
                return Err(RLError::DimensionMismatch {
                    expected: segments.len(),
                    actual: len,
                });
            }
        }
        if let Some(dim) = segments.iter().position(|&s| s == 0) {
            return Err(RLError::InvalidArgument(format!(
                "dimension {dim} has zero segments"
            )));
        }
        let bounds_ok = min_values
            .iter()
            .zip(&max_values)
            .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && hi > lo);
        if !bounds_ok {
            return Err(RLError::InvalidArgument(
                "grid bounds must be finite with max > min".to_string(),
            ));
        }

        let segment_width = min_values
            .iter()
            .zip(&max_values)
            .zip(&segments)
            .map(|((lo, hi), &n)| (hi - lo) / n as f64)
            .collect();

        Ok(Self {
            segments,
            min_values,
            segment_width,
        })
    }

    /// Number of state dimensions
    #[must_use]
    pub fn dim(&self) -> usize {
        self.segments.len()
    }

    /// Total number of cells (product of all segment counts)
    #[must_use]
    pub fn cells(&self) -> usize {
        self.segments.iter().product()
    }

    /// Per-dimension cell coordinates of `state`.
    pub fn cell(&self, state: &[f64]) -> Result<Vec<usize>> {
        self.check_dim(state)?;
        Ok((0..self.dim()).map(|i| self.axis_cell(i, state[i])).collect())
    }

    /// Row-major flattened cell index, last dimension least significant.
    pub fn flat_index(&self, state: &[f64]) -> Result<usize> {
        self.check_dim(state)?;
        Ok((0..self.dim()).fold(0, |index, i| {
            index * self.segments[i] + self.axis_cell(i, state[i])
        }))
    }

    fn axis_cell(&self, axis: usize, x: f64) -> usize {
        let last = self.segments[axis] - 1;
        let scaled = ((x - self.min_values[axis]) / self.segment_width[axis]).floor();
        // NaN fails both comparisons and lands in cell 0
        if scaled >= last as f64 {
            last
        } else if scaled > 0.0 {
            scaled as usize
        } else {
            0
        }
    }

    fn check_dim(&self, state: &[f64]) -> Result<()> {
        if state.len() == self.dim() {
            Ok(())
        } else {
            Err(RLError::DimensionMismatch {
                expected: self.dim(),
                actual: state.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit_grid() -> Grid {
        Grid::new(vec![10], vec![0.0], vec![10.0]).unwrap()
    }

    #[test]
    fn nearby_states_share_a_cell() {
        let grid = unit_grid();
        assert_eq!(grid.flat_index(&[0.05]).unwrap(), 0);
        assert_eq!(grid.flat_index(&[0.09]).unwrap(), 0);
        assert_eq!(grid.flat_index(&[1.0]).unwrap(), 1);
    }

    #[test]
    fn out_of_bounds_states_are_clamped() {
        let grid = unit_grid();
        assert_eq!(grid.flat_index(&[-3.5]).unwrap(), 0);
        assert_eq!(grid.flat_index(&[10.0]).unwrap(), 9);
        assert_eq!(grid.flat_index(&[1e9]).unwrap(), 9);
        assert_eq!(grid.flat_index(&[f64::NAN]).unwrap(), 0);
    }

    #[test]
    fn flat_index_is_row_major() {
        let grid = Grid::new(vec![2, 3, 4], vec![0.0; 3], vec![2.0, 3.0, 4.0]).unwrap();
        assert_eq!(grid.cells(), 24);
        assert_eq!(grid.cell(&[1.5, 2.5, 3.5]).unwrap(), vec![1, 2, 3]);
        assert_eq!(grid.flat_index(&[1.5, 2.5, 3.5]).unwrap(), 23);
        assert_eq!(grid.flat_index(&[0.0, 0.0, 1.0]).unwrap(), 1);
        assert_eq!(grid.flat_index(&[0.0, 1.0, 0.0]).unwrap(), 4);
        assert_eq!(grid.flat_index(&[1.0, 0.0, 0.0]).unwrap(), 12);
    }

    #[test]
    fn rejects_wrong_state_size() {
        let err = unit_grid().flat_index(&[1.0, 2.0]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(Grid::new(vec![], vec![], vec![]).is_err());
        assert!(Grid::new(vec![0], vec![0.0], vec![1.0]).is_err());
        assert!(Grid::new(vec![2], vec![1.0], vec![1.0]).is_err());
        assert!(Grid::new(vec![2, 2], vec![0.0], vec![1.0, 1.0]).is_err());
    }

    proptest! {
        #[test]
        fn index_always_in_range(x in -100.0f64..100.0, y in -100.0f64..100.0) {
            let grid = Grid::new(vec![7, 5], vec![-10.0, 0.0], vec![10.0, 50.0]).unwrap();
            prop_assert!(grid.flat_index(&[x, y]).unwrap() < grid.cells());
        }

        #[test]
        fn contained_states_fall_in_their_segment(x in 0.0f64..10.0) {
            let grid = unit_grid();
            let cell = grid.cell(&[x]).unwrap()[0];
            prop_assert!(cell as f64 <= x && x < cell as f64 + 1.0 + 1e-12);
        }
    }
}
