//! Tile coding: several offset state aggregations averaged together

use std::path::Path;

use rand::Rng;

use super::{load_block, save_block, StateAggregation, StateAggregationConfig, TileCodingConfig};
use crate::{ActionValueFunction, RLError, Result};

/// Composite approximator of `T` offset tilings.
///
/// Layer `k` shifts the base grid down by `tile_size * displacement * k`,
/// where `tile_size = segment_width / T`, and grows by as many segments as
/// needed to still cover the base range. Step size and initialization range
/// are divided by `T` per layer. Predictions and update errors are the
/// arithmetic mean over layers.
#[derive(Debug)]
pub struct TileCoding {
    layers: Vec<StateAggregation>,
}

impl TileCoding {
    /// Create a new tile coding, randomly initialized with `thread_rng`
    pub fn new(config: &TileCodingConfig) -> Result<Self> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Create a new tile coding drawing initial values from `rng`
    pub fn with_rng<R: Rng>(config: &TileCodingConfig, rng: &mut R) -> Result<Self> {
        Self::layer_configs(config)?
            .iter()
            .map(|layer| StateAggregation::with_rng(layer, &mut *rng))
            .collect::<Result<Vec<_>>>()
            .map(|layers| Self { layers })
    }

    /// Per-layer configurations derived from the base grid
    pub fn layer_configs(config: &TileCodingConfig) -> Result<Vec<StateAggregationConfig>> {
        let base = &config.base;
        let tilings = config.tilings;
        if tilings == 0 {
            return Err(RLError::InvalidArgument(
                "tile coding needs at least one tiling".to_string(),
            ));
        }
        let dims = base.segments.len();
        for len in [base.min_values.len(), base.max_values.len(), config.displacement.len()] {
            if len != dims {
                return Err(RLError::DimensionMismatch {
                    expected: dims,
                    actual: len,
                });
            }
        }
        if base.segments.contains(&0) {
            return Err(RLError::InvalidArgument("zero segments in base grid".to_string()));
        }

        let t = tilings as f64;
        let segment_width: Vec<f64> = (0..dims)
            .map(|i| (base.max_values[i] - base.min_values[i]) / base.segments[i] as f64)
            .collect();

        Ok((0..tilings)
            .map(|k| {
                let mut segments = Vec::with_capacity(dims);
                let mut min_values = Vec::with_capacity(dims);
                let mut max_values = Vec::with_capacity(dims);
                for i in 0..dims {
                    let tile_size = segment_width[i] / t;
                    let offset = tile_size * config.displacement[i] as f64 * k as f64;
                    let extra = (offset / segment_width[i]).ceil() as usize;
                    let lo = base.min_values[i] - offset;
                    let n = base.segments[i] + extra;
                    segments.push(n);
                    min_values.push(lo);
                    max_values.push(lo + segment_width[i] * n as f64);
                }
                StateAggregationConfig {
                    number_of_actions: base.number_of_actions,
                    step_size: base.step_size / t,
                    segments,
                    min_values,
                    max_values,
                    action_kernel: base.action_kernel.clone(),
                    init_min_value: base.init_min_value / t,
                    init_max_value: base.init_max_value / t,
                }
            })
            .collect())
    }

    /// Tiling layers in declaration order
    #[must_use]
    pub fn layers(&self) -> &[StateAggregation] {
        &self.layers
    }

    /// Total number of scalar parameters over all layers
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(StateAggregation::parameter_count).sum()
    }

    /// Concatenation of every layer's raw block, in layer order
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.layers.iter().flat_map(StateAggregation::to_bytes).collect()
    }

    /// Split a concatenated block back into layers; `false` on size mismatch
    pub fn load_bytes(&self, bytes: &[u8]) -> bool {
        let expected = self.parameter_count() * std::mem::size_of::<f64>();
        if bytes.len() != expected {
            return false;
        }
        let mut rest = bytes;
        for layer in &self.layers {
            let (head, tail) = rest.split_at(layer.parameter_count() * std::mem::size_of::<f64>());
            if !layer.load_bytes(head) {
                return false;
            }
            rest = tail;
        }
        true
    }

    fn tilings(&self) -> f64 {
        self.layers.len() as f64
    }
}

impl ActionValueFunction for TileCoding {
    fn number_of_actions(&self) -> usize {
        self.layers[0].number_of_actions()
    }

    fn state_dimension(&self) -> usize {
        self.layers[0].state_dimension()
    }

    fn predict(&self, state: &[f64], actions: &[usize]) -> Result<Vec<f64>> {
        let mut sum = vec![0.0; actions.len()];
        for layer in &self.layers {
            for (acc, v) in sum.iter_mut().zip(layer.predict(state, actions)?) {
                *acc += v;
            }
        }
        let t = self.tilings();
        Ok(sum.into_iter().map(|v| v / t).collect())
    }

    fn update(&self, state: &[f64], action: usize, target: f64) -> Result<f64> {
        let mut error = 0.0;
        for layer in &self.layers {
            error += layer.update(state, action, target)?;
        }
        Ok(error / self.tilings())
    }

    fn save(&self, path: &Path) -> Result<()> {
        save_block(path, &self.to_bytes())
    }

    fn load(&self, path: &Path) -> Result<bool> {
        Ok(load_block(path, |bytes| self.load_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approximator::Approximator;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(tilings: usize) -> TileCodingConfig {
        TileCodingConfig {
            base: StateAggregationConfig {
                number_of_actions: 3,
                step_size: 0.4,
                segments: vec![4, 5],
                min_values: vec![0.0, -1.0],
                max_values: vec![4.0, 1.0],
                action_kernel: vec![1.0],
                init_min_value: -1.0,
                init_max_value: 1.0,
            },
            tilings,
            displacement: vec![1, 3],
        }
    }

    #[test]
    fn layers_are_offset_and_inflated() {
        let layers = TileCoding::layer_configs(&config(4)).unwrap();
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[0].segments, vec![4, 5]);
        assert_relative_eq!(layers[0].min_values[0], 0.0);
        // layer 1: offset = (1/4) * 1 * 1 along dim 0, (0.4/4) * 3 along dim 1
        assert_relative_eq!(layers[1].min_values[0], -0.25);
        assert_relative_eq!(layers[1].min_values[1], -1.3);
        assert_eq!(layers[1].segments, vec![5, 6]);
        // layer 3: offset 0.75 along dim 0, 0.9 (2.25 segments) along dim 1
        assert_eq!(layers[3].segments, vec![5, 8]);
        assert_relative_eq!(layers[3].max_values[0], -0.75 + 5.0);
        for layer in &layers {
            assert_relative_eq!(layer.step_size, 0.1);
            assert_relative_eq!(layer.init_max_value, 0.25);
            assert_relative_eq!(layer.init_min_value, -0.25);
        }
    }

    #[test]
    fn predict_is_mean_of_layers() {
        let tc = TileCoding::with_rng(&config(3), &mut StdRng::seed_from_u64(11)).unwrap();
        for state in [[0.1, -0.9], [2.2, 0.3], [3.99, 0.99]] {
            let combined = tc.predict(&state, &[0, 1, 2]).unwrap();
            for (a, &v) in combined.iter().enumerate() {
                let mean = tc
                    .layers()
                    .iter()
                    .map(|l| l.predict(&state, &[a]).unwrap()[0])
                    .sum::<f64>()
                    / 3.0;
                assert_relative_eq!(v, mean, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn update_error_is_mean_of_layer_errors() {
        let tc = TileCoding::with_rng(&config(4), &mut StdRng::seed_from_u64(5)).unwrap();
        let state = [1.7, 0.2];
        let expected = tc
            .layers()
            .iter()
            .map(|l| 2.0 - l.predict(&state, &[1]).unwrap()[0])
            .sum::<f64>()
            / 4.0;
        let prediction = tc.predict(&state, &[1]).unwrap()[0];
        let error = tc.update(&state, 1, 2.0).unwrap();
        assert_relative_eq!(error, expected, epsilon = 1e-12);
        assert_relative_eq!(error, 2.0 - prediction, epsilon = 1e-12);
    }

    #[test]
    fn single_action_entry_points_are_not_implemented() {
        let approximator = Approximator::from(TileCoding::new(&config(2)).unwrap());
        assert!(matches!(
            approximator.predict_action(&[0.0, 0.0], 0),
            Err(RLError::NotImplemented(_))
        ));
        assert!(matches!(
            approximator.update_action(&[0.0, 0.0], 0, 1.0),
            Err(RLError::NotImplemented(_))
        ));
    }

    #[test]
    fn invalid_arguments_propagate() {
        let tc = TileCoding::new(&config(2)).unwrap();
        assert!(tc.predict(&[0.0], &[0]).unwrap_err().is_invalid_argument());
        assert!(tc.update(&[0.0, 0.0], 3, 1.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn rejects_zero_tilings() {
        assert!(TileCoding::new(&config(0)).is_err());
    }

    #[test]
    fn save_load_roundtrip_concatenates_layers() {
        let source = TileCoding::new(&config(3)).unwrap();
        source.update(&[2.0, 0.0], 0, 5.0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.dat");
        source.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let first = source.layers()[0].to_bytes();
        assert_eq!(&bytes[..first.len()], first.as_slice());

        let target = TileCoding::new(&config(3)).unwrap();
        assert!(target.load(&path).unwrap());
        for state in [[0.0, 0.0], [2.0, 0.0], [3.5, -0.5]] {
            let a = source.predict(&state, &[0, 1, 2]).unwrap();
            let b = target.predict(&state, &[0, 1, 2]).unwrap();
            assert_eq!(
                a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
            );
        }
    }
}
