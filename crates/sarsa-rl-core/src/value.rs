//! Action-value functions Q(s, a)

use std::path::Path;

use crate::Result;

/// Action-value function over a continuous state and a discrete action space.
///
/// Implementations are shared between worker threads and must serialize
/// concurrent access internally; see [`crate::approximator`].
pub trait ActionValueFunction: Send + Sync {
    /// Number of discrete actions
    fn number_of_actions(&self) -> usize;

    /// Size of the state vector
    fn state_dimension(&self) -> usize;

    /// Estimate the value of each requested action in `state`.
    ///
    /// Fails with an invalid-argument error if `state` has the wrong length
    /// or an action is out of range.
    fn predict(&self, state: &[f64], actions: &[usize]) -> Result<Vec<f64>>;

    /// Move the estimate for `(state, action)` towards `target`.
    ///
    /// Returns the error `target - prediction` observed before the update.
    fn update(&self, state: &[f64], action: usize, target: f64) -> Result<f64>;

    /// Write the raw parameter table to `path`
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace the parameter table with the contents of `path`.
    ///
    /// Returns `Ok(false)` and keeps the current parameters if the file is
    /// missing or does not match the table size.
    fn load(&self, path: &Path) -> Result<bool>;

    /// Values of every action in `state`
    fn all_q_values(&self, state: &[f64]) -> Result<Vec<f64>> {
        let actions: Vec<usize> = (0..self.number_of_actions()).collect();
        self.predict(state, &actions)
    }

    /// Best action and its value; ties go to the lowest action index
    fn best_action_value(&self, state: &[f64]) -> Result<(usize, f64)> {
        let q_values = self.all_q_values(state)?;
        Ok(argmax(&q_values))
    }
}

/// Index and value of the first maximum. An empty slice yields `(0, -inf)`.
#[must_use]
pub fn argmax(values: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &v) in values.iter().enumerate() {
        if i == 0 || v > best.1 {
            best = (i, v);
        }
    }
    best
}
