//! Discrete action spaces

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{RLError, Result};

/// Discrete action space `{0, 1, ..., n-1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteSpace {
    /// Number of discrete actions
    pub n: usize,
}

impl DiscreteSpace {
    /// Create a new discrete action space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Sample an action uniformly at random
    ///
    /// # Panics
    ///
    /// Panics if the space is empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.n)
    }

    /// Check if an action is valid within this space
    #[must_use]
    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }

    /// Validate an action, reporting the offending index on failure
    pub fn check(&self, action: usize) -> Result<()> {
        if self.contains(action) {
            Ok(())
        } else {
            Err(RLError::InvalidArgument(format!(
                "action {action} outside [0, {})",
                self.n
            )))
        }
    }
}
