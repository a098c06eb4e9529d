//! Policy abstractions for action selection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::{ActionValueFunction, DiscreteSpace, Result};

/// Maps a state to a discrete action.
///
/// Policies are shared by every worker of a learning batch, so any
/// per-decision scratch state must live on the caller's stack or in
/// thread-local storage.
pub trait Policy: Send + Sync {
    /// Select an action given a state
    fn apply(&self, state: &[f64]) -> Result<usize>;
}

impl<P: Policy + ?Sized> Policy for Arc<P> {
    fn apply(&self, state: &[f64]) -> Result<usize> {
        (**self).apply(state)
    }
}

/// Epsilon-greedy policy over an action-value function.
///
/// With probability `1 - epsilon` the action with the highest predicted value
/// is taken (ties go to the lowest index), otherwise a uniformly random one.
/// Epsilon can be changed while the policy is shared between threads.
pub struct EpsilonGreedy<Q: ?Sized> {
    approximator: Arc<Q>,
    epsilon: AtomicU64,
    action_space: DiscreteSpace,
}

impl<Q: ActionValueFunction + ?Sized> EpsilonGreedy<Q> {
    /// Create a new epsilon-greedy policy
    pub fn new(epsilon: f64, approximator: Arc<Q>) -> Self {
        let action_space = DiscreteSpace::new(approximator.number_of_actions());
        Self {
            approximator,
            epsilon: AtomicU64::new(epsilon.clamp(0.0, 1.0).to_bits()),
            action_space,
        }
    }

    /// Current exploration rate
    pub fn epsilon(&self) -> f64 {
        f64::from_bits(self.epsilon.load(Ordering::Relaxed))
    }

    /// Set the exploration rate
    pub fn set_epsilon(&self, epsilon: f64) {
        self.epsilon
            .store(epsilon.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Multiply the exploration rate by `factor`
    pub fn decay(&self, factor: f64) {
        self.set_epsilon(self.epsilon() * factor);
    }

    /// Approximator the policy reads from
    pub fn approximator(&self) -> &Arc<Q> {
        &self.approximator
    }

    /// Select an action using the supplied random source
    pub fn apply_with<R: Rng + ?Sized>(&self, state: &[f64], rng: &mut R) -> Result<usize> {
        if rng.gen::<f64>() < 1.0 - self.epsilon() {
            self.approximator.best_action_value(state).map(|(a, _)| a)
        } else {
            Ok(self.action_space.sample(rng))
        }
    }
}

impl<Q: ActionValueFunction + ?Sized> Policy for EpsilonGreedy<Q> {
    fn apply(&self, state: &[f64]) -> Result<usize> {
        self.apply_with(state, &mut rand::thread_rng())
    }
}

impl<Q: ?Sized> std::fmt::Debug for EpsilonGreedy<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpsilonGreedy")
            .field("epsilon", &f64::from_bits(self.epsilon.load(Ordering::Relaxed)))
            .field("actions", &self.action_space.n)
            .finish_non_exhaustive()
    }
}

/// Always takes the highest-valued action
pub struct Greedy<Q: ?Sized> {
    approximator: Arc<Q>,
}

impl<Q: ?Sized> Greedy<Q> {
    /// Create a new greedy policy
    pub fn new(approximator: Arc<Q>) -> Self {
        Self { approximator }
    }
}

impl<Q: ActionValueFunction + ?Sized> Policy for Greedy<Q> {
    fn apply(&self, state: &[f64]) -> Result<usize> {
        self.approximator.best_action_value(state).map(|(a, _)| a)
    }
}
