//! Reward functions

/// Reward for one `(state, action, next_state)` transition.
///
/// The environment is passed along so that rewards can depend on signals the
/// state vector does not carry (collisions, goal flags, ...).
pub trait RewardFunction<E: ?Sized>: Send + Sync {
    /// Compute the reward of a transition
    fn reward(&self, state: &[f64], action: usize, next_state: &[f64], environment: &E) -> f64;
}

impl<E, F> RewardFunction<E> for F
where
    E: ?Sized,
    F: Fn(&[f64], usize, &[f64], &E) -> f64 + Send + Sync,
{
    fn reward(&self, state: &[f64], action: usize, next_state: &[f64], environment: &E) -> f64 {
        self(state, action, next_state, environment)
    }
}

/// Reward function that pays a constant per step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantReward(pub f64);

impl<E: ?Sized> RewardFunction<E> for ConstantReward {
    fn reward(&self, _state: &[f64], _action: usize, _next_state: &[f64], _environment: &E) -> f64 {
        self.0
    }
}
