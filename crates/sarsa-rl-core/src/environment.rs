//! Environment contract consumed by the learners

use serde::{Deserialize, Serialize};

use crate::Result;

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// State observed after the action
    pub observation: Vec<f64>,
    /// Whether a terminal state was reached
    pub done: bool,
}

/// Output device for [`Environment::render`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Text frame on standard output
    #[default]
    Console,
    /// Nothing is drawn
    Hidden,
}

/// Continuous-state, discrete-action environment.
///
/// Learners treat implementations as opaque: each episode owns its own
/// instance, so implementations need to be `Send` but never `Sync`.
pub trait Environment: Send {
    /// Number of discrete actions
    fn number_of_actions(&self) -> usize;

    /// Size of the state vector
    fn state_dimension(&self) -> usize;

    /// Current state vector
    fn state(&self) -> Vec<f64>;

    /// Reset the environment and return the initial state
    fn reset(&mut self) -> Vec<f64>;

    /// Take a step in the environment
    fn step(&mut self, action: usize) -> Result<Step>;

    /// Render the environment (optional)
    fn render(&self, _mode: RenderMode) -> Result<()> {
        Ok(())
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn number_of_actions(&self) -> usize {
        (**self).number_of_actions()
    }

    fn state_dimension(&self) -> usize {
        (**self).state_dimension()
    }

    fn state(&self) -> Vec<f64> {
        (**self).state()
    }

    fn reset(&mut self) -> Vec<f64> {
        (**self).reset()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        (**self).step(action)
    }

    fn render(&self, mode: RenderMode) -> Result<()> {
        (**self).render(mode)
    }
}

/// Produces a fresh environment instance, invoked once per episode
pub trait EnvironmentFactory<E>: Send + Sync {
    /// Build a new environment
    fn create(&self) -> E;
}

impl<E, F> EnvironmentFactory<E> for F
where
    F: Fn() -> E + Send + Sync,
{
    fn create(&self) -> E {
        self()
    }
}
