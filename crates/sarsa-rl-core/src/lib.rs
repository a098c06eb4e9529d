//! Core reinforcement learning traits and types for SARSA learners
//!
//! This crate provides the state discretization, the linear action-value
//! approximators and the policy and environment abstractions shared by the
//! learner and the environments.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod action;
pub mod approximator;
pub mod environment;
pub mod error;
pub mod policy;
pub mod reward;
pub mod state;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::DiscreteSpace;
pub use approximator::{
    Approximator, ApproximatorConfig, StateAggregation, StateAggregationConfig, TileCoding,
    TileCodingConfig,
};
pub use environment::{Environment, EnvironmentFactory, RenderMode, Step};
pub use error::{RLError, Result};
pub use policy::{EpsilonGreedy, Greedy, Policy};
pub use reward::{ConstantReward, RewardFunction};
pub use state::Grid;
pub use trajectory::Transition;
pub use value::{argmax, ActionValueFunction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionValueFunction, Approximator, ApproximatorConfig, Environment, EnvironmentFactory,
        EpsilonGreedy, Policy, Result, RewardFunction, Step,
    };
}
