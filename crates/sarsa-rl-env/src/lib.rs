//! Simulated environments for the n-step SARSA learner
//!
//! This crate provides:
//! - The flappy-bird simulator and its reward function
//! - A real-time demonstration loop for any policy

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod flappy;
pub mod play;

// Re-export environments
pub use flappy::{flappy_reward, FlappyConfig, FlappySimulator};
pub use play::{play, PlayOptions, PlaySummary};

// Re-export core types
pub use sarsa_rl_core::{Environment, RenderMode, Step};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{flappy_reward, play, FlappySimulator, PlayOptions};
    pub use sarsa_rl_core::prelude::*;
}
