//! Parallel n-step SARSA learner
//!
//! This crate provides:
//! - Fixed-capacity trace buffers for multi-step backups
//! - A worker-pool episode scheduler with index-ordered diagnostics
//! - n-step SARSA over any [`sarsa_rl_core::ActionValueFunction`]
//! - Decay schedules for exploration parameters

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod buffer;
pub mod learner;
pub mod sarsa;
pub mod utils;

// Re-export learners
pub use sarsa::{Sarsa, SarsaConfig};

// Re-export utilities
pub use buffer::{NStepTrace, RingBuffer};
pub use learner::{
    EpisodeDiagnostics, EpisodeStats, Learner, OrderedCommit, RolloutConfig, Scheduler,
};
pub use utils::{ExponentialSchedule, Schedule};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{EpisodeDiagnostics, Learner, Sarsa, SarsaConfig};
    pub use sarsa_rl_core::prelude::*;
}
