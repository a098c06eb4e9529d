//! Parallel episode scheduling and per-episode diagnostics

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sarsa_rl_core::{Environment, Policy, RLError, Result};

/// Outcome of a single episode
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeStats {
    /// Sum of squared TD errors divided by the requested step count
    pub msve: f64,
    /// Sum of all rewards received
    pub total_reward: f64,
}

/// Per-episode diagnostics of a batch, indexed by episode number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDiagnostics {
    /// Mean squared value error per episode
    pub msve: Vec<f64>,
    /// Total reward per episode
    pub total_reward: Vec<f64>,
}

impl EpisodeDiagnostics {
    /// Number of episodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.msve.len()
    }

    /// True if no episode was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.msve.is_empty()
    }

    /// Mean of the per-episode MSVE, 0 when empty
    #[must_use]
    pub fn mean_msve(&self) -> f64 {
        mean(&self.msve)
    }

    /// Mean of the per-episode total reward, 0 when empty
    #[must_use]
    pub fn mean_reward(&self) -> f64 {
        mean(&self.total_reward)
    }

    /// Append the episodes of a later batch
    pub fn extend(&mut self, other: &EpisodeDiagnostics) {
        self.msve.extend_from_slice(&other.msve);
        self.total_reward.extend_from_slice(&other.total_reward);
    }

    /// `(msve, total_reward)` pairs in episode order
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.msve.iter().copied().zip(self.total_reward.iter().copied())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Write-once result slots published in episode-index order.
///
/// Workers may finish in any order. A completed episode is buffered until
/// every lower index has been committed; only then is it published, which is
/// when rate-limited progress is reported.
#[derive(Debug)]
pub struct OrderedCommit {
    state: Mutex<CommitState>,
    progress_interval: Duration,
}

#[derive(Debug)]
struct CommitState {
    slots: Vec<Option<EpisodeStats>>,
    next: usize,
    last_report: Option<Instant>,
}

impl OrderedCommit {
    /// Create `episodes` empty slots
    #[must_use]
    pub fn new(episodes: usize, progress_interval: Duration) -> Self {
        Self {
            state: Mutex::new(CommitState {
                slots: vec![None; episodes],
                next: 0,
                last_report: None,
            }),
            progress_interval,
        }
    }

    /// Store the result of `episode`.
    ///
    /// Fails if the index is out of range or the slot was already written.
    pub fn commit(&self, episode: usize, stats: EpisodeStats) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let episodes = state.slots.len();
        match state.slots.get_mut(episode) {
            None => {
                return Err(RLError::Computation(format!(
                    "episode {episode} out of range for a batch of {episodes}"
                )))
            }
            Some(Some(_)) => {
                return Err(RLError::Computation(format!(
                    "episode {episode} committed twice"
                )))
            }
            Some(slot) => *slot = Some(stats),
        }
        state.publish_ready(self.progress_interval);
        Ok(())
    }

    /// Number of episodes published so far, i.e. the length of the
    /// committed prefix
    #[must_use]
    pub fn published(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).next
    }

    /// Collect the slots into diagnostics; every slot must be filled
    pub fn finish(self) -> Result<EpisodeDiagnostics> {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut diagnostics = EpisodeDiagnostics {
            msve: Vec::with_capacity(state.slots.len()),
            total_reward: Vec::with_capacity(state.slots.len()),
        };
        for (episode, slot) in state.slots.into_iter().enumerate() {
            let stats = slot.ok_or_else(|| {
                RLError::Computation(format!("episode {episode} was never committed"))
            })?;
            diagnostics.msve.push(stats.msve);
            diagnostics.total_reward.push(stats.total_reward);
        }
        Ok(diagnostics)
    }
}

impl CommitState {
    fn publish_ready(&mut self, interval: Duration) {
        while let Some(Some(stats)) = self.slots.get(self.next).copied() {
            let due = self
                .last_report
                .map_or(true, |last| last.elapsed() >= interval);
            if due {
                self.last_report = Some(Instant::now());
                info!(
                    "Episode {}: MSVE {:.6}, total reward {:.2}",
                    self.next, stats.msve, stats.total_reward
                );
            }
            self.next += 1;
        }
    }
}

/// Worker pool settings of a learner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Worker threads; `None` uses rayon's global pool
    pub workers: Option<usize>,
    /// Minimum seconds between two progress reports
    pub progress_interval_secs: u64,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            workers: None,
            progress_interval_secs: 5,
        }
    }
}

/// Runs independent episodes on a worker pool with dynamic scheduling
#[derive(Debug)]
pub struct Scheduler {
    pool: Option<rayon::ThreadPool>,
    progress_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler; builds a dedicated pool when `workers` is set
    pub fn new(config: &RolloutConfig) -> Result<Self> {
        let pool = match config.workers {
            Some(0) => {
                return Err(RLError::InvalidArgument(
                    "worker count must be positive".to_string(),
                ))
            }
            Some(workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("sarsa-worker-{i}"))
                    .build()
                    .map_err(|e| RLError::Computation(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            pool,
            progress_interval: Duration::from_secs(config.progress_interval_secs),
        })
    }

    /// Number of threads episodes run on
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, rayon::ThreadPool::current_num_threads)
    }

    /// Run `episodes` calls of `episode`, each index exactly once.
    ///
    /// Workers claim one index at a time. The first error aborts the batch.
    pub fn run<F>(&self, episodes: usize, episode: F) -> Result<EpisodeDiagnostics>
    where
        F: Fn(usize) -> Result<EpisodeStats> + Sync,
    {
        if episodes == 0 {
            return Ok(EpisodeDiagnostics::default());
        }
        debug!("Running {} episodes on {} workers", episodes, self.workers());
        let commit = OrderedCommit::new(episodes, self.progress_interval);
        let rollout = || {
            (0..episodes)
                .into_par_iter()
                .with_max_len(1)
                .try_for_each(|index| commit.commit(index, episode(index)?))
        };
        match &self.pool {
            Some(pool) => pool.install(rollout)?,
            None => rollout()?,
        }
        commit.finish()
    }
}

/// Learning algorithm driven episode by episode
pub trait Learner: Send + Sync {
    /// Environment the episodes run in
    type Env: Environment;
    /// Policy being improved
    type Policy: Policy + ?Sized;

    /// The policy derived from the learned values
    fn policy(&self) -> Arc<Self::Policy>;

    /// Fresh environment for one episode
    fn create_environment(&self) -> Self::Env;

    /// Scheduler the batch runs on
    fn scheduler(&self) -> &Scheduler;

    /// Run one episode of at most `max_steps` steps in `environment`
    fn learn_episode(&self, max_steps: usize, environment: &mut Self::Env) -> Result<EpisodeStats>;

    /// Run `episodes` independent episodes in parallel.
    ///
    /// Each episode gets its own environment; only the value function is
    /// shared. Diagnostics come back in episode-index order.
    fn learn(&self, episodes: usize, max_steps: usize) -> Result<EpisodeDiagnostics> {
        self.scheduler().run(episodes, |_| {
            let mut environment = self.create_environment();
            self.learn_episode(max_steps, &mut environment)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn stats(i: usize) -> EpisodeStats {
        EpisodeStats {
            msve: i as f64,
            total_reward: -(i as f64),
        }
    }

    #[test]
    fn out_of_order_commits_publish_in_order() {
        let commit = OrderedCommit::new(4, Duration::ZERO);
        commit.commit(2, stats(2)).unwrap();
        commit.commit(1, stats(1)).unwrap();
        assert_eq!(commit.published(), 0);
        commit.commit(0, stats(0)).unwrap();
        assert_eq!(commit.published(), 3);
        commit.commit(3, stats(3)).unwrap();
        assert_eq!(commit.published(), 4);
        let diagnostics = commit.finish().unwrap();
        assert_eq!(diagnostics.msve, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(diagnostics.total_reward, vec![0.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn slots_are_write_once() {
        let commit = OrderedCommit::new(2, Duration::ZERO);
        commit.commit(0, stats(0)).unwrap();
        assert!(matches!(commit.commit(0, stats(5)), Err(RLError::Computation(_))));
        assert!(matches!(commit.commit(2, stats(2)), Err(RLError::Computation(_))));
    }

    #[test]
    fn unfilled_slot_fails_finish() {
        let commit = OrderedCommit::new(2, Duration::ZERO);
        commit.commit(1, stats(1)).unwrap();
        assert!(commit.finish().is_err());
    }

    #[test]
    fn zero_episodes_is_a_no_op() {
        let scheduler = Scheduler::new(&RolloutConfig::default()).unwrap();
        let diagnostics = scheduler
            .run(0, |_| -> Result<EpisodeStats> { panic!("no episode should run") })
            .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn every_slot_filled_once_for_any_pool_size() {
        for workers in [1, 4] {
            let scheduler = Scheduler::new(&RolloutConfig {
                workers: Some(workers),
                progress_interval_secs: 0,
            })
            .unwrap();
            assert_eq!(scheduler.workers(), workers);
            let seen = Mutex::new(HashSet::new());
            let diagnostics = scheduler
                .run(37, |i| {
                    assert!(seen.lock().unwrap().insert(i));
                    Ok(stats(i))
                })
                .unwrap();
            assert_eq!(diagnostics.len(), 37);
            assert_eq!(seen.lock().unwrap().len(), 37);
            for (i, (msve, reward)) in diagnostics.rows().enumerate() {
                assert_eq!(msve, i as f64);
                assert_eq!(reward, -(i as f64));
            }
        }
    }

    #[test]
    fn episode_error_aborts_batch() {
        let scheduler = Scheduler::new(&RolloutConfig {
            workers: Some(2),
            progress_interval_secs: 0,
        })
        .unwrap();
        let result = scheduler.run(10, |i| {
            if i == 7 {
                Err(RLError::Environment("crashed".to_string()))
            } else {
                Ok(stats(i))
            }
        });
        assert!(matches!(result, Err(RLError::Environment(_))));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = Scheduler::new(&RolloutConfig {
            workers: Some(0),
            progress_interval_secs: 5,
        })
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn diagnostics_means_and_extend() {
        let mut a = EpisodeDiagnostics {
            msve: vec![1.0, 3.0],
            total_reward: vec![10.0, 20.0],
        };
        assert_eq!(EpisodeDiagnostics::default().mean_msve(), 0.0);
        a.extend(&EpisodeDiagnostics {
            msve: vec![5.0],
            total_reward: vec![30.0],
        });
        assert_eq!(a.len(), 3);
        assert_eq!(a.mean_msve(), 3.0);
        assert_eq!(a.mean_reward(), 20.0);
    }
}
