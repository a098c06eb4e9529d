// Training configuration for sarsactl

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use sarsa_rl_agent::SarsaConfig;
use sarsa_rl_core::{ApproximatorConfig, StateAggregationConfig};

/// Everything a learning or playing run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Value-function approximator
    pub approximator: ApproximatorConfig,
    /// Learner settings
    pub sarsa: SarsaConfig,
    /// Initial exploration rate
    pub epsilon: f64,
    /// Per-episode multiplicative epsilon decay, applied after each batch
    pub epsilon_decay: f64,
    /// Total number of episodes
    pub episodes: usize,
    /// Number of batches the episodes are split into
    pub batches: usize,
    /// Steps per episode
    pub episode_length: usize,
    /// Parameter file, loaded before and written after learning
    pub parameters: PathBuf,
    /// Statistics CSV written after learning
    pub statistics: PathBuf,
    /// Seconds of greedy demonstration after every batch, 0 to skip
    pub play_after_batch_secs: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            approximator: ApproximatorConfig::StateAggregation(StateAggregationConfig {
                number_of_actions: 2,
                step_size: 1e-3,
                segments: vec![10, 10, 10, 10, 5],
                min_values: vec![0.0, 3.75, 3.75, 1.0, -10.0],
                max_values: vec![11.0, 10.25, 10.25, 13.0, 10.0],
                ..StateAggregationConfig::default()
            }),
            sarsa: SarsaConfig {
                discount: 0.9,
                n_steps: 20,
                ..SarsaConfig::default()
            },
            epsilon: 0.2,
            epsilon_decay: 1.0,
            episodes: 2_000_000,
            batches: 100,
            episode_length: 400,
            parameters: PathBuf::from("approximator.dat"),
            statistics: PathBuf::from("statistics.csv"),
            play_after_batch_secs: 10.0,
        }
    }
}

impl TrainingConfig {
    /// Read a JSON configuration; missing fields take their defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, or the contents of `path` when given
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the driver cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batches > 0, "batches must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.epsilon),
            "epsilon {} outside [0, 1]",
            self.epsilon
        );
        ensure!(
            self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0,
            "epsilon_decay {} outside (0, 1]",
            self.epsilon_decay
        );
        ensure!(
            self.play_after_batch_secs >= 0.0
                && Duration::try_from_secs_f64(self.play_after_batch_secs).is_ok(),
            "play_after_batch_secs {} is not a representable duration",
            self.play_after_batch_secs
        );
        self.sarsa.validate()?;
        Ok(())
    }

    /// Episode counts of the batches: `ceil(episodes / batches)` each,
    /// the last one taking the remainder
    pub fn batch_sizes(&self) -> Vec<usize> {
        let size = self.episodes.div_ceil(self.batches.max(1)).max(1);
        let mut remaining = self.episodes;
        let mut sizes = Vec::new();
        while remaining > 0 {
            let batch = size.min(remaining);
            sizes.push(batch);
            remaining -= batch;
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_flappy_task() {
        let config = TrainingConfig::default();
        config.validate().unwrap();
        let approximator = config.approximator.build().unwrap();
        assert_eq!(approximator.parameter_count(), 10 * 10 * 10 * 10 * 5 * 2);
        assert_eq!(config.sarsa.n_steps, 20);
    }

    #[test]
    fn batches_cover_every_episode() {
        let mut config = TrainingConfig {
            episodes: 10,
            batches: 3,
            ..TrainingConfig::default()
        };
        assert_eq!(config.batch_sizes(), vec![4, 4, 2]);
        config.episodes = 0;
        assert!(config.batch_sizes().is_empty());
        config.episodes = 2;
        config.batches = 5;
        assert_eq!(config.batch_sizes(), vec![1, 1]);
    }

    #[test]
    fn invalid_settings_rejected() {
        let config = TrainingConfig {
            batches: 0,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
        let config = TrainingConfig {
            epsilon_decay: 1.5,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
        for secs in [-1.0, 1e300, f64::INFINITY, f64::NAN] {
            let config = TrainingConfig {
                play_after_batch_secs: secs,
                ..TrainingConfig::default()
            };
            assert!(config.validate().is_err(), "{secs} accepted");
        }
    }

    #[tokio::test]
    async fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(
            &path,
            r#"{
                "episodes": 12,
                "sarsa": { "n_steps": 3, "workers": 2 },
                "approximator": {
                    "kind": "tile_coding",
                    "number_of_actions": 2,
                    "segments": [4],
                    "min_values": [0.0],
                    "max_values": [1.0],
                    "tilings": 2,
                    "displacement": [1]
                }
            }"#,
        )
        .await
        .unwrap();
        let config = TrainingConfig::load(Some(path.as_path())).await.unwrap();
        assert_eq!(config.episodes, 12);
        assert_eq!(config.episode_length, 400);
        assert_eq!(config.sarsa.n_steps, 3);
        assert_eq!(config.sarsa.rollout.workers, Some(2));
        assert!((config.sarsa.discount - 0.9).abs() < f64::EPSILON);
        match config.approximator {
            ApproximatorConfig::TileCoding(tc) => {
                assert_eq!(tc.tilings, 2);
                assert_eq!(tc.base.segments, vec![4]);
            }
            other => panic!("unexpected approximator {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TrainingConfig::load(Some(dir.path().join("nope.json").as_path()))
            .await
            .is_err());
    }
}
