// Learn and play commands for sarsactl

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sarsa_rl_agent::{EpisodeDiagnostics, ExponentialSchedule, Learner, Sarsa, Schedule};
use sarsa_rl_core::{ActionValueFunction, Approximator, EpsilonGreedy, Greedy, Policy, RenderMode};
use sarsa_rl_env::{flappy_reward, play, FlappySimulator, PlayOptions};

use crate::config::TrainingConfig;

/// Build the approximator and restore its parameters if the file fits
fn restore_approximator(config: &TrainingConfig) -> Result<Arc<Approximator>> {
    let approximator = config
        .approximator
        .build()
        .context("Invalid approximator configuration")?;
    if approximator.load(&config.parameters)? {
        info!("Loaded parameters from {}", config.parameters.display());
    } else {
        info!("Starting from freshly initialized parameters");
    }
    Ok(Arc::new(approximator))
}

/// Train on the flappy task in batches, then persist parameters and statistics
pub async fn learn(config: TrainingConfig) -> Result<()> {
    config.validate()?;
    let demo_duration = seconds_to_duration(config.play_after_batch_secs)?;
    let approximator = restore_approximator(&config)?;
    let policy = Arc::new(EpsilonGreedy::new(config.epsilon, Arc::clone(&approximator)));
    let learner = Arc::new(Sarsa::new(
        config.sarsa.clone(),
        Arc::clone(&policy) as Arc<dyn Policy>,
        Arc::clone(&approximator),
        flappy_reward,
        FlappySimulator::new,
    )?);
    let schedule = ExponentialSchedule::new(config.epsilon, 0.0, config.epsilon_decay);

    let batch_sizes = config.batch_sizes();
    info!(
        "Learning {} episodes of {} steps in {} batches on {} workers",
        config.episodes,
        config.episode_length,
        batch_sizes.len(),
        learner.scheduler().workers()
    );

    let mut diagnostics = EpisodeDiagnostics::default();
    for (batch, &batch_size) in batch_sizes.iter().enumerate() {
        info!("Batch {}/{}: {} episodes", batch + 1, batch_sizes.len(), batch_size);
        let worker = Arc::clone(&learner);
        let episode_length = config.episode_length;
        let result = tokio::task::spawn_blocking(move || worker.learn(batch_size, episode_length))
            .await
            .context("Learning batch panicked")??;
        info!(
            "Batch mean reward: {:.3}, batch MSVE: {:.6}",
            result.mean_reward(),
            result.mean_msve()
        );
        diagnostics.extend(&result);

        policy.set_epsilon(schedule.value(diagnostics.len()));

        if config.play_after_batch_secs > 0.0 {
            demonstrate(Arc::clone(&approximator), demo_duration, 1.0).await?;
        }
    }

    approximator
        .save(&config.parameters)
        .with_context(|| format!("Failed to save parameters to {}", config.parameters.display()))?;
    info!("Saved parameters to {}", config.parameters.display());

    save_statistics(&config.statistics, &diagnostics).await?;
    info!(
        "Wrote statistics of {} episodes to {}",
        diagnostics.len(),
        config.statistics.display()
    );
    Ok(())
}

/// Play the greedy policy of the stored parameters in the console
pub async fn play_policy(config: TrainingConfig, seconds: f64, speedup: f64) -> Result<()> {
    let duration = seconds_to_duration(seconds.max(0.0))?;
    let approximator = restore_approximator(&config)?;
    if !config.parameters.exists() {
        warn!(
            "No parameter file at {}, playing an untrained policy",
            config.parameters.display()
        );
    }
    demonstrate(approximator, duration, speedup).await
}

fn seconds_to_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("{seconds} seconds is not a valid play duration"))
}

async fn demonstrate(approximator: Arc<Approximator>, duration: Duration, speedup: f64) -> Result<()> {
    let options = PlayOptions {
        duration,
        speedup,
        render: RenderMode::Console,
        ..PlayOptions::default()
    };
    let summary = tokio::task::spawn_blocking(move || {
        let policy = Greedy::new(approximator);
        let mut environment = FlappySimulator::new();
        play(&mut environment, &policy, &options)
    })
    .await
    .context("Demonstration panicked")??;
    info!(
        "Demonstration: {} frames, {} collisions",
        summary.frames, summary.episodes_ended
    );
    Ok(())
}

/// CSV with a `MSVE,REWARD` header and one row per episode
pub fn format_statistics(diagnostics: &EpisodeDiagnostics) -> String {
    std::iter::once("MSVE,REWARD".to_string())
        .chain(diagnostics.rows().map(|(msve, reward)| format!("{msve},{reward}")))
        .map(|line| line + "\n")
        .collect()
}

/// Write the statistics CSV
pub async fn save_statistics(path: &Path, diagnostics: &EpisodeDiagnostics) -> Result<()> {
    tokio::fs::write(path, format_statistics(diagnostics))
        .await
        .with_context(|| format!("Failed to write statistics to {}", path.display()))
}
