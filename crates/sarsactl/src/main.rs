// sarsactl
// Command-line driver for training and playing n-step SARSA policies

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::TrainingConfig;

#[derive(Parser)]
#[command(name = "sarsactl")]
#[command(about = "Train and play n-step SARSA policies on the flappy simulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a policy in parallel batches of episodes
    Learn {
        /// JSON training configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Total number of episodes
        #[arg(long)]
        episodes: Option<usize>,

        /// Number of batches
        #[arg(long)]
        batches: Option<usize>,

        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip the demonstration after each batch
        #[arg(long)]
        no_play: bool,
    },

    /// Play the learned greedy policy in the console
    Play {
        /// JSON training configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seconds to play
        #[arg(short, long, default_value = "300")]
        seconds: f64,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speedup: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Learn {
            config,
            episodes,
            batches,
            workers,
            no_play,
        } => {
            let mut config = TrainingConfig::load(config.as_deref()).await?;
            if let Some(episodes) = episodes {
                config.episodes = episodes;
            }
            if let Some(batches) = batches {
                config.batches = batches;
            }
            if workers.is_some() {
                config.sarsa.rollout.workers = workers;
            }
            if no_play {
                config.play_after_batch_secs = 0.0;
            }
            commands::learn(config).await?;
        }

        Commands::Play {
            config,
            seconds,
            speedup,
        } => {
            let config = TrainingConfig::load(config.as_deref()).await?;
            commands::play_policy(config, seconds, speedup).await?;
        }
    }

    tracing::info!("finished");
    Ok(())
}
