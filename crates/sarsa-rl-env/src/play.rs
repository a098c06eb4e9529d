//! Real-time rollout of a policy for demonstration

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use sarsa_rl_core::{Environment, Policy, RLError, RenderMode, Result};

/// Settings of a demonstration run
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOptions {
    /// Wall-clock time to play for
    pub duration: Duration,
    /// Simulated time per frame
    pub frame_time: Duration,
    /// Playback speed; frames are shown `speedup` times faster than real time
    pub speedup: f64,
    /// Where frames are drawn
    pub render: RenderMode,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            frame_time: Duration::from_millis(50),
            speedup: 1.0,
            render: RenderMode::Console,
        }
    }
}

/// What happened during a demonstration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaySummary {
    /// Steps taken
    pub frames: usize,
    /// Terminal steps, each followed by a reset
    pub episodes_ended: usize,
}

/// Let `policy` act in `environment` for the configured wall-clock time,
/// rendering every frame. Terminal steps reset the environment.
pub fn play<E, P>(environment: &mut E, policy: &P, options: &PlayOptions) -> Result<PlaySummary>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let frame_interval = if options.speedup > 0.0 {
        Duration::try_from_secs_f64(options.frame_time.as_secs_f64() / options.speedup)
            .map_err(|e| {
                RLError::InvalidArgument(format!("speedup {}: {e}", options.speedup))
            })?
    } else {
        options.frame_time
    };
    let start = Instant::now();
    let mut summary = PlaySummary::default();
    let mut state = environment.reset();

    while start.elapsed() < options.duration {
        let frame_start = Instant::now();
        let action = policy.apply(&state)?;
        let step = environment.step(action)?;
        environment.render(options.render)?;
        debug!("Frame {}: action {}, done {}", summary.frames, action, step.done);
        summary.frames += 1;
        state = if step.done {
            summary.episodes_ended += 1;
            environment.reset()
        } else {
            step.observation
        };
        if let Some(rest) = frame_interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    info!(
        "Played {} frames, {} episodes ended",
        summary.frames, summary.episodes_ended
    );
    Ok(summary)
}
