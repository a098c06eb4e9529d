//! Batch learning across worker pools

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sarsa_rl_agent::{Learner, RolloutConfig, Sarsa, SarsaConfig};
use sarsa_rl_core::{
    ActionValueFunction, Approximator, ApproximatorConfig, Environment, EpsilonGreedy, Policy,
    Result, StateAggregationConfig, Step, TileCodingConfig,
};

/// Two-dimensional random walk that collides on every step
struct Wall {
    steps: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    collision: bool,
}

impl Environment for Wall {
    fn number_of_actions(&self) -> usize {
        3
    }

    fn state_dimension(&self) -> usize {
        2
    }

    fn state(&self) -> Vec<f64> {
        vec![0.5, 0.5]
    }

    fn reset(&mut self) -> Vec<f64> {
        self.resets.fetch_add(1, Ordering::Relaxed);
        self.collision = false;
        self.state()
    }

    fn step(&mut self, _action: usize) -> Result<Step> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        self.collision = true;
        Ok(Step {
            observation: vec![0.25, 0.75],
            done: true,
        })
    }
}

fn wall_reward(_: &[f64], _: usize, _: &[f64], env: &Wall) -> f64 {
    if env.collision {
        -100.0
    } else {
        1.0
    }
}

/// Bounded drift along a line, never terminal
struct Drift {
    x: f64,
}

impl Environment for Drift {
    fn number_of_actions(&self) -> usize {
        3
    }

    fn state_dimension(&self) -> usize {
        2
    }

    fn state(&self) -> Vec<f64> {
        vec![self.x, 1.0 - self.x]
    }

    fn reset(&mut self) -> Vec<f64> {
        self.x = 0.5;
        self.state()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        self.x = (self.x + (action as f64 - 1.0) * 0.05).clamp(0.0, 1.0);
        Ok(Step {
            observation: self.state(),
            done: false,
        })
    }
}

fn drift_reward(_: &[f64], _: usize, next: &[f64], _: &Drift) -> f64 {
    -(next[0] - 0.8).abs()
}

fn base_config() -> StateAggregationConfig {
    StateAggregationConfig {
        number_of_actions: 3,
        step_size: 0.1,
        segments: vec![8, 8],
        min_values: vec![0.0, 0.0],
        max_values: vec![1.0, 1.0],
        action_kernel: vec![1.0, 0.25],
        init_min_value: -0.1,
        init_max_value: 0.1,
    }
}

fn config(n_steps: usize, workers: usize) -> SarsaConfig {
    SarsaConfig {
        discount: 0.9,
        n_steps,
        rollout: RolloutConfig {
            workers: Some(workers),
            progress_interval_secs: 0,
        },
    }
}

#[test]
fn terminal_first_step_episode_stays_finite() {
    let approximator = Arc::new(Approximator::from(
        sarsa_rl_core::StateAggregation::new(&base_config()).unwrap(),
    ));
    let policy: Arc<dyn Policy> = Arc::new(EpsilonGreedy::new(0.2, approximator.clone()));
    let steps = Arc::new(AtomicUsize::new(0));
    let resets = Arc::new(AtomicUsize::new(0));
    let (s, r) = (steps.clone(), resets.clone());
    let learner = Sarsa::new(config(20, 1), policy, approximator, wall_reward, move || Wall {
        steps: s.clone(),
        resets: r.clone(),
        collision: false,
    })
    .unwrap();

    let diagnostics = learner.learn(1, 400).unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics.msve[0].is_finite());
    // every one of the 400 steps collides and ends a one-step segment
    assert_eq!(diagnostics.total_reward[0], -40_000.0);
    assert_eq!(steps.load(Ordering::Relaxed), 400);
    assert_eq!(resets.load(Ordering::Relaxed), 401);
}

#[test]
fn pool_sizes_fill_every_slot() {
    for workers in [1, 4] {
        for episodes in [0, 1, 9, 64] {
            let approximator = Arc::new(Approximator::from(
                sarsa_rl_core::StateAggregation::new(&base_config()).unwrap(),
            ));
            let policy: Arc<dyn Policy> =
                Arc::new(EpsilonGreedy::new(0.3, approximator.clone()));
            let learner = Sarsa::new(
                config(3, workers),
                policy,
                approximator,
                drift_reward,
                || Drift { x: 0.5 },
            )
            .unwrap();
            let diagnostics = learner.learn(episodes, 25).unwrap();
            assert_eq!(diagnostics.len(), episodes);
            assert_eq!(diagnostics.total_reward.len(), episodes);
            for (msve, reward) in diagnostics.rows() {
                assert!(msve.is_finite() && msve >= 0.0);
                // 25 steps, each reward in [-0.8, 0]
                assert!((-20.0..=0.0).contains(&reward));
            }
        }
    }
}

#[test]
fn tile_coding_learns_through_the_batched_interface() {
    let approximator = Arc::new(
        ApproximatorConfig::TileCoding(TileCodingConfig {
            base: base_config(),
            tilings: 4,
            displacement: vec![1, 3],
        })
        .build()
        .unwrap(),
    );
    let before = approximator.to_bytes();
    let policy: Arc<dyn Policy> = Arc::new(EpsilonGreedy::new(0.5, approximator.clone()));
    let learner = Sarsa::new(
        config(5, 3),
        policy,
        approximator.clone(),
        drift_reward,
        || Drift { x: 0.5 },
    )
    .unwrap();
    let diagnostics = learner.learn(12, 50).unwrap();
    assert_eq!(diagnostics.len(), 12);
    assert!(diagnostics.mean_msve().is_finite());
    assert_ne!(approximator.to_bytes(), before);
    assert!(approximator.predict_action(&[0.5, 0.5], 0).is_err());
}

#[test]
fn learned_values_prefer_moving_towards_the_target() {
    let approximator = Arc::new(Approximator::from(
        sarsa_rl_core::StateAggregation::new(&StateAggregationConfig {
            action_kernel: vec![1.0],
            init_min_value: 0.0,
            init_max_value: 0.0,
            ..base_config()
        })
        .unwrap(),
    ));
    let policy = Arc::new(EpsilonGreedy::new(1.0, approximator.clone()));
    let learner = Sarsa::new(
        config(2, 4),
        policy.clone() as Arc<dyn Policy>,
        approximator.clone(),
        drift_reward,
        || Drift { x: 0.5 },
    )
    .unwrap();
    learner.learn(200, 60).unwrap();

    // far left of the target, drifting right (action 2) beats drifting left
    let values = approximator.all_q_values(&[0.3, 0.7]).unwrap();
    assert!(values[2] > values[0], "{values:?}");
}
