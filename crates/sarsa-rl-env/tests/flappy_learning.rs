//! Learning on the flappy simulator end to end

use std::sync::Arc;
use std::time::Duration;

use sarsa_rl_agent::{Learner, RolloutConfig, Sarsa, SarsaConfig};
use sarsa_rl_core::{
    ActionValueFunction, ApproximatorConfig, Environment, EpsilonGreedy, Greedy, Policy, RenderMode,
    StateAggregationConfig, TileCodingConfig,
};
use sarsa_rl_env::{flappy_reward, play, FlappySimulator, PlayOptions};

fn flappy_grid() -> StateAggregationConfig {
    StateAggregationConfig {
        number_of_actions: 2,
        step_size: 0.05,
        segments: vec![6, 6, 6, 6, 4],
        min_values: vec![0.0, 3.75, 3.75, 1.0, -10.0],
        max_values: vec![11.0, 10.25, 10.25, 13.0, 10.0],
        action_kernel: vec![1.0],
        init_min_value: 0.0,
        init_max_value: 0.0,
    }
}

#[test]
fn tile_coding_sarsa_runs_on_flappy() {
    let approximator = Arc::new(
        ApproximatorConfig::TileCoding(TileCodingConfig {
            base: flappy_grid(),
            tilings: 3,
            displacement: vec![1, 3, 5, 7, 9],
        })
        .build()
        .unwrap(),
    );
    let policy = Arc::new(EpsilonGreedy::new(0.2, Arc::clone(&approximator)));
    let learner = Sarsa::new(
        SarsaConfig {
            discount: 0.9,
            n_steps: 8,
            rollout: RolloutConfig {
                workers: Some(2),
                progress_interval_secs: 0,
            },
        },
        Arc::clone(&policy) as Arc<dyn Policy>,
        Arc::clone(&approximator),
        flappy_reward,
        || FlappySimulator::with_seed(7),
    )
    .unwrap();

    let diagnostics = learner.learn(8, 200).unwrap();
    assert_eq!(diagnostics.len(), 8);
    for (msve, reward) in diagnostics.rows() {
        assert!(msve.is_finite() && msve >= 0.0);
        // 200 steps, each worth +1 or -100
        assert!((-20_000.0..=200.0).contains(&reward));
    }
    let start = FlappySimulator::with_seed(7).state();
    let values = approximator.all_q_values(&start).unwrap();
    assert!(values.iter().all(|v| v.is_finite()));
}

#[test]
fn greedy_play_runs_for_a_bounded_number_of_frames() {
    let approximator = Arc::new(ApproximatorConfig::StateAggregation(flappy_grid()).build().unwrap());
    let policy = Greedy::new(approximator);
    let mut environment = FlappySimulator::with_seed(3);
    let options = PlayOptions {
        duration: Duration::from_millis(200),
        frame_time: Duration::from_millis(50),
        speedup: 10.0,
        render: RenderMode::Hidden,
    };
    let summary = play(&mut environment, &policy, &options).unwrap();
    assert!(summary.frames > 0);
    assert!(summary.episodes_ended <= summary.frames);
}
