//! n-step SARSA with linear value-function approximation

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sarsa_rl_core::{
    ActionValueFunction, Environment, EnvironmentFactory, Policy, RLError, Result,
    RewardFunction, Step, Transition,
};

use crate::buffer::NStepTrace;
use crate::learner::{EpisodeStats, Learner, RolloutConfig, Scheduler};

/// SARSA configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarsaConfig {
    /// Discount factor for future rewards
    pub discount: f64,
    /// Backup horizon `n`
    pub n_steps: usize,
    /// Worker pool settings
    #[serde(flatten)]
    pub rollout: RolloutConfig,
}

impl Default for SarsaConfig {
    fn default() -> Self {
        Self {
            discount: 0.9,
            n_steps: 1,
            rollout: RolloutConfig::default(),
        }
    }
}

impl SarsaConfig {
    /// Check the configuration for invalid values
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 {
            return Err(RLError::InvalidArgument(
                "n_steps must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(RLError::InvalidArgument(format!(
                "discount {} outside [0, 1]",
                self.discount
            )));
        }
        Ok(())
    }
}

/// On-policy n-step SARSA.
///
/// The value function is shared by every episode of a batch; each episode
/// owns its environment and trace. Within an episode, the update for time
/// `tau` uses the `n` rewards that follow it plus `discount^n` times the value
/// of the state-action pair at `tau + n`, when that pair still lies inside the
/// current segment. A terminal transition ends the segment: the environment
/// is reset and a new segment starts with the remaining step budget.
pub struct Sarsa<E, Q: ?Sized> {
    config: SarsaConfig,
    approximator: Arc<Q>,
    policy: Arc<dyn Policy>,
    reward: Box<dyn RewardFunction<E>>,
    factory: Box<dyn EnvironmentFactory<E>>,
    scheduler: Scheduler,
}

impl<E, Q> Sarsa<E, Q>
where
    E: Environment,
    Q: ActionValueFunction + ?Sized,
{
    /// Create a new SARSA learner
    pub fn new(
        config: SarsaConfig,
        policy: Arc<dyn Policy>,
        approximator: Arc<Q>,
        reward: impl RewardFunction<E> + 'static,
        factory: impl EnvironmentFactory<E> + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let scheduler = Scheduler::new(&config.rollout)?;
        debug!(
            "SARSA learner: n = {}, discount = {}, workers = {}",
            config.n_steps,
            config.discount,
            scheduler.workers()
        );
        Ok(Self {
            config,
            approximator,
            policy,
            reward: Box::new(reward),
            factory: Box::new(factory),
            scheduler,
        })
    }

    /// Learner configuration
    #[must_use]
    pub fn config(&self) -> &SarsaConfig {
        &self.config
    }

    /// Shared value function
    #[must_use]
    pub fn approximator(&self) -> &Arc<Q> {
        &self.approximator
    }

    fn check_environment(&self, environment: &E) -> Result<()> {
        if environment.state_dimension() != self.approximator.state_dimension() {
            return Err(RLError::DimensionMismatch {
                expected: self.approximator.state_dimension(),
                actual: environment.state_dimension(),
            });
        }
        if environment.number_of_actions() != self.approximator.number_of_actions() {
            return Err(RLError::InvalidArgument(format!(
                "environment has {} actions, value function {}",
                environment.number_of_actions(),
                self.approximator.number_of_actions()
            )));
        }
        Ok(())
    }
}

impl<E, Q> Learner for Sarsa<E, Q>
where
    E: Environment,
    Q: ActionValueFunction + ?Sized,
{
    type Env = E;
    type Policy = dyn Policy;

    fn policy(&self) -> Arc<dyn Policy> {
        Arc::clone(&self.policy)
    }

    fn create_environment(&self) -> E {
        self.factory.create()
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn learn_episode(&self, max_steps: usize, environment: &mut E) -> Result<EpisodeStats> {
        self.check_environment(environment)?;
        let n = self.config.n_steps;
        let discount = self.config.discount;
        let bootstrap_discount = discount.powi(i32::try_from(n).unwrap_or(i32::MAX));

        let mut trace = NStepTrace::new(n);
        let mut state = environment.reset();
        let mut action = self.policy.apply(&state)?;
        let mut ssve = 0.0;
        let mut total_reward = 0.0;
        let mut remaining = max_steps;

        while remaining > 0 {
            let mut horizon = remaining;
            trace.start(&state, action);
            let mut step = 0;
            loop {
                if step < horizon {
                    let Step { observation, done } = environment.step(action)?;
                    let reward = self
                        .reward
                        .reward(&state, action, &observation, environment);
                    total_reward += reward;
                    let transition = Transition {
                        state,
                        action,
                        reward,
                        next_state: observation,
                        terminal: done,
                    };
                    action = self.policy.apply(&transition.next_state)?;
                    trace.push(step, &transition, action);
                    state = transition.next_state;
                    if done {
                        state = environment.reset();
                        action = self.policy.apply(&state)?;
                        horizon = step + 1;
                    }
                }

                if step + 1 >= n {
                    let tau = step + 1 - n;
                    let mut target = trace.n_step_return(tau, horizon, step, discount);
                    if let Some(future) = trace.bootstrap_time(tau, horizon) {
                        let value = self
                            .approximator
                            .predict(trace.state(future), &[trace.action(future)])?;
                        target += bootstrap_discount * value[0];
                    }
                    let error = self
                        .approximator
                        .update(trace.state(tau), trace.action(tau), target)?;
                    ssve += error * error;
                    if tau + 1 == horizon {
                        break;
                    }
                }
                step += 1;
            }
            remaining -= horizon;
        }

        let msve = if max_steps == 0 {
            0.0
        } else {
            ssve / max_steps as f64
        };
        Ok(EpisodeStats { msve, total_reward })
    }
}
