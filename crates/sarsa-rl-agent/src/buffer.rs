//! Fixed-capacity trace buffers for multi-step backups

use sarsa_rl_core::Transition;

/// Fixed-capacity ring buffer addressed by absolute time.
///
/// Writing time `t` overwrites whatever was stored at `t - capacity`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
}

impl<T: Clone + Default> RingBuffer<T> {
    /// Create a buffer with `capacity` default-initialized slots
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            slots: vec![T::default(); capacity],
        }
    }
}

impl<T> RingBuffer<T> {
    /// Value stored for time `t`
    #[must_use]
    pub fn get(&self, t: usize) -> &T {
        &self.slots[t % self.slots.len()]
    }

    /// Mutable slot for time `t`
    pub fn get_mut(&mut self, t: usize) -> &mut T {
        let len = self.slots.len();
        &mut self.slots[t % len]
    }

    /// Store `value` for time `t`
    pub fn set(&mut self, t: usize, value: T) {
        *self.get_mut(t) = value;
    }
}

/// States, actions and rewards of the last `n + 1` time steps of a segment.
///
/// A backup at time `tau` reads times `tau ..= tau + n` while the step that
/// triggers it writes time `tau + n`, so `n + 1` slots are exactly enough.
#[derive(Debug, Clone)]
pub struct NStepTrace {
    states: RingBuffer<Vec<f64>>,
    actions: RingBuffer<usize>,
    rewards: RingBuffer<f64>,
    n: usize,
}

impl NStepTrace {
    /// Create a trace for horizon `n`
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    #[must_use]
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n-step horizon must be positive");
        Self {
            states: RingBuffer::new(n + 1),
            actions: RingBuffer::new(n + 1),
            rewards: RingBuffer::new(n + 1),
            n,
        }
    }

    /// Record the state and action at time 0 of a new segment
    pub fn start(&mut self, state: &[f64], action: usize) {
        self.store_state(0, state);
        self.actions.set(0, action);
    }

    /// Record the outcome of the step taken at time `t`.
    ///
    /// Reward and next state go to time `t + 1`. The next action is only
    /// stored for non-terminal transitions; nothing bootstraps from a
    /// terminal state.
    pub fn push(&mut self, t: usize, transition: &Transition, next_action: usize) {
        self.rewards.set(t + 1, transition.reward);
        self.store_state(t + 1, &transition.next_state);
        if !transition.terminal {
            self.actions.set(t + 1, next_action);
        }
    }

    /// State at time `t`
    #[must_use]
    pub fn state(&self, t: usize) -> &[f64] {
        self.states.get(t)
    }

    /// Action at time `t`
    #[must_use]
    pub fn action(&self, t: usize) -> usize {
        *self.actions.get(t)
    }

    /// Reward received on entering time `t`
    #[must_use]
    pub fn reward(&self, t: usize) -> f64 {
        *self.rewards.get(t)
    }

    /// Discounted sum of the rewards following `tau`.
    ///
    /// Sums `discount^(i - tau - 1) * reward(i)` for `i` in
    /// `tau + 1 ..= min(horizon, step + 1)`.
    #[must_use]
    pub fn n_step_return(&self, tau: usize, horizon: usize, step: usize, discount: f64) -> f64 {
        let last = horizon.min(step + 1);
        let mut sum = 0.0;
        let mut dampening = 1.0;
        for i in tau + 1..=last {
            sum += dampening * self.reward(i);
            dampening *= discount;
        }
        sum
    }

    /// Time to bootstrap from, if `tau + n` still lies inside the segment
    #[must_use]
    pub fn bootstrap_time(&self, tau: usize, horizon: usize) -> Option<usize> {
        let future = tau + self.n;
        (future < horizon).then_some(future)
    }

    fn store_state(&mut self, t: usize, state: &[f64]) {
        let slot = self.states.get_mut(t);
        slot.clear();
        slot.extend_from_slice(state);
    }
}
