//! Parameter schedules used between learning batches

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: usize) -> f64;
}

/// Exponential decay schedule
#[derive(Debug, Clone)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl ExponentialSchedule {
    /// Create a new exponential schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            start,
            min_value,
            decay_rate,
        }
    }
}

impl Schedule for ExponentialSchedule {
    fn value(&self, t: usize) -> f64 {
        let value = self.start * self.decay_rate.powf(t as f64);
        value.max(self.min_value)
    }
}
