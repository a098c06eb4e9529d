//! Transitions produced by environment steps

/// Single transition, consumed immediately by the n-step backup
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State the action was taken in
    pub state: Vec<f64>,
    /// Action taken
    pub action: usize,
    /// Reward received
    pub reward: f64,
    /// State observed after the action
    pub next_state: Vec<f64>,
    /// Whether the episode ended
    pub terminal: bool,
}
