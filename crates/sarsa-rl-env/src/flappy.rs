//! Headless flappy-bird style simulator

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use sarsa_rl_core::{Environment, RLError, RenderMode, Result, Step};

/// Number of state dimensions
pub const STATE_DIMENSION: usize = 5;
/// Number of actions: 0 lets the bird fall, 1 flaps
pub const NUMBER_OF_ACTIONS: usize = 2;

/// Horizontal position of the right edge of the first pipe
pub const PIPE_1_X: usize = 0;
/// Centre height of the first pipe's opening
pub const PIPE_1_Y: usize = 1;
/// Centre height of the second pipe's opening
pub const PIPE_2_Y: usize = 2;
/// Height of the bird (y grows downwards)
pub const FLAPPY_Y: usize = 3;
/// Vertical velocity of the bird
pub const FLAPPY_V: usize = 4;

/// Physical constants of the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct FlappyConfig {
    /// Screen width
    pub screen_width: f64,
    /// Screen height
    pub screen_height: f64,
    /// Horizontal distance between two pipes
    pub pipe_distance: f64,
    /// Height of the gap in a pipe
    pub pipe_opening: f64,
    /// Pipe width
    pub pipe_width: f64,
    /// Bird radius
    pub flappy_radius: f64,
    /// Upward acceleration while flapping
    pub flappy_accel: f64,
    /// Horizontal pipe speed
    pub flappy_speed: f64,
    /// Maximum vertical speed
    pub flappy_vmax: f64,
    /// Horizontal position of the bird
    pub flappy_x: f64,
    /// Gravity
    pub gravity: f64,
    /// Time step
    pub dt: f64,
}

impl Default for FlappyConfig {
    fn default() -> Self {
        Self {
            screen_width: 9.0,
            screen_height: 14.0,
            pipe_distance: 6.0,
            pipe_opening: 5.0,
            pipe_width: 2.0,
            flappy_radius: 1.0,
            flappy_accel: 100.0,
            flappy_speed: 2.0,
            flappy_vmax: 10.0,
            flappy_x: 4.0,
            gravity: 9.81,
            dt: 1.0 / 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FlappyState {
    pipe_1_x: f64,
    pipe_1_y: f64,
    pipe_2_y: f64,
    flappy_y: f64,
    flappy_v: f64,
}

impl FlappyState {
    fn to_vec(self) -> Vec<f64> {
        vec![
            self.pipe_1_x,
            self.pipe_1_y,
            self.pipe_2_y,
            self.flappy_y,
            self.flappy_v,
        ]
    }
}

/// Axis-aligned rectangle `[left, right] x [top, bottom]`
#[derive(Debug, Clone, Copy)]
struct Rect {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Rect {
    fn contains(&self, x: f64, y: f64) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }

    /// Whether the circle of radius `r` around `(x, y)` touches the rectangle
    fn overlaps_circle(&self, r: f64, x: f64, y: f64) -> bool {
        let dx = x.clamp(self.left, self.right) - x;
        let dy = y.clamp(self.top, self.bottom) - y;
        dx * dx + dy * dy <= r * r
    }
}

/// Flappy-bird simulator.
///
/// Two pipes scroll to the left and wrap around; the bird falls under gravity
/// and flaps upwards. Touching a pipe, the ground or the ceiling is a
/// collision: the bird's vertical movement is undone and the step is terminal.
///
/// Unless built with [`FlappySimulator::with_seed`], every reset reseeds the
/// random source from the current time.
#[derive(Debug, Clone)]
pub struct FlappySimulator {
    config: FlappyConfig,
    state: FlappyState,
    collision: bool,
    rng: StdRng,
    reseed_on_reset: bool,
}

impl FlappySimulator {
    /// Create a simulator with the default physics
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FlappyConfig::default())
    }

    /// Create a simulator with custom physics
    #[must_use]
    pub fn with_config(config: FlappyConfig) -> Self {
        let mut simulator = Self {
            config,
            state: FlappyState::default(),
            collision: false,
            rng: StdRng::seed_from_u64(time_seed()),
            reseed_on_reset: true,
        };
        simulator.reset();
        simulator
    }

    /// Create a deterministic simulator; resets draw from one seeded stream
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        let mut simulator = Self {
            config: FlappyConfig::default(),
            state: FlappyState::default(),
            collision: false,
            rng: StdRng::seed_from_u64(seed),
            reseed_on_reset: false,
        };
        simulator.reset();
        simulator
    }

    /// Physics constants
    #[must_use]
    pub fn config(&self) -> &FlappyConfig {
        &self.config
    }

    /// Whether the last step ended in a collision
    #[must_use]
    pub fn collision(&self) -> bool {
        self.collision
    }

    /// Overwrite the bird's height and velocity
    pub fn set_flappy(&mut self, y: f64, v: f64) {
        self.state.flappy_y = y;
        self.state.flappy_v = v;
    }

    /// Overwrite the pipe position and opening heights
    pub fn set_pipes(&mut self, pipe_1_x: f64, pipe_1_y: f64, pipe_2_y: f64) {
        self.state.pipe_1_x = pipe_1_x;
        self.state.pipe_1_y = pipe_1_y;
        self.state.pipe_2_y = pipe_2_y;
    }

    fn random_pipe_height(&mut self) -> f64 {
        let c = &self.config;
        let range = c.screen_height - c.pipe_opening * 1.5;
        let low = c.pipe_opening * 0.75;
        self.rng.gen::<f64>() * range + low
    }

    /// Horizontal extent of both pipes given the first pipe's right edge
    fn pipe_columns(&self, pipe_1_x: f64) -> [(f64, f64); 2] {
        let c = &self.config;
        let mut columns = [(0.0, 0.0); 2];
        let mut pipe_x = pipe_1_x;
        for column in &mut columns {
            *column = (pipe_x - c.pipe_width, pipe_x);
            pipe_x += c.pipe_distance;
            if pipe_x > c.screen_width + c.pipe_width {
                pipe_x -= c.pipe_distance * 2.0;
            }
        }
        columns
    }

    /// Lower and upper obstacle of every pipe
    fn obstacles(&self, pipe_1_x: f64, heights: [f64; 2]) -> Vec<Rect> {
        let c = &self.config;
        self.pipe_columns(pipe_1_x)
            .iter()
            .zip(heights)
            .flat_map(|(&(left, right), height)| {
                let lower_top = height + c.pipe_opening / 2.0;
                [
                    Rect {
                        left,
                        top: lower_top,
                        right,
                        bottom: c.screen_height,
                    },
                    Rect {
                        left,
                        top: 0.0,
                        right,
                        bottom: lower_top - c.pipe_opening,
                    },
                ]
            })
            .collect()
    }

    /// ASCII frame of the current state, two columns per unit of width
    #[must_use]
    pub fn frame(&self) -> String {
        let c = &self.config;
        let rows = c.screen_height.ceil() as usize;
        let cols = (c.screen_width * 2.0).ceil() as usize;
        let obstacles = self.obstacles(
            self.state.pipe_1_x,
            [self.state.pipe_1_y, self.state.pipe_2_y],
        );
        let border = format!("+{}+\n", "-".repeat(cols));
        let mut frame = border.clone();
        for row in 0..rows {
            frame.push('|');
            let y = row as f64 + 0.5;
            for col in 0..cols {
                let x = (col as f64 + 0.5) / 2.0;
                let dx = x - c.flappy_x;
                let dy = y - self.state.flappy_y;
                let cell = if dx * dx + dy * dy <= c.flappy_radius * c.flappy_radius {
                    '@'
                } else if obstacles.iter().any(|o| o.contains(x, y)) {
                    '#'
                } else {
                    ' '
                };
                frame.push(cell);
            }
            frame.push_str("|\n");
        }
        frame.push_str(&border);
        frame.push_str(&format!(
            "y = {:.2}  v = {:.2}{}\n",
            self.state.flappy_y,
            self.state.flappy_v,
            if self.collision { "  COLLISION" } else { "" }
        ));
        frame
    }
}

impl Default for FlappySimulator {
    fn default() -> Self {
        Self::new()
    }
}

fn time_seed() -> u64 {
    Utc::now().timestamp_micros().unsigned_abs()
}

impl Environment for FlappySimulator {
    fn number_of_actions(&self) -> usize {
        NUMBER_OF_ACTIONS
    }

    fn state_dimension(&self) -> usize {
        STATE_DIMENSION
    }

    fn state(&self) -> Vec<f64> {
        self.state.to_vec()
    }

    fn reset(&mut self) -> Vec<f64> {
        if self.reseed_on_reset {
            self.rng = StdRng::seed_from_u64(time_seed());
        }
        let c = self.config.clone();
        let second_slot = f64::from(self.rng.gen_range(0..2u8));
        self.state = FlappyState {
            pipe_1_x: c.flappy_x - c.flappy_radius + second_slot * c.pipe_distance,
            pipe_1_y: self.random_pipe_height(),
            pipe_2_y: self.random_pipe_height(),
            flappy_y: c.screen_height / 2.0,
            flappy_v: 0.0,
        };
        self.collision = false;
        self.state()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        if action >= NUMBER_OF_ACTIONS {
            return Err(RLError::InvalidArgument(format!(
                "action {action} out of range for {NUMBER_OF_ACTIONS} actions"
            )));
        }
        let c = self.config.clone();
        let previous = self.state;

        // Constant acceleration over one time step
        let acceleration = c.gravity - action as f64 * c.flappy_accel;
        let mut flappy_v =
            (previous.flappy_v + acceleration * c.dt).clamp(-c.flappy_vmax, c.flappy_vmax);
        let mut flappy_y =
            previous.flappy_y + previous.flappy_v * c.dt + 0.5 * acceleration * c.dt * c.dt;

        let mut pipe_1_x = previous.pipe_1_x - c.flappy_speed * c.dt;
        let mut pipe_1_y = previous.pipe_1_y;
        let mut pipe_2_y = previous.pipe_2_y;
        if pipe_1_x < 0.0 {
            pipe_1_x += c.pipe_distance * 2.0;
            pipe_1_y = self.random_pipe_height();
        }
        let second = pipe_1_x - c.pipe_distance;
        if second < 0.0 && second >= -c.flappy_speed * c.dt {
            pipe_2_y = self.random_pipe_height();
        }

        // Openings are checked at the heights from before this step's respawn
        let hit_pipe = self
            .obstacles(pipe_1_x, [previous.pipe_1_y, previous.pipe_2_y])
            .iter()
            .any(|o| o.overlaps_circle(c.flappy_radius, c.flappy_x, flappy_y));
        let hit_bounds = flappy_y + c.flappy_radius >= c.screen_height
            || flappy_y - c.flappy_radius <= 0.0;
        let collision = hit_pipe || hit_bounds;

        if collision {
            flappy_y = previous.flappy_y;
            flappy_v = 0.0;
            trace!("Collision at y = {:.2}", flappy_y);
        }

        self.collision = collision;
        self.state = FlappyState {
            pipe_1_x,
            pipe_1_y,
            pipe_2_y,
            flappy_y,
            flappy_v,
        };
        Ok(Step {
            observation: self.state(),
            done: collision,
        })
    }

    fn render(&self, mode: RenderMode) -> Result<()> {
        if mode == RenderMode::Console {
            print!("{}", self.frame());
        }
        Ok(())
    }
}

/// Reward of the flappy task: -100 on collision, +1 for every other step
#[must_use]
pub fn flappy_reward(
    _state: &[f64],
    _action: usize,
    _next_state: &[f64],
    environment: &FlappySimulator,
) -> f64 {
    if environment.collision() {
        -100.0
    } else {
        1.0
    }
}
