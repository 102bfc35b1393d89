use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::GameError;
use crate::GridInt;

pub const DEFAULT_GRID_WIDTH: GridInt = 40;
pub const DEFAULT_GRID_HEIGHT: GridInt = 20;
pub const DEFAULT_TICK_MS: u64 = 16;
pub const DEFAULT_RENDER_MS: u64 = 33;
pub const INITIAL_SPEED: f32 = 0.1;
pub const SPEED_INCREMENT: f32 = 0.02;
pub const BONUS_DURATION_SECS: u64 = 6;
pub const BONUS_EVERY_N_FOODS: u32 = 4;
pub const BONUS_POLL_MS: u64 = 800;

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub grid_width: GridInt,
    pub grid_height: GridInt,
    /// Time between two simulation steps.
    pub tick_duration: Duration,
    /// Time between two render snapshots.
    pub render_interval: Duration,
    /// Cells travelled per tick at the start of a run.
    pub initial_speed: f32,
    /// Added to the speed on every normal food pickup.
    pub speed_increment: f32,
    pub bonus_duration: Duration,
    /// A bonus spawns whenever the number of placed foods is a multiple of this.
    pub bonus_every: u32,
    pub bonus_poll_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            tick_duration: Duration::from_millis(DEFAULT_TICK_MS),
            render_interval: Duration::from_millis(DEFAULT_RENDER_MS),
            initial_speed: INITIAL_SPEED,
            speed_increment: SPEED_INCREMENT,
            bonus_duration: Duration::from_secs(BONUS_DURATION_SECS),
            bonus_every: BONUS_EVERY_N_FOODS,
            bonus_poll_interval: Duration::from_millis(BONUS_POLL_MS),
        }
    }
}

impl GameConfig {
    /// Defaults overridden by `SNAKE_GRID_WIDTH`, `SNAKE_GRID_HEIGHT`,
    /// `SNAKE_TICK_MS` and `SNAKE_INITIAL_SPEED` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = GameConfig::default();

        if let Some(width) = env_var("SNAKE_GRID_WIDTH")? {
            config.grid_width = width;
        }
        if let Some(height) = env_var("SNAKE_GRID_HEIGHT")? {
            config.grid_height = height;
        }
        if let Some(tick_ms) = env_var("SNAKE_TICK_MS")? {
            config.tick_duration = Duration::from_millis(tick_ms);
        }
        if let Some(speed) = env_var("SNAKE_INITIAL_SPEED")? {
            config.initial_speed = speed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let invalid = |msg: &str| Err(GameError::InvalidConfig(msg.to_string()));

        if self.grid_width == 0 || self.grid_height == 0 {
            return invalid("grid dimensions must be positive");
        }
        if self.tick_duration.is_zero() || self.render_interval.is_zero() {
            return invalid("tick and render intervals must be non-zero");
        }
        if !(self.initial_speed > 0.0) {
            return invalid("initial speed must be positive");
        }
        if !(self.speed_increment > 0.0) {
            return invalid("speed increment must be positive");
        }
        if self.bonus_duration.is_zero() || self.bonus_poll_interval.is_zero() {
            return invalid("bonus duration and poll interval must be non-zero");
        }
        if self.bonus_every == 0 {
            return invalid("bonus cadence must be positive");
        }
        Ok(())
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(None),
    }
}
