use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bonus::BonusState;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::food::FoodPlacer;
use crate::snake::{Direction, Snake};
use crate::{Coords, GridInt};

/// The one lock every task goes through to read or change the game.
pub type SharedState = Arc<Mutex<GameState>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// What happened during a single tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ate_food: bool,
    /// Epoch of a bonus activated this tick; its timer still has to be started.
    pub bonus_started: Option<u64>,
    /// Epoch of a bonus eaten this tick.
    pub bonus_consumed: Option<u64>,
    pub died: bool,
    pub grid_full: bool,
}

/// Point-in-time copy of everything a renderer needs.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub grid_width: GridInt,
    pub grid_height: GridInt,
    /// Oldest cell first, head excluded.
    pub body: Vec<Coords>,
    pub head: (f32, f32),
    pub head_cell: Coords,
    pub direction: Direction,
    pub size: usize,
    pub alive: bool,
    pub won: bool,
    pub food: Coords,
    pub bonus_food: Option<Coords>,
    pub bonus_remaining_secs: u32,
    pub score: u32,
    pub speed: f32,
    pub ticks_per_second: u32,
    pub run_state: RunState,
}

#[derive(Debug)]
pub struct GameState {
    snake: Snake,
    placer: FoodPlacer,
    food: Coords,
    bonus: BonusState,
    score: u32,
    food_placed_count: u32,
    won: bool,
    run_state: RunState,
    ticks_per_second: u32,
    grid_width: GridInt,
    grid_height: GridInt,
    speed_increment: f32,
    bonus_every: u32,
    bonus_duration_secs: u32,
}

impl GameState {
    pub fn new(config: &GameConfig) -> Result<Self, GameError> {
        let placer = FoodPlacer::new(config.grid_width, config.grid_height);
        Self::with_placer(config, placer)
    }

    pub fn with_rng(config: &GameConfig, rng: StdRng) -> Result<Self, GameError> {
        let placer = FoodPlacer::with_rng(config.grid_width, config.grid_height, rng);
        Self::with_placer(config, placer)
    }

    fn with_placer(config: &GameConfig, mut placer: FoodPlacer) -> Result<Self, GameError> {
        config.validate()?;

        let snake = Snake::new(config.grid_width, config.grid_height, config.initial_speed)?;
        let food = placer.place_food(&snake)?;

        Ok(GameState {
            snake,
            placer,
            food,
            bonus: BonusState::default(),
            score: 0,
            food_placed_count: 0,
            won: false,
            run_state: RunState::Running,
            ticks_per_second: 0,
            grid_width: config.grid_width,
            grid_height: config.grid_height,
            speed_increment: config.speed_increment,
            bonus_every: config.bonus_every,
            bonus_duration_secs: config.bonus_duration.as_secs() as u32,
        })
    }

    /// Runs one simulation step. Does nothing unless the game is running and
    /// the snake is alive with room left to place food.
    pub fn tick(&mut self) -> Result<TickReport, GameError> {
        let mut report = TickReport::default();

        if self.run_state != RunState::Running || self.won || !self.snake.is_alive() {
            return Ok(report);
        }

        self.snake.update();

        if !self.snake.is_alive() {
            info!(score = self.score, size = self.snake.size(), "Snake ran into itself");
            report.died = true;
            return Ok(report);
        }

        let head = self.snake.head_cell();

        if head == self.food {
            self.eat_food(&mut report)?;
        }

        if self.bonus.is_active() && self.bonus.food() == Some(head) {
            let epoch = self.bonus.epoch();
            let remaining = self.bonus.consume();
            self.score += 2 + remaining;
            info!(epoch, remaining, score = self.score, "Bonus food eaten");
            report.bonus_consumed = Some(epoch);
        }

        Ok(report)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.snake.set_direction(direction);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            body: self.snake.body().iter().copied().collect(),
            head: self.snake.head(),
            head_cell: self.snake.head_cell(),
            direction: self.snake.direction(),
            size: self.snake.size(),
            alive: self.snake.is_alive(),
            won: self.won,
            food: self.food,
            bonus_food: self.bonus.food(),
            bonus_remaining_secs: self.bonus.remaining_secs(),
            score: self.score,
            speed: self.snake.speed(),
            ticks_per_second: self.ticks_per_second,
            run_state: self.run_state,
        }
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Coords {
        self.food
    }

    pub fn bonus(&self) -> &BonusState {
        &self.bonus
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn food_placed_count(&self) -> u32 {
        self.food_placed_count
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// The game can no longer change: snake dead, grid full, or stopping.
    pub fn is_over(&self) -> bool {
        !self.snake.is_alive() || self.won || self.run_state != RunState::Running
    }

    pub(crate) fn bonus_mut(&mut self) -> &mut BonusState {
        &mut self.bonus
    }

    pub(crate) fn set_run_state(&mut self, run_state: RunState) {
        self.run_state = run_state;
    }

    pub(crate) fn set_ticks_per_second(&mut self, ticks: u32) {
        self.ticks_per_second = ticks;
    }

    ///////////////////////////////////////////////////////////////////////////

    fn eat_food(&mut self, report: &mut TickReport) -> Result<(), GameError> {
        self.score += 1;
        report.ate_food = true;

        match self.placer.place_food(&self.snake) {
            Ok(cell) => {
                self.food = cell;
                self.food_placed_count += 1;
            }
            Err(GameError::GridExhausted) => {
                info!(score = self.score, "No free cell left for food, run won");
                self.won = true;
                report.grid_full = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        debug!(score = self.score, food = ?self.food, "Food eaten");

        if self.food_placed_count % self.bonus_every == 0 && !self.bonus.is_active() {
            match self.placer.place_bonus_food(&self.snake, self.food) {
                Ok(cell) => {
                    let epoch = self.bonus.activate(cell, self.bonus_duration_secs);
                    info!(epoch, cell = ?cell, "Bonus food placed");
                    report.bonus_started = Some(epoch);
                }
                Err(GameError::GridExhausted) => debug!("No room for bonus food"),
                Err(e) => return Err(e),
            }
        }

        self.snake.grow_body();
        self.snake.set_speed(self.snake.speed() + self.speed_increment)
    }
}

#[cfg(test)]
impl GameState {
    pub(crate) fn put_food_at(&mut self, cell: Coords) {
        self.food = cell;
    }

    pub(crate) fn put_bonus_at(&mut self, cell: Coords) {
        self.bonus.move_to(cell);
    }

    pub(crate) fn set_food_placed_count(&mut self, count: u32) {
        self.food_placed_count = count;
    }

    pub(crate) fn snake_mut(&mut self) -> &mut Snake {
        &mut self.snake
    }
}
