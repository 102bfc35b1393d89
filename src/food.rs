use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::GameError;
use crate::snake::Snake;
use crate::{Coords, GridInt};

/// Random sampling tries this many times per grid cell before falling back to
/// enumerating the free cells.
const ATTEMPTS_PER_CELL: usize = 4;

/// Picks free cells for food.
#[derive(Debug)]
pub struct FoodPlacer {
    width: GridInt,
    height: GridInt,
    rng: StdRng,
}

impl FoodPlacer {
    pub fn new(width: GridInt, height: GridInt) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    pub fn with_rng(width: GridInt, height: GridInt, rng: StdRng) -> Self {
        FoodPlacer { width, height, rng }
    }

    /// A random cell not covered by the snake.
    pub fn place_food(&mut self, snake: &Snake) -> Result<Coords, GameError> {
        self.sample(|cell| !snake.snake_cell(cell))
    }

    /// A random cell not covered by the snake nor by the normal food.
    pub fn place_bonus_food(&mut self, snake: &Snake, food: Coords) -> Result<Coords, GameError> {
        self.sample(|cell| cell != food && !snake.snake_cell(cell))
    }

    fn sample(&mut self, is_free: impl Fn(Coords) -> bool) -> Result<Coords, GameError> {
        let cells = self.width as usize * self.height as usize;

        for _ in 0..cells * ATTEMPTS_PER_CELL {
            let cell = (self.rng.gen_range(0..self.width), self.rng.gen_range(0..self.height));
            if is_free(cell) {
                return Ok(cell);
            }
        }

        debug!("Rejection sampling gave up, scanning {} cells", cells);
        let (width, height) = (self.width, self.height);
        let choices: Vec<Coords> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .filter(|cell| is_free(*cell))
            .collect();

        choices.choose(&mut self.rng).copied().ok_or(GameError::GridExhausted)
    }
}
