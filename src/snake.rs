use std::collections::VecDeque;

use crate::error::GameError;
use crate::{Coords, GridInt};
use Direction::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Up => Down,
            Down => Up,
            Left => Right,
            Right => Left,
        }
    }
}

/// A snake moving over a toroidal grid.
///
/// The head moves continuously (`speed` cells per update) while the body is a
/// list of whole cells, oldest first. The body only shifts when the head
/// crosses into a new cell.
#[derive(Clone, Debug)]
pub struct Snake {
    head: (f32, f32),
    direction: Direction,
    speed: f32,
    size: usize,
    alive: bool,
    growing: bool,
    body: VecDeque<Coords>,
    grid_width: GridInt,
    grid_height: GridInt,
}

impl Snake {
    /// Creates a snake of size 1 in the center of the grid, heading up.
    pub fn new(grid_width: GridInt, grid_height: GridInt, speed: f32) -> Result<Self, GameError> {
        if !(speed > 0.0) {
            return Err(GameError::InvalidSpeed(speed));
        }

        let head = (f32::from(grid_width / 2), f32::from(grid_height / 2));
        Ok(Snake {
            head,
            direction: Up,
            speed,
            size: 1,
            alive: true,
            growing: false,
            body: VecDeque::new(),
            grid_width,
            grid_height,
        })
    }

    /// Advances the head by one step. No-op once the snake is dead.
    pub fn update(&mut self) {
        if !self.alive {
            return;
        }

        let prev_cell = self.head_cell();
        self.move_head();
        let new_cell = self.head_cell();

        if new_cell != prev_cell {
            self.move_body(prev_cell, new_cell);
        }
    }

    pub fn grow_body(&mut self) {
        self.growing = true;
    }

    /// Turning straight back onto the body is ignored.
    pub fn set_direction(&mut self, new_direction: Direction) {
        if new_direction != self.direction.opposite() {
            self.direction = new_direction;
        }
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), GameError> {
        if !(speed > 0.0) {
            return Err(GameError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    pub fn snake_cell(&self, cell: Coords) -> bool {
        self.head_cell() == cell || self.body.contains(&cell)
    }

    pub fn head(&self) -> (f32, f32) {
        self.head
    }

    pub fn head_cell(&self) -> Coords {
        (self.head.0 as GridInt, self.head.1 as GridInt)
    }

    pub fn body(&self) -> &VecDeque<Coords> {
        &self.body
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    ///////////////////////////////////////////////////////////////////////////

    fn move_head(&mut self) {
        let (dx, dy) = match self.direction {
            Up => (0.0, -self.speed),
            Down => (0.0, self.speed),
            Left => (-self.speed, 0.0),
            Right => (self.speed, 0.0),
        };

        self.head.0 = wrap(self.head.0 + dx, self.grid_width);
        self.head.1 = wrap(self.head.1 + dy, self.grid_height);
    }

    fn move_body(&mut self, prev_cell: Coords, new_cell: Coords) {
        self.body.push_back(prev_cell);

        if self.growing {
            self.growing = false;
            self.size += 1;
        } else {
            self.body.pop_front();
        }

        if self.body.contains(&new_cell) {
            self.alive = false;
        }
    }
}

fn wrap(pos: f32, dim: GridInt) -> f32 {
    let dim = f32::from(dim);
    let wrapped = pos.rem_euclid(dim);
    // rem_euclid rounds up to `dim` for tiny negative inputs
    if wrapped >= dim { 0.0 } else { wrapped }
}
