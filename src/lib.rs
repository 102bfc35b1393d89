//! Snake on a wrapping grid, driven by a simulation task, a render task and
//! a countdown task for the bonus food, all sharing one locked game state.

pub mod bonus;
pub mod config;
pub mod error;
pub mod food;
pub mod game;
pub mod snake;
pub mod state;

pub type GridInt = u16;
pub type Coords = (GridInt, GridInt);

pub use config::GameConfig;
pub use error::GameError;
pub use game::{Game, GameHandle, Renderer, ScoreSink};
pub use snake::Direction;
pub use state::{RunState, Snapshot};
