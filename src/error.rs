use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("speed must be positive, got {0}")]
    InvalidSpeed(f32),

    #[error("no free cell left on the grid")]
    GridExhausted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("background task failed during shutdown: {0}")]
    Shutdown(#[from] tokio::task::JoinError),
}
