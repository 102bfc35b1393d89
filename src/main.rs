mod term;

use std::fs::File;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use snake::{Game, GameConfig, Snapshot};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::term::{Input, TermManager, TermRenderer, BORDER, STATUS_LINES};

const INPUT_POLL_MS: u64 = 50;
const GAME_OVER_CHECK_MS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let mut term = TermManager::new()?;
    let config = fit_to_terminal(GameConfig::from_env()?, term.terminal_size())?;

    term.setup()?;
    let result = play(&mut term, config).await;
    term.restore()?;

    if let Some(score) = result? {
        println!("Final score: {}", score);
    }
    Ok(())
}

/// Logs go to the file named by `SNAKE_LOG`, since the terminal is taken by
/// the game.
fn init_logging() -> Result<()> {
    let path = match std::env::var("SNAKE_LOG") {
        Ok(path) => path,
        Err(_) => return Ok(()),
    };
    let file = File::create(&path).with_context(|| format!("Failed to create log file {}", path))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn fit_to_terminal(mut config: GameConfig, (width, height): (u16, u16)) -> Result<GameConfig> {
    let max_width = width.saturating_sub(BORDER);
    let max_height = height.saturating_sub(BORDER + STATUS_LINES);
    if max_width == 0 || max_height == 0 {
        bail!("Terminal of {}x{} is too small to play", width, height);
    }

    config.grid_width = config.grid_width.min(max_width);
    config.grid_height = config.grid_height.min(max_height);
    Ok(config)
}

/// Runs one game. Returns `None` if the player quit from the intro screen.
async fn play(term: &mut TermManager, config: GameConfig) -> Result<Option<u32>> {
    term.show_message(&[
        "Arrow keys or WASD to move",
        "Esc, q or CTRL+C to quit",
        "",
        "Press any key to begin"
    ])?;

    if term::is_ctrl_c(&term.read_key_blocking()?) {
        return Ok(None);
    }

    let game = Game::start(config, Some(Box::new(TermRenderer::new())))?;
    let handle = game.handle();

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let input_stop = CancellationToken::new();
    let input = spawn_input(input_tx, input_stop.clone());

    let mut game_over_check = time::interval(Duration::from_millis(GAME_OVER_CHECK_MS));
    loop {
        tokio::select! {
            event = input_rx.recv() => match event {
                Some(Input::Turn(direction)) => handle.set_direction(direction).await,
                Some(Input::Other) => {}
                Some(Input::Quit) | None => break,
            },

            _ = game_over_check.tick() => {
                let snapshot = handle.snapshot().await;
                if !snapshot.alive || snapshot.won {
                    break;
                }
            }
        }
    }

    let snapshot = handle.snapshot().await;
    let score = game
        .stop(&mut |score: u32| info!(score, "Final score reported"))
        .await?;

    term.show_message(&[
        game_over_title(&snapshot),
        &*format!("Score: {}", score),
        "",
        "Press any key to exit"
    ])?;
    input_rx.recv().await;

    input_stop.cancel();
    input.await.context("Input thread panicked")??;
    Ok(Some(score))
}

fn game_over_title(snapshot: &Snapshot) -> &'static str {
    if snapshot.won {
        "You won!"
    } else if snapshot.alive {
        "Game stopped"
    } else {
        "Game over!"
    }
}

/// Reads keys on a blocking thread until `stop` is cancelled or the receiver
/// goes away.
fn spawn_input(tx: mpsc::UnboundedSender<Input>, stop: CancellationToken) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || {
        while !stop.is_cancelled() {
            if let Some(input) = term::poll_input(Duration::from_millis(INPUT_POLL_MS))? {
                if tx.send(input).is_err() {
                    break;
                }
            }
        }
        Ok(())
    })
}
