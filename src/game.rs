use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::bonus::BonusTimer;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::snake::Direction;
use crate::state::{GameState, RunState, SharedState, Snapshot};

/// Draws snapshots of a running game.
pub trait Renderer: Send + 'static {
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Receives the final score of a run, once.
pub trait ScoreSink {
    fn record_final_score(&mut self, score: u32);
}

impl<F: FnMut(u32)> ScoreSink for F {
    fn record_final_score(&mut self, score: u32) {
        self(score)
    }
}

/// Cheap handle for input and render collaborators.
#[derive(Clone)]
pub struct GameHandle {
    state: SharedState,
}

impl GameHandle {
    pub async fn set_direction(&self, direction: Direction) {
        self.state.lock().await.set_direction(direction);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }
}

/// A running game: the simulation task, an optional render task and any live
/// bonus timer, all sharing one [`GameState`].
///
/// Dropping a `Game` without calling [`Game::stop`] still signals every task
/// to stop, but nobody waits for them.
pub struct Game {
    state: SharedState,
    shutdown: DropGuard,
    simulation: JoinHandle<Result<(), GameError>>,
    render: Option<JoinHandle<()>>,
}

impl Game {
    /// Starts a fresh game. Must be called from within a tokio runtime.
    pub fn start(config: GameConfig, renderer: Option<Box<dyn Renderer>>) -> Result<Self, GameError> {
        let state = GameState::new(&config)?;
        Ok(Self::start_with_state(config, state, renderer))
    }

    pub fn start_with_state(
        config: GameConfig,
        state: GameState,
        renderer: Option<Box<dyn Renderer>>,
    ) -> Self {
        info!(
            width = config.grid_width,
            height = config.grid_height,
            tick_ms = config.tick_duration.as_millis() as u64,
            "Starting game"
        );

        let state: SharedState = Arc::new(Mutex::new(state));
        let shutdown = CancellationToken::new();

        let simulation = tokio::spawn(run_simulation(state.clone(), config.clone(), shutdown.clone()));
        let render = renderer.map(|renderer| {
            tokio::spawn(run_renderer(state.clone(), renderer, config.render_interval, shutdown.clone()))
        });

        Game { state, shutdown: shutdown.drop_guard(), simulation, render }
    }

    pub fn handle(&self) -> GameHandle {
        GameHandle { state: self.state.clone() }
    }

    /// Stops every task, waits for all of them, then hands the final score to
    /// `sink`.
    pub async fn stop(self, sink: &mut dyn ScoreSink) -> Result<u32, GameError> {
        let Game { state, shutdown, simulation, render } = self;

        state.lock().await.set_run_state(RunState::Stopping);
        info!("Stopping game");
        shutdown.disarm().cancel();

        let simulation = simulation.await;
        let render = match render {
            Some(handle) => handle.await,
            None => Ok(()),
        };
        simulation??;
        render?;

        let score = {
            let mut state = state.lock().await;
            state.set_run_state(RunState::Stopped);
            state.score()
        };
        info!(score, "Game stopped");

        sink.record_final_score(score);
        Ok(score)
    }
}

async fn run_simulation(
    state: SharedState,
    config: GameConfig,
    shutdown: CancellationToken,
) -> Result<(), GameError> {
    let mut interval = time::interval(config.tick_duration);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut timers: Vec<BonusTimer> = Vec::new();
    let mut ticks = 0u32;
    let mut rate_window = Instant::now();

    let result = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("Simulation loop shutting down");
                break Ok(());
            }

            _ = interval.tick() => {
                let report = {
                    let mut state = state.lock().await;
                    let report = state.tick();

                    ticks += 1;
                    if rate_window.elapsed() >= Duration::from_secs(1) {
                        state.set_ticks_per_second(ticks);
                        ticks = 0;
                        rate_window = Instant::now();
                    }
                    report
                };

                let report = match report {
                    Ok(report) => report,
                    Err(e) => {
                        error!("Simulation tick failed: {}", e);
                        break Err(e);
                    }
                };

                if let Some(epoch) = report.bonus_started {
                    timers.retain(|timer| !timer.is_finished());
                    timers.push(BonusTimer::spawn(
                        state.clone(),
                        epoch,
                        config.bonus_duration,
                        config.bonus_poll_interval,
                        &shutdown,
                    ));
                }

                if let Some(epoch) = report.bonus_consumed {
                    for timer in timers.iter().filter(|timer| timer.epoch() == epoch) {
                        timer.cancel();
                    }
                }
            }
        }
    };

    for timer in timers {
        timer.cancel();
        let outcome = timer.join().await?;
        debug!(?outcome, "Bonus timer joined");
    }

    result
}

async fn run_renderer(
    state: SharedState,
    mut renderer: Box<dyn Renderer>,
    render_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = time::interval(render_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("Render loop shutting down");
                break;
            }

            _ = interval.tick() => {
                let snapshot = state.lock().await.snapshot();
                if let Err(e) = renderer.render(&snapshot) {
                    warn!("Failed to render frame: {:#}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::BonusOutcome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// One tick per second keeps the simulation predictable under paused time.
    fn slow_config() -> GameConfig {
        GameConfig {
            grid_width: 20,
            grid_height: 20,
            initial_speed: 1.0,
            tick_duration: Duration::from_secs(1),
            ..GameConfig::default()
        }
    }

    /// Food right above the head, one pickup away from a bonus.
    fn state_before_bonus(config: &GameConfig) -> GameState {
        let mut state = GameState::with_rng(config, StdRng::seed_from_u64(9)).unwrap();
        state.set_food_placed_count(3);
        state.put_food_at((10, 9));
        state
    }

    #[tokio::test(start_paused = true)]
    async fn bonus_expires_without_changing_the_score() {
        let config = GameConfig { tick_duration: Duration::from_secs(3600), ..slow_config() };
        let game = Game::start_with_state(config.clone(), state_before_bonus(&config), None);
        let handle = game.handle();

        time::sleep(Duration::from_millis(10)).await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.score, 1);
        assert!(snapshot.bonus_food.is_some());
        assert_eq!(snapshot.bonus_remaining_secs, 6);

        time::sleep(Duration::from_secs(7)).await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.bonus_food, None);
        assert_eq!(snapshot.score, 1);

        let mut reported = Vec::new();
        let score = game.stop(&mut |score: u32| reported.push(score)).await.unwrap();
        assert_eq!(score, 1);
        assert_eq!(reported, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn eating_the_bonus_pays_and_ends_the_timer() {
        let config = slow_config();
        let game = Game::start_with_state(config.clone(), state_before_bonus(&config), None);
        let handle = game.handle();

        // first tick at t=0 eats the food and spawns the bonus
        time::sleep(Duration::from_millis(500)).await;
        {
            let mut state = game.state.lock().await;
            assert!(state.bonus().is_active());
            let mut probe = state.snake().clone();
            probe.update();
            state.put_food_at((0, 0));
            state.put_bonus_at(probe.head_cell());
        }

        // second tick at t=1s lands on the bonus with 6s left on the clock
        time::sleep(Duration::from_secs(1)).await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.score, 1 + 2 + 6);
        assert_eq!(snapshot.bonus_food, None);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().await.bonus_food, None);

        assert_eq!(game.stop(&mut |_: u32| {}).await.unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_joins_a_live_bonus_timer() {
        let config = GameConfig { tick_duration: Duration::from_secs(3600), ..slow_config() };
        let game = Game::start_with_state(config.clone(), state_before_bonus(&config), None);
        let state = game.state.clone();

        time::sleep(Duration::from_millis(10)).await;
        assert!(state.lock().await.bonus().is_active());

        let before = Instant::now();
        game.stop(&mut |_: u32| {}).await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(800));

        let state = state.lock().await;
        assert_eq!(state.run_state(), RunState::Stopped);
        // shut down before expiring
        assert!(state.bonus().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_outcome_is_consumed_after_pickup() {
        let config = slow_config();
        let state: SharedState = Arc::new(Mutex::new(state_before_bonus(&config)));
        let epoch = state.lock().await.tick().unwrap().bonus_started.unwrap();

        let shutdown = CancellationToken::new();
        let timer = BonusTimer::spawn(
            state.clone(),
            epoch,
            config.bonus_duration,
            config.bonus_poll_interval,
            &shutdown,
        );

        {
            let mut state = state.lock().await;
            let mut probe = state.snake().clone();
            probe.update();
            state.put_food_at((0, 0));
            state.put_bonus_at(probe.head_cell());
            assert_eq!(state.tick().unwrap().bonus_consumed, Some(epoch));
        }
        timer.cancel();

        assert_eq!(timer.join().await.unwrap(), BonusOutcome::Consumed);
    }

    #[tokio::test(start_paused = true)]
    async fn direction_changes_reach_the_snake() {
        let config = GameConfig { tick_duration: Duration::from_secs(3600), ..slow_config() };
        let game = Game::start_with_state(config.clone(), state_before_bonus(&config), None);
        let handle = game.handle();

        handle.set_direction(Direction::Down).await;
        assert_eq!(handle.snapshot().await.direction, Direction::Up);
        handle.set_direction(Direction::Left).await;
        assert_eq!(handle.snapshot().await.direction, Direction::Left);

        game.stop(&mut |_: u32| {}).await.unwrap();
    }
}
