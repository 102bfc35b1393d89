use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::GameError;
use crate::state::SharedState;
use crate::Coords;

/// Bonus food fields of the game state.
///
/// Every activation bumps `epoch`, so a timer started for an earlier bonus can
/// tell that the bonus it was counting down is gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BonusState {
    food: Option<Coords>,
    remaining_secs: u32,
    active: bool,
    epoch: u64,
}

impl BonusState {
    pub fn food(&self) -> Option<Coords> {
        self.food
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.active && self.epoch == epoch
    }

    pub(crate) fn activate(&mut self, cell: Coords, duration_secs: u32) -> u64 {
        self.epoch += 1;
        self.food = Some(cell);
        self.remaining_secs = duration_secs;
        self.active = true;
        self.epoch
    }

    pub(crate) fn publish_remaining(&mut self, secs: u32) {
        self.remaining_secs = secs;
    }

    pub(crate) fn expire(&mut self) {
        self.active = false;
        self.food = None;
    }

    /// Deactivates the bonus and returns the seconds that were left on it.
    pub(crate) fn consume(&mut self) -> u32 {
        self.expire();
        self.remaining_secs
    }

    #[cfg(test)]
    pub(crate) fn move_to(&mut self, cell: Coords) {
        if self.active {
            self.food = Some(cell);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BonusOutcome {
    /// The countdown ran out and cleared the bonus food.
    Expired,
    /// The bonus was eaten (or replaced) before the countdown ran out.
    Consumed,
    /// The game shut down while the bonus was still up.
    Cancelled,
}

/// Countdown task for one bonus activation.
pub struct BonusTimer {
    epoch: u64,
    token: CancellationToken,
    handle: JoinHandle<BonusOutcome>,
}

impl BonusTimer {
    /// Spawns the countdown for the bonus activated with `epoch`. The timer
    /// stops early when `shutdown` is cancelled.
    pub fn spawn(
        state: SharedState,
        epoch: u64,
        duration: Duration,
        poll_interval: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        let token = shutdown.child_token();
        let handle = tokio::spawn(countdown(state, epoch, duration, poll_interval, token.clone()));
        BonusTimer { epoch, token, handle }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Wakes the timer so it re-reads the state and exits.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<BonusOutcome, GameError> {
        Ok(self.handle.await?)
    }
}

async fn countdown(
    state: SharedState,
    epoch: u64,
    duration: Duration,
    poll_interval: Duration,
    token: CancellationToken,
) -> BonusOutcome {
    let started = Instant::now();
    debug!(epoch, "Bonus timer started");

    loop {
        let elapsed = started.elapsed();
        {
            let mut state = state.lock().await;
            let bonus = state.bonus_mut();

            if !bonus.is_current(epoch) {
                debug!(epoch, "Bonus timer found its bonus gone");
                return BonusOutcome::Consumed;
            }
            if elapsed >= duration {
                bonus.expire();
                info!(epoch, "Bonus food expired");
                return BonusOutcome::Expired;
            }
            bonus.publish_remaining(remaining_secs(duration, elapsed));
        }

        let wait = poll_interval.min(duration - elapsed);
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                let state = state.lock().await;
                return if state.bonus().is_current(epoch) {
                    debug!(epoch, "Bonus timer cancelled");
                    BonusOutcome::Cancelled
                } else {
                    BonusOutcome::Consumed
                };
            }

            _ = sleep(wait) => {}
        }
    }
}

fn remaining_secs(duration: Duration, elapsed: Duration) -> u32 {
    duration.as_secs().saturating_sub(elapsed.as_secs()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::state::GameState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const DURATION: Duration = Duration::from_secs(6);
    const POLL: Duration = Duration::from_millis(800);

    fn shared_state() -> SharedState {
        let config = GameConfig { grid_width: 10, grid_height: 10, ..GameConfig::default() };
        let state = GameState::with_rng(&config, StdRng::seed_from_u64(3)).unwrap();
        Arc::new(Mutex::new(state))
    }

    async fn activate(state: &SharedState) -> u64 {
        state.lock().await.bonus_mut().activate((0, 0), DURATION.as_secs() as u32)
    }

    #[test]
    fn remaining_counts_down_in_whole_seconds() {
        assert_eq!(remaining_secs(DURATION, Duration::ZERO), 6);
        assert_eq!(remaining_secs(DURATION, Duration::from_millis(800)), 6);
        assert_eq!(remaining_secs(DURATION, Duration::from_millis(5900)), 1);
        assert_eq!(remaining_secs(DURATION, Duration::from_secs(9)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_duration() {
        let state = shared_state();
        let epoch = activate(&state).await;
        let shutdown = CancellationToken::new();
        let timer = BonusTimer::spawn(state.clone(), epoch, DURATION, POLL, &shutdown);

        sleep(Duration::from_millis(2500)).await;
        {
            let state = state.lock().await;
            assert!(state.bonus().is_active());
            assert_eq!(state.bonus().remaining_secs(), 4);
        }

        assert_eq!(timer.join().await.unwrap(), BonusOutcome::Expired);
        let state = state.lock().await;
        assert!(!state.bonus().is_active());
        assert_eq!(state.bonus().food(), None);
        assert_eq!(state.score(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_without_touching_state_once_consumed() {
        let state = shared_state();
        let epoch = activate(&state).await;
        let shutdown = CancellationToken::new();
        let timer = BonusTimer::spawn(state.clone(), epoch, DURATION, POLL, &shutdown);

        sleep(Duration::from_secs(1)).await;
        let left = state.lock().await.bonus_mut().consume();
        assert_eq!(left, 6);
        timer.cancel();

        assert_eq!(timer.join().await.unwrap(), BonusOutcome::Consumed);
        assert_eq!(state.lock().await.bonus().food(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_leaves_a_newer_bonus_alone() {
        let state = shared_state();
        let first = activate(&state).await;
        let shutdown = CancellationToken::new();
        let timer = BonusTimer::spawn(state.clone(), first, DURATION, POLL, &shutdown);

        // Eaten and replaced before the first timer wakes up again
        state.lock().await.bonus_mut().consume();
        let second = activate(&state).await;

        assert_eq!(timer.join().await.unwrap(), BonusOutcome::Consumed);
        let state = state.lock().await;
        assert!(state.bonus().is_current(second));
        assert_eq!(state.bonus().food(), Some((0, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_promptly() {
        let state = shared_state();
        let epoch = activate(&state).await;
        let shutdown = CancellationToken::new();
        let timer = BonusTimer::spawn(state.clone(), epoch, DURATION, POLL, &shutdown);

        sleep(Duration::from_millis(100)).await;
        let before = Instant::now();
        shutdown.cancel();

        assert_eq!(timer.join().await.unwrap(), BonusOutcome::Cancelled);
        assert!(before.elapsed() < POLL);
        assert!(state.lock().await.bonus().is_active());
    }
}
