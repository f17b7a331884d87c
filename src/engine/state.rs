//! Match lifecycle state and phase tracking.
//!
//! Lifecycle ([`GameState`]) and phase-of-day ([`GamePhase`]) are separate:
//! the lifecycle says whether the loop runs at all, the phase says which
//! handler runs next. Pause is a lifecycle state the loop blocks on at the
//! top of each iteration.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::info;

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Created, not yet started
    Waiting,
    /// Distributing roles
    Loading,
    /// Roles dealt, about to enter the first night
    Starting,
    /// Phase loop running
    Ongoing,
    /// Loop blocked until resumed
    Paused,
    /// Terminal
    Ended,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Loading => "loading",
            Self::Starting => "starting",
            Self::Ongoing => "ongoing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Phase of the day/night cycle while the match is ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Night actions are collected
    Night,
    /// Night actions are resolved and announced
    Day,
    /// Open discussion before the vote
    Discussion,
    /// Elimination vote
    Voting,
}

impl GamePhase {
    /// Lowercase name used in logs and the game store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Day => "day",
            Self::Discussion => "discussion",
            Self::Voting => "voting",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared lifecycle handle. Other tasks pause, resume, or stop the match
/// through this; the engine loop observes it at the top of each iteration.
#[derive(Debug)]
pub struct GameControl {
    state: Mutex<GameState>,
    changed: Notify,
}

impl Default for GameControl {
    fn default() -> Self {
        Self::new()
    }
}

impl GameControl {
    /// Creates a control in the waiting state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GameState::Waiting),
            changed: Notify::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GameState {
        *self.lock()
    }

    /// Moves to a new lifecycle state. The engine uses this for its own
    /// transitions; external callers use `pause`/`resume`/`stop`.
    pub fn set(&self, state: GameState) {
        let mut guard = self.lock();
        if *guard != state {
            info!(from = %*guard, to = %state, "game state");
            *guard = state;
        }
        drop(guard);
        self.changed.notify_waiters();
    }

    /// Pauses an active match. No effect once ended.
    pub fn pause(&self) {
        let mut guard = self.lock();
        if *guard != GameState::Ended {
            *guard = GameState::Paused;
        }
    }

    /// Resumes a paused match.
    pub fn resume(&self) {
        {
            let mut guard = self.lock();
            if *guard == GameState::Paused {
                *guard = GameState::Ongoing;
            }
        }
        self.changed.notify_waiters();
    }

    /// Ends the match; observed at the top of the loop.
    pub fn stop(&self) {
        *self.lock() = GameState::Ended;
        self.changed.notify_waiters();
    }

    /// Whether the match has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state() == GameState::Ended
    }

    /// Blocks while the match is paused.
    pub async fn wait_if_paused(&self) {
        while self.state() == GameState::Paused {
            self.changed.notified().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
