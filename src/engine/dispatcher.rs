//! Phase dispatchers.
//!
//! The night dispatcher listens for ability responses concurrently with the
//! night countdown, so an immediate-result ability (an investigation) can be
//! answered the moment it arrives without stalling the timer. Day resolution
//! and vote collection are synchronous drains and live here as well.

use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::channels::{AbilityResponse, GameChannels, Information, PromptResponse};
use crate::error::NocturneError;
use crate::player::{PlayerId, Roster};
use crate::vote::PlayerVote;

/// Callback resolving an immediate-result response into a private message.
pub type ImmediateResolver =
    Arc<dyn Fn(&AbilityResponse) -> Result<Information, NocturneError> + Send + Sync>;

struct DispatcherInner {
    channels: GameChannels,
    roster: Arc<Mutex<Roster>>,
    responded: DashSet<PlayerId>,
    deferred: Mutex<Vec<AbilityResponse>>,
    resolver: ImmediateResolver,
}

impl DispatcherInner {
    fn handle(&self, response: PromptResponse) {
        let PromptResponse::Ability(response) = response else {
            return;
        };

        // First response per player wins; later submissions are dropped.
        if !self.responded.insert(response.source) {
            debug!(player = %response.source, "duplicate night response ignored");
            return;
        }

        let immediate = {
            let roster = self
                .roster
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            roster
                .get(response.source)
                .ok()
                .and_then(|p| p.role())
                .and_then(|r| r.find_ability(&response.ability))
                .map(|a| a.immediate_result)
        };

        let Some(immediate) = immediate else {
            warn!(
                player = %response.source,
                ability = %response.ability,
                "response names an ability the player does not have"
            );
            return;
        };

        if immediate {
            match (self.resolver)(&response) {
                Ok(information) => self.channels.information.send(information),
                Err(error) => warn!(
                    player = %response.source,
                    ability = %response.ability,
                    %error,
                    "immediate ability resolution failed"
                ),
            }
        } else {
            self.deferred
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(response);
        }
    }
}

/// Collects night responses on a background task until stopped.
pub struct NightDispatcher {
    inner: Arc<DispatcherInner>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl NightDispatcher {
    /// Creates a dispatcher for one night phase.
    #[must_use]
    pub fn new(
        channels: GameChannels,
        roster: Arc<Mutex<Roster>>,
        resolver: ImmediateResolver,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                channels,
                roster,
                responded: DashSet::new(),
                deferred: Mutex::new(Vec::new()),
                resolver,
            }),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawns the listener task.
    pub fn start(&mut self) {
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    response = inner.channels.responses.recv() => inner.handle(response),
                }
            }
        }));
    }

    /// Stops the listener and waits for it to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// The deferred responses collected this night, in arrival order.
    #[must_use]
    pub fn drain_deferred(&self) -> Vec<AbilityResponse> {
        self.inner
            .deferred
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

/// Drains queued responses into votes at the end of the voting countdown.
/// Non-vote responses are discarded.
#[must_use]
pub fn drain_votes(channels: &GameChannels) -> Vec<PlayerVote> {
    channels
        .responses
        .drain()
        .into_iter()
        .filter_map(|response| match response {
            PromptResponse::Vote(vote) => Some(PlayerVote {
                voter: vote.source,
                target: vote.target,
            }),
            PromptResponse::Ability(_) => None,
        })
        .collect()
}
