//! The engine's message surfaces: prompts out, responses in, broadcasts out,
//! private information out.

use std::sync::Arc;

use crate::action::ActionResult;
use crate::channel::MessageChannel;
use crate::engine::state::GamePhase;
use crate::player::{PlayerId, PlayerState};
use crate::vote::VoteResult;

/// One selectable ability in an ability prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityOption {
    /// Ability name; echoed back in the response
    pub name: String,
    /// Description shown to the player
    pub description: String,
}

/// Request for one player to pick an ability and a target.
#[derive(Debug, Clone)]
pub struct AbilityPrompt {
    /// Who is prompted
    pub player: PlayerId,
    /// The abilities they may use
    pub options: Vec<AbilityOption>,
    /// Valid targets
    pub targets: Vec<PlayerId>,
}

/// Request for one player to cast an elimination vote.
#[derive(Debug, Clone)]
pub struct VotePrompt {
    /// Who is prompted
    pub player: PlayerId,
    /// Valid targets
    pub options: Vec<PlayerId>,
}

/// Engine-to-player request.
#[derive(Debug, Clone)]
pub enum Prompt {
    /// Pick an ability and a target
    Ability(AbilityPrompt),
    /// Cast a vote
    Vote(VotePrompt),
}

/// A player's answer to an ability prompt.
#[derive(Debug, Clone)]
pub struct AbilityResponse {
    /// The responding player
    pub source: PlayerId,
    /// Chosen ability name
    pub ability: String,
    /// Chosen target
    pub target: PlayerId,
}

/// A player's answer to a vote prompt.
#[derive(Debug, Clone, Copy)]
pub struct VoteResponse {
    /// The responding player
    pub source: PlayerId,
    /// Chosen target
    pub target: PlayerId,
}

/// Player-to-engine answer.
#[derive(Debug, Clone)]
pub enum PromptResponse {
    /// Answer to an ability prompt
    Ability(AbilityResponse),
    /// Answer to a vote prompt
    Vote(VoteResponse),
}

/// One kill or save announced at dawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightEvent {
    /// What happened to the player
    pub outcome: PlayerState,
    /// Who it happened to
    pub player: PlayerId,
}

/// One disclosed role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleReveal {
    /// Whose role is disclosed
    pub player: PlayerId,
    /// Primary role name
    pub role: String,
    /// Secondary role name, if any
    pub secondary_role: Option<String>,
}

/// Broadcast to spectators and clients.
#[derive(Debug, Clone)]
pub enum GameUpdate {
    /// The phase advanced
    PhaseChanged {
        /// Previous phase; `None` on the initial transition
        from: Option<GamePhase>,
        /// New phase
        to: GamePhase,
    },
    /// Countdown tick
    TimeRemaining {
        /// Which countdown
        label: &'static str,
        /// Seconds left
        seconds: u64,
    },
    /// Dawn announcement of the night's kills and saves
    NightResolution(Vec<NightEvent>),
    /// Role disclosures, possibly empty under secrecy rules
    RoleReveal(Vec<RoleReveal>),
    /// Outcome of a voting phase
    VotingResult(VoteResult),
    /// Alive roster snapshot at the start of a new round
    PlayersRemaining(Vec<PlayerId>),
    /// Terminal outcome
    GameEnded {
        /// Winning side
        winner: String,
    },
}

/// Immediate ability result delivered to one player only.
#[derive(Debug, Clone)]
pub struct Information {
    /// The recipient
    pub player: PlayerId,
    /// What their ability found
    pub result: ActionResult,
}

/// The four channels a match communicates over. Shared by handle; the
/// engine, the night dispatcher, and the host all hold clones.
#[derive(Debug, Clone, Default)]
pub struct GameChannels {
    /// Engine → player requests
    pub prompts: Arc<MessageChannel<Prompt>>,
    /// Player → engine answers
    pub responses: Arc<MessageChannel<PromptResponse>>,
    /// Engine → everyone broadcasts
    pub updates: Arc<MessageChannel<GameUpdate>>,
    /// Engine → one player private results
    pub information: Arc<MessageChannel<Information>>,
}

impl GameChannels {
    /// Creates a fresh set of empty channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
