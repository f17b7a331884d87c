//! Players and the roster.
//!
//! A player is a typed struct plus a small side store for the flags the
//! engine sets dynamically during resolution (`killed`, `votedOut`,
//! `takendown`, the `killer` list, the `soulmate` back-reference).
//! [`Player::properties`] projects both into one evaluation store, and
//! [`Roster::game_entries`] projects the whole roster as the `players` list
//! formulas iterate over.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::ActionResult;
use crate::error::EngineError;
use crate::property::{PropertySource, PropertyStore, Value};
use crate::role::{ActionKind, Alignment, Role};

/// Roster index of a player. Stable for the whole match; dead players stay
/// in the roster and are filtered by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub usize);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a player within one resolution cycle.
///
/// `Saved` and `Killed` are transient dawn states; the day handler settles
/// them to `Alive` or `Dead` after announcing the night's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// Alive and acting
    Alive,
    /// Was attacked this cycle but healed
    Saved,
    /// Killed this cycle, not yet settled to dead
    Killed,
    /// Out of the game
    Dead,
}

impl PlayerState {
    /// Uppercase string form used by `is` comparisons in rule formulas.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "ALIVE",
            Self::Saved => "SAVED",
            Self::Killed => "KILLED",
            Self::Dead => "DEAD",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant in the match.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    name: String,
    state: PlayerState,
    role: Option<Arc<Role>>,
    secondary_role: Option<Arc<Role>>,
    alignment: Option<Alignment>,
    attempted: HashMap<ActionKind, u32>,
    results: Vec<ActionResult>,
    flags: PropertyStore,
    soulmate: Option<PlayerId>,
}

impl Player {
    /// Creates an alive player with no role assigned yet.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: PlayerState::Alive,
            role: None,
            secondary_role: None,
            alignment: None,
            attempted: HashMap::new(),
            results: Vec::new(),
            flags: PropertyStore::new("flags"),
            soulmate: None,
        }
    }

    /// Roster id.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PlayerState {
        self.state
    }

    /// Sets the lifecycle state. Only resolution code calls this; phase
    /// advance never touches player state directly.
    pub fn set_state(&mut self, state: PlayerState) {
        self.state = state;
    }

    /// Whether the player is currently alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state == PlayerState::Alive
    }

    /// Primary role, once assigned.
    #[must_use]
    pub fn role(&self) -> Option<&Arc<Role>> {
        self.role.as_ref()
    }

    /// Secondary role, if any.
    #[must_use]
    pub fn secondary_role(&self) -> Option<&Arc<Role>> {
        self.secondary_role.as_ref()
    }

    /// Team derived from the primary role.
    #[must_use]
    pub const fn alignment(&self) -> Option<Alignment> {
        self.alignment
    }

    /// Assigns the primary role and derives the alignment from it.
    pub fn assign_role(&mut self, role: Arc<Role>) {
        self.alignment = Some(role.alignment);
        self.role = Some(role);
    }

    /// Assigns the secondary role.
    pub fn assign_secondary_role(&mut self, role: Arc<Role>) {
        self.secondary_role = Some(role);
    }

    /// Bonded partner, if the player carries a bonding secondary role.
    #[must_use]
    pub const fn soulmate(&self) -> Option<PlayerId> {
        self.soulmate
    }

    /// Records the bonded partner.
    pub fn set_soulmate(&mut self, partner: PlayerId, partner_name: &str) {
        self.soulmate = Some(partner);
        self.flags.set("soulmate", partner_name);
    }

    /// Increments the attempted-action tally for one kind.
    pub fn record_attempt(&mut self, kind: ActionKind) {
        *self.attempted.entry(kind).or_insert(0) += 1;
    }

    /// Current tally for one action kind.
    #[must_use]
    pub fn attempted(&self, kind: ActionKind) -> u32 {
        self.attempted.get(&kind).copied().unwrap_or(0)
    }

    /// Clears all tallies; called once per derivation.
    pub fn clear_attempts(&mut self) {
        self.attempted.clear();
    }

    /// Appends the actor to this player's `killer` list flag.
    pub fn record_killer(&mut self, actor_name: &str) {
        let mut killers = match self.flags.remove("killer") {
            Some(Value::List(list)) => list,
            _ => Vec::new(),
        };
        killers.push(Value::Literal(actor_name.to_string()));
        self.flags.set("killer", Value::List(killers));
    }

    /// Sets an engine flag on the side store.
    pub fn set_flag(&mut self, key: &str, value: impl Into<Value>) {
        self.flags.set(key, value);
    }

    /// Reads an engine flag.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(key)
    }

    /// Appends an action outcome to the player's log.
    pub fn log_result(&mut self, result: ActionResult) {
        self.results.push(result);
    }

    /// Past action outcomes, oldest first.
    #[must_use]
    pub fn results(&self) -> &[ActionResult] {
        &self.results
    }
}

impl PropertySource for Player {
    fn properties(&self) -> PropertyStore {
        let mut store = PropertyStore::new("player")
            .with("name", self.name.as_str())
            .with("state", self.state.to_string());
        if let Some(alignment) = self.alignment {
            store.set("alignment", alignment.to_string());
        }
        if let Some(role) = &self.role {
            store.set("role", Value::Store(role.properties()));
        }
        if let Some(secondary) = &self.secondary_role {
            store.set("secondaryRole", Value::Store(secondary.properties()));
        }
        store.merge(&self.flags);
        store
    }
}

/// The full set of players, indexed by [`PlayerId`]. Players are never
/// removed.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Builds a roster from display names, assigning ids in order.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let players = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(PlayerId(i), name))
            .collect();
        Self { players }
    }

    /// Number of players, dead included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Looks up a player.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] for an out-of-range id.
    pub fn get(&self, id: PlayerId) -> Result<&Player, EngineError> {
        self.players.get(id.0).ok_or(EngineError::UnknownPlayer(id.0))
    }

    /// Mutable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] for an out-of-range id.
    pub fn get_mut(&mut self, id: PlayerId) -> Result<&mut Player, EngineError> {
        self.players
            .get_mut(id.0)
            .ok_or(EngineError::UnknownPlayer(id.0))
    }

    /// All players in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Mutable iteration in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Ids of players matching a predicate.
    pub fn ids_where(&self, predicate: impl Fn(&Player) -> bool) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| predicate(p))
            .map(Player::id)
            .collect()
    }

    /// Ids of currently-alive players.
    #[must_use]
    pub fn alive(&self) -> Vec<PlayerId> {
        self.ids_where(Player::is_alive)
    }

    /// Count of currently-alive players.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    /// The roster as a list of per-player stores, for the game-level
    /// `players` property.
    #[must_use]
    pub fn game_entries(&self) -> Value {
        Value::List(
            self.players
                .iter()
                .map(|p| Value::Store(p.properties()))
                .collect(),
        )
    }
}
