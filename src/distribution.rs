//! Role distribution at match start.
//!
//! A preset names how many copies of each role go into the deck; a count of
//! `-1` means "fill every remaining seat". Roles are dealt in shuffled order
//! to a shuffled seating, then bonding secondary roles are paired up.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::player::{PlayerId, Roster};
use crate::role::Role;

/// The secondary role name that bonds two players together.
pub const SOULMATE_ROLE: &str = "Soulmate";

/// How many copies of one role a preset deals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCount {
    /// Role name, matched case-insensitively against the role list
    pub role: String,
    /// Copy count; `-1` fills every seat left over by the other entries
    pub players: i64,
}

/// A named game setup: player bounds plus the primary and secondary decks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    /// Preset name
    pub name: String,
    /// Fewest players the preset supports
    #[serde(rename = "minimumPlayers", default)]
    pub minimum_players: usize,
    /// Most players the preset supports
    #[serde(rename = "maximumPlayers", default)]
    pub maximum_players: usize,
    /// Primary-role deck
    #[serde(rename = "primaryRoles", default)]
    pub primary_roles: Vec<RoleCount>,
    /// Secondary-role deck
    #[serde(rename = "secondaryRoles", default)]
    pub secondary_roles: Vec<RoleCount>,
}

/// Which role slot a distribution pass fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSlot {
    /// The player's main role; assignment also derives their alignment
    Primary,
    /// An additional role layered on top (e.g. the bonding role)
    Secondary,
}

/// Deals one deck of the preset onto the roster.
///
/// Secondary passes also bond pairs of players holding the
/// [`SOULMATE_ROLE`].
///
/// # Errors
///
/// Returns [`EngineError::Distribution`] when the deck cannot be built
/// (several fill entries, more copies than players, an unknown role name)
/// or when an odd number of players holds the bonding role.
pub fn distribute_roles<R: Rng + ?Sized>(
    preset: &Preset,
    roster: &mut Roster,
    roles: &[Arc<Role>],
    slot: RoleSlot,
    rng: &mut R,
) -> Result<(), EngineError> {
    let counts = match slot {
        RoleSlot::Primary => &preset.primary_roles,
        RoleSlot::Secondary => &preset.secondary_roles,
    };

    let mut deck = build_deck(counts, roster.len())?;
    deck.shuffle(rng);

    let mut seating: Vec<PlayerId> = roster.iter().map(crate::player::Player::id).collect();
    seating.shuffle(rng);

    for (id, role_name) in seating.iter().zip(deck) {
        let role = roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(&role_name))
            .ok_or_else(|| {
                EngineError::Distribution(format!("preset names unknown role '{role_name}'"))
            })?;

        let player = roster.get_mut(*id)?;
        match slot {
            RoleSlot::Primary => player.assign_role(Arc::clone(role)),
            RoleSlot::Secondary => player.assign_secondary_role(Arc::clone(role)),
        }
    }

    if slot == RoleSlot::Secondary {
        bond_soulmates(roster, &seating)?;
    }

    info!(preset = %preset.name, ?slot, players = roster.len(), "roles distributed");
    Ok(())
}

/// Expands role counts into a flat deck of role names.
fn build_deck(counts: &[RoleCount], player_count: usize) -> Result<Vec<String>, EngineError> {
    let fill_entries = counts.iter().filter(|c| c.players == -1).count();
    if fill_entries > 1 {
        return Err(EngineError::Distribution(
            "preset has more than one fill-remainder role".to_string(),
        ));
    }

    let assigned: i64 = counts.iter().map(|c| c.players.max(0)).sum();
    let player_count = i64::try_from(player_count)
        .map_err(|_| EngineError::Distribution("roster too large".to_string()))?;
    let fill = player_count - assigned;
    if assigned > player_count || (fill_entries == 1 && fill < 0) {
        return Err(EngineError::Distribution(format!(
            "preset deals {assigned} roles to {player_count} players"
        )));
    }

    let mut deck = Vec::new();
    for count in counts {
        let copies = if count.players == -1 {
            fill
        } else {
            count.players
        };
        for _ in 0..copies {
            deck.push(count.role.clone());
        }
    }
    Ok(deck)
}

/// Pairs consecutive bonded players in seating order.
fn bond_soulmates(roster: &mut Roster, seating: &[PlayerId]) -> Result<(), EngineError> {
    let bonded: Vec<PlayerId> = seating
        .iter()
        .copied()
        .filter(|id| {
            roster
                .get(*id)
                .ok()
                .and_then(|p| p.secondary_role())
                .is_some_and(|r| r.name.eq_ignore_ascii_case(SOULMATE_ROLE))
        })
        .collect();

    if bonded.len() % 2 == 1 {
        return Err(EngineError::Distribution(format!(
            "odd number of {SOULMATE_ROLE} holders: {}",
            bonded.len()
        )));
    }

    for pair in bonded.chunks_exact(2) {
        let [first, second] = [pair[0], pair[1]];
        let first_name = roster.get(first)?.name().to_string();
        let second_name = roster.get(second)?.name().to_string();
        roster.get_mut(first)?.set_soulmate(second, &second_name);
        roster.get_mut(second)?.set_soulmate(first, &first_name);
    }
    Ok(())
}
