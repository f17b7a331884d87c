//! Vote tallying and elimination.

use std::collections::HashMap;
use std::collections::HashSet;

use tracing::info;

use crate::error::EngineError;
use crate::player::{Player, PlayerId, PlayerState, Roster};

/// One submitted vote. Self-votes are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerVote {
    /// Who voted
    pub voter: PlayerId,
    /// Who they voted for
    pub target: PlayerId,
}

/// Outcome of one voting phase.
#[derive(Debug, Clone, Default)]
pub struct VoteResult {
    /// Vote count per target
    pub counts: HashMap<PlayerId, usize>,
    /// The eliminated player, or `None` on a tie for the top count
    pub elected: Option<PlayerId>,
    /// Players eliminated transitively (bonded partners)
    pub affected: Vec<PlayerId>,
    /// Who voted for the eliminated player, when voting is not anonymous
    pub message: Option<String>,
}

impl VoteResult {
    /// Tallies votes and applies the elimination to the roster.
    ///
    /// Only the first vote from each living voter counts, and votes naming a
    /// dead target are discarded without consuming that first vote. The
    /// winner is the
    /// unique target with the strictly highest count; any tie for the top
    /// eliminates no one. The elected player is marked dead, their bonded
    /// partner is co-eliminated, and unless `anonymous_voting` is set the
    /// result carries a `(voter, voter)` message.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlayer`] for a vote referencing a
    /// player outside the roster.
    pub fn tally(
        votes: &[PlayerVote],
        roster: &mut Roster,
        anonymous_voting: bool,
    ) -> Result<Self, EngineError> {
        let mut voters_for: HashMap<PlayerId, Vec<PlayerId>> = HashMap::new();
        let mut seen_voters = HashSet::new();

        for vote in votes {
            if !roster.get(vote.voter)?.is_alive() {
                continue;
            }
            // Dead players cannot be elected again
            if !roster.get(vote.target)?.is_alive() {
                continue;
            }
            if !seen_voters.insert(vote.voter) {
                continue;
            }
            voters_for.entry(vote.target).or_default().push(vote.voter);
        }

        let counts: HashMap<PlayerId, usize> = voters_for
            .iter()
            .map(|(target, voters)| (*target, voters.len()))
            .collect();

        let elected = unique_maximum(&counts);
        let mut affected = Vec::new();
        let mut message = None;

        if let Some(target) = elected {
            let player = roster.get_mut(target)?;
            player.set_state(PlayerState::Dead);
            player.set_flag("votedOut", true);

            if let Some(partner) = roster.get(target)?.soulmate() {
                let bonded = roster.get_mut(partner)?;
                bonded.set_state(PlayerState::Dead);
                bonded.set_flag("votedOut", true);
                affected.push(partner);
            }

            if !anonymous_voting {
                let names: Vec<&str> = voters_for[&target]
                    .iter()
                    .map(|id| roster.get(*id).map(Player::name))
                    .collect::<Result<_, _>>()?;
                message = Some(format!("({})", names.join(", ")));
            }

            info!(
                target = %roster.get(target)?.name(),
                votes = counts[&target],
                co_eliminated = affected.len(),
                "vote elimination"
            );
        } else {
            info!(ballots = votes.len(), "vote tied, no elimination");
        }

        Ok(Self {
            counts,
            elected,
            affected,
            message,
        })
    }
}

/// The target with the strictly highest count, or `None` on a top tie or an
/// empty ballot.
fn unique_maximum(counts: &HashMap<PlayerId, usize>) -> Option<PlayerId> {
    let max = counts.values().copied().max()?;
    let mut top = counts.iter().filter(|(_, c)| **c == max);
    let (target, _) = top.next()?;
    if top.next().is_some() {
        return None;
    }
    Some(*target)
}
