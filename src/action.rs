//! Action and ability resolution.
//!
//! Submitted night actions become [`ActionContext`]s; a batch of contexts is
//! applied as attempted-action tallies, every living player's outcome is then
//! derived from its tallies in one pass, and finally each context receives a
//! result describing what its actor learns.

use std::collections::HashMap;

use tracing::debug;

use crate::error::EngineError;
use crate::player::{Player, PlayerId, PlayerState, Roster};
use crate::property::Value;
use crate::role::{Ability, ActionKind};

/// Final classification of one resolved action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// The action achieved its effect
    Success,
    /// The action was cancelled or its effect did not land
    Failed,
    /// The action produced information rather than an effect
    Info,
    /// The action had nothing to do (e.g. healing an untouched player)
    None,
}

/// Outcome of one action: a kind plus an open data bag (investigation
/// findings, failure reasons).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionResult {
    /// Result classification
    pub kind: Option<ResultKind>,
    /// Ability-specific result data
    pub data: HashMap<String, Value>,
}

impl ActionResult {
    fn of(kind: ResultKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// One submitted or synthesized action, alive for a single resolution cycle.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The acting player
    pub actor: PlayerId,
    /// The targeted player
    pub target: PlayerId,
    /// The ability being used
    pub ability: Ability,
    /// Set by pre-processing rules to veto the action
    pub cancelled: bool,
    /// Why the action was cancelled, when it was
    pub cancel_reason: Option<String>,
    /// Filled during finalization
    pub result: Option<ActionResult>,
}

impl ActionContext {
    /// Creates a pending context.
    #[must_use]
    pub fn new(actor: PlayerId, target: PlayerId, ability: Ability) -> Self {
        Self {
            actor,
            target,
            ability,
            cancelled: false,
            cancel_reason: None,
            result: None,
        }
    }

    /// Vetoes the action before it is counted.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancelled = true;
        self.cancel_reason = Some(reason.into());
    }
}

/// Applies batches of action contexts to the roster and derives states.
#[derive(Debug, Default)]
pub struct ActionResolver;

impl ActionResolver {
    /// Resolves a full batch: tallies every context, derives every living
    /// player's state from its tallies, then finalizes each context's
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for unknown action kinds or player ids;
    /// these indicate content defects and abort the resolution step.
    pub fn resolve_batch(
        contexts: &mut [ActionContext],
        roster: &mut Roster,
        overkill: bool,
    ) -> Result<(), EngineError> {
        for ctx in contexts.iter_mut() {
            Self::apply(ctx, roster)?;
        }
        Self::derive_states(roster, overkill);
        for ctx in contexts.iter_mut() {
            Self::finalize(ctx, roster)?;
        }
        Ok(())
    }

    /// Resolves one immediate-result action (e.g. an investigation) without
    /// running state derivation, so a mid-night response cannot flip anyone's
    /// state before dawn.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve_batch`].
    pub fn resolve_immediate(
        ctx: &mut ActionContext,
        roster: &mut Roster,
    ) -> Result<(), EngineError> {
        Self::apply(ctx, roster)?;
        Self::finalize(ctx, roster)
    }

    /// Tallies one context: attribution flags plus the target's
    /// attempted-action counter.
    fn apply(ctx: &mut ActionContext, roster: &mut Roster) -> Result<(), EngineError> {
        // Pre-processing hook point; cancellation rules plug in here.
        if ctx.cancelled {
            return Ok(());
        }

        let kind = ctx.ability.action_kind()?;
        let actor_name = roster.get(ctx.actor)?.name().to_string();
        let target_name = roster.get(ctx.target)?.name().to_string();

        match kind {
            ActionKind::Kill => {
                roster.get_mut(ctx.target)?.record_killer(&actor_name);
                roster
                    .get_mut(ctx.actor)?
                    .set_flag("killed", target_name.as_str());
            }
            ActionKind::Takedown => {
                roster.get_mut(ctx.target)?.set_flag("takendown", true);
            }
            ActionKind::Heal | ActionKind::Investigate => {}
        }

        roster.get_mut(ctx.target)?.record_attempt(kind);
        debug!(
            actor = %actor_name,
            target = %target_name,
            ability = %ctx.ability.name,
            ?kind,
            "action tallied"
        );
        Ok(())
    }

    /// Derives every living player's state from its tallies, then clears
    /// the tallies.
    fn derive_states(roster: &mut Roster, overkill: bool) {
        for player in roster.iter_mut() {
            if !player.is_alive() {
                continue;
            }

            let kills = player.attempted(ActionKind::Kill);
            let heals = player.attempted(ActionKind::Heal);
            let takedowns = player.attempted(ActionKind::Takedown);

            let saved = if overkill {
                kills == heals
            } else {
                kills >= 1 && heals >= 1
            };
            let killed = if overkill {
                kills != heals
            } else {
                kills >= 1 && heals == 0
            };

            // Takedown bypasses heal arbitration entirely.
            if takedowns >= 1 || (killed && !saved) {
                player.set_state(PlayerState::Killed);
                player.set_flag("killed", true);
            } else if saved {
                player.set_state(PlayerState::Saved);
            }

            player.clear_attempts();
        }
    }

    /// Fills each context's result from the ability kind and the target's
    /// derived state, and appends it to the actor's log.
    fn finalize(ctx: &mut ActionContext, roster: &mut Roster) -> Result<(), EngineError> {
        if ctx.cancelled {
            let mut result = ActionResult::of(ResultKind::Failed);
            let reason = ctx
                .cancel_reason
                .clone()
                .unwrap_or_else(|| "Action was cancelled".to_string());
            result.data.insert("reason".to_string(), reason.into());
            roster.get_mut(ctx.actor)?.log_result(result.clone());
            ctx.result = Some(result);
            return Ok(());
        }

        let target = roster.get(ctx.target)?;
        let result = match ctx.ability.action_kind()? {
            ActionKind::Kill => {
                if target.state() == PlayerState::Killed {
                    ActionResult::of(ResultKind::Success)
                } else {
                    let mut result = ActionResult::of(ResultKind::Failed);
                    result
                        .data
                        .insert("reason".to_string(), "Target survived".into());
                    result
                }
            }
            ActionKind::Heal => ActionResult::of(match target.state() {
                PlayerState::Saved => ResultKind::Success,
                PlayerState::Alive | PlayerState::Dead => ResultKind::None,
                PlayerState::Killed => ResultKind::Failed,
            }),
            ActionKind::Investigate => {
                let mut result = ActionResult::of(ResultKind::Info);
                if let Some(finding) = Self::investigation_finding(&ctx.ability, target) {
                    result
                        .data
                        .insert("investigationResult".to_string(), finding.into());
                }
                result
            }
            ActionKind::Takedown => ActionResult::of(ResultKind::Success),
        };

        roster.get_mut(ctx.actor)?.log_result(result.clone());
        ctx.result = Some(result);
        Ok(())
    }

    fn investigation_finding(ability: &Ability, target: &Player) -> Option<String> {
        match ability.reveal_mode()? {
            "side" => target.alignment().map(|a| a.to_string()),
            "role" => target.role().map(|r| r.name.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::role::{Alignment, Role};

    fn ability(name: &str) -> Ability {
        Ability {
            name: name.to_string(),
            ..Ability::default()
        }
    }

    fn roster_of(n: usize) -> Roster {
        Roster::from_names((0..n).map(|i| format!("p{i}")))
    }

    fn kill(actor: usize, target: usize) -> ActionContext {
        ActionContext::new(PlayerId(actor), PlayerId(target), ability("nightKill"))
    }

    fn heal(actor: usize, target: usize) -> ActionContext {
        ActionContext::new(PlayerId(actor), PlayerId(target), ability("heal"))
    }

    #[test]
    fn overkill_matching_counts_save() {
        let mut roster = roster_of(5);
        let mut batch = vec![kill(0, 4), kill(1, 4), heal(2, 4), heal(3, 4)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, true).unwrap();
        assert_eq!(roster.get(PlayerId(4)).unwrap().state(), PlayerState::Saved);
    }

    #[test]
    fn overkill_mismatched_counts_kill() {
        let mut roster = roster_of(4);
        let mut batch = vec![kill(0, 3), kill(1, 3), heal(2, 3)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, true).unwrap();
        assert_eq!(
            roster.get(PlayerId(3)).unwrap().state(),
            PlayerState::Killed
        );
    }

    #[test]
    fn simple_mode_one_kill_no_heal_kills() {
        let mut roster = roster_of(2);
        let mut batch = vec![kill(0, 1)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        assert_eq!(
            roster.get(PlayerId(1)).unwrap().state(),
            PlayerState::Killed
        );
        assert_eq!(
            batch[0].result.as_ref().unwrap().kind,
            Some(ResultKind::Success)
        );
    }

    #[test]
    fn simple_mode_any_heal_saves() {
        let mut roster = roster_of(4);
        let mut batch = vec![kill(0, 3), kill(1, 3), heal(2, 3)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        assert_eq!(roster.get(PlayerId(3)).unwrap().state(), PlayerState::Saved);
        // failed kill carries a reason, successful heal reports success
        assert_eq!(
            batch[0].result.as_ref().unwrap().kind,
            Some(ResultKind::Failed)
        );
        assert_eq!(
            batch[2].result.as_ref().unwrap().kind,
            Some(ResultKind::Success)
        );
    }

    #[test]
    fn takedown_overrides_heal_arbitration() {
        let mut roster = roster_of(4);
        let mut batch = vec![
            kill(0, 3),
            heal(1, 3),
            ActionContext::new(PlayerId(2), PlayerId(3), ability("takedown")),
        ];
        ActionResolver::resolve_batch(&mut batch, &mut roster, true).unwrap();
        assert_eq!(
            roster.get(PlayerId(3)).unwrap().state(),
            PlayerState::Killed
        );
        assert_eq!(
            batch[2].result.as_ref().unwrap().kind,
            Some(ResultKind::Success)
        );
    }

    #[test]
    fn kill_records_attribution_flags() {
        let mut roster = roster_of(2);
        let mut batch = vec![kill(0, 1)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        let target = roster.get(PlayerId(1)).unwrap();
        let Some(Value::List(killers)) = target.flag("killer") else {
            panic!("expected killer list");
        };
        assert_eq!(killers, &vec![Value::Literal("p0".into())]);
        assert_eq!(
            roster.get(PlayerId(0)).unwrap().flag("killed"),
            Some(&Value::Literal("p1".into()))
        );
    }

    #[test]
    fn overkill_untouched_players_read_as_saved() {
        // zero kills and zero heals match, so untouched players pass through
        // the saved state until the day handler settles them
        let mut roster = roster_of(2);
        let mut batch = vec![];
        ActionResolver::resolve_batch(&mut batch, &mut roster, true).unwrap();
        assert_eq!(roster.get(PlayerId(0)).unwrap().state(), PlayerState::Saved);
    }

    #[test]
    fn simple_mode_untouched_players_stay_alive() {
        let mut roster = roster_of(2);
        let mut batch = vec![];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        assert_eq!(roster.get(PlayerId(0)).unwrap().state(), PlayerState::Alive);
    }

    #[test]
    fn cancelled_action_fails_with_reason() {
        let mut roster = roster_of(2);
        let mut ctx = kill(0, 1);
        ctx.cancel("blocked");
        let mut batch = vec![ctx];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        assert_eq!(roster.get(PlayerId(1)).unwrap().state(), PlayerState::Alive);
        let result = batch[0].result.as_ref().unwrap();
        assert_eq!(result.kind, Some(ResultKind::Failed));
        assert_eq!(result.data.get("reason"), Some(&Value::Literal("blocked".into())));
    }

    #[test]
    fn investigation_reveals_side_or_role() {
        let mut roster = roster_of(2);
        roster.get_mut(PlayerId(1)).unwrap().assign_role(Arc::new(Role {
            name: "Mafioso".into(),
            alignment: Alignment::Evil,
            description: String::new(),
            abilities: vec![],
        }));

        let mut investigate = Ability {
            name: "investigate".into(),
            ..Ability::default()
        };
        investigate
            .properties
            .insert("revealInvestigation".into(), serde_json::json!("side"));

        let mut ctx = ActionContext::new(PlayerId(0), PlayerId(1), investigate.clone());
        ActionResolver::resolve_immediate(&mut ctx, &mut roster).unwrap();
        let result = ctx.result.unwrap();
        assert_eq!(result.kind, Some(ResultKind::Info));
        assert_eq!(
            result.data.get("investigationResult"),
            Some(&Value::Literal("Evil".into()))
        );

        investigate
            .properties
            .insert("revealInvestigation".into(), serde_json::json!("role"));
        let mut ctx = ActionContext::new(PlayerId(0), PlayerId(1), investigate);
        ActionResolver::resolve_immediate(&mut ctx, &mut roster).unwrap();
        assert_eq!(
            ctx.result.unwrap().data.get("investigationResult"),
            Some(&Value::Literal("Mafioso".into()))
        );
    }

    #[test]
    fn immediate_resolution_does_not_derive_states() {
        let mut roster = roster_of(2);
        let mut ctx = ActionContext::new(
            PlayerId(0),
            PlayerId(1),
            ability("investigate"),
        );
        ActionResolver::resolve_immediate(&mut ctx, &mut roster).unwrap();
        assert_eq!(roster.get(PlayerId(1)).unwrap().state(), PlayerState::Alive);
        // the tally stays pending for the dawn batch
        assert_eq!(
            roster.get(PlayerId(1)).unwrap().attempted(ActionKind::Investigate),
            1
        );
    }

    #[test]
    fn actor_log_accumulates_results() {
        let mut roster = roster_of(2);
        let mut batch = vec![kill(0, 1)];
        ActionResolver::resolve_batch(&mut batch, &mut roster, false).unwrap();
        assert_eq!(roster.get(PlayerId(0)).unwrap().results().len(), 1);
    }
}
