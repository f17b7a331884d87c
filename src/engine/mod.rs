//! The match orchestrator: role distribution, the phase loop, timers,
//! round conclusion, and reveal rules.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod rules;
pub mod state;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::action::{ActionContext, ActionResolver};
use crate::channel::PhaseChannel;
use crate::distribution::{self, Preset, RoleSlot};
use crate::engine::channels::{
    AbilityOption, AbilityPrompt, AbilityResponse, GameChannels, GameUpdate, Information,
    NightEvent, Prompt, PromptResponse, RoleReveal, VotePrompt,
};
use crate::engine::config::GameConfig;
use crate::engine::dispatcher::{ImmediateResolver, NightDispatcher, drain_votes};
use crate::engine::rules::{
    CONTINUE_ROUND_CONDITIONS, EVIL_WINNING_CONDITION, GameRules, ROLE_REVEAL_CONDITIONS,
};
use crate::engine::state::{GameControl, GamePhase, GameState};
use crate::error::{EngineError, NocturneError};
use crate::expr::ExpressionEngine;
use crate::player::{Player, PlayerId, PlayerState, Roster};
use crate::property::{PropertySource, PropertyStore};
use crate::role::{Ability, Alignment};
use crate::vote::VoteResult;

/// The per-round countdown lengths, resolved once at match start.
#[derive(Debug, Clone, Copy)]
pub struct Durations {
    /// Night action window, seconds
    pub night: u64,
    /// Day discussion window, seconds
    pub discussion: u64,
    /// Voting window, seconds
    pub voting: u64,
    /// Follow-up window for triggered abilities, seconds
    pub miscellaneous: u64,
}

impl Durations {
    /// Resolves all four countdowns from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingConfiguration`] for any absent entry;
    /// a match cannot start without its timers.
    pub fn resolve(config: &GameConfig) -> Result<Self, EngineError> {
        Ok(Self {
            night: config.duration("general", "nightTimeActionTimer")?,
            discussion: config.duration("general", "daytimeDiscussionTimer")?,
            voting: config.duration("general", "dayTimeVotingTimer")?,
            miscellaneous: config.duration("other", "miscellaneousTimer")?,
        })
    }
}

/// Terminal outcome of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    /// Winning side
    pub winner: String,
    /// Rounds played
    pub rounds: u64,
}

/// Orchestrates one match from role distribution to a winner.
pub struct GameEngine {
    roster: Arc<Mutex<Roster>>,
    primary_roles: Vec<Arc<crate::role::Role>>,
    secondary_roles: Vec<Arc<crate::role::Role>>,
    preset: Preset,
    rules: GameRules,
    config: GameConfig,
    channels: GameChannels,
    control: Arc<GameControl>,
    expressions: ExpressionEngine,
    phase: GamePhase,
    round: u64,
    store: PropertyStore,
    outcome: Arc<PhaseChannel<GameOutcome>>,
}

impl GameEngine {
    /// Creates an engine and pre-parses every rule formula so a malformed
    /// rule fails here instead of mid-phase.
    ///
    /// # Errors
    ///
    /// Returns the first lex or parse failure among the rule formulas.
    pub fn new(
        roster: Roster,
        primary_roles: Vec<Arc<crate::role::Role>>,
        secondary_roles: Vec<Arc<crate::role::Role>>,
        preset: Preset,
        rules: GameRules,
        config: GameConfig,
    ) -> Result<Self, NocturneError> {
        let expressions = ExpressionEngine::new();
        expressions.load(rules.all_formulas())?;

        let mut store = PropertyStore::new("game");
        store.set("nightCounter", 1.0);

        Ok(Self {
            roster: Arc::new(Mutex::new(roster)),
            primary_roles,
            secondary_roles,
            preset,
            rules,
            config,
            channels: GameChannels::new(),
            control: Arc::new(GameControl::new()),
            expressions,
            phase: GamePhase::Night,
            round: 1,
            store,
            outcome: Arc::new(PhaseChannel::new()),
        })
    }

    /// The match's channels, for hosts and bots.
    #[must_use]
    pub fn channels(&self) -> GameChannels {
        self.channels.clone()
    }

    /// The pause/resume/stop handle.
    #[must_use]
    pub fn control(&self) -> Arc<GameControl> {
        Arc::clone(&self.control)
    }

    /// The single-slot outcome mailbox, filled when the match ends.
    #[must_use]
    pub fn outcome(&self) -> Arc<PhaseChannel<GameOutcome>> {
        Arc::clone(&self.outcome)
    }

    /// Shared roster handle.
    #[must_use]
    pub fn roster(&self) -> Arc<Mutex<Roster>> {
        Arc::clone(&self.roster)
    }

    /// Runs the match to completion: role distribution, then the phase loop
    /// until a win condition ends it or [`GameControl::stop`] is called.
    ///
    /// # Errors
    ///
    /// Returns configuration and content wiring failures; gameplay-level
    /// formula errors never abort the match.
    pub async fn start(&mut self) -> Result<(), NocturneError> {
        let durations = Durations::resolve(&self.config)?;
        self.store
            .set("nightTimeLeft", durations.night as f64)
            .set("discussionTimeLeft", durations.discussion as f64)
            .set("votingTimeLeft", durations.voting as f64)
            .set("miscellaneousTimeLeft", durations.miscellaneous as f64);

        self.control.set(GameState::Loading);
        {
            let mut roster = lock(&self.roster);
            let mut rng = rand::rng();
            distribution::distribute_roles(
                &self.preset,
                &mut roster,
                &self.primary_roles,
                RoleSlot::Primary,
                &mut rng,
            )?;
            if !self.preset.secondary_roles.is_empty() {
                distribution::distribute_roles(
                    &self.preset,
                    &mut roster,
                    &self.secondary_roles,
                    RoleSlot::Secondary,
                    &mut rng,
                )?;
            }
            for player in roster.iter_mut() {
                player.set_state(PlayerState::Alive);
            }
        }

        self.control.set(GameState::Starting);
        self.channels.updates.send(GameUpdate::PhaseChanged {
            from: None,
            to: GamePhase::Night,
        });
        self.control.set(GameState::Ongoing);

        self.run_loop(durations).await
    }

    async fn run_loop(&mut self, durations: Durations) -> Result<(), NocturneError> {
        let mut deferred = Vec::new();
        while !self.control.is_ended() {
            self.control.wait_if_paused().await;
            if self.control.is_ended() {
                break;
            }
            match self.phase {
                GamePhase::Night => deferred = self.night_phase(durations).await?,
                GamePhase::Day => {
                    let batch = std::mem::take(&mut deferred);
                    self.day_phase(batch, durations).await?;
                }
                GamePhase::Discussion => self.discussion_phase(durations).await?,
                GamePhase::Voting => self.voting_phase(durations).await?,
            }
        }
        Ok(())
    }

    /// Prompts night-ability holders, listens for the whole countdown, and
    /// hands the deferred responses to the day handler.
    async fn night_phase(
        &mut self,
        durations: Durations,
    ) -> Result<Vec<AbilityResponse>, NocturneError> {
        let mut dispatcher = NightDispatcher::new(
            self.channels.clone(),
            Arc::clone(&self.roster),
            self.immediate_resolver(),
        );

        let prompts = self.night_prompts();
        for prompt in prompts {
            self.channels.prompts.send(Prompt::Ability(prompt));
        }

        dispatcher.start();
        self.run_timer("nightTimeLeft", "Night", durations.night, None::<fn() -> bool>)
            .await;
        dispatcher.stop().await;

        self.set_phase(GamePhase::Day);
        Ok(dispatcher.drain_deferred())
    }

    /// Builds one ability prompt per living player with at least one
    /// eligible night ability.
    fn night_prompts(&self) -> Vec<AbilityPrompt> {
        let roster = lock(&self.roster);
        let alive = roster.alive();
        let mut prompts = Vec::new();

        for player in roster.iter().filter(|p| p.is_alive()) {
            let Some(role) = player.role() else { continue };
            let options: Vec<AbilityOption> = role
                .night_abilities()
                .filter(|a| self.ability_eligible(a, player))
                .map(|a| AbilityOption {
                    name: a.name.clone(),
                    description: a.description.clone(),
                })
                .collect();
            if options.is_empty() {
                continue;
            }
            prompts.push(AbilityPrompt {
                player: player.id(),
                options,
                targets: alive.clone(),
            });
        }
        prompts
    }

    /// Required abilities are always eligible; optional ones need no
    /// conditions or any condition true. A failing condition formula means
    /// not satisfied.
    fn ability_eligible(&self, ability: &Ability, player: &Player) -> bool {
        if ability.required {
            return true;
        }
        if !ability.optional {
            return false;
        }
        if ability.conditions.is_empty() {
            return true;
        }
        let store = player.properties();
        ability.conditions.iter().any(|condition| {
            self.expressions
                .evaluate_bool(condition, &store)
                .unwrap_or(false)
        })
    }

    /// Resolves the night's deferred actions, announces kills and saves,
    /// cascades triggered abilities, and either concludes the round early
    /// or opens discussion.
    async fn day_phase(
        &mut self,
        deferred: Vec<AbilityResponse>,
        durations: Durations,
    ) -> Result<(), NocturneError> {
        let overkill = self.config.boolean("general", "overkillRule")?;
        let anonymous_heal = self.config.boolean("general", "anonymousHeal")?;

        let (killed, healed) = {
            let mut roster = lock(&self.roster);
            let mut contexts = deferred
                .into_iter()
                .map(|response| resolve_response(&roster, &response))
                .collect::<Result<Vec<_>, _>>()?;
            ActionResolver::resolve_batch(&mut contexts, &mut roster, overkill)?;

            let mut killed = roster.ids_where(|p| p.state() == PlayerState::Killed);
            let healed = roster.ids_where(|p| p.state() == PlayerState::Saved);
            apply_soulmate_deaths(&mut roster, &mut killed)?;

            for id in &killed {
                roster.get_mut(*id)?.set_state(PlayerState::Dead);
            }
            // Saved players always return to alive; the flag only controls
            // whether they are announced.
            for id in &healed {
                roster.get_mut(*id)?.set_state(PlayerState::Alive);
            }
            (killed, healed)
        };

        let mut events: Vec<NightEvent> = killed
            .iter()
            .map(|id| NightEvent {
                outcome: PlayerState::Killed,
                player: *id,
            })
            .collect();
        if !anonymous_heal {
            events.extend(healed.iter().map(|id| NightEvent {
                outcome: PlayerState::Saved,
                player: *id,
            }));
        }
        info!(killed = killed.len(), saved = healed.len(), "night resolved");
        self.channels.updates.send(GameUpdate::NightResolution(events));

        self.reveal_roles(&killed, GamePhase::Day)?;
        self.resolve_triggered(killed, durations).await?;

        let (alive, alive_evil) = {
            let roster = lock(&self.roster);
            let alive = roster.alive_count();
            let evil = roster
                .iter()
                .filter(|p| p.is_alive() && p.alignment() == Some(Alignment::Evil))
                .count();
            (alive, evil)
        };

        if alive < 3 || alive_evil == 0 {
            self.conclude_round();
        } else {
            self.set_phase(GamePhase::Discussion);
        }
        Ok(())
    }

    async fn discussion_phase(&mut self, durations: Durations) -> Result<(), NocturneError> {
        self.run_timer(
            "discussionTimeLeft",
            "Discussion",
            durations.discussion,
            None::<fn() -> bool>,
        )
        .await;
        self.set_phase(GamePhase::Voting);
        Ok(())
    }

    async fn voting_phase(&mut self, durations: Durations) -> Result<(), NocturneError> {
        let alive = lock(&self.roster).alive();
        for player in &alive {
            self.channels.prompts.send(Prompt::Vote(VotePrompt {
                player: *player,
                options: alive.clone(),
            }));
        }

        let responses = Arc::clone(&self.channels.responses);
        let expected = alive.len();
        self.run_timer(
            "votingTimeLeft",
            "Voting",
            durations.voting,
            Some(move || responses.len() >= expected),
        )
        .await;

        let votes = drain_votes(&self.channels);
        let anonymous_voting = self.config.boolean("general", "anonymousVoting")?;
        let result = {
            let mut roster = lock(&self.roster);
            VoteResult::tally(&votes, &mut roster, anonymous_voting)?
        };
        let elected = result.elected;
        let affected = result.affected.clone();
        self.channels.updates.send(GameUpdate::VotingResult(result));

        if let Some(target) = elected {
            let mut eliminated = vec![target];
            eliminated.extend(affected);
            self.reveal_roles(&eliminated, GamePhase::Voting)?;
            self.resolve_triggered(vec![target], durations).await?;
        }

        self.conclude_round();
        Ok(())
    }

    /// Cascades reactive abilities: every newly killed player may trigger
    /// an ability, whose resolution may kill again, until no trigger fires.
    async fn resolve_triggered(
        &mut self,
        sources: Vec<PlayerId>,
        durations: Durations,
    ) -> Result<(), NocturneError> {
        let overkill = self.config.boolean("general", "overkillRule")?;
        let mut sources = sources;

        loop {
            let mut triggered = Vec::new();
            {
                let roster = lock(&self.roster);
                let alive = roster.alive();
                for id in &sources {
                    let player = roster.get(*id)?;
                    if let Some(ability) = self.triggered_ability(player) {
                        debug!(player = %player.name(), ability = %ability.name, "trigger fired");
                        self.channels.prompts.send(Prompt::Ability(AbilityPrompt {
                            player: *id,
                            options: vec![AbilityOption {
                                name: ability.name.clone(),
                                description: ability.description.clone(),
                            }],
                            targets: alive.clone(),
                        }));
                        triggered.push(*id);
                    }
                }
            }
            if triggered.is_empty() {
                return Ok(());
            }

            let responses = Arc::clone(&self.channels.responses);
            let expected = triggered.len();
            self.run_timer(
                "miscellaneousTimeLeft",
                "Miscellaneous",
                durations.miscellaneous,
                Some(move || responses.len() >= expected),
            )
            .await;

            let killed = {
                let mut roster = lock(&self.roster);
                let mut contexts = Vec::new();
                for response in self.channels.responses.drain() {
                    if let PromptResponse::Ability(response) = response {
                        contexts.push(resolve_response(&roster, &response)?);
                    }
                }
                ActionResolver::resolve_batch(&mut contexts, &mut roster, overkill)?;

                let mut killed = roster.ids_where(|p| p.state() == PlayerState::Killed);
                apply_soulmate_deaths(&mut roster, &mut killed)?;
                killed
            };

            self.reveal_roles(&killed, self.phase)?;
            {
                let mut roster = lock(&self.roster);
                for id in &killed {
                    roster.get_mut(*id)?.set_state(PlayerState::Dead);
                }
            }
            sources = killed;
        }
    }

    /// First ability whose trigger formula holds for the player. Formula
    /// errors are a non-match.
    fn triggered_ability(&self, player: &Player) -> Option<Ability> {
        let role = player.role()?;
        let store = player.properties();
        role.abilities
            .iter()
            .find(|ability| {
                ability.trigger.as_deref().is_some_and(|trigger| {
                    self.expressions
                        .evaluate_bool(trigger, &store)
                        .unwrap_or(false)
                })
            })
            .cloned()
    }

    /// Publishes role disclosures for eliminated players, governed by the
    /// secrecy flags and the reveal rule category.
    fn reveal_roles(&self, players: &[PlayerId], phase: GamePhase) -> Result<(), NocturneError> {
        if players.is_empty() {
            return Ok(());
        }

        let secret_roles = self.config.boolean("general", "secretRoles")?;
        let secret_vote_out = self.config.boolean("general", "secretVoteOut")?;

        if secret_roles && secret_vote_out {
            self.channels.updates.send(GameUpdate::RoleReveal(Vec::new()));
            return Ok(());
        }

        let roster = lock(&self.roster);
        let mut reveals = Vec::new();

        if !secret_vote_out {
            for id in players {
                let player = roster.get(*id)?;
                let store = player.properties();
                for rule in self.rules.category(ROLE_REVEAL_CONDITIONS) {
                    match self.expressions.evaluate_bool(rule, &store) {
                        Ok(true) => {
                            reveals.push(reveal_of(player));
                            break;
                        }
                        Ok(false) => {}
                        Err(error) => {
                            debug!(rule, %error, "reveal rule skipped");
                        }
                    }
                }
            }
        } else if phase == GamePhase::Voting && !secret_roles {
            reveals.push(reveal_of(roster.get(players[0])?));
        }

        self.channels.updates.send(GameUpdate::RoleReveal(reveals));
        Ok(())
    }

    /// Evil-win rules first, then continue rules; anything else is a good
    /// win. The ordering gives the evil win priority when both hold.
    fn conclude_round(&mut self) {
        let store = self.game_properties();
        if self.scan_category(EVIL_WINNING_CONDITION, &store) {
            self.finish("Evil");
        } else if self.scan_category(CONTINUE_ROUND_CONDITIONS, &store) {
            let alive = lock(&self.roster).alive();
            self.channels
                .updates
                .send(GameUpdate::PlayersRemaining(alive));
            self.round += 1;
            self.store.set("nightCounter", self.round as f64);
            info!(round = self.round, "round continues");
            self.set_phase(GamePhase::Night);
        } else {
            self.finish("Good");
        }
    }

    fn finish(&mut self, winner: &str) {
        info!(winner, rounds = self.round, "game ended");
        self.channels.updates.send(GameUpdate::GameEnded {
            winner: winner.to_string(),
        });
        self.outcome.send(GameOutcome {
            winner: winner.to_string(),
            rounds: self.round,
        });
        self.control.stop();
    }

    /// First rule in the category that evaluates true wins; formula errors
    /// are a non-match.
    fn scan_category(&self, category: &str, store: &PropertyStore) -> bool {
        for rule in self.rules.category(category) {
            match self.expressions.evaluate_bool(rule, store) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(error) => {
                    debug!(category, rule, %error, "rule skipped");
                }
            }
        }
        false
    }

    /// Snapshot of the game-level store, including the roster projection.
    #[must_use]
    pub fn game_properties(&self) -> PropertyStore {
        let mut store = self.store.clone();
        store.set("players", lock(&self.roster).game_entries());
        store.set("phase", self.phase.as_str());
        store
    }

    /// Per-second countdown publishing the time left, with an optional
    /// early-stop predicate sampled once per tick.
    async fn run_timer<F>(
        &mut self,
        key: &str,
        label: &'static str,
        seconds: u64,
        stop: Option<F>,
    ) where
        F: Fn() -> bool,
    {
        self.store.set(key, seconds as f64);
        for left in (0..=seconds).rev() {
            if let Some(stop) = &stop
                && stop()
            {
                self.store.set(key, 0.0);
                self.channels
                    .updates
                    .send(GameUpdate::TimeRemaining { label, seconds: 0 });
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.store.set(key, left as f64);
            self.channels
                .updates
                .send(GameUpdate::TimeRemaining {
                    label,
                    seconds: left,
                });
        }
    }

    fn set_phase(&mut self, phase: GamePhase) {
        info!(from = %self.phase, to = %phase, "phase change");
        self.channels.updates.send(GameUpdate::PhaseChanged {
            from: Some(self.phase),
            to: phase,
        });
        self.store.set("phase", phase.as_str());
        self.phase = phase;
    }

    /// Resolver handed to the night dispatcher for immediate-result
    /// abilities; it applies the single action and wraps the outcome as a
    /// private message.
    fn immediate_resolver(&self) -> ImmediateResolver {
        let roster = Arc::clone(&self.roster);
        Arc::new(move |response: &AbilityResponse| {
            let mut roster = roster
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut context = resolve_response(&roster, response)?;
            ActionResolver::resolve_immediate(&mut context, &mut roster)?;
            Ok(Information {
                player: response.source,
                result: context.result.unwrap_or_default(),
            })
        })
    }
}

fn lock(roster: &Arc<Mutex<Roster>>) -> std::sync::MutexGuard<'_, Roster> {
    roster.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Turns a submitted response into an action context, resolving the ability
/// on the source player's role.
fn resolve_response(
    roster: &Roster,
    response: &AbilityResponse,
) -> Result<ActionContext, EngineError> {
    let source = roster.get(response.source)?;
    let ability = source
        .role()
        .and_then(|role| role.find_ability(&response.ability))
        .cloned()
        .ok_or_else(|| EngineError::UnknownAbility(response.ability.clone()))?;
    Ok(ActionContext::new(
        response.source,
        response.target,
        ability,
    ))
}

fn reveal_of(player: &Player) -> RoleReveal {
    RoleReveal {
        player: player.id(),
        role: player
            .role()
            .map(|r| r.name.clone())
            .unwrap_or_default(),
        secondary_role: player.secondary_role().map(|r| r.name.clone()),
    }
}

/// Pulls bonded partners of killed players into the kill set so pairs die
/// together.
fn apply_soulmate_deaths(
    roster: &mut Roster,
    killed: &mut Vec<PlayerId>,
) -> Result<(), EngineError> {
    let mut index = 0;
    while index < killed.len() {
        let id = killed[index];
        if let Some(partner) = roster.get(id)?.soulmate()
            && !killed.contains(&partner)
        {
            let bonded = roster.get_mut(partner)?;
            bonded.set_state(PlayerState::Killed);
            bonded.set_flag("killed", true);
            bonded.set_flag("votedOut", true);
            killed.push(partner);
        }
        index += 1;
    }
    Ok(())
}
