//! Full-match integration tests: scripted bots play complete rounds against
//! the engine over its channels, under tokio's paused clock.

use std::collections::HashMap;
use std::sync::Arc;

use nocturne::distribution::{Preset, RoleCount};
use nocturne::engine::channels::{
    AbilityResponse, GameChannels, GameUpdate, Prompt, PromptResponse, VoteResponse,
};
use nocturne::engine::config::GameConfig;
use nocturne::engine::rules::{
    CONTINUE_ROUND_CONDITIONS, EVIL_WINNING_CONDITION, GameRules, ROLE_REVEAL_CONDITIONS,
};
use nocturne::engine::{GameEngine, GameOutcome};
use nocturne::player::{PlayerId, Roster};
use nocturne::property::Value;
use nocturne::role::{Ability, Alignment, Role};

fn wolf_role() -> Arc<Role> {
    Arc::new(Role {
        name: "Mafioso".into(),
        alignment: Alignment::Evil,
        description: "Kills one player each night.".into(),
        abilities: vec![Ability {
            name: "nightKill".into(),
            required: true,
            ..Ability::default()
        }],
    })
}

fn doctor_role() -> Arc<Role> {
    Arc::new(Role {
        name: "Doctor".into(),
        alignment: Alignment::Good,
        description: "May protect one player each night.".into(),
        abilities: vec![Ability {
            name: "heal".into(),
            optional: true,
            ..Ability::default()
        }],
    })
}

fn seer_role() -> Arc<Role> {
    Arc::new(Role {
        name: "Seer".into(),
        alignment: Alignment::Good,
        description: "Learns a player's side at night.".into(),
        abilities: vec![Ability {
            name: "investigate".into(),
            optional: true,
            immediate_result: true,
            properties: HashMap::from([(
                "revealInvestigation".to_string(),
                serde_json::json!("side"),
            )]),
            ..Ability::default()
        }],
    })
}

fn villager_role() -> Arc<Role> {
    Arc::new(Role {
        name: "Villager".into(),
        alignment: Alignment::Good,
        description: String::new(),
        abilities: vec![],
    })
}

fn classic_preset() -> Preset {
    Preset {
        name: "classic".into(),
        minimum_players: 4,
        maximum_players: 8,
        primary_roles: vec![
            RoleCount {
                role: "Mafioso".into(),
                players: 1,
            },
            RoleCount {
                role: "Doctor".into(),
                players: 1,
            },
            RoleCount {
                role: "Seer".into(),
                players: 1,
            },
            RoleCount {
                role: "Villager".into(),
                players: -1,
            },
        ],
        secondary_roles: vec![],
    }
}

fn classic_rules() -> GameRules {
    GameRules::new()
        .with_rule(
            EVIL_WINNING_CONDITION,
            "count(players, player.state is ALIVE and player.alignment is Good) < 2",
        )
        .with_rule(
            CONTINUE_ROUND_CONDITIONS,
            "count(players, player.state is ALIVE and player.alignment is Evil) >= 1 \
             and count(players, player.state is ALIVE) >= 3",
        )
        .with_rule(ROLE_REVEAL_CONDITIONS, "1 == 1")
}

fn classic_config() -> GameConfig {
    GameConfig::new()
        .with_duration("general", "nightTimeActionTimer", 2)
        .with_duration("general", "daytimeDiscussionTimer", 1)
        .with_duration("general", "dayTimeVotingTimer", 3)
        .with_duration("other", "miscellaneousTimer", 1)
        .with_boolean("general", "overkillRule", false)
        .with_boolean("general", "anonymousHeal", false)
        .with_boolean("general", "anonymousVoting", false)
        .with_boolean("general", "secretRoles", false)
        .with_boolean("general", "secretVoteOut", false)
}

fn engine() -> GameEngine {
    GameEngine::new(
        Roster::from_names(["ada", "bo", "cy", "dee"]),
        vec![wolf_role(), doctor_role(), seer_role(), villager_role()],
        vec![],
        classic_preset(),
        classic_rules(),
        classic_config(),
    )
    .unwrap()
}

/// Who the bots vote for once the ballot opens.
#[derive(Clone, Copy)]
enum VotePlan {
    /// The village finds the wolf
    EliminateWolf,
    /// The village misfires on a good player every round
    MisfireOnGood,
}

/// Plays every prompt the engine sends: the wolf kills the first good
/// player, the doctor protects themself, the seer checks the wolf, and the
/// ballot follows the plan.
fn spawn_bots(
    channels: GameChannels,
    roster: Arc<std::sync::Mutex<Roster>>,
    plan: VotePlan,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let prompt = channels.prompts.recv().await;
            let (wolf, goods) = {
                let roster = roster.lock().unwrap();
                let wolf = roster
                    .iter()
                    .find(|p| p.alignment() == Some(Alignment::Evil))
                    .map(nocturne::player::Player::id);
                let goods: Vec<PlayerId> = roster
                    .iter()
                    .filter(|p| p.is_alive() && p.alignment() == Some(Alignment::Good))
                    .map(nocturne::player::Player::id)
                    .collect();
                (wolf, goods)
            };
            let Some(wolf) = wolf else { continue };

            match prompt {
                Prompt::Ability(prompt) => {
                    let Some(option) = prompt.options.first() else {
                        continue;
                    };
                    let target = match option.name.as_str() {
                        "nightKill" => goods.iter().copied().find(|id| *id != prompt.player),
                        "heal" => Some(prompt.player),
                        "investigate" => Some(wolf),
                        _ => None,
                    };
                    if let Some(target) = target {
                        channels.responses.send(PromptResponse::Ability(AbilityResponse {
                            source: prompt.player,
                            ability: option.name.clone(),
                            target,
                        }));
                    }
                }
                Prompt::Vote(prompt) => {
                    let target = match plan {
                        VotePlan::EliminateWolf if prompt.player != wolf => Some(wolf),
                        VotePlan::EliminateWolf => goods.first().copied(),
                        VotePlan::MisfireOnGood => {
                            goods.iter().copied().find(|id| *id != prompt.player)
                        }
                    };
                    if let Some(target) = target {
                        channels.responses.send(PromptResponse::Vote(VoteResponse {
                            source: prompt.player,
                            target,
                        }));
                    }
                }
            }
        }
    })
}

fn phases_of(updates: &[GameUpdate]) -> Vec<String> {
    updates
        .iter()
        .filter_map(|u| match u {
            GameUpdate::PhaseChanged { to, .. } => Some(to.to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn village_finds_the_wolf_and_good_wins() {
    let mut engine = engine();
    let channels = engine.channels();
    let roster = engine.roster();
    let outcome = engine.outcome();

    let bots = spawn_bots(channels.clone(), Arc::clone(&roster), VotePlan::EliminateWolf);
    let game = tokio::spawn(async move { engine.start().await });

    game.await.unwrap().unwrap();
    bots.abort();

    assert_eq!(
        outcome.take(),
        Some(GameOutcome {
            winner: "Good".into(),
            rounds: 1,
        })
    );

    let updates = channels.updates.drain();
    assert_eq!(phases_of(&updates), ["night", "day", "discussion", "voting"]);

    let wolf = roster
        .lock()
        .unwrap()
        .iter()
        .find(|p| p.alignment() == Some(Alignment::Evil))
        .map(nocturne::player::Player::id)
        .unwrap();

    let elected = updates.iter().find_map(|u| match u {
        GameUpdate::VotingResult(result) => result.elected,
        _ => None,
    });
    assert_eq!(elected, Some(wolf));

    // role disclosure is on (no secrecy, reveal rule always true)
    let revealed = updates.iter().any(|u| match u {
        GameUpdate::RoleReveal(reveals) => reveals.iter().any(|r| r.role == "Mafioso"),
        _ => false,
    });
    assert!(revealed);

    let ended = updates.iter().any(|u| {
        matches!(u, GameUpdate::GameEnded { winner } if winner == "Good")
    });
    assert!(ended);
}

#[tokio::test(start_paused = true)]
async fn misfiring_village_hands_the_wolf_the_win() {
    let mut engine = engine();
    let channels = engine.channels();
    let roster = engine.roster();
    let outcome = engine.outcome();

    let bots = spawn_bots(channels.clone(), Arc::clone(&roster), VotePlan::MisfireOnGood);
    let game = tokio::spawn(async move { engine.start().await });

    game.await.unwrap().unwrap();
    bots.abort();

    let outcome = outcome.take().unwrap();
    assert_eq!(outcome.winner, "Evil");

    let ended = channels.updates.drain().iter().any(|u| {
        matches!(u, GameUpdate::GameEnded { winner } if winner == "Evil")
    });
    assert!(ended);
}

#[tokio::test(start_paused = true)]
async fn seer_gets_an_immediate_answer_during_the_night() {
    let mut engine = engine();
    let channels = engine.channels();
    let roster = engine.roster();

    let bots = spawn_bots(channels.clone(), Arc::clone(&roster), VotePlan::EliminateWolf);
    let game = tokio::spawn(async move { engine.start().await });

    game.await.unwrap().unwrap();
    bots.abort();

    let seer = roster
        .lock()
        .unwrap()
        .iter()
        .find(|p| p.role().is_some_and(|r| r.name == "Seer"))
        .map(nocturne::player::Player::id)
        .unwrap();

    let info = channels.information.try_recv().unwrap();
    assert_eq!(info.player, seer);
    assert_eq!(
        info.result.data.get("investigationResult"),
        Some(&Value::Literal("Evil".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn night_resolution_announces_the_kill() {
    let mut engine = engine();
    let channels = engine.channels();
    let roster = engine.roster();

    let bots = spawn_bots(channels.clone(), Arc::clone(&roster), VotePlan::EliminateWolf);
    let game = tokio::spawn(async move { engine.start().await });

    game.await.unwrap().unwrap();
    bots.abort();

    let updates = channels.updates.drain();
    let night_events = updates
        .iter()
        .find_map(|u| match u {
            GameUpdate::NightResolution(events) => Some(events.clone()),
            _ => None,
        })
        .unwrap();

    // the wolf killed a good player the doctor did not protect, unless the
    // doctor happened to be the victim and saved themself
    let roster = roster.lock().unwrap();
    for event in &night_events {
        let victim = roster.get(event.player).unwrap();
        assert_eq!(victim.alignment(), Some(Alignment::Good));
    }
}
