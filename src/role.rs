//! Role and ability definitions.
//!
//! Roles arrive as already-deserialized content (the serde field names match
//! the external content schema) and are shared read-only across every player
//! holding them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::property::{PropertySource, PropertyStore, Value};

/// A player's team, derived from the primary role at assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// The village side
    Good,
    /// The hidden faction
    Evil,
    /// Neither side
    Neutral,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "Good",
            Self::Evil => "Evil",
            Self::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

/// The action kind an ability maps to, parsed by substring from the ability
/// name (`nightKill` and `dayKill` both map to [`ActionKind::Kill`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Attempt to kill the target
    Kill,
    /// Attempt to save the target from kills
    Heal,
    /// Learn something about the target
    Investigate,
    /// Unconditional elimination, bypassing heal arbitration
    Takedown,
}

impl ActionKind {
    /// Maps an ability name to its action kind.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAction`] when the name contains none of
    /// the recognized action words.
    pub fn parse(ability_name: &str) -> Result<Self, EngineError> {
        let lower = ability_name.to_lowercase();
        if lower.contains("kill") {
            Ok(Self::Kill)
        } else if lower.contains("heal") {
            Ok(Self::Heal)
        } else if lower.contains("investigate") {
            Ok(Self::Investigate)
        } else if lower.contains("takedown") {
            Ok(Self::Takedown)
        } else {
            Err(EngineError::UnknownAction(ability_name.to_string()))
        }
    }
}

/// Phase of day an ability can be used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityTime {
    /// Usable during the night phase
    #[default]
    Night,
    /// Usable during the day phase
    Day,
}

/// One ability of a role. Stateless at run time; everything the engine
/// consults (trigger, conditions, reveal mode) is content data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ability {
    /// Ability name; also determines the [`ActionKind`]
    #[serde(rename = "ability")]
    pub name: String,

    /// Free-text description shown in prompts
    #[serde(rename = "abilityDescription", default)]
    pub description: String,

    /// Whether the ability must be used every eligible phase
    #[serde(default)]
    pub required: bool,

    /// Whether the ability may be used at the player's discretion
    #[serde(default)]
    pub optional: bool,

    /// Whether the result is resolved the instant the response arrives
    /// instead of in the dawn batch
    #[serde(rename = "immediateResult", default)]
    pub immediate_result: bool,

    /// Formula evaluated against the owning player to decide automatic
    /// activation (reactive abilities)
    #[serde(default)]
    pub trigger: Option<String>,

    /// Formulas gating optional-ability eligibility; empty means always
    /// eligible
    #[serde(default)]
    pub conditions: Vec<String>,

    /// Free-form ability settings, e.g. `revealInvestigation: side`
    #[serde(rename = "abilityProperties", default)]
    pub properties: HashMap<String, serde_json::Value>,

    /// When the ability can be used
    #[serde(rename = "abilityTime", default)]
    pub ability_time: AbilityTime,
}

impl Ability {
    /// The action kind this ability maps to.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAction`] for unmapped names.
    pub fn action_kind(&self) -> Result<ActionKind, EngineError> {
        ActionKind::parse(&self.name)
    }

    /// Whether the ability belongs to the night phase.
    #[must_use]
    pub fn is_night_time(&self) -> bool {
        self.ability_time == AbilityTime::Night
    }

    /// The configured investigation reveal mode (`"side"` or `"role"`),
    /// if any.
    #[must_use]
    pub fn reveal_mode(&self) -> Option<&str> {
        self.properties
            .get("revealInvestigation")
            .and_then(serde_json::Value::as_str)
    }
}

impl PropertySource for Ability {
    fn properties(&self) -> PropertyStore {
        let mut store = PropertyStore::new("ability");
        store
            .set("name", self.name.as_str())
            .set("description", self.description.as_str())
            .set("required", self.required)
            .set("optional", self.optional)
            .set("immediateResult", self.immediate_result);
        for (key, value) in &self.properties {
            store.set(key.as_str(), Value::from(value));
        }
        store
    }
}

/// A role definition: name, alignment, and ability list. Shared read-only
/// across all holders via `Arc<Role>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Role name
    #[serde(rename = "role")]
    pub name: String,

    /// Team the role belongs to
    pub alignment: Alignment,

    /// Descriptive metadata
    #[serde(rename = "roleDescription", default)]
    pub description: String,

    /// The role's abilities
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl Role {
    /// Finds an ability by name, case-insensitively.
    #[must_use]
    pub fn find_ability(&self, name: &str) -> Option<&Ability> {
        self.abilities
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// The role's night-time abilities.
    pub fn night_abilities(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.iter().filter(|a| a.is_night_time())
    }

    /// Whether the role has any night-time ability.
    #[must_use]
    pub fn has_night_ability(&self) -> bool {
        self.night_abilities().next().is_some()
    }
}

impl PropertySource for Role {
    fn properties(&self) -> PropertyStore {
        PropertyStore::new("role")
            .with("name", self.name.as_str())
            .with("alignment", self.alignment.to_string())
            .with("description", self.description.as_str())
    }
}
