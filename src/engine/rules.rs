//! Rule-set categories.
//!
//! Game content supplies named categories of formula strings; the engine
//! scans a category in insertion order and takes the first rule that
//! evaluates true. Formula errors are a non-match, never a phase abort.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Category scanned to decide whether the hidden faction has won.
pub const EVIL_WINNING_CONDITION: &str = "evilWinningCondition";
/// Category scanned to decide whether another round is played.
pub const CONTINUE_ROUND_CONDITIONS: &str = "continueRoundConditions";
/// Category scanned per eliminated player to decide role disclosure.
pub const ROLE_REVEAL_CONDITIONS: &str = "roleRevealConditions";

/// Named categories of rule formulas, scanned in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameRules {
    /// Content schema version
    #[serde(default)]
    pub version: String,
    /// Formulas per category
    #[serde(default)]
    pub rules: IndexMap<String, Vec<String>>,
}

impl GameRules {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a formula to a category, creating the category on first use.
    #[must_use]
    pub fn with_rule(mut self, category: &str, formula: &str) -> Self {
        self.rules
            .entry(category.to_string())
            .or_default()
            .push(formula.to_string());
        self
    }

    /// The formulas of one category, in insertion order. Unknown categories
    /// are empty.
    #[must_use]
    pub fn category(&self, name: &str) -> &[String] {
        self.rules.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every formula across all categories, for cache preloading.
    pub fn all_formulas(&self) -> impl Iterator<Item = &str> {
        self.rules.values().flatten().map(String::as_str)
    }
}
