//! Property stores: the evaluation context of the expression engine.
//!
//! Every evaluable entity (player, role, ability, the game itself) projects
//! its attributes into a [`PropertyStore`]. Stores nest: a player's store
//! holds its role's store under `"role"`, and the game store holds the
//! roster as a list of player stores under `"players"`, which is what lets
//! formulas like `count(players, player.state is ALIVE)` walk the game.

use std::collections::HashMap;
use std::fmt;

/// A typed value held in a [`PropertyStore`] or produced by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric value; all arithmetic is done in `f64`
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Opaque literal: a string-valued attribute or a bare identifier
    Literal(String),
    /// Ordered collection
    List(Vec<Value>),
    /// Entity-valued result carrying its own store (a role, a player)
    Store(PropertyStore),
    /// Absence of a value (empty expression)
    Void,
}

impl Value {
    /// Short tag used in type-error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Literal(_) => "literal",
            Self::List(_) => "list",
            Self::Store(_) => "store",
            Self::Void => "void",
        }
    }

    /// The string form used by `is` / `is not` / `is in` comparisons and
    /// generic `==` equality on mixed operands.
    #[must_use]
    pub fn literal_form(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Literal(s) => s.clone(),
            Self::List(items) => format!("[{} items]", items.len()),
            Self::Store(store) => store.name().to_string(),
            Self::Void => String::new(),
        }
    }

    /// Returns the boolean if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number if this is a numeric value.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Self::Literal(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            serde_json::Value::Null | serde_json::Value::Object(_) => Self::Void,
        }
    }
}

/// Numbers print without a trailing `.0` when integral, so that
/// `player.votes is 3` compares against the bare identifier form.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Named mapping from string key to typed value, one per evaluable entity.
///
/// Insertion order is irrelevant; last write wins; no versioning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyStore {
    name: String,
    entries: HashMap<String, Value>,
}

impl PropertyStore {
    /// Creates an empty store with the given entity name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// The entity name this store belongs to (used in error messages).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts or overwrites a property. Returns `&mut self` for chaining.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert for store construction.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Removes a property, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Looks up a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Whether the store holds the given key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Copies every entry of `other` into this store (last write wins).
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={}", self.entries[*key].literal_form())?;
        }
        write!(f, "}}")
    }
}

/// Implemented by entities that can serve as an evaluation context.
pub trait PropertySource {
    /// Projects the entity's current attributes into a store snapshot.
    fn properties(&self) -> PropertyStore;
}
