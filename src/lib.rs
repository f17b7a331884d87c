//! Nocturne: a social-deduction match engine.
//!
//! Roles, presets, rules, and configuration arrive as data; a small formula
//! language drives win conditions, ability gating, and role disclosure. The
//! engine runs the night/day/discussion/voting loop over async channels
//! until one side wins.

pub mod action;
pub mod channel;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod expr;
pub mod observability;
pub mod player;
pub mod property;
pub mod role;
pub mod vote;

pub use error::{NocturneError, Result};
