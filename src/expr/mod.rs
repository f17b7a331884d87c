//! The rule-formula engine: lexer, parser, evaluator, and a memoizing facade.
//!
//! Formulas arrive as short strings inside game content (win conditions,
//! ability triggers, reveal rules) and are re-evaluated every round against a
//! fresh snapshot of game state. [`ExpressionEngine`] caches the parsed tree
//! per formula text so repeated evaluation skips lexing and parsing.

pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::error::{EvalError, ExprError};
use crate::expr::eval::Evaluator;
use crate::expr::lexer::Lexer;
use crate::expr::parser::{Node, Parser};
use crate::property::{PropertyStore, Value};

/// Compiles and evaluates rule formulas with a shared parse cache.
///
/// Cloning is cheap; clones share the cache.
#[derive(Debug, Default, Clone)]
pub struct ExpressionEngine {
    cache: Arc<DashMap<String, Arc<Node>>>,
}

impl ExpressionEngine {
    /// Creates an engine with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-parses a batch of formulas so later evaluation cannot hit a parse
    /// error mid-phase.
    ///
    /// # Errors
    ///
    /// Returns the first lex or parse failure.
    pub fn load<'a, I>(&self, formulas: I) -> Result<(), ExprError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for formula in formulas {
            self.compile(formula)?;
        }
        Ok(())
    }

    /// Evaluates `formula` against `store`, compiling and caching on miss.
    ///
    /// # Errors
    ///
    /// Returns lex, parse, or evaluation failures.
    pub fn evaluate(&self, formula: &str, store: &PropertyStore) -> Result<Value, ExprError> {
        let node = self.compile(formula)?;
        let value = Evaluator::evaluate(&node, store)?;
        trace!(formula, result = %value.literal_form(), "formula evaluated");
        Ok(value)
    }

    /// Evaluates `formula` and requires a boolean result.
    ///
    /// # Errors
    ///
    /// As [`Self::evaluate`], plus a type error for non-boolean results.
    pub fn evaluate_bool(&self, formula: &str, store: &PropertyStore) -> Result<bool, ExprError> {
        let value = self.evaluate(formula, store)?;
        let b = value.as_bool().ok_or_else(|| {
            ExprError::from(EvalError::Type(format!(
                "rule formula must be boolean, got {}",
                value.type_name()
            )))
        })?;
        Ok(b)
    }

    /// Number of distinct formulas compiled so far.
    #[must_use]
    pub fn cached_formulas(&self) -> usize {
        self.cache.len()
    }

    fn compile(&self, formula: &str) -> Result<Arc<Node>, ExprError> {
        if let Some(node) = self.cache.get(formula) {
            return Ok(Arc::clone(&node));
        }
        let tokens = Lexer::tokenize(formula)?;
        let node = Arc::new(Parser::parse(tokens)?);
        self.cache
            .insert(formula.to_string(), Arc::clone(&node));
        Ok(node)
    }
}
