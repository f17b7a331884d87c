//! Error types for Nocturne.
//!
//! The expression engine reports lexing, parsing, and evaluation failures as
//! separate kinds so callers can decide which ones are recoverable. Rule
//! scanning treats any of them as "this rule does not match"; lookup failures
//! in engine wiring (missing configuration, unknown ability) are fatal to the
//! current resolution step and propagate.

use thiserror::Error;

use crate::expr::lexer::TokenKind;

/// Top-level error type aggregating all domain errors.
#[derive(Debug, Error)]
pub enum NocturneError {
    /// Expression lexing, parsing, or evaluation error
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// Engine wiring or content lookup error
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type alias for Nocturne operations.
pub type Result<T> = std::result::Result<T, NocturneError>;

/// Any failure produced while compiling or evaluating a formula.
///
/// One formula failing inside a rule category is not fatal: callers scanning
/// a category treat the rule as non-matching and continue.
#[derive(Debug, Error)]
pub enum ExprError {
    /// Tokenization failed
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Parsing failed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Evaluation failed
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Tokenizer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A character matched no token class
    #[error("unexpected character at position {position}: '{character}'")]
    UnexpectedCharacter {
        /// Byte offset into the formula text
        position: usize,
        /// The offending character
        character: char,
    },
}

/// Parser errors, each identifying the offending token where one exists.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A token appeared where the grammar does not allow it
    #[error("unexpected token '{value}' with kind {kind:?}")]
    UnexpectedToken {
        /// Token kind as produced by the lexer
        kind: TokenKind,
        /// Token text
        value: String,
    },

    /// An infix or prefix operator is missing its right-hand operand
    #[error("right hand side of '{operator}' is missing")]
    MissingOperand {
        /// The operator text
        operator: String,
    },

    /// An opening parenthesis was never closed
    #[error("expected ')'")]
    UnmatchedParenthesis,

    /// The token stream ended mid-expression
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

/// Evaluator errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Operator or function applied to a wrongly-typed operand
    #[error("type error: {0}")]
    Type(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// A dotted property was not found on the left-hand store
    #[error("property '{property}' not found for {store}")]
    UnknownProperty {
        /// The property name looked up
        property: String,
        /// The name of the store that was searched
        store: String,
    },

    /// A call named a function the engine does not provide
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments
    #[error("function '{function}' expects {expected} arguments, got {actual}")]
    ArgumentMismatch {
        /// Function name
        function: &'static str,
        /// Expected argument count
        expected: usize,
        /// Actual argument count
        actual: usize,
    },
}

/// Engine wiring errors. These indicate a data or configuration defect
/// rather than a normal gameplay outcome, and are fatal to the current
/// resolution step.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration entry the engine requires is absent
    #[error("missing configuration entry '{name}' in category '{category}'")]
    MissingConfiguration {
        /// Configuration category
        category: String,
        /// Entry name within the category
        name: String,
    },

    /// A submitted response referenced an ability its role does not have
    #[error("ability '{0}' not found on the responding player's role")]
    UnknownAbility(String),

    /// An ability name mapped to no known action kind
    #[error("ability name '{0}' maps to no action kind")]
    UnknownAction(String),

    /// A player id referenced a roster slot that does not exist
    #[error("player id {0} not in roster")]
    UnknownPlayer(usize),

    /// Role distribution could not be completed
    #[error("role distribution failed: {0}")]
    Distribution(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display_names_position_and_character() {
        let err = LexError::UnexpectedCharacter {
            position: 7,
            character: '#',
        };
        assert_eq!(err.to_string(), "unexpected character at position 7: '#'");
    }

    #[test]
    fn parse_error_display_names_token() {
        let err = ParseError::UnexpectedToken {
            kind: TokenKind::Separator,
            value: ",".to_string(),
        };
        assert!(err.to_string().contains(','));
    }

    #[test]
    fn expr_error_wraps_all_stages() {
        let lex: ExprError = LexError::UnexpectedCharacter {
            position: 0,
            character: '@',
        }
        .into();
        let parse: ExprError = ParseError::UnexpectedEnd.into();
        let eval: ExprError = EvalError::DivisionByZero.into();
        assert!(matches!(lex, ExprError::Lex(_)));
        assert!(matches!(parse, ExprError::Parse(_)));
        assert!(matches!(eval, ExprError::Eval(_)));
    }

    #[test]
    fn top_level_error_from_engine() {
        let err: NocturneError = EngineError::UnknownAbility("smite".to_string()).into();
        assert!(err.to_string().contains("smite"));
    }
}
