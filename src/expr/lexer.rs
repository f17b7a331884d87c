//! Tokenizer for rule formulas.
//!
//! Formulas are small one-line expressions such as
//! `count(players, player.state is ALIVE and player.alignment is Good) < 2`.
//! The tokenizer is regex-class driven; word operators (`and`, `or`, `not`,
//! `is`, `is not`, `is in`) and function names are case-insensitive.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::LexError;

/// Token classes produced by [`Lexer::tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Integer or decimal literal
    Number,
    /// Bare name: a property, an entity, or an enum-like literal
    Identifier,
    /// `.`
    Dot,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `,`
    Separator,
    /// `+ - * /`
    Arithmetic,
    /// `&& || ! and or not`
    Logical,
    /// `== != < > <= >=`
    Relational,
    /// `is`, `is not`, `is in`
    Keyword,
    /// `count`, `filter`, `contains`
    Function,
    /// End-of-input sentinel
    End,
}

/// A single lexed token. Word operators are normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token class
    pub kind: TokenKind,
    /// Token text
    pub value: String,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// The end-of-input sentinel.
    #[must_use]
    pub fn end() -> Self {
        Self::new(TokenKind::End, "")
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} '{}'", self.kind, self.value)
    }
}

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?").expect("regex"));
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*").expect("regex"));
static ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+\-*/]").expect("regex"));
// Relational is tried before logical so that `!=` is not split into `!` `=`.
static RELATIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(==|!=|<=|>=|<|>)").expect("regex"));
static LOGICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(&&|\|\||!|(and|or|not)\b)").expect("regex"));
// Longest-match-first: `is in` and `is not` before bare `is`.
static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(is in|is not|is)\b").expect("regex"));
static FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(count|filter|contains)\b").expect("regex"));

/// Converts formula text into a token stream terminated by [`TokenKind::End`].
#[derive(Debug, Default)]
pub struct Lexer;

impl Lexer {
    /// Tokenizes `input`.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::UnexpectedCharacter`] for any character that
    /// matches no token class.
    pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let bytes = input.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let rest = &input[i..];
            let c = rest.chars().next().expect("non-empty remainder");

            if c.is_whitespace() {
                i += c.len_utf8();
                continue;
            }

            let single = match c {
                '(' => Some(TokenKind::OpenParen),
                ')' => Some(TokenKind::CloseParen),
                '.' => Some(TokenKind::Dot),
                ',' => Some(TokenKind::Separator),
                _ => None,
            };
            if let Some(kind) = single {
                tokens.push(Token::new(kind, c.to_string()));
                i += 1;
                continue;
            }

            if let Some(m) = FUNCTION.find(rest) {
                tokens.push(Token::new(TokenKind::Function, m.as_str().to_lowercase()));
                i += m.end();
            } else if let Some(m) = ARITHMETIC.find(rest) {
                tokens.push(Token::new(TokenKind::Arithmetic, m.as_str()));
                i += m.end();
            } else if let Some(m) = RELATIONAL.find(rest) {
                tokens.push(Token::new(TokenKind::Relational, m.as_str()));
                i += m.end();
            } else if let Some(m) = LOGICAL.find(rest) {
                tokens.push(Token::new(TokenKind::Logical, m.as_str().to_lowercase()));
                i += m.end();
            } else if let Some(m) = KEYWORD.find(rest) {
                tokens.push(Token::new(TokenKind::Keyword, m.as_str().to_lowercase()));
                i += m.end();
            } else if let Some(m) = NUMBER.find(rest) {
                tokens.push(Token::new(TokenKind::Number, m.as_str()));
                i += m.end();
            } else if let Some(m) = IDENTIFIER.find(rest) {
                tokens.push(Token::new(TokenKind::Identifier, m.as_str()));
                i += m.end();
            } else {
                return Err(LexError::UnexpectedCharacter {
                    position: i,
                    character: c,
                });
            }
        }

        tokens.push(Token::end());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_arithmetic_expression() {
        assert_eq!(
            kinds("2 + 3 * 4"),
            vec![
                TokenKind::Number,
                TokenKind::Arithmetic,
                TokenKind::Number,
                TokenKind::Arithmetic,
                TokenKind::Number,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn tokenizes_count_call() {
        let tokens = Lexer::tokenize("count(players, player.state is ALIVE)").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Function);
        assert_eq!(tokens[0].value, "count");
        assert_eq!(tokens[1].kind, TokenKind::OpenParen);
        assert_eq!(tokens[3].kind, TokenKind::Separator);
        let keyword = tokens.iter().find(|t| t.kind == TokenKind::Keyword).unwrap();
        assert_eq!(keyword.value, "is");
    }

    #[test]
    fn keywords_longest_match_first() {
        let tokens = Lexer::tokenize("x is not y").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].value, "is not");

        let tokens = Lexer::tokenize("x is in y").unwrap();
        assert_eq!(tokens[1].value, "is in");
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = Lexer::tokenize("a IS b AND c OR NOT d").unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["a", "is", "b", "and", "c", "or", "not", "d", ""]);
    }

    #[test]
    fn not_equals_is_one_relational_token() {
        let tokens = Lexer::tokenize("a != b").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Relational);
        assert_eq!(tokens[1].value, "!=");
    }

    #[test]
    fn bang_alone_is_logical() {
        let tokens = Lexer::tokenize("!a").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Logical);
        assert_eq!(tokens[0].value, "!");
    }

    #[test]
    fn function_prefix_does_not_swallow_identifier() {
        let tokens = Lexer::tokenize("counter").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value, "counter");
    }

    #[test]
    fn word_operators_require_boundaries() {
        let tokens = Lexer::tokenize("android").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value, "android");
    }

    #[test]
    fn decimal_numbers() {
        let tokens = Lexer::tokenize("3.25").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, "3.25");
        assert_eq!(tokens[1].kind, TokenKind::End);
    }

    #[test]
    fn number_then_dot_then_identifier() {
        // `players.size` style access after a non-number
        let tokens = Lexer::tokenize("players.size").unwrap();
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = Lexer::tokenize("a # b").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                position: 2,
                character: '#'
            }
        );
    }

    #[test]
    fn whitespace_only_yields_end_sentinel() {
        let tokens = Lexer::tokenize("   \t ").unwrap();
        assert_eq!(tokens, vec![Token::end()]);
    }
}
