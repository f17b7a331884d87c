//! Operator-precedence (Pratt) parser for rule formulas.
//!
//! Binding powers, strongest first: postfix `.` (100), `*` `/` (60), `+` `-`
//! (50, unary minus as prefix), relational and `is` forms (40), prefix `not`
//! (35), `and` (30), `or` (20). Parenthesized sub-expressions require a
//! matching close; function calls collect a comma-separated argument list.

use std::collections::VecDeque;

use crate::error::ParseError;
use crate::expr::lexer::{Token, TokenKind};

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Numeric negation (`-x`)
    Negate,
    /// Boolean negation (`not x`, `!x`)
    Not,
}

/// Binary and postfix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Property access (`a.b`)
    Dot,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `is` — type-and-string-form equality
    Is,
    /// `is not`
    IsNot,
    /// `is in` — membership in a comma-separated literal
    IsIn,
    /// `and`, `&&`
    And,
    /// `or`, `||`
    Or,
}

impl BinaryOp {
    /// Left/right binding-power pair. Left < right gives left associativity.
    const fn binding_power(self) -> (u8, u8) {
        match self {
            Self::Dot => (100, 101),
            Self::Multiply | Self::Divide => (60, 61),
            Self::Add | Self::Subtract => (50, 51),
            Self::Equal
            | Self::NotEqual
            | Self::Less
            | Self::Greater
            | Self::LessEqual
            | Self::GreaterEqual
            | Self::Is
            | Self::IsNot
            | Self::IsIn => (40, 41),
            Self::And => (30, 31),
            Self::Or => (20, 21),
        }
    }

    /// Operator text for error messages.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Dot => ".",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::IsIn => "is in",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Right binding power of the prefix operators (`-x`, `not x`).
const NEGATE_POWER: u8 = 51;
const NOT_POWER: u8 = 35;

/// Parsed expression tree. Trees are cached by formula text, so parsing the
/// same formula twice must yield structurally equal nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Empty expression (whitespace-only formula)
    Empty,
    /// Numeric literal
    Number(f64),
    /// Bare name, resolved against the evaluation store at run time
    Identifier(String),
    /// Prefix operator application
    Unary {
        /// The operator
        op: UnaryOp,
        /// Operand subtree
        operand: Box<Node>,
    },
    /// Infix operator application
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left subtree
        left: Box<Node>,
        /// Right subtree
        right: Box<Node>,
    },
    /// Built-in function call with flattened argument list
    Call {
        /// Lowercased function name
        function: String,
        /// Arguments in source order
        args: Vec<Node>,
    },
}

/// Parses a lexed token stream into a [`Node`] tree.
#[derive(Debug, Default)]
pub struct Parser;

impl Parser {
    /// Parses a full expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] identifying the offending token for any
    /// unexpected token, missing operand, or unmatched parenthesis.
    pub fn parse(tokens: Vec<Token>) -> Result<Node, ParseError> {
        let mut stream = TokenStream {
            tokens: tokens.into(),
        };
        let node = parse_expr(&mut stream, 0, false)?;
        match stream.peek().kind {
            TokenKind::End => Ok(node),
            _ => Err(unexpected(stream.peek())),
        }
    }
}

struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    fn peek(&self) -> &Token {
        self.tokens.front().map_or(const { &END_TOKEN }, |t| t)
    }

    fn next(&mut self) -> Token {
        self.tokens.pop_front().unwrap_or_else(Token::end)
    }
}

static END_TOKEN: Token = Token {
    kind: TokenKind::End,
    value: String::new(),
};

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        kind: token.kind,
        value: token.value.clone(),
    }
}

fn parse_expr(
    stream: &mut TokenStream,
    min_power: u8,
    inside_parens: bool,
) -> Result<Node, ParseError> {
    let mut lhs = parse_prefix(stream, inside_parens)?;

    loop {
        let token = stream.peek();
        match token.kind {
            TokenKind::End | TokenKind::Separator => break,
            TokenKind::CloseParen => {
                if inside_parens {
                    break;
                }
                return Err(unexpected(token));
            }
            _ => {}
        }

        let op = infix_operator(token)?;
        let (left_power, right_power) = op.binding_power();
        if left_power < min_power {
            break;
        }

        stream.next();
        let rhs = parse_expr(stream, right_power, inside_parens)?;
        if rhs == Node::Empty {
            return Err(ParseError::MissingOperand {
                operator: op.symbol().to_string(),
            });
        }

        lhs = Node::Binary {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        };
    }

    Ok(lhs)
}

fn parse_prefix(stream: &mut TokenStream, inside_parens: bool) -> Result<Node, ParseError> {
    let token = stream.peek().clone();
    match token.kind {
        TokenKind::End => Ok(Node::Empty),
        TokenKind::Number => {
            stream.next();
            // The lexer guarantees the text is a valid decimal literal.
            let value: f64 = token.value.parse().map_err(|_| unexpected(&token))?;
            Ok(Node::Number(value))
        }
        TokenKind::Identifier => {
            stream.next();
            Ok(Node::Identifier(token.value))
        }
        TokenKind::OpenParen => parse_parenthesized(stream),
        TokenKind::Function => parse_call(stream),
        TokenKind::Arithmetic if token.value == "-" => {
            stream.next();
            parse_unary(stream, UnaryOp::Negate, NEGATE_POWER, inside_parens, "-")
        }
        TokenKind::Logical if token.value == "!" || token.value == "not" => {
            stream.next();
            parse_unary(stream, UnaryOp::Not, NOT_POWER, inside_parens, &token.value)
        }
        _ => Err(unexpected(&token)),
    }
}

fn parse_unary(
    stream: &mut TokenStream,
    op: UnaryOp,
    right_power: u8,
    inside_parens: bool,
    symbol: &str,
) -> Result<Node, ParseError> {
    let operand = parse_expr(stream, right_power, inside_parens)?;
    if operand == Node::Empty {
        return Err(ParseError::MissingOperand {
            operator: symbol.to_string(),
        });
    }
    Ok(Node::Unary {
        op,
        operand: Box::new(operand),
    })
}

fn parse_parenthesized(stream: &mut TokenStream) -> Result<Node, ParseError> {
    stream.next(); // '('
    let body = parse_expr(stream, 0, true)?;
    let close = stream.next();
    if close.kind != TokenKind::CloseParen {
        return Err(ParseError::UnmatchedParenthesis);
    }
    Ok(body)
}

fn parse_call(stream: &mut TokenStream) -> Result<Node, ParseError> {
    let callee = stream.next();
    if stream.peek().kind != TokenKind::OpenParen {
        return Err(unexpected(stream.peek()));
    }
    stream.next(); // '('

    let mut args = Vec::new();
    if stream.peek().kind != TokenKind::CloseParen {
        loop {
            let arg = parse_expr(stream, 0, true)?;
            if arg == Node::Empty {
                return Err(ParseError::UnexpectedEnd);
            }
            args.push(arg);
            match stream.peek().kind {
                TokenKind::Separator => {
                    stream.next();
                }
                _ => break,
            }
        }
    }

    let close = stream.next();
    if close.kind != TokenKind::CloseParen {
        return Err(ParseError::UnmatchedParenthesis);
    }

    Ok(Node::Call {
        function: callee.value,
        args,
    })
}

fn infix_operator(token: &Token) -> Result<BinaryOp, ParseError> {
    let op = match (token.kind, token.value.as_str()) {
        (TokenKind::Dot, _) => BinaryOp::Dot,
        (TokenKind::Arithmetic, "*") => BinaryOp::Multiply,
        (TokenKind::Arithmetic, "/") => BinaryOp::Divide,
        (TokenKind::Arithmetic, "+") => BinaryOp::Add,
        (TokenKind::Arithmetic, "-") => BinaryOp::Subtract,
        (TokenKind::Relational, "==") => BinaryOp::Equal,
        (TokenKind::Relational, "!=") => BinaryOp::NotEqual,
        (TokenKind::Relational, "<") => BinaryOp::Less,
        (TokenKind::Relational, ">") => BinaryOp::Greater,
        (TokenKind::Relational, "<=") => BinaryOp::LessEqual,
        (TokenKind::Relational, ">=") => BinaryOp::GreaterEqual,
        (TokenKind::Keyword, "is") => BinaryOp::Is,
        (TokenKind::Keyword, "is not") => BinaryOp::IsNot,
        (TokenKind::Keyword, "is in") => BinaryOp::IsIn,
        (TokenKind::Logical, "and" | "&&") => BinaryOp::And,
        (TokenKind::Logical, "or" | "||") => BinaryOp::Or,
        _ => return Err(unexpected(token)),
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::Lexer;

    fn parse(input: &str) -> Node {
        Parser::parse(Lexer::tokenize(input).unwrap()).unwrap()
    }

    fn parse_err(input: &str) -> ParseError {
        Parser::parse(Lexer::tokenize(input).unwrap()).unwrap_err()
    }

    fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn parsing_the_same_text_yields_equal_trees() {
        let text = "count(players, player.state is ALIVE) < 2 or paused";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("2 + 3 * 4"),
            binary(
                BinaryOp::Add,
                Node::Number(2.0),
                binary(BinaryOp::Multiply, Node::Number(3.0), Node::Number(4.0)),
            )
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parse("(2 + 3) * 4"),
            binary(
                BinaryOp::Multiply,
                binary(BinaryOp::Add, Node::Number(2.0), Node::Number(3.0)),
                Node::Number(4.0),
            )
        );
    }

    #[test]
    fn addition_is_left_associative() {
        assert_eq!(
            parse("1 - 2 - 3"),
            binary(
                BinaryOp::Subtract,
                binary(BinaryOp::Subtract, Node::Number(1.0), Node::Number(2.0)),
                Node::Number(3.0),
            )
        );
    }

    #[test]
    fn dot_chains_left_associative() {
        assert_eq!(
            parse("player.role.alignment"),
            binary(
                BinaryOp::Dot,
                binary(
                    BinaryOp::Dot,
                    Node::Identifier("player".into()),
                    Node::Identifier("role".into()),
                ),
                Node::Identifier("alignment".into()),
            )
        );
    }

    #[test]
    fn dot_binds_tighter_than_is() {
        assert_eq!(
            parse("player.state is ALIVE"),
            binary(
                BinaryOp::Is,
                binary(
                    BinaryOp::Dot,
                    Node::Identifier("player".into()),
                    Node::Identifier("state".into()),
                ),
                Node::Identifier("ALIVE".into()),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse("a or b and c"),
            binary(
                BinaryOp::Or,
                Node::Identifier("a".into()),
                binary(
                    BinaryOp::And,
                    Node::Identifier("b".into()),
                    Node::Identifier("c".into()),
                ),
            )
        );
    }

    #[test]
    fn not_binds_looser_than_relational() {
        // `not 1 == 1` parses as `not (1 == 1)`
        assert_eq!(
            parse("not 1 == 1"),
            Node::Unary {
                op: UnaryOp::Not,
                operand: Box::new(binary(BinaryOp::Equal, Node::Number(1.0), Node::Number(1.0))),
            }
        );
    }

    #[test]
    fn unary_minus() {
        assert_eq!(
            parse("-3 + 5"),
            binary(
                BinaryOp::Add,
                Node::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(Node::Number(3.0)),
                },
                Node::Number(5.0),
            )
        );
    }

    #[test]
    fn call_collects_arguments() {
        let node = parse("count(players, player.state is ALIVE)");
        let Node::Call { function, args } = node else {
            panic!("expected call");
        };
        assert_eq!(function, "count");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], Node::Identifier("players".into()));
    }

    #[test]
    fn nested_calls() {
        let node = parse("count(filter(players, player.state is ALIVE), player.alignment is Good)");
        let Node::Call { function, args } = node else {
            panic!("expected call");
        };
        assert_eq!(function, "count");
        assert!(matches!(&args[0], Node::Call { function, .. } if function == "filter"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "count(players, player.state is ALIVE and player.alignment is Good) < 2";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn missing_close_paren_is_reported() {
        assert_eq!(parse_err("(1 + 2"), ParseError::UnmatchedParenthesis);
        assert_eq!(
            parse_err("count(players, player.state is ALIVE"),
            ParseError::UnmatchedParenthesis
        );
    }

    #[test]
    fn stray_close_paren_is_unexpected() {
        assert!(matches!(
            parse_err("1 + 2)"),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn missing_operand_is_reported() {
        assert_eq!(
            parse_err("1 +"),
            ParseError::MissingOperand {
                operator: "+".to_string()
            }
        );
        assert_eq!(
            parse_err("not"),
            ParseError::MissingOperand {
                operator: "not".to_string()
            }
        );
    }

    #[test]
    fn empty_input_parses_to_empty() {
        assert_eq!(parse(""), Node::Empty);
    }

    #[test]
    fn lone_separator_is_unexpected() {
        assert!(matches!(
            parse_err(", 1"),
            ParseError::UnexpectedToken { .. }
        ));
    }
}
