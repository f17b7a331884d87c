//! Tree-walking evaluator for parsed rule formulas.
//!
//! Evaluation happens against an ambient [`PropertyStore`]. An identifier
//! that resolves in the store yields that property's value; an identifier
//! that does not resolve yields itself as an opaque literal, which is what
//! makes enum-like comparands (`ALIVE`, `Good`) work without quoting. A
//! dotted access whose left side is such an unresolved literal is looked up
//! on the ambient store, so `player.state` inside a `count` predicate reads
//! the current item's `state` regardless of the word used before the dot.

use crate::error::EvalError;
use crate::expr::functions::call_function;
use crate::expr::parser::{BinaryOp, Node, UnaryOp};
use crate::property::{PropertyStore, Value};

/// Evaluates [`Node`] trees against a property store.
#[derive(Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Evaluates `node` with `store` as the ambient context.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] for type mismatches, division by zero,
    /// unknown dotted properties, and bad function calls.
    pub fn evaluate(node: &Node, store: &PropertyStore) -> Result<Value, EvalError> {
        match node {
            Node::Empty => Ok(Value::Void),
            Node::Number(n) => Ok(Value::Number(*n)),
            Node::Identifier(name) => Ok(resolve_identifier(name, store)),
            Node::Unary { op, operand } => evaluate_unary(*op, operand, store),
            Node::Binary { op, left, right } => evaluate_binary(*op, left, right, store),
            Node::Call { function, args } => call_function(function, args, store),
        }
    }
}

fn resolve_identifier(name: &str, store: &PropertyStore) -> Value {
    store
        .get(name)
        .cloned()
        .unwrap_or_else(|| Value::Literal(name.to_string()))
}

fn evaluate_unary(op: UnaryOp, operand: &Node, store: &PropertyStore) -> Result<Value, EvalError> {
    let value = Evaluator::evaluate(operand, store)?;
    match op {
        UnaryOp::Negate => {
            let n = value
                .as_number()
                .ok_or_else(|| type_error("unary '-' requires a number", &value))?;
            Ok(Value::Number(-n))
        }
        UnaryOp::Not => {
            let b = value
                .as_bool()
                .ok_or_else(|| type_error("'not' requires a boolean", &value))?;
            Ok(Value::Bool(!b))
        }
    }
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Node,
    right: &Node,
    store: &PropertyStore,
) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Dot => evaluate_dot(left, right, store),
        BinaryOp::And | BinaryOp::Or => evaluate_logical(op, left, right, store),
        _ => {
            let lhs = Evaluator::evaluate(left, store)?;
            let rhs = Evaluator::evaluate(right, store)?;
            match op {
                BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                    evaluate_arithmetic(op, &lhs, &rhs)
                }
                BinaryOp::Equal => Ok(Value::Bool(lhs == rhs)),
                BinaryOp::NotEqual => Ok(Value::Bool(lhs != rhs)),
                BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
                    evaluate_ordering(op, &lhs, &rhs)
                }
                BinaryOp::Is => Ok(Value::Bool(is_same(&lhs, &rhs))),
                BinaryOp::IsNot => Ok(Value::Bool(!is_same(&lhs, &rhs))),
                BinaryOp::IsIn => evaluate_membership(&lhs, &rhs),
                BinaryOp::Dot | BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            }
        }
    }
}

/// `a.b`: the property `b` of whatever `a` names.
///
/// A store-valued left side scopes the lookup to that store. A literal left
/// side keeps the ambient store. A list left side supports only `size`.
fn evaluate_dot(left: &Node, right: &Node, store: &PropertyStore) -> Result<Value, EvalError> {
    let lhs = Evaluator::evaluate(left, store)?;

    let Node::Identifier(property) = right else {
        return Err(EvalError::Type(
            "right side of '.' must be a property name".to_string(),
        ));
    };

    let scope = match &lhs {
        Value::Store(inner) => inner,
        Value::Literal(_) => store,
        Value::List(items) => {
            if property != "size" {
                return Err(EvalError::Type(format!(
                    "only 'size' is supported on lists, got '{property}'"
                )));
            }
            #[allow(clippy::cast_precision_loss)]
            return Ok(Value::Number(items.len() as f64));
        }
        other => {
            return Err(type_error("left side of '.' must name an entity", other));
        }
    };

    scope
        .get(property)
        .cloned()
        .ok_or_else(|| EvalError::UnknownProperty {
            property: property.clone(),
            store: scope.name().to_string(),
        })
}

fn evaluate_arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (Some(l), Some(r)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(EvalError::Type(format!(
            "arithmetic '{}' requires numeric operands, got {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name(),
        )));
    };
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Divide => {
            if r == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            l / r
        }
        _ => unreachable!("caller dispatches arithmetic operators only"),
    };
    Ok(Value::Number(result))
}

fn evaluate_ordering(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (Some(l), Some(r)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(EvalError::Type(format!(
            "comparison '{}' requires numeric operands, got {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name(),
        )));
    };
    let result = match op {
        BinaryOp::Less => l < r,
        BinaryOp::Greater => l > r,
        BinaryOp::LessEqual => l <= r,
        BinaryOp::GreaterEqual => l >= r,
        _ => unreachable!("caller dispatches ordering operators only"),
    };
    Ok(Value::Bool(result))
}

/// `and` / `or` short-circuit; the unevaluated side may be erroneous.
fn evaluate_logical(
    op: BinaryOp,
    left: &Node,
    right: &Node,
    store: &PropertyStore,
) -> Result<Value, EvalError> {
    let lhs = Evaluator::evaluate(left, store)?;
    let l = lhs
        .as_bool()
        .ok_or_else(|| type_error("logical operator requires booleans", &lhs))?;

    let short_circuit = match op {
        BinaryOp::And => !l,
        BinaryOp::Or => l,
        _ => unreachable!("caller dispatches logical operators only"),
    };
    if short_circuit {
        return Ok(Value::Bool(l));
    }

    let rhs = Evaluator::evaluate(right, store)?;
    let r = rhs
        .as_bool()
        .ok_or_else(|| type_error("logical operator requires booleans", &rhs))?;
    Ok(Value::Bool(r))
}

/// `is`: same type and same string form.
fn is_same(lhs: &Value, rhs: &Value) -> bool {
    lhs.type_name() == rhs.type_name() && lhs.literal_form() == rhs.literal_form()
}

/// `is in`: the right side is a comma-separated literal of alternatives.
fn evaluate_membership(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let Value::Literal(set) = rhs else {
        return Err(type_error(
            "right side of 'is in' must be a comma-separated literal",
            rhs,
        ));
    };
    let needle = lhs.literal_form();
    let found = set.split(',').any(|item| item.trim() == needle);
    Ok(Value::Bool(found))
}

fn type_error(message: &str, value: &Value) -> EvalError {
    EvalError::Type(format!("{message}, got {}", value.type_name()))
}
