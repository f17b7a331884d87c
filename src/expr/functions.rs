//! Built-in formula functions: `count`, `filter`, `contains`.
//!
//! All three take a list and a predicate. The predicate is re-evaluated once
//! per item with the item's own store as the ambient context, which is why
//! `count(players, player.state is ALIVE)` reads each roster entry in turn.

use crate::error::EvalError;
use crate::expr::eval::Evaluator;
use crate::expr::parser::Node;
use crate::property::{PropertyStore, Value};

/// Dispatches a parsed call node to the matching built-in.
///
/// # Errors
///
/// Returns [`EvalError::UnknownFunction`] for an unrecognized name, and
/// propagates argument and predicate evaluation failures.
pub fn call_function(
    function: &str,
    args: &[Node],
    store: &PropertyStore,
) -> Result<Value, EvalError> {
    match function {
        "count" => count(args, store),
        "filter" => filter(args, store),
        "contains" => contains(args, store),
        _ => Err(EvalError::UnknownFunction(function.to_string())),
    }
}

fn count(args: &[Node], store: &PropertyStore) -> Result<Value, EvalError> {
    let (items, predicate) = list_and_predicate("count", args, store)?;
    let mut matched = 0usize;
    for item in &items {
        if predicate_holds(predicate, item)? {
            matched += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(Value::Number(matched as f64))
}

fn filter(args: &[Node], store: &PropertyStore) -> Result<Value, EvalError> {
    let (items, predicate) = list_and_predicate("filter", args, store)?;
    let mut kept = Vec::new();
    for item in items {
        if predicate_holds(predicate, &item)? {
            kept.push(Value::Store(item));
        }
    }
    Ok(Value::List(kept))
}

fn contains(args: &[Node], store: &PropertyStore) -> Result<Value, EvalError> {
    let (items, predicate) = list_and_predicate("contains", args, store)?;
    for item in &items {
        if predicate_holds(predicate, item)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// Checks arity, evaluates the first argument to a list of stores, and
/// hands back the unevaluated predicate node.
fn list_and_predicate<'a>(
    function: &'static str,
    args: &'a [Node],
    store: &PropertyStore,
) -> Result<(Vec<PropertyStore>, &'a Node), EvalError> {
    let [list_arg, predicate] = args else {
        return Err(EvalError::ArgumentMismatch {
            function,
            expected: 2,
            actual: args.len(),
        });
    };

    let list = Evaluator::evaluate(list_arg, store)?;
    let Value::List(items) = list else {
        return Err(EvalError::Type(format!(
            "first argument of '{function}' must be a list, got {}",
            list.type_name()
        )));
    };

    let mut stores = Vec::with_capacity(items.len());
    for item in items {
        let Value::Store(item_store) = item else {
            return Err(EvalError::Type(format!(
                "'{function}' items must carry properties, got {}",
                item.type_name()
            )));
        };
        stores.push(item_store);
    }

    Ok((stores, predicate))
}

fn predicate_holds(predicate: &Node, item: &PropertyStore) -> Result<bool, EvalError> {
    let result = Evaluator::evaluate(predicate, item)?;
    result
        .as_bool()
        .ok_or_else(|| EvalError::Type(format!("predicate must be boolean, got {}", result.type_name())))
}
