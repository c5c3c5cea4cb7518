//! Filter and expression evaluation for the in-memory engine
//!
//! Interprets rendered wire documents against JSON documents. Covers the
//! operators the renderers emit; anything else is a command error, the
//! same way a real engine rejects an unknown operator.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use super::{DriverError, DriverResult};
use crate::render::ObjectId;

/// Checks if `document` matches a filter document
pub fn matches(document: &Value, filter: &Value) -> DriverResult<bool> {
    let clauses = filter
        .as_object()
        .ok_or_else(|| DriverError::command(format!("filter must be a document: {}", filter)))?;

    for (key, operand) in clauses {
        let matched = match key.as_str() {
            "$and" => all(document, operand)?,
            "$or" => any(document, operand)?,
            "$nor" => !any(document, operand)?,
            "$expr" => truthy(&evaluate(document, operand)?),
            other if other.starts_with('$') => {
                return Err(DriverError::command(format!("unknown top-level operator {}", other)))
            }
            field => field_matches(resolve(document, field), operand)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn branches(operand: &Value) -> DriverResult<&Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| DriverError::command("logical operator expects an array"))
}

fn all(document: &Value, operand: &Value) -> DriverResult<bool> {
    for branch in branches(operand)? {
        if !matches(document, branch)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any(document: &Value, operand: &Value) -> DriverResult<bool> {
    for branch in branches(operand)? {
        if matches(document, branch)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Resolve a dotted path. `None` means the field is missing.
pub fn resolve<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn is_operator_document(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| !map.is_empty() && map.keys().all(|key| key.starts_with('$')))
        .unwrap_or(false)
        && ObjectId::from_wire(value).is_none()
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> DriverResult<bool> {
    if !is_operator_document(condition) {
        return Ok(equals_or_contains(actual, condition));
    }

    let operators = condition.as_object().into_iter().flatten();
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals_or_contains(actual, operand),
            "$ne" => !equals_or_contains(actual, operand),
            "$gt" => ordered(actual, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(actual, operand, |o| o != Ordering::Less),
            "$lt" => ordered(actual, operand, |o| o == Ordering::Less),
            "$lte" => ordered(actual, operand, |o| o != Ordering::Greater),
            "$in" => in_list(actual, operand)?,
            "$nin" => !in_list(actual, operand)?,
            "$exists" => actual.is_some() == truthy(operand),
            "$regex" => match (actual, operand.as_str()) {
                (Some(Value::String(text)), Some(pattern)) => compile(pattern)?.is_match(text),
                (_, Some(_)) => false,
                (_, None) => return Err(DriverError::command("$regex expects a string")),
            },
            other => return Err(DriverError::command(format!("unknown operator {}", other))),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with array-field semantics: an array field matches when it
/// equals the operand or contains it. A missing field equals null.
fn equals_or_contains(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) if value == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

fn ordered(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) if !bound.is_array() => items
            .iter()
            .any(|item| compare(item, bound).map(&accept).unwrap_or(false)),
        Some(value) => compare(value, bound).map(accept).unwrap_or(false),
    }
}

fn in_list(actual: Option<&Value>, operand: &Value) -> DriverResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| DriverError::command("$in / $nin expect an array"))?;
    Ok(candidates
        .iter()
        .any(|candidate| equals_or_contains(actual, candidate)))
}

fn compile(pattern: &str) -> DriverResult<Regex> {
    Regex::new(pattern).map_err(|e| DriverError::command(format!("invalid regex: {}", e)))
}

/// Ordering within one type bracket; `None` across brackets
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (ObjectId::from_wire(a), ObjectId::from_wire(b)) {
        return Some(a.cmp(&b));
    }
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(value) if ObjectId::from_wire(value).is_some() => 5,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 6,
    }
}

/// Total order used by `$sort`: type bracket first, then value
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Aggregation-expression truthiness
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// Evaluate an aggregation expression against `document`
pub fn evaluate(document: &Value, expression: &Value) -> DriverResult<Value> {
    match expression {
        Value::String(path) if path.starts_with("$$") => Err(DriverError::command(format!(
            "variable {} is not bound",
            path
        ))),
        Value::String(path) if path.starts_with('$') => {
            Ok(resolve(document, &path[1..])
                .cloned()
                .unwrap_or(Value::Null))
        }
        Value::Object(map) if map.len() == 1 && is_operator_document(expression) => {
            let (operator, operand) = map
                .iter()
                .next()
                .ok_or_else(|| DriverError::command("empty expression"))?;
            apply(document, operator, operand)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(document, item))
            .collect::<DriverResult<Vec<_>>>()
            .map(Value::Array),
        literal => Ok(literal.clone()),
    }
}

fn arguments(document: &Value, operand: &Value) -> DriverResult<Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| DriverError::command("expression operator expects an array"))?
        .iter()
        .map(|item| evaluate(document, item))
        .collect()
}

fn pair(document: &Value, operand: &Value) -> DriverResult<(Value, Value)> {
    let mut args = arguments(document, operand)?.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(DriverError::command("comparison expects two arguments")),
    }
}

fn apply(document: &Value, operator: &str, operand: &Value) -> DriverResult<Value> {
    let result = match operator {
        "$literal" => return Ok(operand.clone()),
        "$eq" => {
            let (l, r) = pair(document, operand)?;
            l == r
        }
        "$ne" => {
            let (l, r) = pair(document, operand)?;
            l != r
        }
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let (l, r) = pair(document, operand)?;
            let ordering = sort_order(Some(&l), Some(&r));
            match operator {
                "$gt" => ordering == Ordering::Greater,
                "$gte" => ordering != Ordering::Less,
                "$lt" => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
        "$in" => {
            let (needle, haystack) = pair(document, operand)?;
            haystack
                .as_array()
                .ok_or_else(|| DriverError::command("$in expects an array as second argument"))?
                .contains(&needle)
        }
        "$and" => arguments(document, operand)?.iter().all(truthy),
        "$or" => arguments(document, operand)?.iter().any(truthy),
        "$not" => !arguments(document, operand)?
            .first()
            .map(truthy)
            .unwrap_or(false),
        "$ifNull" => {
            let args = arguments(document, operand)?;
            return Ok(args
                .iter()
                .find(|value| !value.is_null())
                .or_else(|| args.last())
                .cloned()
                .unwrap_or(Value::Null));
        }
        "$regexMatch" => {
            let input = evaluate(document, operand.get("input").unwrap_or(&Value::Null))?;
            let regex = evaluate(document, operand.get("regex").unwrap_or(&Value::Null))?;
            match (input.as_str(), regex.as_str()) {
                (Some(text), Some(pattern)) => compile(pattern)?.is_match(text),
                _ => false,
            }
        }
        other => {
            return Err(DriverError::command(format!(
                "unsupported expression operator {}",
                other
            )))
        }
    };
    Ok(Value::Bool(result))
}
