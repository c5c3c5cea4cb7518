//! Element-scoped condition rendering
//!
//! Inside a computed-field `$filter`, every leaf field resolves against the
//! current array element (`$$this.<field>`), and conditions render in
//! aggregation-expression form (`{ $op: [left, right] }`).
//!
//! EXISTS cannot use the plain existence operator here. It is re-encoded as
//! "coalesce the element field with null, then compare to null":
//!
//! ```text
//! exists()      => { "$ne": [{ "$ifNull": ["$$this.f", null] }, null] }
//! not_exists()  => { "$eq": [{ "$ifNull": ["$$this.f", null] }, null] }
//! ```
//!
//! A field that is present but explicitly `null` therefore counts as absent.

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::query::{Condition, ConditionKind, Conjunction, ConjunctionKind, Expr, Field, Operand};

use super::filter::doc;

/// Prefix resolving a path against the current `$filter` element
const ELEMENT_PREFIX: &str = "$$this.";

/// Render `expr` as a `$filter` condition over array elements
pub fn to_element_condition(expr: &Expr) -> QueryResult<Value> {
    match expr {
        Expr::Condition(condition) => render_condition(condition),
        Expr::Conjunction(conjunction) => render_conjunction(conjunction),
    }
}

/// Path of `field` on the current element
pub fn element_path(field: &Field) -> String {
    format!("{}{}", ELEMENT_PREFIX, field.name)
}

fn render_conjunction(conjunction: &Conjunction) -> QueryResult<Value> {
    let values = conjunction
        .values
        .iter()
        .map(to_element_condition)
        .collect::<QueryResult<Vec<_>>>()?;

    Ok(match conjunction.kind {
        ConjunctionKind::And => doc("$and", Value::Array(values)),
        ConjunctionKind::Or => doc("$or", Value::Array(values)),
        // Expression context has no $nor
        ConjunctionKind::Not => doc("$not", Value::Array(vec![doc("$or", Value::Array(values))])),
    })
}

fn render_condition(condition: &Condition) -> QueryResult<Value> {
    let left = Value::String(element_path(&condition.left_operand));
    let right = match &condition.right_operand {
        Operand::Field(field) => Value::String(element_path(field)),
        Operand::Literal(value) => literal(value),
    };
    let pair = |op: &str, left: Value, right: Value| doc(op, Value::Array(vec![left, right]));

    Ok(match condition.kind {
        ConditionKind::Equals => pair("$eq", left, right),
        ConditionKind::GreaterThan => pair("$gt", left, right),
        ConditionKind::GreaterThanOrEqual => pair("$gte", left, right),
        ConditionKind::LessThan => pair("$lt", left, right),
        ConditionKind::LessThanOrEqual => pair("$lte", left, right),
        ConditionKind::NotEquals => pair("$ne", left, right),
        ConditionKind::Contains => pair("$in", left, right),
        ConditionKind::NotContains => doc("$not", Value::Array(vec![pair("$in", left, right)])),
        ConditionKind::Regex => {
            let mut args = Map::new();
            args.insert("input".to_string(), left);
            args.insert("regex".to_string(), right);
            doc("$regexMatch", Value::Object(args))
        }
        ConditionKind::Exists => {
            let present = match right {
                Value::Bool(flag) => flag,
                _ => {
                    return Err(QueryError::UnsupportedCondition {
                        condition: condition.kind.as_str(),
                        context: "element filter",
                    })
                }
            };
            let coalesced = pair("$ifNull", left, Value::Null);
            pair(if present { "$ne" } else { "$eq" }, coalesced, Value::Null)
        }
    })
}

/// Literals in expression context must not be read as field paths or
/// operators, at any depth
fn literal(value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with('$') => doc("$literal", value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(literal).collect()),
        Value::Object(map) if map.keys().any(|key| key.starts_with('$')) => {
            doc("$literal", value.clone())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), literal(item)))
                .collect(),
        ),
        _ => value.clone(),
    }
}
