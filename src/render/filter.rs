//! # Filter Renderer
//!
//! Compiles a Condition / Conjunction tree into a native filter document
//! for plain (non-aggregation) queries.
//!
//! | Kind                  | Literal operand          | Field operand                    |
//! |-----------------------|--------------------------|----------------------------------|
//! | EQUALS ... NOT_EQUALS | `{ f: { $op: v } }`      | `{ $expr: { $op: ["$f", "$g"] } }` |
//! | CONTAINS              | `{ f: { $in: [..] } }`   | `{ $expr: { $in: ["$f", "$g"] } }` |
//! | NOT_CONTAINS          | `{ f: { $nin: [..] } }`  | `$not` of the `$in` form           |
//! | REGEX                 | `{ f: { $regex: p } }`   | `$regexMatch`                      |
//! | EXISTS                | `{ f: { $exists: b } }`  | unsupported                        |
//!
//! String literals compared against `_id` that look like 24-character
//! hexadecimal strings are embedded as native identifiers.

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::query::{
    Condition, ConditionKind, Conjunction, ConjunctionKind, Expr, Field, Operand, Sort,
};

use super::object_id::ObjectId;

/// Compile an expression tree into a native filter document
pub fn to_filter(expr: &Expr) -> QueryResult<Value> {
    expr.validate()?;
    render_expr(expr)
}

/// Compile a sort spec into a native sort document (`{ f: 1 | -1 }`)
pub fn to_sort(sort: &Sort) -> Value {
    let mut map = Map::new();
    for key in &sort.fields {
        map.insert(key.field.name.clone(), Value::from(key.direction.as_native()));
    }
    Value::Object(map)
}

/// Single-key document
pub(crate) fn doc(key: impl Into<String>, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.into(), value);
    Value::Object(map)
}

/// Native operator for a literal comparison in filter context
pub fn filter_operator(kind: ConditionKind) -> &'static str {
    match kind {
        ConditionKind::Equals => "$eq",
        ConditionKind::GreaterThan => "$gt",
        ConditionKind::GreaterThanOrEqual => "$gte",
        ConditionKind::LessThan => "$lt",
        ConditionKind::LessThanOrEqual => "$lte",
        ConditionKind::NotEquals => "$ne",
        ConditionKind::Contains => "$in",
        ConditionKind::NotContains => "$nin",
        ConditionKind::Exists => "$exists",
        ConditionKind::Regex => "$regex",
    }
}

/// Native boolean operator for a conjunction in filter context
pub fn conjunction_operator(kind: ConjunctionKind) -> &'static str {
    match kind {
        ConjunctionKind::And => "$and",
        ConjunctionKind::Or => "$or",
        ConjunctionKind::Not => "$nor",
    }
}

fn render_expr(expr: &Expr) -> QueryResult<Value> {
    match expr {
        Expr::Condition(condition) => render_condition(condition),
        Expr::Conjunction(conjunction) => render_conjunction(conjunction),
    }
}

fn render_conjunction(conjunction: &Conjunction) -> QueryResult<Value> {
    let values = conjunction
        .values
        .iter()
        .map(render_expr)
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(doc(
        conjunction_operator(conjunction.kind),
        Value::Array(values),
    ))
}

fn render_condition(condition: &Condition) -> QueryResult<Value> {
    let left = &condition.left_operand;
    match &condition.right_operand {
        Operand::Field(right) => render_field_comparison(condition.kind, left, right),
        Operand::Literal(value) => {
            let value = match condition.kind {
                ConditionKind::Exists | ConditionKind::Regex => value.clone(),
                _ => coerce_identifier(left, value),
            };
            Ok(doc(
                left.name.clone(),
                doc(filter_operator(condition.kind), value),
            ))
        }
    }
}

/// Field-to-field comparison; plain filter operators only take literals,
/// so these render in expression context.
fn render_field_comparison(
    kind: ConditionKind,
    left: &Field,
    right: &Field,
) -> QueryResult<Value> {
    let paths = Value::Array(vec![
        Value::String(left.path()),
        Value::String(right.path()),
    ]);
    let expression = match kind {
        ConditionKind::Equals
        | ConditionKind::GreaterThan
        | ConditionKind::GreaterThanOrEqual
        | ConditionKind::LessThan
        | ConditionKind::LessThanOrEqual
        | ConditionKind::NotEquals
        | ConditionKind::Contains => doc(filter_operator(kind), paths),
        ConditionKind::NotContains => doc("$not", Value::Array(vec![doc("$in", paths)])),
        ConditionKind::Regex => {
            let mut args = Map::new();
            args.insert("input".to_string(), Value::String(left.path()));
            args.insert("regex".to_string(), Value::String(right.path()));
            doc("$regexMatch", Value::Object(args))
        }
        ConditionKind::Exists => {
            return Err(QueryError::UnsupportedCondition {
                condition: kind.as_str(),
                context: "field comparison",
            })
        }
    };
    Ok(doc("$expr", expression))
}

/// Embed 24-hex strings compared against `_id` as native identifiers.
/// List operands are coerced element by element.
fn coerce_identifier(field: &Field, value: &Value) -> Value {
    if !field.is_id() {
        return value.clone();
    }
    match value {
        Value::String(s) => match ObjectId::parse_str(s) {
            Some(id) => id.to_wire(),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| coerce_identifier(field, item))
                .collect(),
        ),
        _ => value.clone(),
    }
}
