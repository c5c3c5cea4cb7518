//! Condition / Conjunction expression tree
//!
//! A `Condition` is a leaf comparing a field against a literal or against
//! another field. A `Conjunction` combines conditions and conjunctions with
//! AND / OR / NOT. Trees are immutable values built by the methods on
//! [`Field`] and the [`and`], [`or`] and [`not`] combinators.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::field::Field;

/// Comparison kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    Equals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    NotEquals,
    Contains,
    NotContains,
    Exists,
    Regex,
}

impl ConditionKind {
    /// Get the kind name used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Equals => "EQUALS",
            ConditionKind::GreaterThan => "GREATER_THAN",
            ConditionKind::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            ConditionKind::LessThan => "LESS_THAN",
            ConditionKind::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            ConditionKind::NotEquals => "NOT_EQUALS",
            ConditionKind::Contains => "CONTAINS",
            ConditionKind::NotContains => "NOT_CONTAINS",
            ConditionKind::Exists => "EXISTS",
            ConditionKind::Regex => "REGEX",
        }
    }

    /// Every kind, in declaration order
    pub const ALL: [ConditionKind; 10] = [
        ConditionKind::Equals,
        ConditionKind::GreaterThan,
        ConditionKind::GreaterThanOrEqual,
        ConditionKind::LessThan,
        ConditionKind::LessThanOrEqual,
        ConditionKind::NotEquals,
        ConditionKind::Contains,
        ConditionKind::NotContains,
        ConditionKind::Exists,
        ConditionKind::Regex,
    ];
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operand {
    /// A literal value (an array for CONTAINS / NOT_CONTAINS, a boolean for EXISTS)
    Literal(Value),
    /// Another field, requesting a field-to-field comparison
    Field(Field),
}

impl Operand {
    /// True if this operand names another field
    pub fn is_field(&self) -> bool {
        matches!(self, Operand::Field(_))
    }

    /// The literal value, if this is a literal
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Operand::Literal(value) => Some(value),
            Operand::Field(_) => None,
        }
    }
}

impl From<Field> for Operand {
    fn from(field: Field) -> Self {
        Operand::Field(field)
    }
}

impl From<&Field> for Operand {
    fn from(field: &Field) -> Self {
        Operand::Field(field.clone())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Operand::Literal(Value::Array(values.into_iter().map(Into::into).collect()))
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Operand {
    fn from(values: &[T]) -> Self {
        Operand::Literal(Value::Array(
            values.iter().cloned().map(Into::into).collect(),
        ))
    }
}

macro_rules! literal_operand {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Literal(Value::from(value))
                }
            }
        )+
    };
}

literal_operand!(&str, String, bool, i32, i64, u32, u64, f64);

impl From<&String> for Operand {
    fn from(value: &String) -> Self {
        Operand::Literal(Value::from(value.as_str()))
    }
}

/// A leaf comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Comparison kind
    #[serde(rename = "condition")]
    pub kind: ConditionKind,
    /// Field being compared
    pub left_operand: Field,
    /// Literal or field compared against
    pub right_operand: Operand,
}

impl Condition {
    /// Create a condition
    pub fn new(kind: ConditionKind, left: Field, right: impl Into<Operand>) -> Self {
        Self {
            kind,
            left_operand: left,
            right_operand: right.into(),
        }
    }

    /// True if the right operand is another field
    pub fn compares_fields(&self) -> bool {
        self.right_operand.is_field()
    }
}

/// Boolean combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConjunctionKind {
    And,
    Or,
    Not,
}

impl ConjunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConjunctionKind::And => "AND",
            ConjunctionKind::Or => "OR",
            ConjunctionKind::Not => "NOT",
        }
    }
}

/// A boolean combination of expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conjunction {
    #[serde(rename = "conjunction")]
    pub kind: ConjunctionKind,
    /// Children in caller order; may be empty
    pub values: Vec<Expr>,
}

impl Conjunction {
    /// True if the conjunction has no children
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Condition(Condition),
    Conjunction(Conjunction),
}

impl Expr {
    /// Visit every leaf condition, depth first
    pub fn for_each_condition<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        match self {
            Expr::Condition(condition) => visit(condition),
            Expr::Conjunction(conjunction) => {
                for value in &conjunction.values {
                    value.for_each_condition(visit);
                }
            }
        }
    }
}

impl From<Condition> for Expr {
    fn from(condition: Condition) -> Self {
        Expr::Condition(condition)
    }
}

impl From<Conjunction> for Expr {
    fn from(conjunction: Conjunction) -> Self {
        Expr::Conjunction(conjunction)
    }
}

fn conjunction<I, E>(kind: ConjunctionKind, values: I) -> Conjunction
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Conjunction {
        kind,
        values: values.into_iter().map(Into::into).collect(),
    }
}

/// All children must hold. `and(Vec::<Expr>::new())` is a valid, empty conjunction.
pub fn and<I, E>(values: I) -> Conjunction
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    conjunction(ConjunctionKind::And, values)
}

/// At least one child must hold
pub fn or<I, E>(values: I) -> Conjunction
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    conjunction(ConjunctionKind::Or, values)
}

/// No child may hold
pub fn not<I, E>(values: I) -> Conjunction
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    conjunction(ConjunctionKind::Not, values)
}

/// Condition builders bound to a field.
///
/// The left operand is always the unqualified field: a source tag only
/// matters to stages such as joins, never to the comparison itself.
impl Field {
    fn condition(&self, kind: ConditionKind, right: impl Into<Operand>) -> Condition {
        Condition::new(kind, self.unqualified(), right)
    }

    pub fn equals(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::Equals, right)
    }

    pub fn greater_than(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::GreaterThan, right)
    }

    pub fn greater_than_or_equal(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::GreaterThanOrEqual, right)
    }

    pub fn less_than(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::LessThan, right)
    }

    pub fn less_than_or_equal(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::LessThanOrEqual, right)
    }

    pub fn not_equal(&self, right: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::NotEquals, right)
    }

    /// Field value is one of `values` (a list literal or another field)
    pub fn contains(&self, values: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::Contains, values)
    }

    /// Field value is none of `values`
    pub fn not_contains(&self, values: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::NotContains, values)
    }

    pub fn regex(&self, pattern: impl Into<Operand>) -> Condition {
        self.condition(ConditionKind::Regex, pattern)
    }

    /// Field is present
    pub fn exists(&self) -> Condition {
        self.condition(ConditionKind::Exists, true)
    }

    /// Field is absent
    pub fn not_exists(&self) -> Condition {
        self.condition(ConditionKind::Exists, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builds_nested_tree() {
        let uno = Field::new("uno");
        let two = Field::new("two");
        let three = Field::new("three");

        let actual = or([
            Expr::from(uno.equals("theValue")),
            and([
                Expr::from(two.equals(45)),
                three.equals(true).into(),
                or([uno.equals("hello"), uno.equals("something")]).into(),
            ])
            .into(),
        ]);

        assert_eq!(actual.kind, ConjunctionKind::Or);
        assert_eq!(actual.values.len(), 2);
        match &actual.values[1] {
            Expr::Conjunction(inner) => {
                assert_eq!(inner.kind, ConjunctionKind::And);
                assert_eq!(inner.values.len(), 3);
            }
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_each_method_sets_kind() {
        let two = Field::new("two");
        let cases = [
            (two.equals(45), ConditionKind::Equals),
            (two.greater_than(45), ConditionKind::GreaterThan),
            (two.greater_than_or_equal(45), ConditionKind::GreaterThanOrEqual),
            (two.less_than(45), ConditionKind::LessThan),
            (two.less_than_or_equal(45), ConditionKind::LessThanOrEqual),
            (two.not_equal(45), ConditionKind::NotEquals),
            (two.contains(vec![45]), ConditionKind::Contains),
            (two.not_contains(vec![45]), ConditionKind::NotContains),
            (two.regex("45"), ConditionKind::Regex),
            (two.exists(), ConditionKind::Exists),
        ];

        for (condition, kind) in cases {
            assert_eq!(condition.kind, kind);
            assert_eq!(condition.left_operand, Field::new("two"));
        }
    }

    #[test]
    fn test_exists_and_not_exists_share_kind() {
        let closed = Field::new("closedDate");

        let exists = closed.exists();
        let absent = closed.not_exists();

        assert_eq!(exists.kind, ConditionKind::Exists);
        assert_eq!(absent.kind, ConditionKind::Exists);
        assert_eq!(exists.right_operand, Operand::Literal(json!(true)));
        assert_eq!(absent.right_operand, Operand::Literal(json!(false)));
    }

    #[test]
    fn test_field_operand_marks_field_comparison() {
        let reopened = Field::new("reopenedDate");
        let closed = Field::new("closedDate");

        let condition = reopened.greater_than_or_equal(&closed);
        assert!(condition.compares_fields());
        assert!(!reopened
            .greater_than_or_equal("2024-01-01")
            .compares_fields());
    }

    #[test]
    fn test_left_operand_drops_source() {
        let sourced = Field::sourced("name", "assignments");
        assert_eq!(sourced.equals("Jane").left_operand, Field::new("name"));
    }

    #[test]
    fn test_empty_conjunctions() {
        for built in [and(Vec::<Expr>::new()), or(Vec::<Expr>::new()), not(Vec::<Expr>::new())] {
            assert!(built.is_empty());
        }
    }

    #[test]
    fn test_condition_wire_shape() {
        let json = serde_json::to_value(Field::new("two").equals(45)).unwrap();
        assert_eq!(json["condition"], "EQUALS");
        assert_eq!(json["leftOperand"], json!({ "name": "two" }));
        assert_eq!(json["rightOperand"], json!({ "literal": 45 }));
    }

    #[test]
    fn test_for_each_condition_visits_leaves_in_order() {
        let tree: Expr = and([
            Expr::from(Field::new("a").equals(1)),
            or([Field::new("b").equals(2), Field::new("c").equals(3)]).into(),
        ])
        .into();

        let mut names = Vec::new();
        tree.for_each_condition(&mut |c| names.push(c.left_operand.name.clone()));
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
