//! Expression tree validation
//!
//! Rejects trees that no renderer can compile faithfully. Runs before any
//! rendering output reaches a driver.

use serde_json::Value;

use crate::error::{QueryError, QueryResult};

use super::condition::{Condition, ConditionKind, Expr, Operand};

impl Expr {
    /// Check every leaf condition of the tree
    pub fn validate(&self) -> QueryResult<()> {
        let mut result = Ok(());
        self.for_each_condition(&mut |condition| {
            if result.is_ok() {
                result = condition.validate();
            }
        });
        result
    }
}

impl Condition {
    /// Check the operands against the condition kind
    pub fn validate(&self) -> QueryResult<()> {
        if self.left_operand.name.is_empty() {
            return Err(QueryError::malformed(format!(
                "{} condition is missing its left field",
                self.kind.as_str()
            )));
        }

        let literal = match &self.right_operand {
            Operand::Field(field) => {
                if field.name.is_empty() {
                    return Err(QueryError::malformed(format!(
                        "{} condition on '{}' compares against an unnamed field",
                        self.kind.as_str(),
                        self.left_operand.name
                    )));
                }
                return Ok(());
            }
            Operand::Literal(value) => value,
        };

        let valid = match self.kind {
            ConditionKind::Contains | ConditionKind::NotContains => literal.is_array(),
            ConditionKind::Exists => literal.is_boolean(),
            ConditionKind::Regex => literal.is_string(),
            ConditionKind::Equals | ConditionKind::NotEquals => true,
            _ => !matches!(literal, Value::Array(_)),
        };

        if valid {
            Ok(())
        } else {
            Err(QueryError::malformed(format!(
                "{} condition on '{}' has an invalid operand: {}",
                self.kind.as_str(),
                self.left_operand.name,
                literal
            )))
        }
    }
}
