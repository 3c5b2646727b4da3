//! Structured predicates over a process instance's data bag
//!
//! Conditions are data, never code. A condition names a dot-separated
//! field path, an operator, and a JSON operand; a pure interpreter in the
//! engine decides whether it holds. This is deliberate: workflow
//! configuration is semi-trusted, and nothing in it may ever execute.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single predicate: `field <op> value`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot-separated path resolved against the instance's data bag
    pub field: String,
    /// Comparison operator
    pub operator: ConditionOperator,
    /// The operand; must be an array for `In`/`NotIn`
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, ConditionOperator::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, ConditionOperator::Ne, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, ConditionOperator::Gt, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, ConditionOperator::Lt, value)
    }

    /// `field in [values]`
    pub fn is_in(field: impl Into<String>, values: Value) -> Self {
        Self::new(field, ConditionOperator::In, values)
    }

    /// `field not-in [values]`
    pub fn not_in(field: impl Into<String>, values: Value) -> Self {
        Self::new(field, ConditionOperator::NotIn, values)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Comparison operators for conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::Gte => ">=",
            ConditionOperator::Lte => "<=",
            ConditionOperator::Eq => "==",
            ConditionOperator::Ne => "!=",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not-in",
        }
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        let c = Condition::gt("promotion.budget", json!(50_000));
        assert_eq!(c.field, "promotion.budget");
        assert_eq!(c.operator, ConditionOperator::Gt);
        assert_eq!(c.value, json!(50_000));
    }

    #[test]
    fn test_display() {
        let c = Condition::eq("status", json!("draft"));
        assert_eq!(format!("{}", c), "status == \"draft\"");
    }

    #[test]
    fn test_operator_serde_rename() {
        let c = Condition::new("region", ConditionOperator::NotIn, json!(["EU", "UK"]));
        let s = serde_json::to_string(&c).unwrap();
        assert!(s.contains("\"not-in\""));

        let back: Condition = serde_json::from_str(&s).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_roundtrip_all_operators() {
        for op in [
            ConditionOperator::Gt,
            ConditionOperator::Lt,
            ConditionOperator::Gte,
            ConditionOperator::Lte,
            ConditionOperator::Eq,
            ConditionOperator::Ne,
            ConditionOperator::In,
            ConditionOperator::NotIn,
        ] {
            let s = serde_json::to_string(&op).unwrap();
            let back: ConditionOperator = serde_json::from_str(&s).unwrap();
            assert_eq!(back, op);
        }
    }
}
