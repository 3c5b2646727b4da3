//! Condition evaluation against instance data bags
//!
//! The evaluator is a pure, total function: any condition against any
//! data bag yields true or false, never an error. A malformed condition
//! or a missing field simply fails to match (with one deliberate
//! exception: `!=` holds when the field is absent, since an absent
//! value is certainly not equal to anything).

use promoflow_types::{Condition, ConditionOperator, DataBag};
use serde_json::Value;

/// Interprets structured conditions over a data bag. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether all conditions hold (AND semantics, vacuously true when
    /// the list is empty).
    pub fn evaluate(&self, conditions: &[Condition], data: &DataBag) -> bool {
        conditions.iter().all(|c| self.matches(c, data))
    }

    /// Whether a single condition holds.
    pub fn matches(&self, condition: &Condition, data: &DataBag) -> bool {
        let actual = resolve(data, &condition.field);

        // Missing field: only != can hold
        let Some(actual) = actual else {
            return condition.operator == ConditionOperator::Ne;
        };

        match condition.operator {
            ConditionOperator::Eq => value_eq(actual, &condition.value),
            ConditionOperator::Ne => !value_eq(actual, &condition.value),
            ConditionOperator::Gt => compare_numeric(actual, &condition.value, |a, b| a > b),
            ConditionOperator::Lt => compare_numeric(actual, &condition.value, |a, b| a < b),
            ConditionOperator::Gte => compare_numeric(actual, &condition.value, |a, b| a >= b),
            ConditionOperator::Lte => compare_numeric(actual, &condition.value, |a, b| a <= b),
            ConditionOperator::In => membership(actual, &condition.value),
            ConditionOperator::NotIn => {
                // A non-array operand fails the condition rather than
                // inverting to true
                match condition.value.as_array() {
                    Some(candidates) => !candidates.iter().any(|c| value_eq(actual, c)),
                    None => false,
                }
            }
        }
    }
}

/// Walk a dot-separated path through nested objects
fn resolve<'a>(data: &'a DataBag, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Structural equality, with numbers compared by value so `5` == `5.0`
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordered comparison; holds only when both sides are numbers
fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn membership(actual: &Value, operand: &Value) -> bool {
    operand
        .as_array()
        .map(|candidates| candidates.iter().any(|c| value_eq(actual, c)))
        .unwrap_or(false)
}
