//! Business-rule screening at process start
//!
//! A workflow definition may name a rule set; when it does, the rules
//! run once, in declaration order, against the initial data bag before
//! the first step executes. Reject terminates the instance on the spot
//! and short-circuits the remaining rules. Warn and RequireApproval are
//! informational: they annotate the instance and keep going.

use crate::ConditionEvaluator;
use chrono::{DateTime, Utc};
use promoflow_types::{ProcessInstance, RuleAction, RuleOutcome, RuleSet};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Evaluates named rule sets against new process instances
#[derive(Debug, Default)]
pub struct RuleEngine {
    sets: HashMap<String, RuleSet>,
    evaluator: ConditionEvaluator,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule set under its own name, replacing any previous
    /// set with that name.
    pub fn register(&mut self, set: RuleSet) {
        self.sets.insert(set.name.clone(), set);
    }

    pub fn with_rule_set(mut self, set: RuleSet) -> Self {
        self.register(set);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Run the named rule set against `instance`'s data bag, mutating
    /// the instance as rule actions dictate. Returns the outcomes of
    /// every rule whose condition matched, in evaluation order.
    ///
    /// An unknown rule-set name is a configuration gap, not an error:
    /// the instance proceeds unscreened.
    pub fn apply(
        &self,
        name: &str,
        instance: &mut ProcessInstance,
        now: DateTime<Utc>,
    ) -> Vec<RuleOutcome> {
        let Some(set) = self.sets.get(name) else {
            warn!(
                rule_set = name,
                instance_id = %instance.id,
                "rule set not registered; instance proceeds unscreened"
            );
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for rule in &set.rules {
            if !self.evaluator.matches(&rule.condition, &instance.data) {
                continue;
            }
            debug!(
                rule_id = %rule.id,
                action = ?rule.action,
                instance_id = %instance.id,
                "rule matched"
            );
            outcomes.push(RuleOutcome {
                rule_id: rule.id.clone(),
                action: rule.action,
                message: rule.message.clone(),
            });
            match rule.action {
                RuleAction::Reject => {
                    instance.reject("system", rule.message.clone(), now);
                    break;
                }
                RuleAction::Warn => {
                    instance.record_audit(
                        "rule_warning",
                        serde_json::json!({ "rule": rule.id, "message": rule.message }),
                        now,
                    );
                }
                RuleAction::RequireApproval => {
                    instance.approval_required = true;
                    instance.record_audit(
                        "rule_approval_required",
                        serde_json::json!({ "rule": rule.id, "message": rule.message }),
                        now,
                    );
                }
            }
        }
        outcomes
    }
}
