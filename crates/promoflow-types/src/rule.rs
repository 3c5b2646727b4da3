//! Business rules screened once at process start
//!
//! Rules are workflow-type-level guards, independent of the step
//! backbone. They share the structured [`Condition`] grammar — a rule's
//! condition is never an evaluated expression string.

use crate::Condition;
use serde::{Deserialize, Serialize};

/// A single business rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier within its rule set
    pub id: String,
    /// When this condition holds, the action applies
    pub condition: Condition,
    /// What happens when the rule matches
    pub action: RuleAction,
    /// Human-readable message, recorded in audit history and used as the
    /// rejection reason for Reject rules
    pub message: String,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        condition: Condition,
        action: RuleAction,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            condition,
            action,
            message: message.into(),
        }
    }

    /// A rule that rejects the process outright
    pub fn reject(id: impl Into<String>, condition: Condition, message: impl Into<String>) -> Self {
        Self::new(id, condition, RuleAction::Reject, message)
    }

    /// A rule that records a warning but does not block
    pub fn warn(id: impl Into<String>, condition: Condition, message: impl Into<String>) -> Self {
        Self::new(id, condition, RuleAction::Warn, message)
    }

    /// A rule that flags the instance as needing additional approval
    pub fn require_approval(
        id: impl Into<String>,
        condition: Condition,
        message: impl Into<String>,
    ) -> Self {
        Self::new(id, condition, RuleAction::RequireApproval, message)
    }
}

/// What a matching rule does to the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Terminate the instance immediately (rejected_by = "system");
    /// short-circuits the remaining rules
    Reject,
    /// Append an audit entry; the process continues
    Warn,
    /// Flag the instance as requiring additional approval. Recorded and
    /// audited; the executor does not insert a synthetic gate.
    RequireApproval,
}

/// An ordered, named collection of rules for one workflow type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    /// Name referenced by `WorkflowDefinition::rule_set`
    pub name: String,
    /// Rules evaluated in order
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The recorded outcome of one matching rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// The rule that matched
    pub rule_id: String,
    /// The action that was applied
    pub action: RuleAction,
    /// The rule's message
    pub message: String,
}
