//! Workflow definitions: the immutable templates processes run from
//!
//! A WorkflowDefinition is a linear backbone of steps. Steps may carry
//! conditions that elide them for a given instance, but the order never
//! changes and there are no branch targets — the next step is always the
//! next step in the template.
//!
//! Definitions are immutable once registered. In-flight instances carry
//! their own deep copy of the steps, so later edits to a template never
//! affect running processes.

use crate::{Condition, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a step within a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role that tasks are assigned to (e.g., "sales-manager", "finance")
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// An immutable workflow template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow accomplishes
    pub description: String,
    /// The ordered step backbone
    pub steps: Vec<StepDefinition>,
    /// Name of the rule set screened at process start, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
}

impl WorkflowDefinition {
    /// Create a new workflow definition
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(id),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            rule_set: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rule_set(mut self, name: impl Into<String>) -> Self {
        self.rule_set = Some(name.into());
        self
    }

    /// Append a step to the backbone
    pub fn add_step(&mut self, step: StepDefinition) -> WorkflowResult<()> {
        if self.steps.iter().any(|s| s.id == step.id) {
            return Err(WorkflowError::DuplicateStepId(step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Get a step by id
    pub fn get_step(&self, id: &StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Position of a step in the backbone
    pub fn step_index(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|s| &s.id == id)
    }

    /// The step after the given one in template order
    pub fn step_after(&self, id: &StepId) -> Option<&StepDefinition> {
        self.step_index(id).and_then(|i| self.steps.get(i + 1))
    }

    /// Total number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Validate the definition for structural correctness
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Validation(
                "workflow must have at least one step".into(),
            ));
        }

        if self.steps[0].step_type != StepType::Start {
            return Err(WorkflowError::Validation(
                "first step must be a Start step".into(),
            ));
        }

        if !self.steps.iter().any(|s| s.step_type == StepType::End) {
            return Err(WorkflowError::Validation(
                "workflow must have at least one End step".into(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(&step.id) {
                return Err(WorkflowError::DuplicateStepId(step.id.clone()));
            }
            if step.parallel && step.step_type != StepType::Review {
                return Err(WorkflowError::Validation(format!(
                    "step '{}': parallel flag is only valid on Review steps",
                    step.id
                )));
            }
            if step.requires_task() && step.assignee_role.is_none() {
                return Err(WorkflowError::Validation(format!(
                    "step '{}': {} steps need an assignee role",
                    step.id,
                    step.step_type.as_str()
                )));
            }
        }

        Ok(())
    }
}

// ── Step Definition ──────────────────────────────────────────────────

/// One step in a workflow's linear backbone
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique identifier within this workflow
    pub id: StepId,
    /// Human-readable name
    pub name: String,
    /// Step type, determines dispatch in the executor
    pub step_type: StepType,
    /// The role tasks for this step are initially assigned to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_role: Option<RoleId>,
    /// Conditions that must ALL hold for this step to execute;
    /// if any fails, the step is skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Named actions run by Start/System/End steps, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// How long (seconds) a task for this step may stay open before
    /// escalation triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Role an overdue task is reassigned to; if unset the task goes
    /// Overdue under its original assignee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_role: Option<RoleId>,
    /// Informational marker on Review steps. The backbone stays strictly
    /// linear regardless; this never changes execution order.
    #[serde(default)]
    pub parallel: bool,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: StepId::new(id),
            name: name.into(),
            step_type,
            assignee_role: None,
            conditions: Vec::new(),
            actions: Vec::new(),
            timeout_secs: None,
            escalation_role: None,
            parallel: false,
        }
    }

    /// Create a start step
    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, "Start", StepType::Start)
    }

    /// Create an end step
    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, "End", StepType::End)
    }

    /// Create an approval step assigned to a role
    pub fn approval(id: impl Into<String>, name: impl Into<String>, role: RoleId) -> Self {
        Self::new(id, name, StepType::Approval).with_assignee_role(role)
    }

    /// Create a review step assigned to a role
    pub fn review(id: impl Into<String>, name: impl Into<String>, role: RoleId) -> Self {
        Self::new(id, name, StepType::Review).with_assignee_role(role)
    }

    /// Create a human task step assigned to a role
    pub fn task(id: impl Into<String>, name: impl Into<String>, role: RoleId) -> Self {
        Self::new(id, name, StepType::Task).with_assignee_role(role)
    }

    /// Create a system step (runs actions, no human input)
    pub fn system(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, StepType::System)
    }

    pub fn with_assignee_role(mut self, role: RoleId) -> Self {
        self.assignee_role = Some(role);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_escalation_role(mut self, role: RoleId) -> Self {
        self.escalation_role = Some(role);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Whether entering this step creates a human task
    pub fn requires_task(&self) -> bool {
        matches!(
            self.step_type,
            StepType::Approval | StepType::Review | StepType::Task
        )
    }

    /// Whether this step runs its actions and auto-advances
    pub fn is_automatic(&self) -> bool {
        matches!(
            self.step_type,
            StepType::Start | StepType::System | StepType::End
        )
    }
}

// ── Step Type ────────────────────────────────────────────────────────

/// The type of a workflow step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    /// The entry point; runs its actions and advances
    Start,
    /// A human decision with an approve/reject outcome
    Approval,
    /// A human review; completion always advances
    Review,
    /// A unit of human work; completion always advances
    Task,
    /// Automated actions (activate promotion, notify stakeholders);
    /// runs and advances without human input
    System,
    /// Terminal step; runs its actions, then the process completes
    End,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Start => "start",
            StepType::Approval => "approval",
            StepType::Review => "review",
            StepType::Task => "task",
            StepType::System => "system",
            StepType::End => "end",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConditionOperator;

    fn make_approval_workflow() -> WorkflowDefinition {
        let mut wf = WorkflowDefinition::new("promotion-approval", "Promotion Approval")
            .with_description("Standard promotion approval flow")
            .with_rule_set("promotion-rules");

        wf.add_step(StepDefinition::start("start")).unwrap();
        wf.add_step(
            StepDefinition::approval("manager-approval", "Manager Approval", RoleId::new("manager"))
                .with_timeout(86_400)
                .with_escalation_role(RoleId::new("senior-manager")),
        )
        .unwrap();
        wf.add_step(StepDefinition::end("end").with_action("activate_promotion"))
            .unwrap();
        wf
    }

    #[test]
    fn test_create_definition() {
        let wf = make_approval_workflow();
        assert_eq!(wf.step_count(), 3);
        assert_eq!(wf.rule_set.as_deref(), Some("promotion-rules"));
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_step_order_helpers() {
        let wf = make_approval_workflow();
        assert_eq!(wf.step_index(&StepId::new("manager-approval")), Some(1));
        assert_eq!(
            wf.step_after(&StepId::new("manager-approval")).unwrap().id,
            StepId::new("end")
        );
        assert!(wf.step_after(&StepId::new("end")).is_none());
        assert!(wf.get_step(&StepId::new("missing")).is_none());
    }

    #[test]
    fn test_duplicate_step_id() {
        let mut wf = WorkflowDefinition::new("wf", "Wf");
        wf.add_step(StepDefinition::start("start")).unwrap();
        let result = wf.add_step(StepDefinition::system("start", "Dup"));
        assert!(matches!(result, Err(WorkflowError::DuplicateStepId(_))));
    }

    #[test]
    fn test_validate_first_step_must_be_start() {
        let mut wf = WorkflowDefinition::new("wf", "Wf");
        wf.add_step(StepDefinition::system("sys", "System")).unwrap();
        wf.add_step(StepDefinition::end("end")).unwrap();
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_validate_requires_end_step() {
        let mut wf = WorkflowDefinition::new("wf", "Wf");
        wf.add_step(StepDefinition::start("start")).unwrap();
        wf.add_step(StepDefinition::system("sys", "System")).unwrap();
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_validate_parallel_only_on_review() {
        let mut wf = WorkflowDefinition::new("wf", "Wf");
        wf.add_step(StepDefinition::start("start")).unwrap();
        wf.add_step(
            StepDefinition::approval("appr", "Approval", RoleId::new("manager")).parallel(),
        )
        .unwrap();
        wf.add_step(StepDefinition::end("end")).unwrap();
        assert!(wf.validate().is_err());

        let mut wf = WorkflowDefinition::new("wf2", "Wf2");
        wf.add_step(StepDefinition::start("start")).unwrap();
        wf.add_step(
            StepDefinition::review("rev", "Review", RoleId::new("legal")).parallel(),
        )
        .unwrap();
        wf.add_step(StepDefinition::end("end")).unwrap();
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_validate_task_step_needs_role() {
        let mut wf = WorkflowDefinition::new("wf", "Wf");
        wf.add_step(StepDefinition::start("start")).unwrap();
        wf.add_step(StepDefinition::new("appr", "Approval", StepType::Approval))
            .unwrap();
        wf.add_step(StepDefinition::end("end")).unwrap();
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_step_constructors() {
        let step = StepDefinition::approval("a", "Approve", RoleId::new("manager"))
            .with_condition(Condition::new(
                "budget",
                ConditionOperator::Gt,
                serde_json::json!(1000),
            ))
            .with_timeout(3600);

        assert_eq!(step.step_type, StepType::Approval);
        assert!(step.requires_task());
        assert!(!step.is_automatic());
        assert_eq!(step.conditions.len(), 1);
        assert_eq!(step.timeout_secs, Some(3600));

        let sys = StepDefinition::system("s", "Notify").with_action("notify_stakeholders");
        assert!(sys.is_automatic());
        assert!(!sys.requires_task());
        assert_eq!(sys.actions, vec!["notify_stakeholders".to_string()]);
    }

    #[test]
    fn test_ids() {
        let id = WorkflowId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);
        assert_eq!(format!("{}", WorkflowId::new("wf-1")), "wf-1");
        assert_eq!(format!("{}", StepId::new("step-1")), "step-1");
        assert_eq!(format!("{}", RoleId::new("manager")), "manager");
    }
}
