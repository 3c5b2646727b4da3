//! Process instances: running executions of workflow definitions
//!
//! A ProcessInstance tracks one execution: where it is on the step
//! backbone, which steps completed, what the data bag holds, and an
//! append-only audit history of every transition and why it happened.
//!
//! The instance carries a deep copy of the definition's steps taken at
//! start time, so later edits to a template never affect in-flight work.

use crate::{StepDefinition, StepId, TaskId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The data bag: arbitrary key→value state supplied at start.
/// The engine never auto-mutates it; only System-style step actions do.
pub type DataBag = serde_json::Map<String, Value>;

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a process instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
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

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tenant a process instance belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A human actor (initiator, approver, task owner)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Process Instance ─────────────────────────────────────────────────

/// One running execution of a workflow definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// Unique instance identifier
    pub id: InstanceId,
    /// The tenant this instance belongs to
    pub tenant_id: TenantId,
    /// The definition this instance was created from
    pub workflow_id: WorkflowId,
    /// Deep copy of the definition's steps, frozen at start time
    pub steps: Vec<StepDefinition>,
    /// Arbitrary key→value state supplied at start
    pub data: DataBag,
    /// Who started this process
    pub initiator: UserId,
    /// Current lifecycle status
    pub status: InstanceStatus,
    /// The step the instance is positioned at; unset only once terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepId>,
    /// Step ids completed so far, in definition order, no duplicates
    pub completed_steps: Vec<StepId>,
    /// Tasks created for this instance, in creation order
    pub task_ids: Vec<TaskId>,
    /// Whether a RequireApproval rule matched at start (informational)
    #[serde(default)]
    pub approval_required: bool,
    /// Append-only, ordered audit history
    pub audit: Vec<AuditEntry>,
    /// When the instance was created
    pub created_at: DateTime<Utc>,
    /// When the instance was last updated
    pub updated_at: DateTime<Utc>,
    /// When the instance reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Who rejected the instance ("system" for rule rejections)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    /// Why the instance was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// When the instance was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ProcessInstance {
    /// Create a new Active instance positioned at the first step.
    ///
    /// `now` comes from the engine's clock so tests can control time.
    pub fn new(
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        steps: Vec<StepDefinition>,
        data: DataBag,
        initiator: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let current_step = steps.first().map(|s| s.id.clone());
        let mut instance = Self {
            id: InstanceId::generate(),
            tenant_id,
            workflow_id,
            steps,
            data,
            initiator,
            status: InstanceStatus::Active,
            current_step,
            completed_steps: Vec::new(),
            task_ids: Vec::new(),
            approval_required: false,
            audit: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            rejected_by: None,
            rejection_reason: None,
            rejected_at: None,
        };
        instance.record_audit("workflow_started", Value::Null, now);
        instance
    }

    /// The step definition at the current position
    pub fn current_step_def(&self) -> Option<&StepDefinition> {
        self.current_step
            .as_ref()
            .and_then(|id| self.steps.iter().find(|s| &s.id == id))
    }

    /// Look up one of the instance's own (frozen) steps
    pub fn step(&self, id: &StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// The step after `id` in the frozen backbone order
    pub fn step_after(&self, id: &StepId) -> Option<&StepDefinition> {
        self.steps
            .iter()
            .position(|s| &s.id == id)
            .and_then(|i| self.steps.get(i + 1))
    }

    // ── Lifecycle mutators (each appends exactly one audit entry) ────

    /// Mark the current step completed and move the pointer to the next
    /// step in backbone order (or clear it if there is none).
    pub fn complete_step(&mut self, step_id: &StepId, now: DateTime<Utc>) {
        self.completed_steps.push(step_id.clone());
        self.current_step = self.step_after(step_id).map(|s| s.id.clone());
        self.updated_at = now;
        self.record_audit(
            "step_completed",
            serde_json::json!({ "step": step_id.0 }),
            now,
        );
    }

    /// Skip the current step (its conditions failed) and move on.
    pub fn skip_step(&mut self, step_id: &StepId, now: DateTime<Utc>) {
        self.completed_steps.push(step_id.clone());
        self.current_step = self.step_after(step_id).map(|s| s.id.clone());
        self.updated_at = now;
        self.record_audit(
            "step_skipped",
            serde_json::json!({ "step": step_id.0 }),
            now,
        );
    }

    /// Complete the whole process
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = InstanceStatus::Completed;
        self.current_step = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.record_audit("workflow_completed", Value::Null, now);
    }

    /// Reject the process (terminal)
    pub fn reject(&mut self, rejected_by: impl Into<String>, reason: impl Into<String>, now: DateTime<Utc>) {
        let rejected_by = rejected_by.into();
        let reason = reason.into();
        self.status = InstanceStatus::Rejected;
        self.current_step = None;
        self.completed_at = Some(now);
        self.rejected_at = Some(now);
        self.rejected_by = Some(rejected_by.clone());
        self.rejection_reason = Some(reason.clone());
        self.updated_at = now;
        self.record_audit(
            "workflow_rejected",
            serde_json::json!({ "rejected_by": rejected_by, "reason": reason }),
            now,
        );
    }

    /// Record a task created for this instance
    pub fn add_task(&mut self, task_id: TaskId, step_id: &StepId, now: DateTime<Utc>) {
        self.task_ids.push(task_id.clone());
        self.updated_at = now;
        self.record_audit(
            "task_created",
            serde_json::json!({ "task": task_id.0, "step": step_id.0 }),
            now,
        );
    }

    /// Append an audit entry
    pub fn record_audit(&mut self, event: impl Into<String>, data: Value, now: DateTime<Utc>) {
        self.audit.push(AuditEntry {
            sequence: self.audit.len() as u64,
            event: event.into(),
            data,
            timestamp: now,
        });
    }

    // ── Query methods ────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration from creation to completion, if terminal
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| done.signed_duration_since(self.created_at).num_milliseconds())
    }

    /// A compact view for listings
    pub fn summary(&self) -> InstanceSummary {
        InstanceSummary {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            workflow_id: self.workflow_id.clone(),
            status: self.status,
            current_step: self.current_step.clone(),
            initiator: self.initiator.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ── Instance Status ──────────────────────────────────────────────────

/// Lifecycle status of a process instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// In flight; positioned at a step or waiting on a task
    Active,
    /// Reached an End step
    Completed,
    /// Terminated by a rule or an approver
    Rejected,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Audit ────────────────────────────────────────────────────────────

/// An entry in the instance's append-only audit history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Event name (workflow_started, step_skipped, task_escalated, ...)
    pub event: String,
    /// Structured event payload
    pub data: Value,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

// ── Summaries ────────────────────────────────────────────────────────

/// Compact instance view returned by list operations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub tenant_id: TenantId,
    pub workflow_id: WorkflowId,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepId>,
    pub initiator: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoleId, StepDefinition};

    fn make_instance() -> ProcessInstance {
        let steps = vec![
            StepDefinition::start("start"),
            StepDefinition::approval("approve", "Approve", RoleId::new("manager")),
            StepDefinition::end("end"),
        ];
        ProcessInstance::new(
            TenantId::new("acme"),
            WorkflowId::new("wf-1"),
            steps,
            DataBag::new(),
            UserId::new("alice"),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_instance() {
        let inst = make_instance();
        assert!(inst.is_active());
        assert!(!inst.is_terminal());
        assert_eq!(inst.current_step, Some(StepId::new("start")));
        assert_eq!(inst.audit.len(), 1);
        assert_eq!(inst.audit[0].event, "workflow_started");
    }

    #[test]
    fn test_complete_step_moves_pointer() {
        let mut inst = make_instance();
        let now = Utc::now();

        inst.complete_step(&StepId::new("start"), now);
        assert_eq!(inst.current_step, Some(StepId::new("approve")));
        assert_eq!(inst.completed_steps, vec![StepId::new("start")]);

        inst.complete_step(&StepId::new("approve"), now);
        assert_eq!(inst.current_step, Some(StepId::new("end")));

        inst.complete_step(&StepId::new("end"), now);
        assert_eq!(inst.current_step, None);
        assert_eq!(inst.completed_steps.len(), 3);
    }

    #[test]
    fn test_skip_step_audits() {
        let mut inst = make_instance();
        inst.skip_step(&StepId::new("start"), Utc::now());
        assert_eq!(inst.audit.last().unwrap().event, "step_skipped");
        assert_eq!(inst.completed_steps, vec![StepId::new("start")]);
    }

    #[test]
    fn test_complete_terminal() {
        let mut inst = make_instance();
        let now = Utc::now();
        inst.complete(now);

        assert_eq!(inst.status, InstanceStatus::Completed);
        assert!(inst.is_terminal());
        assert!(inst.current_step.is_none());
        assert!(inst.completed_at.is_some());
        assert!(inst.duration_ms().is_some());
    }

    #[test]
    fn test_reject_records_fields() {
        let mut inst = make_instance();
        inst.reject("bob", "budget too high", Utc::now());

        assert_eq!(inst.status, InstanceStatus::Rejected);
        assert!(inst.is_terminal());
        assert!(inst.current_step.is_none());
        assert_eq!(inst.rejected_by.as_deref(), Some("bob"));
        assert_eq!(inst.rejection_reason.as_deref(), Some("budget too high"));
        assert!(inst.rejected_at.is_some());
        assert_eq!(inst.audit.last().unwrap().event, "workflow_rejected");
    }

    #[test]
    fn test_audit_sequence_is_monotonic() {
        let mut inst = make_instance();
        let now = Utc::now();
        inst.complete_step(&StepId::new("start"), now);
        inst.skip_step(&StepId::new("approve"), now);
        inst.complete(now);

        for (i, entry) in inst.audit.iter().enumerate() {
            assert_eq!(entry.sequence, i as u64);
        }
    }

    #[test]
    fn test_add_task() {
        let mut inst = make_instance();
        inst.add_task(TaskId::new("task-1"), &StepId::new("approve"), Utc::now());
        assert_eq!(inst.task_ids.len(), 1);
        assert_eq!(inst.audit.last().unwrap().event, "task_created");
    }

    #[test]
    fn test_summary() {
        let inst = make_instance();
        let summary = inst.summary();
        assert_eq!(summary.id, inst.id);
        assert_eq!(summary.status, InstanceStatus::Active);
        assert_eq!(summary.current_step, Some(StepId::new("start")));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!InstanceStatus::Active.is_terminal());
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
    }
}
