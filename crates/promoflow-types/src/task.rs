//! Tasks: units of human work bound to one step of one instance
//!
//! A task is created when the executor enters an Approval/Review/Task
//! step and is the only thing a process ever waits on. Tasks are never
//! deleted; completion and escalation mutate them in place.

use crate::{DataBag, InstanceId, StepId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
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

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Task ─────────────────────────────────────────────────────────────

/// A unit of human work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// The tenant the owning instance belongs to
    pub tenant_id: TenantId,
    /// The owning process instance
    pub instance_id: InstanceId,
    /// The step this task is bound to
    pub step_id: StepId,
    /// Task type, mirrors the step type
    pub task_type: TaskType,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Current owner. Initially the step's declared role; overwritten
    /// by escalation.
    pub assignee: String,
    /// Snapshot of the instance's data bag at creation time
    pub data_snapshot: DataBag,
    /// Current status
    pub status: TaskStatus,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task becomes overdue, if the step declared a timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// When the task was completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The completion payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// Who completed the task
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<UserId>,
    /// Whether the task was reassigned by timeout escalation
    #[serde(default)]
    pub escalated: bool,
}

impl Task {
    /// Whether the task can still be completed
    pub fn is_open(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Overdue)
    }

    /// Whether a pending task is past its due date at `now`
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending
            && self.due_at.map(|due| now >= due).unwrap_or(false)
    }

    /// Whole days past the due date at `now` (0 if not overdue)
    pub fn overdue_days(&self, now: DateTime<Utc>) -> i64 {
        self.due_at
            .map(|due| now.signed_duration_since(due).num_days().max(0))
            .unwrap_or(0)
    }
}

/// Task type, mirroring the step type it was created for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Approve/reject decision; rejection terminates the instance
    Approval,
    /// Review; completion always advances
    Review,
    /// General work item; completion always advances
    Task,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Approval => "approval",
            TaskType::Review => "review",
            TaskType::Task => "task",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for its owner
    Pending,
    /// Completed; terminal
    Completed,
    /// Past its due date; still completable
    Overdue,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Task Result ──────────────────────────────────────────────────────

/// The payload supplied when completing a task
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskResult {
    /// The approve/reject decision; only meaningful for Approval tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    /// Rejection reason, recorded on the instance when approved == false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Free-form summary (review notes, task outcome)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Arbitrary structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl TaskResult {
    /// An approval decision
    pub fn approve() -> Self {
        Self {
            approved: Some(true),
            ..Default::default()
        }
    }

    /// A rejection decision with a reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: Some(false),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// A plain completion with a summary
    pub fn done(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether this result denies an approval
    pub fn is_denial(&self) -> bool {
        self.approved == Some(false)
    }
}
