//! Lifecycle events published to external consumers
//!
//! Events are fire-and-forget: notification, audit, and reporting
//! collaborators subscribe to them, and emission never blocks a state
//! transition. Delivery is at-least-once with no ordering guarantee
//! across different instances.

use crate::{InstanceId, TaskId, TaskResult, TenantId, UserId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A workflow lifecycle event
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A process instance was created and its first step executed
    WorkflowStarted {
        instance_id: InstanceId,
        workflow_id: WorkflowId,
        tenant_id: TenantId,
        initiator: UserId,
    },
    /// An instance reached an End step
    WorkflowCompleted {
        instance_id: InstanceId,
        workflow_id: WorkflowId,
        tenant_id: TenantId,
        duration_ms: i64,
    },
    /// An instance was terminated by a rule or an approver
    WorkflowRejected {
        instance_id: InstanceId,
        reason: String,
        rejected_by: String,
    },
    /// A task was completed
    TaskCompleted {
        task_id: TaskId,
        instance_id: InstanceId,
        result: TaskResult,
        completed_by: UserId,
    },
    /// A task passed its due date
    TaskOverdue {
        task_id: TaskId,
        assignee: String,
        overdue_days: i64,
    },
}

impl WorkflowEvent {
    /// Event name as published to consumers
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted { .. } => "workflow_started",
            WorkflowEvent::WorkflowCompleted { .. } => "workflow_completed",
            WorkflowEvent::WorkflowRejected { .. } => "workflow_rejected",
            WorkflowEvent::TaskCompleted { .. } => "task_completed",
            WorkflowEvent::TaskOverdue { .. } => "task_overdue",
        }
    }
}
