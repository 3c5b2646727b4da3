//! Error types for the Promoflow engine
//!
//! Structural and caller errors live here. Business outcomes — a rule or
//! an approver rejecting a process — are never errors: rejection is a
//! terminal state of the data model, inspectable via the instance.

use crate::{InstanceId, StepId, TaskId, WorkflowId};

/// Errors that can occur in workflow operations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(WorkflowId),

    #[error("Process instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task already terminal: {0}")]
    TaskAlreadyTerminal(TaskId),

    #[error("Process instance not active: {0}")]
    InstanceNotActive(InstanceId),

    #[error("Step not found in instance: {0}")]
    StepNotFound(StepId),

    #[error("Action '{action}' failed in step '{step}': {source}")]
    StepAction {
        step: StepId,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Duplicate step ID: {0}")]
    DuplicateStepId(StepId),

    #[error("Workflow validation error: {0}")]
    Validation(String),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
