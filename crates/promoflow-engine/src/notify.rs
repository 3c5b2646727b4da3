//! Notification port for task assignment and escalation
//!
//! Notification is best-effort and never blocks a transition. The
//! default implementation logs; a real deployment plugs in email or
//! chat delivery behind the same trait.

use promoflow_types::Task;
use tracing::info;

/// Notifies humans about task state they should act on
pub trait Notifier: Send + Sync {
    /// A task was created and assigned
    fn task_assigned(&self, task: &Task);

    /// A task went overdue and was reassigned to the escalation role
    fn task_escalated(&self, task: &Task);
}

/// Logs notifications through `tracing`. The default notifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn task_assigned(&self, task: &Task) {
        info!(
            task_id = %task.id,
            assignee = %task.assignee,
            task_type = %task.task_type,
            "task assigned"
        );
    }

    fn task_escalated(&self, task: &Task) {
        info!(
            task_id = %task.id,
            assignee = %task.assignee,
            "task escalated"
        );
    }
}

/// Swallows notifications entirely
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn task_assigned(&self, _task: &Task) {}
    fn task_escalated(&self, _task: &Task) {}
}
