//! Task lifecycle: creation, completion, timeout escalation
//!
//! Tasks are what a suspended process waits on. The manager enforces the
//! two invariants everything else relies on: at most one open task per
//! (instance, step), and a completed task can never be completed again.
//!
//! Timeouts never complete work on anyone's behalf. An overdue task is
//! reassigned to the step's escalation role and stays open until a human
//! closes it.

use crate::{Notifier, TaskStore};
use chrono::{DateTime, Duration, Utc};
use promoflow_types::{
    ProcessInstance, RoleId, StepDefinition, StepType, Task, TaskId, TaskResult, TaskStatus,
    TaskType, UserId, WorkflowError, WorkflowResult,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Creates, completes, and escalates tasks
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Create the task for a task-requiring step the instance just
    /// entered. If an open task for this (instance, step) already exists
    /// it is returned unchanged, so re-entry never duplicates work.
    pub async fn create_for_step(
        &self,
        instance: &mut ProcessInstance,
        step: &StepDefinition,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Task> {
        if let Some(existing) = self
            .store
            .list_for_instance(&instance.id)
            .await?
            .into_iter()
            .find(|t| t.step_id == step.id && t.is_open())
        {
            warn!(
                task_id = %existing.id,
                step = %step.id,
                instance_id = %instance.id,
                "open task already exists for step; not duplicating"
            );
            return Ok(existing);
        }

        let assignee = step
            .assignee_role
            .as_ref()
            .ok_or_else(|| {
                WorkflowError::Validation(format!("step '{}' has no assignee role", step.id))
            })?
            .0
            .clone();
        let task_type = task_type_for(step.step_type).ok_or_else(|| {
            WorkflowError::Validation(format!(
                "step '{}' ({}) does not take a task",
                step.id,
                step.step_type.as_str()
            ))
        })?;

        let task = Task {
            id: TaskId::generate(),
            tenant_id: instance.tenant_id.clone(),
            instance_id: instance.id.clone(),
            step_id: step.id.clone(),
            task_type,
            title: step.name.clone(),
            description: format!("{} for workflow {}", step.name, instance.workflow_id),
            assignee,
            data_snapshot: instance.data.clone(),
            status: TaskStatus::Pending,
            created_at: now,
            due_at: step.timeout_secs.map(|s| due_date(now, s)),
            completed_at: None,
            result: None,
            completed_by: None,
            escalated: false,
        };

        self.store.save(&task).await?;
        instance.add_task(task.id.clone(), &step.id, now);
        self.notifier.task_assigned(&task);
        info!(
            task_id = %task.id,
            step = %step.id,
            assignee = %task.assignee,
            instance_id = %instance.id,
            "task created"
        );
        Ok(task)
    }

    pub async fn get(&self, id: &TaskId) -> WorkflowResult<Task> {
        self.store.get(id).await
    }

    /// Complete an open task with the supplied result
    pub async fn complete(
        &self,
        id: &TaskId,
        result: TaskResult,
        completed_by: UserId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Task> {
        let mut task = self.store.get(id).await?;
        if !task.is_open() {
            return Err(WorkflowError::TaskAlreadyTerminal(id.clone()));
        }
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.completed_by = Some(completed_by);
        task.completed_at = Some(now);
        self.store.save(&task).await?;
        info!(task_id = %task.id, completed_by = %task.completed_by.as_ref().map(|u| u.0.as_str()).unwrap_or(""), "task completed");
        Ok(task)
    }

    /// Pending tasks past their due date at `now`
    pub async fn past_due(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<Task>> {
        self.store.list_past_due(now).await
    }

    /// Promote a pending, past-due task to Overdue, reassigning it to
    /// the escalation role when one is declared. Returns `None` if the
    /// task is no longer pending and past due (completed or already
    /// escalated by a racing scan).
    pub async fn mark_overdue(
        &self,
        id: &TaskId,
        escalate_to: Option<&RoleId>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Option<Task>> {
        let mut task = self.store.get(id).await?;
        if !task.is_past_due(now) {
            return Ok(None);
        }
        task.status = TaskStatus::Overdue;
        if let Some(role) = escalate_to {
            task.assignee = role.0.clone();
            task.escalated = true;
        }
        self.store.save(&task).await?;
        if task.escalated {
            self.notifier.task_escalated(&task);
        }
        info!(
            task_id = %task.id,
            assignee = %task.assignee,
            escalated = task.escalated,
            "task overdue"
        );
        Ok(Some(task))
    }
}

/// Saturating due-date arithmetic; an oversized timeout clamps to the
/// far future instead of wrapping into the past.
fn due_date(now: DateTime<Utc>, timeout_secs: u64) -> DateTime<Utc> {
    let delta = i64::try_from(timeout_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn task_type_for(step_type: StepType) -> Option<TaskType> {
    match step_type {
        StepType::Approval => Some(TaskType::Approval),
        StepType::Review => Some(TaskType::Review),
        StepType::Task => Some(TaskType::Task),
        StepType::Start | StepType::System | StepType::End => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryTaskStore, NoopNotifier};
    use promoflow_types::{DataBag, TenantId, WorkflowId};

    fn manager() -> (TaskManager, Arc<MemoryTaskStore>) {
        let store = Arc::new(MemoryTaskStore::new());
        (
            TaskManager::new(store.clone(), Arc::new(NoopNotifier)),
            store,
        )
    }

    fn make_instance() -> ProcessInstance {
        ProcessInstance::new(
            TenantId::new("acme"),
            WorkflowId::new("wf-1"),
            vec![
                StepDefinition::start("start"),
                StepDefinition::approval("approve", "Manager Approval", RoleId::new("manager"))
                    .with_timeout(3600)
                    .with_escalation_role(RoleId::new("senior-manager")),
                StepDefinition::end("end"),
            ],
            DataBag::new(),
            UserId::new("alice"),
            Utc::now(),
        )
    }

    fn approval_step(instance: &ProcessInstance) -> StepDefinition {
        instance
            .step(&promoflow_types::StepId::new("approve"))
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_create_sets_due_date_and_audits() {
        let (manager, _store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);

        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        assert_eq!(task.assignee, "manager");
        assert_eq!(task.task_type, TaskType::Approval);
        assert_eq!(task.due_at, Some(now + Duration::seconds(3600)));
        assert_eq!(instance.task_ids, vec![task.id.clone()]);
        assert_eq!(instance.audit.last().unwrap().event, "task_created");
    }

    #[tokio::test]
    async fn test_oversized_timeout_clamps_to_far_future() {
        let (manager, _store) = manager();
        let step = StepDefinition::approval("approve", "Approve", RoleId::new("manager"))
            .with_timeout(u64::MAX);
        let mut instance = ProcessInstance::new(
            TenantId::new("acme"),
            WorkflowId::new("wf-1"),
            vec![
                StepDefinition::start("start"),
                step.clone(),
                StepDefinition::end("end"),
            ],
            DataBag::new(),
            UserId::new("alice"),
            Utc::now(),
        );
        let now = Utc::now();

        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        // Never wraps into the past
        let due = task.due_at.unwrap();
        assert!(due > now);
        assert!(!task.is_past_due(now));
        assert!(manager.past_due(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_is_idempotent_per_step() {
        let (manager, store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);

        let first = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();
        let second = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count(), 1);
        assert_eq!(instance.task_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_guards() {
        let (manager, _store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);
        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        let done = manager
            .complete(&task.id, TaskResult::approve(), UserId::new("bob"), now)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_by, Some(UserId::new("bob")));

        // Second completion fails
        let again = manager
            .complete(&task.id, TaskResult::approve(), UserId::new("bob"), now)
            .await;
        assert!(matches!(again, Err(WorkflowError::TaskAlreadyTerminal(_))));

        // Unknown task
        let missing = manager
            .complete(
                &TaskId::new("nope"),
                TaskResult::approve(),
                UserId::new("bob"),
                now,
            )
            .await;
        assert!(matches!(missing, Err(WorkflowError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_overdue_completion_still_allowed() {
        let (manager, _store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);
        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        let later = now + Duration::hours(2);
        manager
            .mark_overdue(&task.id, Some(&RoleId::new("senior-manager")), later)
            .await
            .unwrap()
            .unwrap();

        let done = manager
            .complete(&task.id, TaskResult::approve(), UserId::new("carol"), later)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_mark_overdue_escalates_once() {
        let (manager, _store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);
        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();
        let senior = RoleId::new("senior-manager");

        let later = now + Duration::hours(2);
        let escalated = manager
            .mark_overdue(&task.id, Some(&senior), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(escalated.status, TaskStatus::Overdue);
        assert_eq!(escalated.assignee, "senior-manager");
        assert!(escalated.escalated);

        // Second scan sees nothing to do
        let again = manager
            .mark_overdue(&task.id, Some(&senior), later)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_mark_overdue_without_escalation_role() {
        let (manager, _store) = manager();
        let mut instance = make_instance();
        let now = Utc::now();
        let step = approval_step(&instance);
        let task = manager
            .create_for_step(&mut instance, &step, now)
            .await
            .unwrap();

        let later = now + Duration::hours(2);
        let overdue = manager
            .mark_overdue(&task.id, None, later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(overdue.status, TaskStatus::Overdue);
        assert_eq!(overdue.assignee, "manager");
        assert!(!overdue.escalated);
    }
}
