//! The orchestration facade
//!
//! One object owns the whole lifecycle: start a workflow, complete a
//! task, query instances and tasks, and run the timeout scan. Every
//! state-mutating path for one instance runs under that instance's lock,
//! so concurrent task completions and timeout scans serialize instead of
//! clobbering each other. Different instances never contend.

use crate::{
    ActionRunner, Advance, Clock, DefinitionRegistry, EventSink, InstanceFilter, InstanceStore,
    MemoryInstanceStore, MemoryTaskStore, NoopActionRunner, Notifier, PageRequest, RuleEngine,
    StepExecutor, SystemClock, TaskManager, TaskStore, TracingEventSink, TracingNotifier,
};
use parking_lot::Mutex;
use promoflow_types::{
    DataBag, InstanceId, InstanceStatus, InstanceSummary, ProcessInstance, Task, TaskId,
    TaskResult, TaskStatus, TaskType, TenantId, UserId, WorkflowError, WorkflowEvent,
    WorkflowId, WorkflowResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What `start_workflow` produced
#[derive(Clone, Debug)]
pub struct StartOutcome {
    pub instance_id: InstanceId,
    pub status: InstanceStatus,
    /// The step the instance is waiting at, if it suspended
    pub current_step: Option<promoflow_types::StepId>,
    /// Whether a RequireApproval rule matched
    pub approval_required: bool,
}

/// What `complete_task` produced
#[derive(Clone, Debug)]
pub struct TaskCompletion {
    pub task: Task,
    pub instance_status: InstanceStatus,
}

/// The workflow orchestration engine
pub struct WorkflowOrchestrator {
    registry: DefinitionRegistry,
    rules: RuleEngine,
    instances: Arc<dyn InstanceStore>,
    tasks: TaskManager,
    executor: StepExecutor,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    locks: Mutex<HashMap<InstanceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkflowOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Create a new process instance and drive it as far as it will go.
    ///
    /// Screens the definition's rule set first; a Reject rule terminates
    /// the instance before any step runs and before any task exists. The
    /// instance record is persisted in every outcome, including action
    /// failure, so the caller can always fetch what happened.
    pub async fn start_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: &WorkflowId,
        data: DataBag,
        initiator: UserId,
    ) -> WorkflowResult<StartOutcome> {
        let definition = self.registry.get(workflow_id)?;
        let now = self.clock.now();
        let mut instance = ProcessInstance::new(
            tenant_id,
            definition.id.clone(),
            definition.steps.clone(),
            data,
            initiator,
            now,
        );
        info!(
            instance_id = %instance.id,
            workflow_id = %workflow_id,
            tenant_id = %instance.tenant_id,
            "starting workflow"
        );
        let lock = self.lock_for(&instance.id);
        let _guard = lock.lock().await;

        self.events.emit(&WorkflowEvent::WorkflowStarted {
            instance_id: instance.id.clone(),
            workflow_id: definition.id.clone(),
            tenant_id: instance.tenant_id.clone(),
            initiator: instance.initiator.clone(),
        });

        if let Some(rule_set) = &definition.rule_set {
            self.rules.apply(rule_set, &mut instance, now);
            if instance.is_terminal() {
                self.finish(&instance).await?;
                return Ok(StartOutcome {
                    instance_id: instance.id.clone(),
                    status: instance.status,
                    current_step: None,
                    approval_required: instance.approval_required,
                });
            }
        }

        self.drive(&mut instance).await?;
        Ok(StartOutcome {
            instance_id: instance.id.clone(),
            status: instance.status,
            current_step: instance.current_step.clone(),
            approval_required: instance.approval_required,
        })
    }

    /// Complete a task and resume its process.
    ///
    /// A denied Approval task rejects the whole instance; any other
    /// completion marks the step done and advances. Completing a task
    /// twice fails with `TaskAlreadyTerminal` whatever happened to the
    /// instance in between.
    ///
    /// A step-action failure while resuming surfaces as `StepAction`
    /// with the task already closed; the instance stays active at the
    /// failing step and `resume_instance` retries it.
    pub async fn complete_task(
        &self,
        task_id: &TaskId,
        result: TaskResult,
        completed_by: UserId,
    ) -> WorkflowResult<TaskCompletion> {
        let task = self.tasks.get(task_id).await?;
        let lock = self.lock_for(&task.instance_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; a racing completion may have won
        let task = self.tasks.get(task_id).await?;
        if !task.is_open() {
            return Err(WorkflowError::TaskAlreadyTerminal(task_id.clone()));
        }
        let mut instance = self.instances.get(&task.instance_id).await?;
        if !instance.is_active() {
            return Err(WorkflowError::InstanceNotActive(instance.id.clone()));
        }

        let now = self.clock.now();
        let task = self
            .tasks
            .complete(task_id, result, completed_by.clone(), now)
            .await?;
        instance.record_audit(
            "task_completed",
            serde_json::json!({
                "task": task.id.0,
                "step": task.step_id.0,
                "completed_by": completed_by.0,
            }),
            now,
        );
        self.events.emit(&WorkflowEvent::TaskCompleted {
            task_id: task.id.clone(),
            instance_id: instance.id.clone(),
            result: task.result.clone().unwrap_or_default(),
            completed_by: completed_by.clone(),
        });

        let denied = task.task_type == TaskType::Approval
            && task.result.as_ref().map(TaskResult::is_denial).unwrap_or(false);
        if denied {
            let reason = task
                .result
                .as_ref()
                .and_then(|r| r.reason.clone())
                .unwrap_or_else(|| "approval denied".to_string());
            instance.reject(completed_by.0.clone(), reason, now);
            self.finish(&instance).await?;
        } else {
            instance.complete_step(&task.step_id, now);
            self.drive(&mut instance).await?;
        }

        Ok(TaskCompletion {
            task,
            instance_status: instance.status,
        })
    }

    /// Re-run `advance` on an active instance.
    ///
    /// The recovery path after a step-action failure: the failing step's
    /// pointer was left in place, so resuming re-enters that step and
    /// re-runs its actions. Safe to call on any active instance — one
    /// suspended on an open task suspends again and reuses the open task.
    pub async fn resume_instance(&self, id: &InstanceId) -> WorkflowResult<InstanceStatus> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut instance = self.instances.get(id).await?;
        if !instance.is_active() {
            return Err(WorkflowError::InstanceNotActive(id.clone()));
        }
        info!(instance_id = %instance.id, "resuming instance");
        self.drive(&mut instance).await?;
        Ok(instance.status)
    }

    /// Fetch the full instance record, active or retired
    pub async fn get_instance(&self, id: &InstanceId) -> WorkflowResult<ProcessInstance> {
        self.instances.get(id).await
    }

    /// Tenant-scoped instance listing, newest-first
    pub async fn list_instances(
        &self,
        tenant_id: &TenantId,
        filter: InstanceFilter,
        page: PageRequest,
    ) -> WorkflowResult<Vec<InstanceSummary>> {
        self.instances.list(tenant_id, &filter, &page).await
    }

    /// Tasks currently owned by `assignee` in a tenant
    pub async fn list_tasks_for_assignee(
        &self,
        tenant_id: &TenantId,
        assignee: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> WorkflowResult<Vec<Task>> {
        self.tasks
            .store()
            .list_for_assignee(tenant_id, assignee, status, limit)
            .await
    }

    /// One pass of timeout detection: every pending task past its due
    /// date goes Overdue and, when the step declares an escalation role,
    /// is reassigned to it. Returns how many tasks were promoted.
    ///
    /// The scan never completes tasks or advances processes; overdue
    /// work stays open until a human closes it.
    pub async fn run_timeout_scan(&self) -> WorkflowResult<usize> {
        let now = self.clock.now();
        let candidates = self.tasks.past_due(now).await?;
        let mut promoted = 0;
        for candidate in candidates {
            let lock = self.lock_for(&candidate.instance_id);
            let _guard = lock.lock().await;

            let mut instance = match self.instances.get(&candidate.instance_id).await {
                Ok(instance) => instance,
                Err(err) => {
                    warn!(
                        task_id = %candidate.id,
                        instance_id = %candidate.instance_id,
                        error = %err,
                        "skipping overdue task with unloadable instance"
                    );
                    continue;
                }
            };
            let escalation_role = instance
                .step(&candidate.step_id)
                .and_then(|s| s.escalation_role.clone());

            let Some(task) = self
                .tasks
                .mark_overdue(&candidate.id, escalation_role.as_ref(), now)
                .await?
            else {
                continue;
            };

            instance.record_audit(
                "task_overdue",
                serde_json::json!({
                    "task": task.id.0,
                    "step": task.step_id.0,
                    "assignee": task.assignee,
                    "escalated": task.escalated,
                }),
                now,
            );
            self.instances.save(&instance).await?;
            self.events.emit(&WorkflowEvent::TaskOverdue {
                task_id: task.id.clone(),
                assignee: task.assignee.clone(),
                overdue_days: task.overdue_days(now),
            });
            promoted += 1;
        }
        if promoted > 0 {
            info!(promoted, "timeout scan promoted overdue tasks");
        }
        Ok(promoted)
    }

    /// Spawn a background loop that runs the timeout scan on a fixed
    /// interval. The interval bounds worst-case escalation latency.
    pub fn spawn_timeout_monitor(
        self: &Arc<Self>,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = engine.run_timeout_scan().await {
                    warn!(error = %err, "timeout scan failed");
                }
            }
        })
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Advance the instance and persist the result. Suspension creates
    /// the task for the step it stopped on; persistence happens in every
    /// outcome, action failure included.
    async fn drive(&self, instance: &mut ProcessInstance) -> WorkflowResult<()> {
        match self.executor.advance(instance).await {
            Ok(Advance::Suspended(step)) => {
                self.tasks
                    .create_for_step(instance, &step, self.clock.now())
                    .await?;
                self.instances.save(instance).await?;
                Ok(())
            }
            Ok(Advance::Completed) => self.finish(instance).await,
            Err(err) => {
                self.instances.save(instance).await?;
                Err(err)
            }
        }
    }

    /// Persist a terminal instance, retire it from the active index, and
    /// emit its terminal event
    async fn finish(&self, instance: &ProcessInstance) -> WorkflowResult<()> {
        self.instances.save(instance).await?;
        self.instances.retire(&instance.id).await?;
        match instance.status {
            InstanceStatus::Completed => {
                self.events.emit(&WorkflowEvent::WorkflowCompleted {
                    instance_id: instance.id.clone(),
                    workflow_id: instance.workflow_id.clone(),
                    tenant_id: instance.tenant_id.clone(),
                    duration_ms: instance.duration_ms().unwrap_or(0),
                });
            }
            InstanceStatus::Rejected => {
                self.events.emit(&WorkflowEvent::WorkflowRejected {
                    instance_id: instance.id.clone(),
                    reason: instance
                        .rejection_reason
                        .clone()
                        .unwrap_or_else(|| "rejected".to_string()),
                    rejected_by: instance
                        .rejected_by
                        .clone()
                        .unwrap_or_else(|| "system".to_string()),
                });
            }
            InstanceStatus::Active => {}
        }
        Ok(())
    }

    /// The serialization lock for one instance. Entries live as long as
    /// the orchestrator; the instance store retains records anyway.
    fn lock_for(&self, id: &InstanceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles an orchestrator from its collaborators, with in-memory and
/// tracing defaults for everything not supplied
pub struct OrchestratorBuilder {
    registry: DefinitionRegistry,
    rules: RuleEngine,
    instances: Option<Arc<dyn InstanceStore>>,
    tasks: Option<Arc<dyn TaskStore>>,
    runner: Option<Arc<dyn ActionRunner>>,
    notifier: Option<Arc<dyn Notifier>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            registry: DefinitionRegistry::new(),
            rules: RuleEngine::new(),
            instances: None,
            tasks: None,
            runner: None,
            notifier: None,
            events: None,
            clock: None,
        }
    }
}

impl OrchestratorBuilder {
    pub fn with_registry(mut self, registry: DefinitionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_instance_store(mut self, store: Arc<dyn InstanceStore>) -> Self {
        self.instances = Some(store);
        self
    }

    pub fn with_task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(store);
        self
    }

    pub fn with_action_runner(mut self, runner: Arc<dyn ActionRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> WorkflowOrchestrator {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let task_store: Arc<dyn TaskStore> = self
            .tasks
            .unwrap_or_else(|| Arc::new(MemoryTaskStore::new()));
        let notifier: Arc<dyn Notifier> =
            self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let runner: Arc<dyn ActionRunner> = self
            .runner
            .unwrap_or_else(|| Arc::new(NoopActionRunner));

        WorkflowOrchestrator {
            registry: self.registry,
            rules: self.rules,
            instances: self
                .instances
                .unwrap_or_else(|| Arc::new(MemoryInstanceStore::new())),
            tasks: TaskManager::new(task_store, notifier),
            executor: StepExecutor::new(runner, clock.clone()),
            clock,
            events: self
                .events
                .unwrap_or_else(|| Arc::new(TracingEventSink)),
            locks: Mutex::new(HashMap::new()),
        }
    }
}
