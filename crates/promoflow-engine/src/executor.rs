//! The step state machine
//!
//! `advance` walks the instance's frozen step backbone from the current
//! position until it either suspends on a task-requiring step, reaches
//! an End step, or hits an action failure. The walk is a loop, never
//! recursion, so arbitrarily long definitions cannot overflow the stack.
//!
//! On an action failure the step pointer is left where it was: the audit
//! history records the failure, data-bag mutations made by earlier
//! actions of the step persist, and a retry re-enters the same step.

use crate::{ActionRunner, Clock, ConditionEvaluator};
use promoflow_types::{
    ProcessInstance, StepDefinition, StepType, WorkflowError, WorkflowResult,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What `advance` stopped on
#[derive(Clone, Debug)]
pub enum Advance {
    /// The instance is waiting on a task for this step
    Suspended(StepDefinition),
    /// The instance reached an End step and completed
    Completed,
}

/// Drives an instance along its step backbone
pub struct StepExecutor {
    evaluator: ConditionEvaluator,
    runner: Arc<dyn ActionRunner>,
    clock: Arc<dyn Clock>,
}

impl StepExecutor {
    pub fn new(runner: Arc<dyn ActionRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(),
            runner,
            clock,
        }
    }

    /// Advance the instance until it suspends or completes.
    ///
    /// Preconditions: the instance is Active. A terminal instance or one
    /// with no current step (which only terminal instances have) simply
    /// reports its state.
    pub async fn advance(&self, instance: &mut ProcessInstance) -> WorkflowResult<Advance> {
        loop {
            if !instance.is_active() {
                return Ok(Advance::Completed);
            }
            let Some(step) = instance.current_step_def().cloned() else {
                // Backbone exhausted without an End step reached; the
                // registry's validation makes this unreachable, but the
                // instance must not spin
                instance.complete(self.clock.now());
                return Ok(Advance::Completed);
            };

            let now = self.clock.now();
            if !self.evaluator.evaluate(&step.conditions, &instance.data) {
                debug!(step = %step.id, instance_id = %instance.id, "conditions failed; skipping step");
                instance.skip_step(&step.id, now);
                continue;
            }

            match step.step_type {
                StepType::Start | StepType::System => {
                    self.run_actions(instance, &step).await?;
                    instance.complete_step(&step.id, self.clock.now());
                }
                StepType::Approval | StepType::Review | StepType::Task => {
                    debug!(step = %step.id, instance_id = %instance.id, "suspending on task step");
                    return Ok(Advance::Suspended(step));
                }
                StepType::End => {
                    self.run_actions(instance, &step).await?;
                    let now = self.clock.now();
                    instance.complete_step(&step.id, now);
                    instance.complete(now);
                    info!(instance_id = %instance.id, "workflow completed");
                    return Ok(Advance::Completed);
                }
            }
        }
    }

    /// Run the step's actions in order. The first failure is recorded in
    /// the audit history and aborts the step before the pointer moves.
    async fn run_actions(
        &self,
        instance: &mut ProcessInstance,
        step: &StepDefinition,
    ) -> WorkflowResult<()> {
        for action in &step.actions {
            if let Err(source) = self.runner.run(action, &instance.id, &mut instance.data).await {
                error!(
                    step = %step.id,
                    action,
                    instance_id = %instance.id,
                    error = %source,
                    "step action failed"
                );
                instance.record_audit(
                    "step_error",
                    serde_json::json!({
                        "step": step.id.0,
                        "action": action,
                        "error": source.to_string(),
                    }),
                    self.clock.now(),
                );
                return Err(WorkflowError::StepAction {
                    step: step.id.clone(),
                    action: action.clone(),
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoopActionRunner, SystemClock};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use promoflow_types::{
        Condition, DataBag, InstanceId, InstanceStatus, RoleId, StepId, TenantId, UserId,
        WorkflowId,
    };
    use serde_json::json;

    fn executor() -> StepExecutor {
        StepExecutor::new(Arc::new(NoopActionRunner), Arc::new(SystemClock))
    }

    fn make_instance(steps: Vec<StepDefinition>, data: serde_json::Value) -> ProcessInstance {
        ProcessInstance::new(
            TenantId::new("acme"),
            WorkflowId::new("wf-1"),
            steps,
            data.as_object().cloned().unwrap_or_default(),
            UserId::new("alice"),
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_runs_to_completion_without_task_steps() {
        let exec = executor();
        let mut instance = make_instance(
            vec![
                StepDefinition::start("start"),
                StepDefinition::system("notify", "Notify").with_action("notify_stakeholders"),
                StepDefinition::end("end"),
            ],
            json!({}),
        );

        let advance = exec.advance(&mut instance).await.unwrap();
        assert!(matches!(advance, Advance::Completed));
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert!(instance.current_step.is_none());
        assert_eq!(
            instance.completed_steps,
            vec![
                StepId::new("start"),
                StepId::new("notify"),
                StepId::new("end")
            ]
        );
    }

    #[tokio::test]
    async fn test_suspends_on_approval_step() {
        let exec = executor();
        let mut instance = make_instance(
            vec![
                StepDefinition::start("start"),
                StepDefinition::approval("approve", "Approve", RoleId::new("manager")),
                StepDefinition::end("end"),
            ],
            json!({}),
        );

        let advance = exec.advance(&mut instance).await.unwrap();
        let Advance::Suspended(step) = advance else {
            panic!("expected suspension");
        };
        assert_eq!(step.id, StepId::new("approve"));
        assert!(instance.is_active());
        assert_eq!(instance.current_step, Some(StepId::new("approve")));
        assert_eq!(instance.completed_steps, vec![StepId::new("start")]);
    }

    #[tokio::test]
    async fn test_skips_steps_whose_conditions_fail() {
        let exec = executor();
        let mut instance = make_instance(
            vec![
                StepDefinition::start("start"),
                StepDefinition::approval("finance", "Finance Approval", RoleId::new("finance"))
                    .with_condition(Condition::gt("budget", json!(50_000))),
                StepDefinition::end("end"),
            ],
            json!({ "budget": 1000 }),
        );

        let advance = exec.advance(&mut instance).await.unwrap();
        assert!(matches!(advance, Advance::Completed));
        // Skipped steps count toward the completed list
        assert_eq!(
            instance.completed_steps,
            vec![
                StepId::new("start"),
                StepId::new("finance"),
                StepId::new("end")
            ]
        );
        assert!(instance
            .audit
            .iter()
            .any(|e| e.event == "step_skipped" && e.data["step"] == "finance"));
    }

    #[tokio::test]
    async fn test_condition_held_step_suspends() {
        let exec = executor();
        let mut instance = make_instance(
            vec![
                StepDefinition::start("start"),
                StepDefinition::approval("finance", "Finance Approval", RoleId::new("finance"))
                    .with_condition(Condition::gt("budget", json!(50_000))),
                StepDefinition::end("end"),
            ],
            json!({ "budget": 80_000 }),
        );

        let advance = exec.advance(&mut instance).await.unwrap();
        assert!(matches!(advance, Advance::Suspended(_)));
    }

    struct FailingRunner {
        fail_on: String,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionRunner for FailingRunner {
        async fn run(
            &self,
            action: &str,
            _instance_id: &InstanceId,
            data: &mut DataBag,
        ) -> anyhow::Result<()> {
            self.calls.lock().push(action.to_string());
            if action == self.fail_on {
                anyhow::bail!("backend unavailable");
            }
            data.insert(action.to_string(), json!(true));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_action_failure_preserves_step_pointer() {
        let runner = Arc::new(FailingRunner {
            fail_on: "charge_budget".into(),
            calls: Mutex::new(Vec::new()),
        });
        let exec = StepExecutor::new(runner.clone(), Arc::new(SystemClock));
        let mut instance = make_instance(
            vec![
                StepDefinition::start("start"),
                StepDefinition::system("activate", "Activate")
                    .with_action("reserve_funds")
                    .with_action("charge_budget"),
                StepDefinition::end("end"),
            ],
            json!({}),
        );

        let err = exec.advance(&mut instance).await.unwrap_err();
        assert!(matches!(err, WorkflowError::StepAction { .. }));

        // Pointer stays on the failing step; earlier mutations persist
        assert!(instance.is_active());
        assert_eq!(instance.current_step, Some(StepId::new("activate")));
        assert_eq!(instance.completed_steps, vec![StepId::new("start")]);
        assert_eq!(instance.data.get("reserve_funds"), Some(&json!(true)));
        assert_eq!(instance.audit.last().unwrap().event, "step_error");
        assert_eq!(*runner.calls.lock(), ["reserve_funds", "charge_budget"]);
    }

    #[tokio::test]
    async fn test_terminal_instance_does_not_move() {
        let exec = executor();
        let mut instance = make_instance(
            vec![StepDefinition::start("start"), StepDefinition::end("end")],
            json!({}),
        );
        instance.reject("system", "cap", chrono::Utc::now());
        let audit_len = instance.audit.len();

        let advance = exec.advance(&mut instance).await.unwrap();
        assert!(matches!(advance, Advance::Completed));
        assert_eq!(instance.status, InstanceStatus::Rejected);
        assert_eq!(instance.audit.len(), audit_len);
    }
}
