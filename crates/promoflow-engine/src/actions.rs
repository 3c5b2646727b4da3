//! Step actions: named side effects run by automatic steps
//!
//! Start, System, and End steps carry a list of action names
//! ("activate_promotion", "notify_stakeholders"). The engine resolves
//! and runs them through an [`ActionRunner`]; it has no idea what they
//! do. Actions may mutate the instance's data bag; mutations made before
//! a failure persist, so actions should be idempotent under retry.

use async_trait::async_trait;
use promoflow_types::{DataBag, InstanceId};
use tracing::debug;

/// Executes named step actions
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Run one action against the instance's data bag. Errors abort the
    /// step and surface to the caller as a step-action failure.
    async fn run(
        &self,
        action: &str,
        instance_id: &InstanceId,
        data: &mut DataBag,
    ) -> anyhow::Result<()>;
}

/// Logs actions and succeeds. Default runner for tests and for
/// deployments where actions are handled by event consumers instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopActionRunner;

#[async_trait]
impl ActionRunner for NoopActionRunner {
    async fn run(
        &self,
        action: &str,
        instance_id: &InstanceId,
        _data: &mut DataBag,
    ) -> anyhow::Result<()> {
        debug!(action, instance_id = %instance_id, "action executed (noop)");
        Ok(())
    }
}
