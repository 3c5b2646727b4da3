//! Persistence ports for instances and tasks
//!
//! The engine owns these traits; implementations plug in underneath.
//! The in-memory implementations back tests and single-node deployments.
//!
//! Instance stores keep an active index alongside the full record map:
//! terminal instances are retired from the index but stay queryable
//! forever, so `get` and `list` see completed and rejected work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use promoflow_types::{
    InstanceId, InstanceStatus, InstanceSummary, ProcessInstance, Task, TaskId, TaskStatus,
    TenantId, WorkflowError, WorkflowId, WorkflowResult,
};
use std::collections::{HashMap, HashSet};

// ── Query parameters ─────────────────────────────────────────────────

/// Optional filters for instance listings
#[derive(Clone, Debug, Default)]
pub struct InstanceFilter {
    pub status: Option<InstanceStatus>,
    pub workflow_id: Option<WorkflowId>,
}

impl InstanceFilter {
    pub fn status(status: InstanceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn workflow(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id: Some(workflow_id),
            ..Default::default()
        }
    }

    fn accepts(&self, instance: &ProcessInstance) -> bool {
        self.status.map(|s| instance.status == s).unwrap_or(true)
            && self
                .workflow_id
                .as_ref()
                .map(|w| &instance.workflow_id == w)
                .unwrap_or(true)
    }
}

/// Zero-based page over a newest-first ordering
#[derive(Clone, Copy, Debug)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        self.page * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, limit: 20 }
    }
}

// ── Instance store ───────────────────────────────────────────────────

/// Persistence port for process instances
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Upsert the full instance record
    async fn save(&self, instance: &ProcessInstance) -> WorkflowResult<()>;

    /// Load an instance by id, active or retired
    async fn get(&self, id: &InstanceId) -> WorkflowResult<ProcessInstance>;

    /// Tenant-scoped listing, newest-first by creation time
    async fn list(
        &self,
        tenant_id: &TenantId,
        filter: &InstanceFilter,
        page: &PageRequest,
    ) -> WorkflowResult<Vec<InstanceSummary>>;

    /// Remove an instance from the active index; the record remains
    async fn retire(&self, id: &InstanceId) -> WorkflowResult<()>;
}

/// In-memory instance store
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    inner: RwLock<InstanceStoreInner>,
}

#[derive(Debug, Default)]
struct InstanceStoreInner {
    records: HashMap<InstanceId, ProcessInstance>,
    active: HashSet<InstanceId>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the active index
    pub fn active_count(&self) -> usize {
        self.inner.read().active.len()
    }

    /// Whether the instance is in the active index
    pub fn is_active(&self, id: &InstanceId) -> bool {
        self.inner.read().active.contains(id)
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save(&self, instance: &ProcessInstance) -> WorkflowResult<()> {
        let mut inner = self.inner.write();
        if instance.is_active() {
            inner.active.insert(instance.id.clone());
        }
        inner.records.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn get(&self, id: &InstanceId) -> WorkflowResult<ProcessInstance> {
        self.inner
            .read()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::InstanceNotFound(id.clone()))
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        filter: &InstanceFilter,
        page: &PageRequest,
    ) -> WorkflowResult<Vec<InstanceSummary>> {
        let inner = self.inner.read();
        let mut matching: Vec<&ProcessInstance> = inner
            .records
            .values()
            .filter(|i| &i.tenant_id == tenant_id && filter.accepts(i))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit)
            .map(|i| i.summary())
            .collect())
    }

    async fn retire(&self, id: &InstanceId) -> WorkflowResult<()> {
        self.inner.write().active.remove(id);
        Ok(())
    }
}

// ── Task store ───────────────────────────────────────────────────────

/// Persistence port for tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Upsert the full task record
    async fn save(&self, task: &Task) -> WorkflowResult<()>;

    /// Load a task by id
    async fn get(&self, id: &TaskId) -> WorkflowResult<Task>;

    /// Tasks owned by `assignee` within a tenant, optionally filtered by
    /// status, newest-first
    async fn list_for_assignee(
        &self,
        tenant_id: &TenantId,
        assignee: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> WorkflowResult<Vec<Task>>;

    /// All tasks of one instance, in creation order
    async fn list_for_instance(&self, instance_id: &InstanceId) -> WorkflowResult<Vec<Task>>;

    /// Pending tasks whose due date has passed at `now`
    async fn list_past_due(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<Task>>;
}

/// In-memory task store
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    records: RwLock<HashMap<TaskId, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save(&self, task: &Task) -> WorkflowResult<()> {
        self.records.write().insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> WorkflowResult<Task> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::TaskNotFound(id.clone()))
    }

    async fn list_for_assignee(
        &self,
        tenant_id: &TenantId,
        assignee: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> WorkflowResult<Vec<Task>> {
        let records = self.records.read();
        let mut matching: Vec<&Task> = records
            .values()
            .filter(|t| {
                &t.tenant_id == tenant_id
                    && t.assignee == assignee
                    && status.map(|s| t.status == s).unwrap_or(true)
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn list_for_instance(&self, instance_id: &InstanceId) -> WorkflowResult<Vec<Task>> {
        let records = self.records.read();
        let mut matching: Vec<Task> = records
            .values()
            .filter(|t| &t.instance_id == instance_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn list_past_due(&self, now: DateTime<Utc>) -> WorkflowResult<Vec<Task>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|t| t.is_past_due(now))
            .cloned()
            .collect())
    }
}
