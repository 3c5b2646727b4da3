//! Promoflow Orchestration Engine
//!
//! Drives the approval workflows of a multi-tenant trade promotion
//! management backend: long-lived, asynchronous processes that wait on
//! human tasks, skip steps conditionally, escalate on timeout, and leave
//! a complete audit trail.
//!
//! # Key Principle
//!
//! **The engine orchestrates, it never performs business work itself.**
//!
//! Side effects live behind collaborator ports: persistence behind
//! [`InstanceStore`]/[`TaskStore`], step actions behind [`ActionRunner`],
//! notification behind [`Notifier`], event delivery behind [`EventSink`],
//! and time behind [`Clock`]. The engine object is constructed with its
//! dependencies injected — no ambient globals, so tests run any number of
//! isolated engines.
//!
//! # Architecture
//!
//! [`WorkflowOrchestrator`] composes specialized components:
//!
//! - [`DefinitionRegistry`] — validated, read-only catalog of templates
//! - [`ConditionEvaluator`] — pure predicate interpreter over data bags
//! - [`RuleEngine`] — business-rule screening at process start
//! - [`StepExecutor`] — the linear step state machine
//! - [`TaskManager`] — human work items: creation, completion, escalation
//!
//! # Concurrency
//!
//! Instances run independently; within one instance every state-mutating
//! operation is serialized through a per-instance lock. Timeouts are
//! detected by a polling scan whose interval bounds worst-case escalation
//! latency; no thread ever sleeps on a business timer.

#![deny(unsafe_code)]

pub mod actions;
pub mod clock;
pub mod conditions;
pub mod events;
pub mod executor;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod rules;
pub mod store;
pub mod tasks;

pub use actions::{ActionRunner, NoopActionRunner};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conditions::ConditionEvaluator;
pub use events::{EventSink, FanoutEventSink, MemoryEventSink, TracingEventSink};
pub use executor::{Advance, StepExecutor};
pub use notify::{Notifier, NoopNotifier, TracingNotifier};
pub use orchestrator::{OrchestratorBuilder, StartOutcome, TaskCompletion, WorkflowOrchestrator};
pub use registry::DefinitionRegistry;
pub use rules::RuleEngine;
pub use store::{
    InstanceFilter, InstanceStore, MemoryInstanceStore, MemoryTaskStore, PageRequest, TaskStore,
};
pub use tasks::TaskManager;
