//! Promoflow Domain Types
//!
//! Promoflow drives the approval workflows of a multi-tenant trade
//! promotion management backend: promotion approval, budget allocation,
//! customer onboarding. Workflows here are **linear backbones of steps
//! that may be skipped** — branching is expressed through per-step
//! conditions, never through graph edges.
//!
//! # Key Concepts
//!
//! - **WorkflowDefinition**: An immutable template — an ordered list of
//!   steps plus an optional rule-set reference. Loaded once at process
//!   start; never mutated afterwards.
//! - **ProcessInstance**: One running execution of a definition, carrying
//!   its own deep copy of the steps, a data bag, a position, and an
//!   append-only audit history.
//! - **Task**: A unit of human work (approval, review, task) bound to one
//!   step of one instance — the only suspension point in the model.
//! - **Condition**: A structured, safely-evaluable predicate over the
//!   instance's data bag. Conditions are data, never executable code.
//! - **Rule**: A workflow-type-level guard evaluated once at process
//!   start, independent of the step backbone.
//!
//! # Design Principles
//!
//! 1. Rejection is a valid terminal state of the data model, not an error.
//! 2. Every skip, rejection, escalation, and action failure produces
//!    exactly one audit entry. No silent failure path.
//! 3. Terminal instances leave the active working set but stay queryable
//!    forever with full audit history.

#![deny(unsafe_code)]

mod condition;
mod definition;
mod errors;
mod events;
mod instance;
mod rule;
mod task;

pub use condition::*;
pub use definition::*;
pub use errors::*;
pub use events::*;
pub use instance::*;
pub use rule::*;
pub use task::*;
