//! Workflow definition registry
//!
//! A validated, tenant-agnostic catalog of workflow templates. Starting
//! a process resolves its definition here and freezes a copy of the
//! steps onto the instance, so re-registering a definition never
//! affects in-flight work.

use parking_lot::RwLock;
use promoflow_types::{WorkflowDefinition, WorkflowError, WorkflowId, WorkflowResult};
use std::collections::HashMap;
use tracing::info;

/// Catalog of registered workflow definitions
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition. Re-registering an id replaces
    /// the previous version for future starts only.
    pub fn register(&self, definition: WorkflowDefinition) -> WorkflowResult<()> {
        definition.validate()?;
        info!(
            workflow_id = %definition.id,
            steps = definition.steps.len(),
            "registered workflow definition"
        );
        self.definitions
            .write()
            .insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Resolve a definition by id
    pub fn get(&self, id: &WorkflowId) -> WorkflowResult<WorkflowDefinition> {
        self.definitions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow(id.clone()))
    }

    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.definitions.read().contains_key(id)
    }

    /// Ids of all registered definitions
    pub fn list(&self) -> Vec<WorkflowId> {
        self.definitions.read().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.definitions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoflow_types::{RoleId, StepDefinition};

    fn make_definition(id: &str) -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(id, "Promotion Approval");
        def.add_step(StepDefinition::start("start")).unwrap();
        def.add_step(StepDefinition::approval(
            "approve",
            "Manager Approval",
            RoleId::new("manager"),
        ))
        .unwrap();
        def.add_step(StepDefinition::end("end")).unwrap();
        def
    }

    #[test]
    fn test_register_and_get() {
        let registry = DefinitionRegistry::new();
        registry.register(make_definition("wf-promo")).unwrap();

        assert!(registry.contains(&WorkflowId::new("wf-promo")));
        assert_eq!(registry.count(), 1);

        let def = registry.get(&WorkflowId::new("wf-promo")).unwrap();
        assert_eq!(def.steps.len(), 3);
    }

    #[test]
    fn test_get_unknown() {
        let registry = DefinitionRegistry::new();
        let err = registry.get(&WorkflowId::new("nope")).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownWorkflow(_)));
    }

    #[test]
    fn test_register_rejects_invalid() {
        let registry = DefinitionRegistry::new();
        // No End step
        let mut def = WorkflowDefinition::new("bad", "Bad");
        def.add_step(StepDefinition::start("start")).unwrap();
        assert!(registry.register(def).is_err());
        assert!(!registry.contains(&WorkflowId::new("bad")));
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = DefinitionRegistry::new();
        registry.register(make_definition("wf-promo")).unwrap();

        let mut updated = make_definition("wf-promo");
        updated.name = "Promotion Approval v2".into();
        registry.register(updated).unwrap();

        assert_eq!(registry.count(), 1);
        let def = registry.get(&WorkflowId::new("wf-promo")).unwrap();
        assert_eq!(def.name, "Promotion Approval v2");
    }
}
