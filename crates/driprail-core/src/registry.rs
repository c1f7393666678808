//! Step registry: the explicit table from step kind to factory.
//!
//! Built once during startup wiring, then moved behind `Arc` and shared with
//! the dispatcher. Registration after that point is impossible by
//! construction (`register` needs `&mut self`), which is what makes
//! lock-free concurrent `resolve` calls safe.

use std::collections::HashMap;

use driprail_types::error::RegistryError;

use crate::step::StepFactory;

/// Registry of available automation steps, indexed by kind.
///
/// There is no global instance; whoever wires the process builds one,
/// registers every step, and hands it to the dispatcher.
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under the given kind.
    ///
    /// Duplicate kinds fail fast with [`RegistryError::Duplicate`] so a
    /// misconfigured process dies at startup instead of silently shadowing
    /// a step.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        factory: StepFactory,
    ) -> Result<(), RegistryError> {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(RegistryError::Duplicate(kind));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Look up the factory for a kind. Pure lookup; unknown kinds are the
    /// caller's problem (the dispatcher treats them as permanent failures).
    pub fn resolve(&self, kind: &str) -> Option<&StepFactory> {
        self.factories.get(kind)
    }

    /// All registered kinds, sorted for stable listings.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
