//! Individual registry
//!
//! Individuals are created on first reference and never removed.
//! Profiles declared in the policy forest (weights, confidence) replace
//! the defaults on every reload.

use governance_types::{Individual, IndividualId, PolicyForest};
use std::collections::HashMap;

/// Every individual the engine has seen
#[derive(Clone, Debug, Default)]
pub struct IndividualRegistry {
    individuals: HashMap<IndividualId, Individual>,
}

impl IndividualRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register declared profiles and role members of a forest
    pub fn register_forest(&mut self, forest: &PolicyForest) -> usize {
        let known = forest.known_individuals();
        for id in &known {
            match forest.individual(id) {
                Some(profile) => {
                    let registered_at = self
                        .individuals
                        .get(id)
                        .map(|i| i.registered_at)
                        .unwrap_or(profile.registered_at);
                    let mut profile = profile.clone();
                    profile.registered_at = registered_at;
                    self.individuals.insert(id.clone(), profile);
                }
                None => {
                    self.ensure(id);
                }
            }
        }
        tracing::debug!(count = known.len(), "Forest individuals registered");
        known.len()
    }

    /// Fetch an individual, creating it on first reference
    pub fn ensure(&mut self, id: &IndividualId) -> &Individual {
        self.individuals.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(individual = %id, "Individual registered");
            Individual::new(id.0.clone())
        })
    }

    pub fn get(&self, id: &IndividualId) -> Option<&Individual> {
        self.individuals.get(id)
    }

    pub fn contains(&self, id: &IndividualId) -> bool {
        self.individuals.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}
