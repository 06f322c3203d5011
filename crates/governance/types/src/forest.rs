//! Policy forest: the validated set of loaded policies
//!
//! The forest is built from a flat [`PolicyForestSpec`] (the shape the
//! policy loader produces). Building links every phase and leader
//! default to its owner, derives the roots, and rejects malformed
//! structure before any collaboration can reference it. A reload
//! replaces the whole forest.

use crate::{
    GovernanceError, GovernanceResult, Individual, IndividualId, Participant, Policy, PolicyId,
    PolicyKind, Role, RoleId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Flat, serializable description of a forest
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyForestSpec {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub individuals: Vec<Individual>,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// Validated policies plus the roles and profiles they reference
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "PolicyForestSpec", into = "PolicyForestSpec")]
pub struct PolicyForest {
    policies: HashMap<PolicyId, Policy>,
    /// Declaration order, kept for deterministic root selection
    order: Vec<PolicyId>,
    roles: HashMap<RoleId, Role>,
    individuals: HashMap<IndividualId, Individual>,
}

impl PolicyForest {
    pub fn builder() -> PolicyForestBuilder {
        PolicyForestBuilder::default()
    }

    /// Validate a flat spec and link it into a forest
    pub fn build(spec: PolicyForestSpec) -> GovernanceResult<Self> {
        let mut roles = HashMap::new();
        for role in spec.roles {
            if !(role.vote_weight.is_finite() && role.vote_weight >= 0.0) {
                return Err(GovernanceError::InvalidRole {
                    role: role.id,
                    reason: format!("vote weight {} is not a non-negative number", role.vote_weight),
                });
            }
            roles.insert(role.id.clone(), role);
        }

        let mut individuals = HashMap::new();
        for individual in spec.individuals {
            validate_profile(&individual)?;
            individuals.insert(individual.id.clone(), individual);
        }

        let mut policies = HashMap::new();
        let mut order = Vec::with_capacity(spec.policies.len());
        for mut policy in spec.policies {
            policy.parent = None;
            if policies.contains_key(&policy.id) {
                return Err(GovernanceError::DuplicatePolicy(policy.id));
            }
            order.push(policy.id.clone());
            policies.insert(policy.id.clone(), policy);
        }

        for id in &order {
            validate_policy(&policies[id], &policies, &roles)?;
        }

        // Link children to their owner
        let mut owners: HashMap<PolicyId, PolicyId> = HashMap::new();
        for id in &order {
            for child in policies[id].children() {
                if let Some(first) = owners.insert(child.clone(), id.clone()) {
                    return Err(GovernanceError::SharedPhase {
                        child: child.clone(),
                        first,
                        second: id.clone(),
                    });
                }
            }
        }
        for (child, owner) in &owners {
            if let Some(policy) = policies.get_mut(child) {
                policy.parent = Some(owner.clone());
            }
        }

        // Every parent chain must end at a root
        for id in &order {
            let mut seen = HashSet::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    return Err(GovernanceError::PolicyCycle(id.clone()));
                }
                cursor = owners.get(current);
            }
        }

        Ok(Self {
            policies,
            order,
            roles,
            individuals,
        })
    }

    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.get(id)
    }

    pub fn policy(&self, id: &PolicyId) -> GovernanceResult<&Policy> {
        self.policies
            .get(id)
            .ok_or_else(|| GovernanceError::PolicyNotFound(id.clone()))
    }

    /// Policies that are no other policy's phase or default, in declaration order
    pub fn roots(&self) -> impl Iterator<Item = &Policy> {
        self.policies().filter(|p| p.is_root())
    }

    /// All policies in declaration order
    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.order.iter().filter_map(|id| self.policies.get(id))
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn individual(&self, id: &IndividualId) -> Option<&Individual> {
        self.individuals.get(id)
    }

    /// Everyone the forest names: declared profiles and role members
    pub fn known_individuals(&self) -> BTreeSet<IndividualId> {
        self.individuals
            .keys()
            .cloned()
            .chain(self.roles.values().flat_map(|r| r.members.iter().cloned()))
            .collect()
    }

    /// Individuals named by a participant list, with role members expanded
    pub fn expand(&self, participants: &[Participant]) -> BTreeSet<IndividualId> {
        let mut out = BTreeSet::new();
        for participant in participants {
            match participant {
                Participant::Role(role) => {
                    if let Some(role) = self.roles.get(role) {
                        out.extend(role.members.iter().cloned());
                    }
                }
                Participant::Individual(individual) => {
                    out.insert(individual.clone());
                }
            }
        }
        out
    }

    /// Whether `individual` is named by a participant list
    pub fn names(&self, participants: &[Participant], individual: &IndividualId) -> bool {
        participants.iter().any(|participant| match participant {
            Participant::Role(role) => self
                .roles
                .get(role)
                .is_some_and(|r| r.has_member(individual)),
            Participant::Individual(i) => i == individual,
        })
    }

    /// All policies below `id`, depth first, excluding `id` itself
    pub fn descendants(&self, id: &PolicyId) -> Vec<PolicyId> {
        let mut out = Vec::new();
        let mut stack: Vec<&PolicyId> = match self.policies.get(id) {
            Some(policy) => policy.children().into_iter().rev().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            if let Some(policy) = self.policies.get(current) {
                stack.extend(policy.children().into_iter().rev());
            }
        }
        out
    }

    /// `id` followed by its descendants
    pub fn subtree(&self, id: &PolicyId) -> Vec<&Policy> {
        std::iter::once(id.clone())
            .chain(self.descendants(id))
            .filter_map(|p| self.policies.get(&p))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

fn validate_profile(individual: &Individual) -> GovernanceResult<()> {
    if let Some(weight) = individual.vote_weight {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(GovernanceError::InvalidProfile {
                individual: individual.id.clone(),
                reason: format!("vote weight {weight} is not a non-negative number"),
            });
        }
    }
    if let Some(confidence) = individual.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(GovernanceError::InvalidProfile {
                individual: individual.id.clone(),
                reason: format!("confidence {confidence} is outside [0, 1]"),
            });
        }
    }
    Ok(())
}

fn validate_policy(
    policy: &Policy,
    policies: &HashMap<PolicyId, Policy>,
    roles: &HashMap<RoleId, Role>,
) -> GovernanceResult<()> {
    if let PolicyKind::Composed(composition) = &policy.kind {
        if composition.phases.is_empty() {
            return Err(GovernanceError::EmptyComposition(policy.id.clone()));
        }
        let mut seen = HashSet::new();
        for phase in &composition.phases {
            if phase == &policy.id {
                return Err(GovernanceError::PolicyCycle(policy.id.clone()));
            }
            if !seen.insert(phase) {
                return Err(GovernanceError::InvalidPolicy {
                    policy: policy.id.clone(),
                    reason: format!("phase {phase} listed twice"),
                });
            }
            if !policies.contains_key(phase) {
                return Err(GovernanceError::UnknownPolicyReference {
                    policy: policy.id.clone(),
                    reference: phase.clone(),
                });
            }
        }
        return Ok(());
    }

    if let PolicyKind::LeaderDriven { default, .. } = &policy.kind {
        if default.as_str().is_empty() {
            return Err(GovernanceError::MissingDefault(policy.id.clone()));
        }
        if default == &policy.id {
            return Err(GovernanceError::PolicyCycle(policy.id.clone()));
        }
        if !policies.contains_key(default) {
            return Err(GovernanceError::UnknownPolicyReference {
                policy: policy.id.clone(),
                reference: default.clone(),
            });
        }
    }

    let Some(rules) = policy.rules() else {
        return Ok(());
    };

    if let Some(ratio) = rules.ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(GovernanceError::InvalidRatio {
                policy: policy.id.clone(),
                ratio,
            });
        }
    }

    let referenced = rules.participants.iter().chain(rules.conditions.iter().flat_map(
        |condition| match &condition.kind {
            crate::ConditionKind::VetoRight { vetoers } => vetoers.as_slice(),
            crate::ConditionKind::ParticipantExclusion { excluded } => excluded.as_slice(),
            _ => &[][..],
        },
    ));
    for participant in referenced {
        if let Participant::Role(role) = participant {
            if !roles.contains_key(role) {
                return Err(GovernanceError::UnknownRole {
                    policy: policy.id.clone(),
                    role: role.clone(),
                });
            }
        }
    }

    Ok(())
}

impl TryFrom<PolicyForestSpec> for PolicyForest {
    type Error = GovernanceError;

    fn try_from(spec: PolicyForestSpec) -> GovernanceResult<Self> {
        Self::build(spec)
    }
}

impl From<PolicyForest> for PolicyForestSpec {
    fn from(mut forest: PolicyForest) -> Self {
        let mut roles: Vec<Role> = forest.roles.into_values().collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        let mut individuals: Vec<Individual> = forest.individuals.into_values().collect();
        individuals.sort_by(|a, b| a.id.cmp(&b.id));
        let policies = forest
            .order
            .iter()
            .filter_map(|id| forest.policies.remove(id))
            .collect();
        Self {
            roles,
            individuals,
            policies,
        }
    }
}

/// Incremental construction of a forest, mostly for tests and embedders
#[derive(Clone, Debug, Default)]
pub struct PolicyForestBuilder {
    spec: PolicyForestSpec,
}

impl PolicyForestBuilder {
    pub fn role(mut self, role: Role) -> Self {
        self.spec.roles.push(role);
        self
    }

    pub fn individual(mut self, individual: Individual) -> Self {
        self.spec.individuals.push(individual);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.spec.policies.push(policy);
        self
    }

    pub fn build(self) -> GovernanceResult<PolicyForest> {
        PolicyForest::build(self.spec)
    }
}
