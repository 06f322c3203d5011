//! Governance engine: the explicit home of all engine-wide state
//!
//! Holds the current policy forest, the individual registry and every
//! collaboration's state. Each operation is synchronous and takes the
//! external facts it may need through a [`ConditionOracle`].

use crate::facts::ConditionOracle;
use crate::registry::IndividualRegistry;
use crate::state::{CollaborationState, DecisionAttempt, EngineSettings, VoteReceipt};
use governance_types::{
    CollaborationId, CollaborationOutcome, Decision, Directive, ExternalQuery, GovernanceError,
    GovernanceEvent, GovernanceResult, Individual, IndividualId, PolicyForest, PolicyId, Scope,
    ScopeStatus,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Engine owning the forest, the registry and all collaborations
#[derive(Debug)]
pub struct GovernanceEngine {
    forest: Arc<PolicyForest>,
    registry: IndividualRegistry,
    collaborations: HashMap<CollaborationId, CollaborationState>,
    settings: EngineSettings,
}

impl GovernanceEngine {
    pub fn new(forest: PolicyForest) -> Self {
        let mut registry = IndividualRegistry::new();
        registry.register_forest(&forest);
        Self {
            forest: Arc::new(forest),
            registry,
            collaborations: HashMap::new(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn forest(&self) -> &Arc<PolicyForest> {
        &self.forest
    }

    /// Replace the whole forest; running collaborations keep theirs
    pub fn reload(&mut self, forest: PolicyForest) {
        self.registry.register_forest(&forest);
        tracing::info!(
            policies = forest.len(),
            roots = forest.roots().count(),
            "Policy forest reloaded"
        );
        self.forest = Arc::new(forest);
    }

    /// Apply any governance event
    pub fn handle(
        &mut self,
        event: GovernanceEvent,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<Vec<Directive>> {
        match event {
            GovernanceEvent::CollaborationProposed {
                id,
                scope,
                creator,
                rationale,
            } => Ok(self.propose(id, scope, creator, rationale, oracle)?.1),
            GovernanceEvent::PolicyReloaded { forest } => {
                self.reload(forest);
                Ok(Vec::new())
            }
            GovernanceEvent::UserRegistered { login } => {
                self.registry.ensure(&login);
                Ok(Vec::new())
            }
            other => {
                let Some(id) = other.collaboration_id().cloned() else {
                    return Ok(Vec::new());
                };
                if let GovernanceEvent::Voted { individual, .. } = &other {
                    self.registry.ensure(individual);
                }
                self.state_mut(&id)?.apply(&other, oracle)
            }
        }
    }

    pub fn propose(
        &mut self,
        id: CollaborationId,
        scope: Scope,
        creator: IndividualId,
        rationale: Option<String>,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(CollaborationOutcome, Vec<Directive>)> {
        if self.collaborations.contains_key(&id) {
            return Err(GovernanceError::CollaborationAlreadyExists(id));
        }
        self.registry.ensure(&creator);
        let (state, directives) = CollaborationState::propose(
            Arc::clone(&self.forest),
            self.settings.clone(),
            id.clone(),
            scope,
            creator,
            rationale,
            oracle,
        )?;
        let outcome = state.outcome();
        self.collaborations.insert(id, state);
        Ok((outcome, directives))
    }

    pub fn vote(
        &mut self,
        collaboration: &CollaborationId,
        individual: &IndividualId,
        agreement: bool,
        rationale: Option<String>,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(VoteReceipt, Vec<Directive>)> {
        self.registry.ensure(individual);
        self.state_mut(collaboration)?
            .vote(individual, agreement, rationale, oracle)
    }

    pub fn deadline_elapsed(
        &mut self,
        collaboration: &CollaborationId,
        policy: &PolicyId,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(DecisionAttempt, Vec<Directive>)> {
        self.state_mut(collaboration)?
            .deadline_elapsed(policy, oracle)
    }

    pub fn decide(
        &mut self,
        collaboration: &CollaborationId,
        policy: &PolicyId,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(DecisionAttempt, Vec<Directive>)> {
        self.state_mut(collaboration)?.decide(policy, oracle)
    }

    pub fn reassign_leader(
        &mut self,
        collaboration: &CollaborationId,
        leader: IndividualId,
    ) -> GovernanceResult<()> {
        self.registry.ensure(&leader);
        self.state_mut(collaboration)?.reassign_leader(leader);
        Ok(())
    }

    /// Platform facts an event will need answered before it is applied
    pub fn external_queries(&self, event: &GovernanceEvent) -> BTreeSet<ExternalQuery> {
        match event {
            GovernanceEvent::CollaborationProposed { scope, .. } => {
                CollaborationState::queries_for_scope(&self.forest, scope)
            }
            other => other
                .collaboration_id()
                .and_then(|id| self.collaborations.get(id))
                .map(CollaborationState::external_queries)
                .unwrap_or_default(),
        }
    }

    /// Drop completed collaborations; returns their ids
    pub fn collect_completed(&mut self) -> Vec<CollaborationId> {
        let completed: Vec<CollaborationId> = self
            .collaborations
            .iter()
            .filter(|(_, s)| s.collaboration().status == ScopeStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &completed {
            self.collaborations.remove(id);
        }
        completed
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn collaboration(&self, id: &CollaborationId) -> Option<&CollaborationState> {
        self.collaborations.get(id)
    }

    pub fn outcome(&self, id: &CollaborationId) -> Option<CollaborationOutcome> {
        self.collaborations.get(id).map(CollaborationState::outcome)
    }

    pub fn decisions(&self, id: &CollaborationId) -> &[Decision] {
        self.collaborations
            .get(id)
            .map(CollaborationState::decisions)
            .unwrap_or_default()
    }

    pub fn decision_for(&self, id: &CollaborationId, policy: &PolicyId) -> Option<&Decision> {
        self.collaborations
            .get(id)
            .and_then(|s| s.decision_for(policy))
    }

    /// Who voted into the decision of `policy`
    pub fn voters(&self, id: &CollaborationId, policy: &PolicyId) -> Vec<IndividualId> {
        self.collaborations
            .get(id)
            .and_then(|s| {
                s.decision_for(policy)
                    .map(|d| s.voters(&d.id).into_iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn individual(&self, id: &IndividualId) -> Option<&Individual> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &IndividualRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.collaborations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collaborations.is_empty()
    }

    fn state_mut(&mut self, id: &CollaborationId) -> GovernanceResult<&mut CollaborationState> {
        self.collaborations
            .get_mut(id)
            .ok_or_else(|| GovernanceError::CollaborationNotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::ExternalFacts;
    use governance_types::{Participant, Policy, Project, Role, VotingRules};

    fn setup() -> GovernanceEngine {
        let forest = PolicyForest::builder()
            .role(
                Role::new("maintainers")
                    .with_member("alice")
                    .with_member("bob")
                    .with_member("carol"),
            )
            .policy(Policy::majority(
                "review",
                Project::new("core").with_repository("acme/core"),
                VotingRules::new().with_participant(Participant::role("maintainers")),
            ))
            .build()
            .unwrap();
        GovernanceEngine::new(forest)
    }

    fn scope() -> Scope {
        Project::new("core").with_repository("acme/core").into()
    }

    #[test]
    fn test_duplicate_collaboration_rejected() {
        let mut engine = setup();
        let facts = ExternalFacts::new();
        let id = CollaborationId::new("acme/core#1");
        engine
            .propose(id.clone(), scope(), IndividualId::new("alice"), None, &facts)
            .unwrap();
        let again = engine.propose(id, scope(), IndividualId::new("alice"), None, &facts);
        assert!(matches!(
            again,
            Err(GovernanceError::CollaborationAlreadyExists(_))
        ));
    }

    #[test]
    fn test_vote_on_unknown_collaboration_is_an_error() {
        let mut engine = setup();
        let result = engine.vote(
            &CollaborationId::new("nope"),
            &IndividualId::new("alice"),
            true,
            None,
            &ExternalFacts::new(),
        );
        assert!(matches!(
            result,
            Err(GovernanceError::CollaborationNotFound(_))
        ));
    }

    #[test]
    fn test_registry_tracks_first_reference() {
        let mut engine = setup();
        assert!(engine.individual(&IndividualId::new("alice")).is_some());
        engine
            .handle(
                GovernanceEvent::UserRegistered {
                    login: IndividualId::new("dave"),
                },
                &ExternalFacts::new(),
            )
            .unwrap();
        assert!(engine.individual(&IndividualId::new("dave")).is_some());
    }

    #[test]
    fn test_collect_completed() {
        let mut engine = setup();
        let facts = ExternalFacts::new();
        let id = CollaborationId::new("acme/core#1");
        engine
            .propose(id.clone(), scope(), IndividualId::new("alice"), None, &facts)
            .unwrap();
        engine
            .vote(&id, &IndividualId::new("alice"), true, None, &facts)
            .unwrap();
        assert_eq!(
            engine.outcome(&id),
            Some(CollaborationOutcome::Decided { accepted: true })
        );
        assert_eq!(engine.collect_completed(), vec![id.clone()]);
        assert!(engine.outcome(&id).is_none());
    }

    #[test]
    fn test_receipt_serializes_tagged() {
        let mut engine = setup();
        let facts = ExternalFacts::new();
        let id = CollaborationId::new("acme/core#2");
        engine
            .propose(id.clone(), scope(), IndividualId::new("alice"), None, &facts)
            .unwrap();
        let (receipt, _) = engine
            .vote(&id, &IndividualId::new("mallory"), true, None, &facts)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            serde_json::json!({"receipt": "ineligible"})
        );
    }
}
