//! Per-collaboration state: ballot boxes, votes, decisions, audit records
//!
//! One `CollaborationState` owns everything one collaboration mutates, so
//! a single writer per collaboration id serializes all of it. Votes and
//! decisions live in owning tables keyed by id; ballot boxes and
//! individual records refer to them by id.

use crate::ballot::{self, Eligibility};
use crate::composition::{self, ComposedVerdict, PhaseState};
use crate::conditions;
use crate::evaluator::{self, BallotView, Evaluation};
use crate::facts::ConditionOracle;
use crate::scope_matcher;
use chrono::{Duration, Utc};
use governance_types::{
    BallotBox, Collaboration, CollaborationId, CollaborationOutcome, Decision, DecisionId,
    Directive, ExternalQuery, GovernanceEvent, GovernanceResult, IndividualId, IndividualRecord,
    InstanceState, Policy, PolicyForest, PolicyId, PolicyKind, Scope, ScopeStatus, Vote, VoteId,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Tunables shared by every collaboration
#[derive(Clone, Debug, Default)]
pub struct EngineSettings {
    /// Replace every instance's deadline with `opened_at + offset`
    pub deadline_override: Option<Duration>,
}

impl EngineSettings {
    pub fn with_deadline_override(mut self, offset: Duration) -> Self {
        self.deadline_override = Some(offset);
        self
    }
}

/// What happened to a cast vote
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "receipt", rename_all = "snake_case")]
pub enum VoteReceipt {
    /// Recorded into these instances; the decidable ones were attempted
    Recorded {
        policies: Vec<PolicyId>,
        decidable: Vec<PolicyId>,
    },
    /// Not a participant of any open instance
    Ineligible,
    /// Collaboration decided, or nothing open
    Closed,
}

/// Result of asking one instance for a decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "attempt", rename_all = "snake_case")]
pub enum DecisionAttempt {
    Decided {
        decision: DecisionId,
        accepted: bool,
    },
    Pending,
    /// Leader has not voted; its default policy was opened
    FallbackOpened { default: PolicyId },
    /// Never opened, or superseded
    NotOpen,
}

/// All mutable state of one collaboration
#[derive(Clone, Debug)]
pub struct CollaborationState {
    /// Forest the collaboration was proposed under; reloads do not move it
    forest: Arc<PolicyForest>,
    settings: EngineSettings,
    collaboration: Collaboration,
    votes: HashMap<VoteId, Vote>,
    decisions: Vec<Decision>,
    decision_index: HashMap<DecisionId, usize>,
    individuals: BTreeMap<IndividualId, IndividualRecord>,
}

impl CollaborationState {
    /// Create the collaboration, select its governing policy and open it
    pub fn propose(
        forest: Arc<PolicyForest>,
        settings: EngineSettings,
        id: CollaborationId,
        scope: Scope,
        creator: IndividualId,
        rationale: Option<String>,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(Self, Vec<Directive>)> {
        let mut state = Self {
            collaboration: Collaboration::new(id, scope, creator.clone(), rationale),
            forest,
            settings,
            votes: HashMap::new(),
            decisions: Vec::new(),
            decision_index: HashMap::new(),
            individuals: BTreeMap::new(),
        };
        state.record_for(&creator);

        let mut out = Vec::new();
        let forest = Arc::clone(&state.forest);
        let Some(root) = scope_matcher::find_policy_for(&forest, &state.collaboration.scope) else {
            tracing::warn!(
                collaboration_id = %state.collaboration.id,
                scope = state.collaboration.scope.level(),
                "No policy governs the proposed scope"
            );
            return Ok((state, out));
        };

        state.collaboration.governing_policy = Some(root.id.clone());
        tracing::info!(
            collaboration_id = %state.collaboration.id,
            policy = %root.id,
            "Collaboration proposed"
        );
        state.open(&forest, &root.id, oracle, &mut out)?;
        if state.collaboration.skipped.contains(&root.id) {
            tracing::warn!(
                collaboration_id = %state.collaboration.id,
                policy = %root.id,
                "No applicable phase; collaboration stalled"
            );
        }
        Ok((state, out))
    }

    /// Apply a collaboration-scoped event
    pub fn apply(
        &mut self,
        event: &GovernanceEvent,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<Vec<Directive>> {
        match event {
            GovernanceEvent::Voted {
                individual,
                agreement,
                rationale,
                ..
            } => Ok(self
                .vote(individual, *agreement, rationale.clone(), oracle)?
                .1),
            GovernanceEvent::DeadlineElapsed { policy, .. } => {
                Ok(self.deadline_elapsed(policy, oracle)?.1)
            }
            GovernanceEvent::LeaderReassigned { leader, .. } => {
                self.reassign_leader(leader.clone());
                Ok(Vec::new())
            }
            GovernanceEvent::CollaborationProposed { .. }
            | GovernanceEvent::PolicyReloaded { .. }
            | GovernanceEvent::UserRegistered { .. } => Ok(Vec::new()),
        }
    }

    /// Record a vote into every open instance the individual may vote on
    pub fn vote(
        &mut self,
        individual: &IndividualId,
        agreement: bool,
        rationale: Option<String>,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(VoteReceipt, Vec<Directive>)> {
        let mut out = Vec::new();
        self.record_for(individual);
        if self.collaboration.is_decided() {
            tracing::debug!(
                collaboration_id = %self.collaboration.id,
                individual = %individual,
                "Vote on decided collaboration rejected"
            );
            return Ok((VoteReceipt::Closed, out));
        }

        let forest = Arc::clone(&self.forest);
        let open: Vec<PolicyId> = self
            .collaboration
            .open_instances()
            .filter(|id| forest.get(id).is_some_and(|p| !p.is_composed()))
            .cloned()
            .collect();
        if open.is_empty() {
            return Ok((VoteReceipt::Closed, out));
        }

        let mut recorded = Vec::new();
        let mut decidable = Vec::new();
        for id in open {
            let Some(rules) = forest.get(&id).and_then(Policy::rules) else {
                continue;
            };
            if conditions::excluded_individuals(&forest, rules).contains(individual) {
                continue;
            }
            let Some(eligibility) = ballot::eligibility(&forest, rules, individual) else {
                continue;
            };
            self.upsert_vote(&id, individual, agreement, rationale.clone(), eligibility);
            recorded.push(id.clone());

            let elapsed = self
                .collaboration
                .ballot_box(&id)
                .is_some_and(|b| b.deadline_elapsed);
            if elapsed || self.is_decidable(&forest, &id, oracle) {
                decidable.push(id);
            }
        }

        if recorded.is_empty() {
            tracing::debug!(
                collaboration_id = %self.collaboration.id,
                individual = %individual,
                "Vote ignored; not a participant of any open policy"
            );
            return Ok((VoteReceipt::Ineligible, out));
        }

        for id in &decidable {
            self.decide_instance(&forest, id, oracle, &mut out)?;
        }
        Ok((
            VoteReceipt::Recorded {
                policies: recorded,
                decidable,
            },
            out,
        ))
    }

    /// Mark an instance's deadline as elapsed and attempt a decision
    pub fn deadline_elapsed(
        &mut self,
        policy: &PolicyId,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(DecisionAttempt, Vec<Directive>)> {
        let mut out = Vec::new();
        let forest = Arc::clone(&self.forest);
        if !self.collaboration.is_open(policy) {
            return Ok((self.attempt_for(policy), out));
        }
        if let Some(bbox) = self.collaboration.ballot_boxes.get_mut(policy) {
            bbox.deadline_elapsed = true;
        }
        tracing::info!(
            collaboration_id = %self.collaboration.id,
            policy = %policy,
            "Deadline elapsed"
        );
        let attempt = self.decide_instance(&forest, policy, oracle, &mut out)?;
        Ok((attempt, out))
    }

    /// Attempt a decision on one instance; repeated attempts are idempotent
    pub fn decide(
        &mut self,
        policy: &PolicyId,
        oracle: &dyn ConditionOracle,
    ) -> GovernanceResult<(DecisionAttempt, Vec<Directive>)> {
        let mut out = Vec::new();
        let forest = Arc::clone(&self.forest);
        let attempt = self.decide_instance(&forest, policy, oracle, &mut out)?;
        Ok((attempt, out))
    }

    pub fn reassign_leader(&mut self, leader: IndividualId) {
        tracing::info!(
            collaboration_id = %self.collaboration.id,
            leader = %leader,
            "Leader reassigned"
        );
        self.record_for(&leader);
        self.collaboration.reassign_leader(leader);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn collaboration(&self) -> &Collaboration {
        &self.collaboration
    }

    pub fn forest(&self) -> &Arc<PolicyForest> {
        &self.forest
    }

    pub fn outcome(&self) -> CollaborationOutcome {
        let Some(root) = &self.collaboration.governing_policy else {
            return CollaborationOutcome::Ungoverned;
        };
        if let Some(decision) = self
            .collaboration
            .decision
            .as_ref()
            .and_then(|id| self.decision(id))
        {
            return CollaborationOutcome::Decided {
                accepted: decision.accepted,
            };
        }
        if self.collaboration.skipped.contains(root) {
            CollaborationOutcome::Stalled
        } else {
            CollaborationOutcome::Pending
        }
    }

    pub fn decision(&self, id: &DecisionId) -> Option<&Decision> {
        self.decision_index.get(id).map(|&i| &self.decisions[i])
    }

    /// Decisions in the order they were reached
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn decision_for(&self, policy: &PolicyId) -> Option<&Decision> {
        self.collaboration
            .ballot_box(policy)
            .and_then(BallotBox::decision)
            .and_then(|id| self.decision(id))
    }

    pub fn vote_by_id(&self, id: &VoteId) -> Option<&Vote> {
        self.votes.get(id)
    }

    /// Live votes of an instance, in first-cast order
    pub fn ballot(&self, policy: &PolicyId) -> Vec<&Vote> {
        self.collaboration
            .ballot_box(policy)
            .map(|b| b.votes.iter().filter_map(|v| self.votes.get(v)).collect())
            .unwrap_or_default()
    }

    /// Individuals whose votes a decision was computed from
    pub fn voters(&self, decision: &DecisionId) -> Vec<&IndividualId> {
        let mut voters: Vec<&IndividualId> = self
            .decision(decision)
            .map(|d| {
                d.votes
                    .iter()
                    .filter_map(|v| self.votes.get(v))
                    .map(|v| &v.voter)
                    .collect()
            })
            .unwrap_or_default();
        voters.sort();
        voters.dedup();
        voters
    }

    pub fn individual(&self, id: &IndividualId) -> Option<&IndividualRecord> {
        self.individuals.get(id)
    }

    /// Platform facts the governing policy tree needs answered
    pub fn external_queries(&self) -> BTreeSet<ExternalQuery> {
        match &self.collaboration.governing_policy {
            Some(root) => conditions::external_queries(
                &self.forest,
                root,
                self.collaboration.scope.element_reference(),
            ),
            None => BTreeSet::new(),
        }
    }

    /// Platform facts needed to open a collaboration with this scope
    pub fn queries_for_scope(forest: &PolicyForest, scope: &Scope) -> BTreeSet<ExternalQuery> {
        match scope_matcher::find_policy_for(forest, scope) {
            Some(root) => conditions::external_queries(forest, &root.id, scope.element_reference()),
            None => BTreeSet::new(),
        }
    }

    // ── Composition ──────────────────────────────────────────────────

    /// Open `id` (expanded into its starting instances)
    fn open(
        &mut self,
        forest: &PolicyForest,
        id: &PolicyId,
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<()> {
        let element = self.element();
        let plan = composition::find_starting_policies(forest, id, &mut |policy| {
            policy.rules().map_or(true, |rules| {
                conditions::pre_conditions_hold(forest, rules, element.as_deref(), oracle)
            })
        })?;
        for skipped in &plan.skipped {
            tracing::info!(
                collaboration_id = %self.collaboration.id,
                policy = %skipped,
                "PRE conditions failed; policy skipped"
            );
        }
        self.collaboration.skipped.extend(plan.skipped);

        let ready = self.start_policies(forest, &plan.open, oracle, out)?;
        for id in ready {
            self.decide_instance(forest, &id, oracle, out)?;
        }
        Ok(())
    }

    /// Open ballot boxes; returns leaves decidable after carry-over
    fn start_policies(
        &mut self,
        forest: &PolicyForest,
        ids: &[PolicyId],
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<Vec<PolicyId>> {
        let now = Utc::now();
        let mut ready = Vec::new();
        for id in ids {
            if self.collaboration.ballot_boxes.contains_key(id) {
                continue;
            }
            let policy = forest.policy(id)?;
            let deadline = policy.rules().and_then(|rules| {
                self.settings
                    .deadline_override
                    .map(|offset| now + offset)
                    .or_else(|| rules.deadline.as_ref().map(|d| d.due_at(now)))
            });
            self.collaboration.ballot_boxes.insert(
                id.clone(),
                BallotBox::open(id.clone(), now).with_deadline(deadline),
            );
            tracing::debug!(
                collaboration_id = %self.collaboration.id,
                policy = %id,
                kind = policy.kind.name(),
                "Policy instance opened"
            );
            if let Some(at) = deadline {
                out.push(Directive::ScheduleDeadline {
                    collaboration_id: self.collaboration.id.clone(),
                    policy: id.clone(),
                    at,
                });
            }
            if policy.rules().is_some()
                && self.carry_over_into(forest, id)?
                && self.is_decidable(forest, id, oracle)
            {
                ready.push(id.clone());
            }
        }
        Ok(ready)
    }

    /// Copy eligible votes from the preceding phase; true if any carried
    fn carry_over_into(&mut self, forest: &PolicyForest, leaf: &PolicyId) -> GovernanceResult<bool> {
        let Some(source) = composition::carry_over_source(forest, leaf, |p| self.phase_state(p))
        else {
            return Ok(false);
        };
        let Some(rules) = forest.policy(leaf)?.rules() else {
            return Ok(false);
        };
        let excluded = conditions::excluded_individuals(forest, rules);

        // Latest vote per individual in the source phase
        let mut latest: BTreeMap<IndividualId, Vote> = BTreeMap::new();
        for vote in self.votes_of_instance(forest, &source) {
            let newer = latest
                .get(&vote.voter)
                .map_or(true, |seen| vote.timestamp > seen.timestamp);
            if newer {
                latest.insert(vote.voter.clone(), vote.clone());
            }
        }

        let mut carried = 0;
        for (voter, source_vote) in latest {
            if excluded.contains(&voter) {
                continue;
            }
            let Some(eligibility) = ballot::eligibility(forest, rules, &voter) else {
                continue;
            };
            let vote = Vote::new(
                self.collaboration.id.clone(),
                leaf.clone(),
                voter.clone(),
                source_vote.agreement,
                eligibility.weight,
            )
            .with_rationale(source_vote.rationale.clone())
            .carried_from(source_vote.id.clone());
            self.insert_vote(leaf, vote, &eligibility);
            carried += 1;
        }
        if carried > 0 {
            tracing::debug!(
                collaboration_id = %self.collaboration.id,
                from = %source,
                to = %leaf,
                carried,
                "Votes carried over"
            );
        }
        Ok(carried > 0)
    }

    /// Votes an instance's outcome rests on
    fn votes_of_instance(&self, forest: &PolicyForest, id: &PolicyId) -> Vec<&Vote> {
        let ids: Vec<&VoteId> = match self.decision_for(id) {
            Some(decision) => decision.votes.iter().collect(),
            None => self
                .collaboration
                .ballot_box(id)
                .map(|b| b.votes.iter().collect())
                .unwrap_or_default(),
        };
        let mut votes: Vec<&Vote> = ids.into_iter().filter_map(|v| self.votes.get(v)).collect();
        if votes.is_empty() && forest.get(id).is_some_and(Policy::is_composed) {
            votes = forest
                .descendants(id)
                .iter()
                .flat_map(|d| self.ballot(d))
                .collect();
        }
        votes
    }

    fn decide_instance(
        &mut self,
        forest: &PolicyForest,
        id: &PolicyId,
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<DecisionAttempt> {
        if !self.collaboration.is_open(id) {
            return Ok(self.attempt_for(id));
        }
        let policy = forest.policy(id)?;

        match &policy.kind {
            PolicyKind::Composed(composition) => {
                let verdict =
                    composition::compose_decision(composition, None, |p| self.phase_state(p));
                return match verdict {
                    ComposedVerdict::Decided(accepted) => {
                        let decision = self.record_decision(forest, id, accepted, out)?;
                        self.propagate(forest, id, accepted, oracle, out)?;
                        Ok(DecisionAttempt::Decided { decision, accepted })
                    }
                    ComposedVerdict::Pending | ComposedVerdict::Exhausted => {
                        Ok(DecisionAttempt::Pending)
                    }
                };
            }
            PolicyKind::LeaderDriven { default, .. }
                if self.collaboration.ballot_boxes.contains_key(default) =>
            {
                // The open fallback decides for the leader
                let attempt = self.decide_instance(forest, default, oracle, out)?;
                return Ok(match self.attempt_for(id) {
                    DecisionAttempt::NotOpen => attempt,
                    DecisionAttempt::Pending | DecisionAttempt::FallbackOpened { .. } => {
                        DecisionAttempt::Pending
                    }
                    decided => decided,
                });
            }
            _ => {}
        }

        let evaluation = match self.view(forest, policy) {
            Some(view) => evaluator::evaluate(&view, oracle),
            None => Evaluation::Pending,
        };

        match evaluation {
            Evaluation::Pending => Ok(DecisionAttempt::Pending),
            Evaluation::OpenDefault(default) => {
                let opened = self.collaboration.ballot_boxes.contains_key(&default)
                    || self.collaboration.skipped.contains(&default);
                if !opened {
                    tracing::info!(
                        collaboration_id = %self.collaboration.id,
                        policy = %id,
                        default = %default,
                        "Leader has not voted; opening default policy"
                    );
                    self.open(forest, &default, oracle, out)?;
                }
                if self.collaboration.skipped.contains(&default) {
                    // Without its leader and without a fallback nothing can decide
                    self.stall(forest, id, oracle, out)?;
                    return Ok(DecisionAttempt::NotOpen);
                }
                Ok(DecisionAttempt::FallbackOpened { default })
            }
            Evaluation::Decided(accepted) => {
                let decision = self.record_decision(forest, id, accepted, out)?;
                self.propagate(forest, id, accepted, oracle, out)?;
                Ok(DecisionAttempt::Decided { decision, accepted })
            }
        }
    }

    /// Push a decision up through leader-driven and composed ancestors
    fn propagate(
        &mut self,
        forest: &PolicyForest,
        decided: &PolicyId,
        accepted: bool,
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<()> {
        let mut child = decided.clone();
        let mut accepted = accepted;
        while let Some(parent_id) = forest.policy(&child)?.parent.clone() {
            if !self.collaboration.is_open(&parent_id) {
                break;
            }
            let parent = forest.policy(&parent_id)?;
            match &parent.kind {
                PolicyKind::LeaderDriven { .. } => {
                    self.record_decision(forest, &parent_id, accepted, out)?;
                }
                PolicyKind::Composed(composition) => {
                    let known = (accepted != composition.require_all).then_some(accepted);
                    let verdict =
                        composition::compose_decision(composition, known, |p| self.phase_state(p));
                    match verdict {
                        ComposedVerdict::Decided(result) => {
                            accepted = result;
                            self.record_decision(forest, &parent_id, result, out)?;
                        }
                        ComposedVerdict::Pending | ComposedVerdict::Exhausted => {
                            return self.advance(forest, &parent_id, oracle, out);
                        }
                    }
                }
                _ => break,
            }
            child = parent_id;
        }
        Ok(())
    }

    /// Open the next phase of an unresolved sequential composition
    fn advance(
        &mut self,
        forest: &PolicyForest,
        composed: &PolicyId,
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<()> {
        let Some(composition) = forest.policy(composed)?.composition() else {
            return Ok(());
        };
        while let Some(next) = composition::find_policies_in(composition, |p| self.phase_state(p)) {
            tracing::debug!(
                collaboration_id = %self.collaboration.id,
                policy = %composed,
                phase = %next,
                "Opening next phase"
            );
            self.open(forest, &next, oracle, out)?;
            if self.collaboration.ballot_boxes.contains_key(&next) {
                return Ok(());
            }
            // The phase was skipped; the composition may be settled now
            if let ComposedVerdict::Decided(accepted) =
                composition::compose_decision(composition, None, |p| self.phase_state(p))
            {
                if self.collaboration.is_open(composed) {
                    self.record_decision(forest, composed, accepted, out)?;
                    self.propagate(forest, composed, accepted, oracle, out)?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    /// Close an instance that can no longer be decided
    ///
    /// The instance counts as skipped: a composed parent moves past it,
    /// a leader-driven parent waiting on it stalls too, and a stalled
    /// root leaves the collaboration `Stalled`.
    fn stall(
        &mut self,
        forest: &PolicyForest,
        id: &PolicyId,
        oracle: &dyn ConditionOracle,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<()> {
        tracing::warn!(
            collaboration_id = %self.collaboration.id,
            policy = %id,
            "No applicable fallback; policy stalled"
        );
        if let Some(bbox) = self.collaboration.ballot_boxes.get_mut(id) {
            bbox.state = InstanceState::Superseded;
        }
        self.collaboration.skipped.insert(id.clone());

        let Some(parent_id) = forest.policy(id)?.parent.clone() else {
            return Ok(());
        };
        if !self.collaboration.is_open(&parent_id) {
            return Ok(());
        }
        match &forest.policy(&parent_id)?.kind {
            PolicyKind::LeaderDriven { .. } => self.stall(forest, &parent_id, oracle, out),
            PolicyKind::Composed(composition) => {
                self.advance(forest, &parent_id, oracle, out)?;
                if !self.collaboration.is_open(&parent_id) {
                    return Ok(());
                }
                match composition::compose_decision(composition, None, |p| self.phase_state(p)) {
                    ComposedVerdict::Decided(accepted) => {
                        self.record_decision(forest, &parent_id, accepted, out)?;
                        self.propagate(forest, &parent_id, accepted, oracle, out)
                    }
                    ComposedVerdict::Exhausted => self.stall(forest, &parent_id, oracle, out),
                    ComposedVerdict::Pending => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn record_decision(
        &mut self,
        forest: &PolicyForest,
        id: &PolicyId,
        accepted: bool,
        out: &mut Vec<Directive>,
    ) -> GovernanceResult<DecisionId> {
        let policy = forest.policy(id)?;

        let mut vote_ids: Vec<VoteId> = self
            .collaboration
            .ballot_box(id)
            .map(|b| b.votes.clone())
            .unwrap_or_default();
        for child in policy.children() {
            if let Some(decision) = self.decision_for(child) {
                vote_ids.extend(decision.votes.iter().cloned());
            }
        }

        let decision = Decision::new(self.collaboration.id.clone(), id.clone(), accepted, vote_ids);
        let decision_id = decision.id.clone();
        for vote_id in &decision.votes {
            if let Some(vote) = self.votes.get_mut(vote_id) {
                if vote.part_of.is_none() {
                    vote.part_of = Some(decision_id.clone());
                }
            }
        }
        if let Some(bbox) = self.collaboration.ballot_boxes.get_mut(id) {
            bbox.state = InstanceState::Decided(decision_id.clone());
        }
        self.decision_index
            .insert(decision_id.clone(), self.decisions.len());
        self.decisions.push(decision);

        tracing::info!(
            collaboration_id = %self.collaboration.id,
            policy = %id,
            accepted,
            "Decision reached"
        );

        let element = self.element();
        if accepted {
            self.collaboration.status.advance(ScopeStatus::Partial);
            if let (Some(rules), Some(element)) = (policy.rules(), &element) {
                for label in conditions::post_labels(rules) {
                    out.push(Directive::SetLabel {
                        collaboration_id: self.collaboration.id.clone(),
                        element: element.clone(),
                        label,
                    });
                }
            }
        }

        for descendant in forest.descendants(id) {
            if let Some(bbox) = self.collaboration.ballot_boxes.get_mut(&descendant) {
                if bbox.is_open() {
                    bbox.state = InstanceState::Superseded;
                    tracing::debug!(
                        collaboration_id = %self.collaboration.id,
                        policy = %descendant,
                        "Policy instance superseded"
                    );
                }
            }
        }

        let root = policy.is_root();
        out.push(Directive::DecisionReached {
            collaboration_id: self.collaboration.id.clone(),
            policy: id.clone(),
            accepted,
            root,
        });

        if root {
            self.collaboration.decision = Some(decision_id.clone());
            self.collaboration.status.advance(ScopeStatus::Completed);
            tracing::info!(
                collaboration_id = %self.collaboration.id,
                accepted,
                "Collaboration completed"
            );
            if accepted && self.collaboration.scope.requests_merge() {
                if let Some(element) = element {
                    out.push(Directive::Merge {
                        collaboration_id: self.collaboration.id.clone(),
                        element,
                    });
                }
            }
        }

        Ok(decision_id)
    }

    // ── Ballot boxes ─────────────────────────────────────────────────

    fn upsert_vote(
        &mut self,
        policy: &PolicyId,
        individual: &IndividualId,
        agreement: bool,
        rationale: Option<String>,
        eligibility: Eligibility,
    ) {
        let existing = self.collaboration.ballot_box(policy).and_then(|b| {
            b.votes
                .iter()
                .find(|v| self.votes.get(*v).is_some_and(|vote| &vote.voter == individual))
                .cloned()
        });

        match existing.and_then(|id| self.votes.get_mut(&id)) {
            Some(vote) => {
                vote.agreement = agreement;
                vote.value = eligibility.weight;
                vote.rationale = rationale;
                vote.timestamp = Utc::now();
                tracing::debug!(
                    collaboration_id = %self.collaboration.id,
                    policy = %policy,
                    individual = %individual,
                    agreement,
                    "Vote updated"
                );
            }
            None => {
                let vote = Vote::new(
                    self.collaboration.id.clone(),
                    policy.clone(),
                    individual.clone(),
                    agreement,
                    eligibility.weight,
                )
                .with_rationale(rationale);
                tracing::debug!(
                    collaboration_id = %self.collaboration.id,
                    policy = %policy,
                    individual = %individual,
                    agreement,
                    weight = eligibility.weight,
                    "Vote recorded"
                );
                self.insert_vote(policy, vote, &eligibility);
            }
        }
    }

    /// Insert a vote with its role attribution in one step
    fn insert_vote(&mut self, policy: &PolicyId, vote: Vote, eligibility: &Eligibility) {
        let scope = self.collaboration.scope.clone();
        let record = self
            .individuals
            .entry(vote.voter.clone())
            .or_insert_with(|| IndividualRecord::new(vote.voter.clone()));
        record.votes.insert(vote.id.clone());
        for role in &eligibility.roles {
            record.enact(role.clone(), &scope);
        }
        if let Some(bbox) = self.collaboration.ballot_boxes.get_mut(policy) {
            bbox.votes.push(vote.id.clone());
        }
        self.votes.insert(vote.id.clone(), vote);
    }

    fn is_decidable(
        &self,
        forest: &PolicyForest,
        id: &PolicyId,
        oracle: &dyn ConditionOracle,
    ) -> bool {
        let Some(policy) = forest.get(id) else {
            return false;
        };
        match &policy.kind {
            PolicyKind::Composed(composition) => matches!(
                composition::compose_decision(composition, None, |p| self.phase_state(p)),
                ComposedVerdict::Decided(_)
            ),
            PolicyKind::LeaderDriven { default, .. }
                if self.collaboration.ballot_boxes.contains_key(default) =>
            {
                match self.phase_state(default) {
                    PhaseState::Decided(_) => true,
                    PhaseState::Open => self.is_decidable(forest, default, oracle),
                    _ => false,
                }
            }
            _ => {
                self.view(forest, policy)
                    .is_some_and(|view| evaluator::is_decidable(&view, oracle))
            }
        }
    }

    fn view<'a>(&'a self, forest: &'a PolicyForest, policy: &'a Policy) -> Option<BallotView<'a>> {
        let rules = policy.rules()?;
        let bbox = self.collaboration.ballot_box(&policy.id)?;
        let excluded = conditions::excluded_individuals(forest, rules);
        let mut eligible = ballot::eligible_weights(forest, rules);
        eligible.retain(|individual, _| !excluded.contains(individual));
        Some(BallotView {
            forest,
            kind: &policy.kind,
            rules,
            votes: bbox.votes.iter().filter_map(|v| self.votes.get(v)).collect(),
            eligible,
            leader: &self.collaboration.leader,
            element: self.collaboration.scope.element_reference(),
            has_deadline: bbox.deadline.is_some(),
        })
    }

    fn phase_state(&self, id: &PolicyId) -> PhaseState {
        if self.collaboration.skipped.contains(id) {
            return PhaseState::Skipped;
        }
        match self.collaboration.ballot_box(id).map(|b| &b.state) {
            None => PhaseState::NotStarted,
            Some(InstanceState::Open) => PhaseState::Open,
            Some(InstanceState::Superseded) => PhaseState::Superseded,
            Some(InstanceState::Decided(decision)) => self
                .decision(decision)
                .map(|d| PhaseState::Decided(d.accepted))
                .unwrap_or(PhaseState::Superseded),
        }
    }

    fn attempt_for(&self, id: &PolicyId) -> DecisionAttempt {
        match self.decision_for(id) {
            Some(decision) => DecisionAttempt::Decided {
                decision: decision.id.clone(),
                accepted: decision.accepted,
            },
            None if self.collaboration.is_open(id) => DecisionAttempt::Pending,
            None => DecisionAttempt::NotOpen,
        }
    }

    fn record_for(&mut self, individual: &IndividualId) {
        self.individuals
            .entry(individual.clone())
            .or_insert_with(|| IndividualRecord::new(individual.clone()));
    }

    fn element(&self) -> Option<String> {
        self.collaboration
            .scope
            .element_reference()
            .map(str::to_string)
    }
}
