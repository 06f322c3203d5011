//! End-to-end collaboration flows through the governance engine

use governance_engine::{
    DecisionAttempt, EngineSettings, ExternalFacts, GovernanceEngine, VoteReceipt,
};
use governance_types::{
    Activity, CollaborationId, CollaborationOutcome, Composition, Condition, Deadline, Directive,
    Element, ElementKind, EvaluationMode, ExternalQuery, GovernanceEvent, IndividualId,
    Participant, Patch, PatchAction, Policy, PolicyForest, PolicyId, PolicyKind, Project, Role,
    Scope, ScopeStatus, VotingRules,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn project() -> Project {
    Project::new("core").with_repository("acme/core")
}

fn maintainers() -> Role {
    Role::new("maintainers")
        .with_member("alice")
        .with_member("bob")
        .with_member("carol")
}

fn rules() -> VotingRules {
    VotingRules::new().with_participant(Participant::role("maintainers"))
}

fn engine(policies: Vec<Policy>) -> GovernanceEngine {
    let mut builder = PolicyForest::builder().role(maintainers());
    for policy in policies {
        builder = builder.policy(policy);
    }
    GovernanceEngine::new(builder.build().unwrap())
}

fn who(id: &str) -> IndividualId {
    IndividualId::new(id)
}

fn pid(id: &str) -> PolicyId {
    PolicyId::new(id)
}

fn propose(engine: &mut GovernanceEngine, scope: Scope, creator: &str) -> CollaborationId {
    let id = CollaborationId::generate();
    engine
        .propose(id.clone(), scope, who(creator), None, &ExternalFacts::new())
        .unwrap();
    id
}

fn vote(engine: &mut GovernanceEngine, id: &CollaborationId, voter: &str, agreement: bool) {
    engine
        .vote(id, &who(voter), agreement, None, &ExternalFacts::new())
        .unwrap();
}

fn pr_policy_scope() -> Patch {
    Patch::new(
        "merge",
        Activity::new("pull-requests", project()),
        PatchAction::Merge,
        Element::new(ElementKind::PullRequest),
    )
}

fn pr_scope(reference: &str) -> Scope {
    Patch::new(
        "merge",
        Activity::new("pull-requests", project()),
        PatchAction::Merge,
        Element::pull_request(reference),
    )
    .into()
}

// ── Single policies ─────────────────────────────────────────────────

#[test]
fn test_majority_with_deadline_waits_until_outcome_is_certain() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_deadline(Deadline::Offset { seconds: 3600 }),
    )]);
    let id = CollaborationId::new("acme/core#1");
    let (outcome, directives) = engine
        .propose(
            id.clone(),
            project().into(),
            who("alice"),
            Some("Adopt the new release process".into()),
            &ExternalFacts::new(),
        )
        .unwrap();
    assert_eq!(outcome, CollaborationOutcome::Pending);
    assert!(matches!(
        directives.as_slice(),
        [Directive::ScheduleDeadline { policy, .. }] if policy == &pid("review")
    ));

    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", false);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    let (receipt, directives) = engine
        .vote(&id, &who("carol"), true, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(
        receipt,
        VoteReceipt::Recorded {
            policies: vec![pid("review")],
            decidable: vec![pid("review")],
        }
    );
    assert!(directives.iter().any(|d| matches!(
        d,
        Directive::DecisionReached { accepted: true, root: true, .. }
    )));

    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    let decision = engine.decision_for(&id, &pid("review")).unwrap();
    assert_eq!(decision.votes.len(), 3);
    assert_eq!(
        engine.voters(&id, &pid("review")),
        vec![who("alice"), who("bob"), who("carol")]
    );
    let state = engine.collaboration(&id).unwrap();
    assert_eq!(state.collaboration().status, ScopeStatus::Completed);
    assert!(state
        .ballot(&pid("review"))
        .iter()
        .all(|v| v.part_of.as_ref() == Some(&decision.id)));
}

#[test]
fn test_without_deadline_current_votes_decide() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_deadline_decides_a_tie_as_rejected() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_deadline(Deadline::Offset { seconds: 60 }),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", false);

    let (attempt, _) = engine
        .deadline_elapsed(&id, &pid("review"), &ExternalFacts::new())
        .unwrap();
    assert!(matches!(attempt, DecisionAttempt::Decided { accepted: false, .. }));
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
}

#[test]
fn test_deadline_on_empty_ballot_stays_pending() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_deadline(Deadline::Offset { seconds: 60 }),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    let (attempt, directives) = engine
        .deadline_elapsed(&id, &pid("review"), &ExternalFacts::new())
        .unwrap();
    assert_eq!(attempt, DecisionAttempt::Pending);
    assert!(directives.is_empty());

    // Once elapsed, the next vote decides at once
    vote(&mut engine, &id, "bob", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_veto_rejects_and_blocks_early_acceptance() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules()
            .with_deadline(Deadline::Offset { seconds: 3600 })
            .with_condition(Condition::veto_right(vec![Participant::individual("carol")])),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);
    // 2 of 3 in favour is certain, but the vetoer has not spoken yet
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    vote(&mut engine, &id, "carol", false);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
}

#[test]
fn test_silent_vetoer_leaves_majority_to_decide_at_deadline() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules()
            .with_deadline(Deadline::Offset { seconds: 3600 })
            .with_condition(Condition::veto_right(vec![Participant::individual("carol")])),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    vote(&mut engine, &id, "bob", true);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    let (attempt, _) = engine
        .deadline_elapsed(&id, &pid("review"), &ExternalFacts::new())
        .unwrap();
    assert!(matches!(attempt, DecisionAttempt::Decided { accepted: true, .. }));
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    assert_eq!(
        engine.voters(&id, &pid("review")),
        vec![who("alice"), who("bob")]
    );
}

#[test]
fn test_lazy_consensus_without_deadline_waits_on_dissent() {
    let mut engine = GovernanceEngine::new(
        PolicyForest::builder()
            .role(maintainers().with_member("dave"))
            .policy(Policy::new(
                "lazy",
                project(),
                PolicyKind::LazyConsensus(rules()),
            ))
            .build()
            .unwrap(),
    );
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", false);
    // Silence is not consent while the ballot is still open
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    vote(&mut engine, &id, "bob", true);
    vote(&mut engine, &id, "carol", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_lazy_consensus_unanimous_dissent_rejects() {
    let mut engine = GovernanceEngine::new(
        PolicyForest::builder()
            .role(maintainers().with_member("dave"))
            .policy(Policy::new(
                "lazy",
                project(),
                PolicyKind::LazyConsensus(rules()),
            ))
            .build()
            .unwrap(),
    );
    let id = propose(&mut engine, project().into(), "alice");
    for voter in ["alice", "bob", "carol", "dave"] {
        vote(&mut engine, &id, voter, false);
    }
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
}

#[test]
fn test_minimum_participants_fails_at_deadline() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules()
            .with_deadline(Deadline::Offset { seconds: 3600 })
            .with_condition(Condition::minimum_participants(2)),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    let (attempt, _) = engine
        .deadline_elapsed(&id, &pid("review"), &ExternalFacts::new())
        .unwrap();
    assert!(matches!(attempt, DecisionAttempt::Decided { accepted: false, .. }));
}

#[test]
fn test_excluded_participant_cannot_vote() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_condition(Condition::participant_exclusion(vec![
            Participant::individual("carol"),
        ])),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    let (receipt, _) = engine
        .vote(&id, &who("carol"), false, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(receipt, VoteReceipt::Ineligible);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    // The vote never reaches the box, so nothing needs retracting later
    let state = engine.collaboration(&id).unwrap();
    assert!(state.ballot(&pid("review")).is_empty());
    assert!(state.individual(&who("carol")).unwrap().votes.is_empty());

    vote(&mut engine, &id, "alice", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    assert_eq!(engine.voters(&id, &pid("review")), vec![who("alice")]);
}

#[test]
fn test_outsider_vote_is_ignored_but_registered() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())]);
    let id = propose(&mut engine, project().into(), "alice");
    let (receipt, _) = engine
        .vote(&id, &who("mallory"), true, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(receipt, VoteReceipt::Ineligible);
    assert!(engine.individual(&who("mallory")).is_some());
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));
}

#[test]
fn test_repeated_decide_is_idempotent() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);
    let first = engine.decision_for(&id, &pid("review")).unwrap().id.clone();

    let (attempt, directives) = engine
        .decide(&id, &pid("review"), &ExternalFacts::new())
        .unwrap();
    assert_eq!(
        attempt,
        DecisionAttempt::Decided {
            decision: first,
            accepted: true
        }
    );
    assert!(directives.is_empty());
    assert_eq!(engine.decisions(&id).len(), 1);

    let (receipt, _) = engine
        .vote(&id, &who("bob"), false, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(receipt, VoteReceipt::Closed);
}

#[test]
fn test_changed_vote_replaces_earlier_one() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_deadline(Deadline::Offset { seconds: 3600 }),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", false);
    vote(&mut engine, &id, "alice", true);
    let state = engine.collaboration(&id).unwrap();
    let ballot = state.ballot(&pid("review"));
    assert_eq!(ballot.len(), 1);
    assert!(ballot[0].agreement);
}

// ── Scope selection ─────────────────────────────────────────────────

#[test]
fn test_ungoverned_scope() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())]);
    let id = propose(
        &mut engine,
        Project::new("other").with_repository("acme/other").into(),
        "alice",
    );
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Ungoverned));
    let (receipt, _) = engine
        .vote(&id, &who("alice"), true, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(receipt, VoteReceipt::Closed);
}

#[test]
fn test_pre_condition_failure_stalls() {
    let mut engine = engine(vec![Policy::majority(
        "merge",
        pr_policy_scope(),
        rules().with_condition(Condition::check_status().with_mode(EvaluationMode::Pre)),
    )]);
    let id = CollaborationId::new("acme/core#9");
    let facts = ExternalFacts::new().with(
        ExternalQuery::Status {
            element: "acme/core#9".into(),
        },
        false,
    );
    let (outcome, _) = engine
        .propose(id.clone(), pr_scope("acme/core#9"), who("alice"), None, &facts)
        .unwrap();
    assert_eq!(outcome, CollaborationOutcome::Stalled);
}

// ── Platform actions ────────────────────────────────────────────────

#[test]
fn test_accepted_merge_patch_emits_labels_and_merge() {
    let mut engine = engine(vec![Policy::majority(
        "merge",
        pr_policy_scope(),
        rules()
            .with_condition(Condition::check_status())
            .with_condition(Condition::labels(["approved"], true).with_mode(EvaluationMode::Post)),
    )]);
    let scope = pr_scope("acme/core#7");
    let id = CollaborationId::new("acme/core#7");
    let event = GovernanceEvent::CollaborationProposed {
        id: id.clone(),
        scope: scope.clone(),
        creator: who("alice"),
        rationale: None,
    };
    let status = ExternalQuery::Status {
        element: "acme/core#7".into(),
    };
    assert_eq!(
        engine.external_queries(&event).into_iter().collect::<Vec<_>>(),
        vec![status.clone()]
    );

    // Status unknown: the instance cannot decide
    engine.handle(event, &ExternalFacts::new()).unwrap();
    vote(&mut engine, &id, "alice", true);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    let facts = ExternalFacts::new().with(status, true);
    let (_, directives) = engine
        .decide(&id, &pid("merge"), &facts)
        .unwrap();
    assert!(directives.contains(&Directive::SetLabel {
        collaboration_id: id.clone(),
        element: "acme/core#7".into(),
        label: "approved".into(),
    }));
    assert_eq!(
        directives.last(),
        Some(&Directive::Merge {
            collaboration_id: id.clone(),
            element: "acme/core#7".into(),
        })
    );
}

#[test]
fn test_rejected_patch_is_not_merged() {
    let mut engine = engine(vec![Policy::majority("merge", pr_policy_scope(), rules())]);
    let id = CollaborationId::new("acme/core#8");
    engine
        .propose(id.clone(), pr_scope("acme/core#8"), who("alice"), None, &ExternalFacts::new())
        .unwrap();
    let (_, directives) = engine
        .vote(&id, &who("alice"), false, None, &ExternalFacts::new())
        .unwrap();
    // One "no" among three is not yet a certain rejection
    assert!(directives.is_empty());
    let (_, directives) = engine
        .vote(&id, &who("bob"), false, None, &ExternalFacts::new())
        .unwrap();
    assert!(!directives.iter().any(|d| matches!(d, Directive::Merge { .. })));
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
}

// ── Compositions ────────────────────────────────────────────────────

#[test]
fn test_sequential_rejection_short_circuits() {
    let mut engine = engine(vec![
        Policy::composed(
            "root",
            project(),
            Composition::sequential(vec![pid("first"), pid("second")]),
        ),
        Policy::majority("first", project(), rules()),
        Policy::majority("second", project(), rules()),
    ]);
    let id = propose(&mut engine, project().into(), "alice");
    assert!(engine.collaboration(&id).unwrap().collaboration().is_open(&pid("first")));

    vote(&mut engine, &id, "alice", false);
    vote(&mut engine, &id, "bob", false);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
    let state = engine.collaboration(&id).unwrap();
    assert!(state.collaboration().ballot_box(&pid("second")).is_none());
    assert_eq!(state.decisions().len(), 2);
}

#[test]
fn test_sequential_acceptance_opens_next_phase() {
    let mut engine = engine(vec![
        Policy::composed(
            "root",
            project(),
            Composition::sequential(vec![pid("first"), pid("second")]),
        ),
        Policy::majority("first", project(), rules()),
        Policy::majority("second", project(), rules()),
    ]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);

    let state = engine.collaboration(&id).unwrap();
    assert!(state.collaboration().is_open(&pid("second")));
    assert_eq!(state.collaboration().status, ScopeStatus::Partial);
    // No carry-over: the second phase starts empty
    assert!(state.ballot(&pid("second")).is_empty());

    vote(&mut engine, &id, "bob", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    assert_eq!(
        engine.voters(&id, &pid("root")),
        vec![who("alice"), who("bob")]
    );
}

#[test]
fn test_carry_over_reweights_votes_for_next_phase() {
    let forest = PolicyForest::builder()
        .role(Role::new("reviewers").with_member("alice").with_member("bob"))
        .role(
            Role::new("leads")
                .with_vote_weight(3.0)
                .with_member("alice")
                .with_member("carol"),
        )
        .policy(Policy::composed(
            "root",
            project(),
            Composition::sequential(vec![pid("review"), pid("approve")]).with_carry_over(true),
        ))
        .policy(Policy::majority(
            "review",
            project(),
            VotingRules::new().with_participant(Participant::role("reviewers")),
        ))
        .policy(Policy::majority(
            "approve",
            project(),
            VotingRules::new()
                .with_participant(Participant::role("leads"))
                .with_deadline(Deadline::Offset { seconds: 3600 }),
        ))
        .build()
        .unwrap();
    let mut engine = GovernanceEngine::new(forest);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", true);

    let state = engine.collaboration(&id).unwrap();
    let carried = state.ballot(&pid("approve"));
    assert_eq!(carried.len(), 1);
    assert_eq!(carried[0].voter, who("alice"));
    assert_eq!(carried[0].value, 3.0);
    assert!(carried[0].carried_from.is_some());
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    vote(&mut engine, &id, "carol", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_parallel_any_acceptance_decides_composition() {
    let mut engine = engine(vec![
        Policy::composed(
            "root",
            project(),
            Composition::parallel(vec![pid("left"), pid("right")]).with_require_all(false),
        ),
        Policy::majority("left", project(), rules()),
        Policy::majority(
            "right",
            project(),
            rules().with_deadline(Deadline::Offset { seconds: 3600 }),
        ),
    ]);
    let id = propose(&mut engine, project().into(), "alice");
    let (receipt, _) = engine
        .vote(&id, &who("alice"), true, None, &ExternalFacts::new())
        .unwrap();
    assert!(matches!(receipt, VoteReceipt::Recorded { ref policies, .. } if policies.len() == 2));
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    let state = engine.collaboration(&id).unwrap();
    assert_eq!(
        state.collaboration().ballot_box(&pid("right")).map(|b| b.is_open()),
        Some(false)
    );
}

// ── Leader-driven ───────────────────────────────────────────────────

fn leader_engine() -> GovernanceEngine {
    engine(vec![
        Policy::new(
            "lead",
            project(),
            PolicyKind::LeaderDriven {
                rules: rules(),
                default: pid("fallback"),
            },
        ),
        Policy::majority("fallback", project(), rules()),
    ])
}

#[test]
fn test_leader_vote_decides() {
    let mut engine = leader_engine();
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "bob", true);
    // bob is not the leader: the fallback opened
    let state = engine.collaboration(&id).unwrap();
    assert!(state.collaboration().is_open(&pid("fallback")));

    let mut engine = leader_engine();
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "alice", false);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: false })
    );
}

#[test]
fn test_leader_fallback_decides_for_absent_leader() {
    let mut engine = leader_engine();
    let id = propose(&mut engine, project().into(), "dave");
    vote(&mut engine, &id, "bob", false);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    vote(&mut engine, &id, "carol", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
    assert_eq!(engine.voters(&id, &pid("fallback")), vec![who("carol")]);
}

#[test]
fn test_reassigned_leader_decides() {
    let mut engine = leader_engine();
    let id = propose(&mut engine, project().into(), "dave");
    engine.reassign_leader(&id, who("carol")).unwrap();
    vote(&mut engine, &id, "carol", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_leader_driven_stalls_when_fallback_cannot_open() {
    let mut engine = engine(vec![
        Policy::new(
            "lead",
            project(),
            PolicyKind::LeaderDriven {
                rules: rules(),
                default: pid("fallback"),
            },
        ),
        Policy::majority(
            "fallback",
            project(),
            rules().with_condition(Condition::check_status().with_mode(EvaluationMode::Pre)),
        ),
    ]);
    let id = propose(&mut engine, project().into(), "dave");
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Pending));

    // bob is not the leader and the fallback's status check cannot pass
    vote(&mut engine, &id, "bob", true);
    assert_eq!(engine.outcome(&id), Some(CollaborationOutcome::Stalled));
    let (attempt, _) = engine
        .decide(&id, &pid("lead"), &ExternalFacts::new())
        .unwrap();
    assert_eq!(attempt, DecisionAttempt::NotOpen);
    assert!(engine.decisions(&id).is_empty());

    let (receipt, _) = engine
        .vote(&id, &who("carol"), true, None, &ExternalFacts::new())
        .unwrap();
    assert_eq!(receipt, VoteReceipt::Closed);
}

// ── Engine-wide ─────────────────────────────────────────────────────

#[test]
fn test_reload_keeps_running_collaborations_on_their_forest() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())]);
    let id = propose(&mut engine, project().into(), "alice");

    engine.reload(PolicyForest::builder().role(maintainers()).build().unwrap());
    let fresh = propose(&mut engine, project().into(), "alice");
    assert_eq!(engine.outcome(&fresh), Some(CollaborationOutcome::Ungoverned));

    vote(&mut engine, &id, "alice", true);
    assert_eq!(
        engine.outcome(&id),
        Some(CollaborationOutcome::Decided { accepted: true })
    );
}

#[test]
fn test_deadline_override_applies_to_every_instance() {
    let mut engine = engine(vec![Policy::majority("review", project(), rules())])
        .with_settings(EngineSettings::default().with_deadline_override(chrono::Duration::zero()));
    let id = CollaborationId::new("acme/core#3");
    let (_, directives) = engine
        .propose(id, project().into(), who("alice"), None, &ExternalFacts::new())
        .unwrap();
    assert!(matches!(
        directives.as_slice(),
        [Directive::ScheduleDeadline { .. }]
    ));
}

#[test]
fn test_individual_records_enacted_roles() {
    let mut engine = engine(vec![Policy::majority(
        "review",
        project(),
        rules().with_deadline(Deadline::Offset { seconds: 3600 }),
    )]);
    let id = propose(&mut engine, project().into(), "alice");
    vote(&mut engine, &id, "bob", true);
    let state = engine.collaboration(&id).unwrap();
    let record = state.individual(&who("bob")).unwrap();
    assert_eq!(record.votes.len(), 1);
    assert!(record.enacts(&governance_types::RoleId::new("maintainers")));
}
