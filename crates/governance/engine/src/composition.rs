//! Composition engine: phase expansion, aggregation and carry-over
//!
//! Instance lifecycle: not started → open → decided (or superseded when
//! an ancestor decides first). Composed nodes are opened alongside their
//! leaves but never hold votes; they aggregate their phases' decisions.
//!
//! These functions are pure. The collaboration state feeds them the
//! current state of each phase and applies what they return.

use governance_types::{Composition, GovernanceResult, Policy, PolicyForest, PolicyId, PolicyKind};

/// Where one phase of a composition stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseState {
    NotStarted,
    /// PRE conditions failed; never opened
    Skipped,
    Open,
    Decided(bool),
    Superseded,
}

/// Instances to open now, composed nodes before their leaves
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartPlan {
    pub open: Vec<PolicyId>,
    pub skipped: Vec<PolicyId>,
}

/// Expand `id` into the instances that should open right now
///
/// Sequential compositions open their first phase whose PRE conditions
/// pass; parallel ones open every such phase. A composition with no
/// applicable phase is skipped itself.
pub fn find_starting_policies(
    forest: &PolicyForest,
    id: &PolicyId,
    pre_conditions: &mut dyn FnMut(&Policy) -> bool,
) -> GovernanceResult<StartPlan> {
    let mut plan = StartPlan::default();
    expand(forest, id, pre_conditions, &mut plan)?;
    Ok(plan)
}

fn expand(
    forest: &PolicyForest,
    id: &PolicyId,
    pre_conditions: &mut dyn FnMut(&Policy) -> bool,
    plan: &mut StartPlan,
) -> GovernanceResult<bool> {
    let policy = forest.policy(id)?;
    let Some(composition) = policy.composition() else {
        if pre_conditions(policy) {
            plan.open.push(id.clone());
            return Ok(true);
        }
        plan.skipped.push(id.clone());
        return Ok(false);
    };

    let mark = plan.open.len();
    plan.open.push(id.clone());
    let mut opened_any = false;
    for phase in &composition.phases {
        if expand(forest, phase, pre_conditions, plan)? {
            opened_any = true;
            if composition.sequential {
                break;
            }
        }
    }
    if !opened_any {
        plan.open.truncate(mark);
        plan.skipped.push(id.clone());
    }
    Ok(opened_any)
}

/// Next phase of a sequential composition to open, if none is running
pub fn find_policies_in(
    composition: &Composition,
    phase_state: impl Fn(&PolicyId) -> PhaseState,
) -> Option<PolicyId> {
    if !composition.sequential {
        // Parallel phases all start together
        return None;
    }
    if composition
        .phases
        .iter()
        .any(|p| phase_state(p) == PhaseState::Open)
    {
        return None;
    }
    composition
        .phases
        .iter()
        .find(|p| phase_state(p) == PhaseState::NotStarted)
        .cloned()
}

/// Aggregated state of a composition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposedVerdict {
    Decided(bool),
    Pending,
    /// Every phase was skipped
    Exhausted,
}

/// Aggregate phase decisions
///
/// A decided phase that disagrees with `require_all` settles the
/// composition at once. Otherwise the composition settles as
/// `require_all` once every non-skipped phase has decided.
pub fn compose_decision(
    composition: &Composition,
    known_result: Option<bool>,
    phase_state: impl Fn(&PolicyId) -> PhaseState,
) -> ComposedVerdict {
    if let Some(result) = known_result {
        return ComposedVerdict::Decided(result);
    }
    let mut finished = true;
    let mut any_decided = false;
    for phase in &composition.phases {
        match phase_state(phase) {
            PhaseState::Decided(accepted) => {
                if accepted != composition.require_all {
                    return ComposedVerdict::Decided(accepted);
                }
                any_decided = true;
            }
            PhaseState::Skipped => {}
            PhaseState::NotStarted | PhaseState::Open | PhaseState::Superseded => {
                finished = false
            }
        }
    }
    match (finished, any_decided) {
        (false, _) => ComposedVerdict::Pending,
        (true, true) => ComposedVerdict::Decided(composition.require_all),
        (true, false) => ComposedVerdict::Exhausted,
    }
}

/// Phase whose votes carry over into the newly opened leaf, if any
///
/// Walks up from the leaf while it is the first phase of a sequential
/// composition or a branch of a parallel one. Reaching a later phase of
/// a sequential composition with `carry_over` yields the nearest
/// preceding decided phase.
pub fn carry_over_source(
    forest: &PolicyForest,
    leaf: &PolicyId,
    phase_state: impl Fn(&PolicyId) -> PhaseState,
) -> Option<PolicyId> {
    let mut child = leaf;
    loop {
        let parent_id = forest.get(child)?.parent.as_ref()?;
        let parent = forest.get(parent_id)?;
        let PolicyKind::Composed(composition) = &parent.kind else {
            // Leader fallbacks start from an empty box
            return None;
        };
        if composition.sequential {
            let index = composition.phase_index(child)?;
            if index > 0 {
                if !composition.carry_over {
                    return None;
                }
                return composition.phases[..index]
                    .iter()
                    .rev()
                    .find(|p| matches!(phase_state(p), PhaseState::Decided(_)))
                    .cloned();
            }
        }
        child = parent_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governance_types::{Project, VotingRules};
    use std::collections::HashMap;

    fn id(s: &str) -> PolicyId {
        PolicyId::new(s)
    }

    fn leaf(name: &str) -> Policy {
        Policy::majority(name, Project::new("core"), VotingRules::new())
    }

    fn nested_forest(carry_over: bool) -> PolicyForest {
        PolicyForest::builder()
            .policy(Policy::composed(
                "root",
                Project::new("core"),
                Composition::sequential(vec![id("first"), id("second")]).with_carry_over(carry_over),
            ))
            .policy(leaf("first"))
            .policy(Policy::composed(
                "second",
                Project::new("core"),
                Composition::parallel(vec![id("left"), id("right")]),
            ))
            .policy(leaf("left"))
            .policy(leaf("right"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_sequential_opens_first_phase_only() {
        let forest = nested_forest(false);
        let plan = find_starting_policies(&forest, &id("root"), &mut |_| true).unwrap();
        assert_eq!(plan.open, vec![id("root"), id("first")]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_parallel_opens_every_phase() {
        let forest = nested_forest(false);
        let plan = find_starting_policies(&forest, &id("second"), &mut |_| true).unwrap();
        assert_eq!(plan.open, vec![id("second"), id("left"), id("right")]);
    }

    #[test]
    fn test_pre_failure_skips_to_next_phase() {
        let forest = nested_forest(false);
        let plan =
            find_starting_policies(&forest, &id("root"), &mut |p| p.id != id("first")).unwrap();
        assert_eq!(plan.open, vec![id("root"), id("second"), id("left"), id("right")]);
        assert_eq!(plan.skipped, vec![id("first")]);

        let none = find_starting_policies(&forest, &id("root"), &mut |_| false).unwrap();
        assert!(none.open.is_empty());
        assert!(none.skipped.contains(&id("root")));
    }

    #[test]
    fn test_compose_decision_short_circuits() {
        let composition = Composition::sequential(vec![id("a"), id("b")]);
        let states = HashMap::from([(id("a"), PhaseState::Decided(false))]);
        let verdict = compose_decision(&composition, None, |p| {
            states.get(p).copied().unwrap_or(PhaseState::NotStarted)
        });
        assert_eq!(verdict, ComposedVerdict::Decided(false));
        assert_eq!(
            compose_decision(&composition, Some(true), |_| PhaseState::NotStarted),
            ComposedVerdict::Decided(true)
        );
    }

    #[test]
    fn test_compose_decision_waits_then_requires_all() {
        let composition = Composition::parallel(vec![id("a"), id("b")]);
        let partial = HashMap::from([
            (id("a"), PhaseState::Decided(true)),
            (id("b"), PhaseState::Open),
        ]);
        assert_eq!(
            compose_decision(&composition, None, |p| partial[p]),
            ComposedVerdict::Pending
        );
        let done = HashMap::from([
            (id("a"), PhaseState::Decided(true)),
            (id("b"), PhaseState::Skipped),
        ]);
        assert_eq!(
            compose_decision(&composition, None, |p| done[p]),
            ComposedVerdict::Decided(true)
        );
        assert_eq!(
            compose_decision(&composition, None, |_| PhaseState::Skipped),
            ComposedVerdict::Exhausted
        );
    }

    #[test]
    fn test_find_policies_in_picks_next_unstarted_phase() {
        let composition = Composition::sequential(vec![id("a"), id("b"), id("c")]);
        let states = HashMap::from([
            (id("a"), PhaseState::Decided(true)),
            (id("b"), PhaseState::Skipped),
        ]);
        let next = find_policies_in(&composition, |p| {
            states.get(p).copied().unwrap_or(PhaseState::NotStarted)
        });
        assert_eq!(next, Some(id("c")));

        let running = HashMap::from([(id("a"), PhaseState::Open)]);
        assert_eq!(
            find_policies_in(&composition, |p| {
                running.get(p).copied().unwrap_or(PhaseState::NotStarted)
            }),
            None
        );
    }

    #[test]
    fn test_carry_over_source_walks_through_parallel_branch() {
        let forest = nested_forest(true);
        let states = HashMap::from([(id("first"), PhaseState::Decided(true))]);
        let lookup = |p: &PolicyId| states.get(p).copied().unwrap_or(PhaseState::NotStarted);
        assert_eq!(carry_over_source(&forest, &id("left"), lookup), Some(id("first")));
        assert_eq!(carry_over_source(&forest, &id("first"), lookup), None);

        let without = nested_forest(false);
        assert_eq!(carry_over_source(&without, &id("left"), lookup), None);
    }
}
