//! Scope matcher: selects the policy governing a collaboration's scope
//!
//! A policy's declared scope is compared structurally with the received
//! scope. When the received scope is more specific, the comparison walks
//! up its containment chain (Task/Patch → Activity → Project) and reports
//! an INCLUDE if an ancestor lines up.

use governance_types::{Activity, Patch, PatchAction, Policy, PolicyForest, Project, Scope};

/// Result of comparing a declared scope against a received one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeMatch {
    Mismatch,
    /// Same level, identifying fields agree
    Match,
    /// Declared scope contains the received one
    Include,
}

/// Compare a policy's declared scope with a collaboration's scope
pub fn compare_scopes(expected: &Scope, received: &Scope) -> ScopeMatch {
    match (expected, received) {
        (Scope::Project(e), Scope::Project(r)) => compare_projects(e, r),
        (Scope::Activity(e), Scope::Activity(r)) => compare_projects(&e.project, &r.project),
        (Scope::Task(e), Scope::Task(r)) => compare_activities(&e.activity, &r.activity),
        (Scope::Patch(e), Scope::Patch(r)) => compare_patches(e, r),

        // Task-level declarations only govern their own level
        (Scope::Task(_) | Scope::Patch(_), _) | (_, Scope::Project(_)) => ScopeMatch::Mismatch,

        (_, Scope::Task(t)) => include_if(compare_scopes(expected, &Scope::Activity(t.activity.clone()))),
        (_, Scope::Patch(p)) => include_if(compare_scopes(expected, &Scope::Activity(p.activity.clone()))),
        (_, Scope::Activity(a)) => include_if(compare_scopes(expected, &Scope::Project(a.project.clone()))),
    }
}

fn include_if(ancestor: ScopeMatch) -> ScopeMatch {
    match ancestor {
        ScopeMatch::Mismatch => ScopeMatch::Mismatch,
        ScopeMatch::Match | ScopeMatch::Include => ScopeMatch::Include,
    }
}

fn compare_projects(expected: &Project, received: &Project) -> ScopeMatch {
    match (&expected.repository, &received.repository) {
        (Some(e), Some(r)) if e != r => ScopeMatch::Mismatch,
        (Some(_), None) => ScopeMatch::Mismatch,
        _ => ScopeMatch::Match,
    }
}

fn compare_activities(expected: &Activity, received: &Activity) -> ScopeMatch {
    compare_projects(&expected.project, &received.project)
}

fn compare_patches(expected: &Patch, received: &Patch) -> ScopeMatch {
    let actions_agree = expected.action.admits(received.action)
        || received.action == PatchAction::All;
    if !actions_agree || expected.element.kind != received.element.kind {
        return ScopeMatch::Mismatch;
    }
    if !expected
        .element
        .labels
        .iter()
        .all(|label| received.element.labels.contains(label))
    {
        return ScopeMatch::Mismatch;
    }
    compare_activities(&expected.activity, &received.activity)
}

/// Find the root policy governing `scope`
///
/// A MATCH wins immediately. Among INCLUDE candidates the narrowest
/// declared scope wins; ties keep declaration order.
pub fn find_policy_for<'a>(forest: &'a PolicyForest, scope: &Scope) -> Option<&'a Policy> {
    let mut best: Option<&Policy> = None;
    for policy in forest.roots() {
        match compare_scopes(&policy.scope, scope) {
            ScopeMatch::Match => return Some(policy),
            ScopeMatch::Include => {
                let narrower = best
                    .map(|b| policy.scope.specificity() > b.scope.specificity())
                    .unwrap_or(true);
                if narrower {
                    best = Some(policy);
                }
            }
            ScopeMatch::Mismatch => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use governance_types::{Element, ElementKind, Task, VotingRules};

    fn project() -> Project {
        Project::new("core").with_repository("acme/core")
    }

    fn activity() -> Activity {
        Activity::new("pull-requests", project())
    }

    fn patch(action: PatchAction, element: Element) -> Scope {
        Patch::new("pr", activity(), action, element).into()
    }

    #[test]
    fn test_same_level_match() {
        assert_eq!(
            compare_scopes(&project().into(), &project().into()),
            ScopeMatch::Match
        );
        assert_eq!(
            compare_scopes(
                &Project::new("core").into(),
                &Project::new("core").with_repository("acme/other").into()
            ),
            ScopeMatch::Match
        );
        assert_eq!(
            compare_scopes(
                &project().into(),
                &Project::new("core").with_repository("acme/other").into()
            ),
            ScopeMatch::Mismatch
        );
    }

    #[test]
    fn test_containment_include() {
        let task: Scope = Task::new("t", activity()).into();
        assert_eq!(compare_scopes(&activity().into(), &task), ScopeMatch::Include);
        assert_eq!(compare_scopes(&project().into(), &task), ScopeMatch::Include);
        assert_eq!(
            compare_scopes(&project().into(), &activity().into()),
            ScopeMatch::Include
        );
        // A narrower declaration never governs a wider scope
        assert_eq!(compare_scopes(&task, &activity().into()), ScopeMatch::Mismatch);
        assert_eq!(
            compare_scopes(&activity().into(), &project().into()),
            ScopeMatch::Mismatch
        );
    }

    #[test]
    fn test_patch_rules() {
        let received = patch(
            PatchAction::Merge,
            Element::pull_request("acme/core#1").with_label("ready"),
        );
        let any_action = patch(PatchAction::All, Element::new(ElementKind::PullRequest));
        assert_eq!(compare_scopes(&any_action, &received), ScopeMatch::Match);

        let review = patch(PatchAction::Review, Element::new(ElementKind::PullRequest));
        assert_eq!(compare_scopes(&review, &received), ScopeMatch::Mismatch);

        let issue = patch(PatchAction::Merge, Element::new(ElementKind::Issue));
        assert_eq!(compare_scopes(&issue, &received), ScopeMatch::Mismatch);

        let labelled = patch(
            PatchAction::Merge,
            Element::new(ElementKind::PullRequest).with_label("ready"),
        );
        assert_eq!(compare_scopes(&labelled, &received), ScopeMatch::Match);

        let missing_label = patch(
            PatchAction::Merge,
            Element::new(ElementKind::PullRequest).with_label("security"),
        );
        assert_eq!(compare_scopes(&missing_label, &received), ScopeMatch::Mismatch);

        assert_eq!(compare_scopes(&activity().into(), &received), ScopeMatch::Include);
    }

    #[test]
    fn test_activity_level_policy_wins_include_tie_break() {
        let forest = PolicyForest::builder()
            .policy(Policy::majority("project-wide", project(), VotingRules::new()))
            .policy(Policy::majority("activity-wide", activity(), VotingRules::new()))
            .build()
            .unwrap();
        let task: Scope = Task::new("t", activity()).into();
        let chosen = find_policy_for(&forest, &task).unwrap();
        assert_eq!(chosen.id.as_str(), "activity-wide");
    }

    #[test]
    fn test_match_beats_include() {
        let task = Task::new("t", activity());
        let forest = PolicyForest::builder()
            .policy(Policy::majority("activity-wide", activity(), VotingRules::new()))
            .policy(Policy::majority("task", task.clone(), VotingRules::new()))
            .build()
            .unwrap();
        let chosen = find_policy_for(&forest, &task.into()).unwrap();
        assert_eq!(chosen.id.as_str(), "task");
    }

    #[test]
    fn test_ungoverned_scope() {
        let forest = PolicyForest::builder()
            .policy(Policy::majority("project-wide", project(), VotingRules::new()))
            .build()
            .unwrap();
        let elsewhere: Scope = Project::new("other").with_repository("acme/other").into();
        assert!(find_policy_for(&forest, &elsewhere).is_none());
    }
}
