//! Scope model: what a collaboration is about
//!
//! Scopes nest by containment, in increasing specificity:
//! Project ⊃ Activity ⊃ Task, with Patch as a Task specialization that
//! carries an action kind and a labelled platform element.
//!
//! Scopes are plain values compared structurally. The only mutable
//! lifecycle state (`ScopeStatus`) lives on the collaboration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A project, optionally pinned to a repository
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Repository id ("owner/repo"); a declared project without one
    /// matches any repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }
}

/// A line of work inside a project (e.g. pull requests)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub project: Project,
}

impl Activity {
    pub fn new(name: impl Into<String>, project: Project) -> Self {
        Self {
            name: name.into(),
            project,
        }
    }
}

/// A concrete task inside an activity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub activity: Activity,
}

impl Task {
    pub fn new(name: impl Into<String>, activity: Activity) -> Self {
        Self {
            name: name.into(),
            activity,
        }
    }
}

/// Action a patch collaboration asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchAction {
    Merge,
    Review,
    Release,
    /// Declared on a policy, matches any action
    All,
}

impl PatchAction {
    /// Whether a policy declaring `self` governs a patch asking for `requested`
    pub fn admits(&self, requested: PatchAction) -> bool {
        matches!(self, PatchAction::All) || *self == requested
    }
}

/// Kind of platform element a patch is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    PullRequest,
    Issue,
}

/// The platform element under decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    /// Platform reference ("owner/repo#12"); absent on policy declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Labels present on the element, or required by a policy declaration
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            reference: None,
            labels: BTreeSet::new(),
        }
    }

    pub fn pull_request(reference: impl Into<String>) -> Self {
        Self::new(ElementKind::PullRequest).with_reference(reference)
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }
}

/// A task specialization asking for an action on an element
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    pub activity: Activity,
    pub action: PatchAction,
    pub element: Element,
}

impl Patch {
    pub fn new(
        name: impl Into<String>,
        activity: Activity,
        action: PatchAction,
        element: Element,
    ) -> Self {
        Self {
            name: name.into(),
            activity,
            action,
            element,
        }
    }
}

/// What is being decided
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Scope {
    Project(Project),
    Activity(Activity),
    Task(Task),
    Patch(Patch),
}

impl Scope {
    /// Containment depth: Project 0, Activity 1, Task and Patch 2
    pub fn specificity(&self) -> u8 {
        match self {
            Scope::Project(_) => 0,
            Scope::Activity(_) => 1,
            Scope::Task(_) | Scope::Patch(_) => 2,
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            Scope::Project(_) => "project",
            Scope::Activity(_) => "activity",
            Scope::Task(_) => "task",
            Scope::Patch(_) => "patch",
        }
    }

    pub fn project(&self) -> &Project {
        match self {
            Scope::Project(p) => p,
            Scope::Activity(a) => &a.project,
            Scope::Task(t) => &t.activity.project,
            Scope::Patch(p) => &p.activity.project,
        }
    }

    pub fn activity(&self) -> Option<&Activity> {
        match self {
            Scope::Project(_) => None,
            Scope::Activity(a) => Some(a),
            Scope::Task(t) => Some(&t.activity),
            Scope::Patch(p) => Some(&p.activity),
        }
    }

    pub fn element(&self) -> Option<&Element> {
        match self {
            Scope::Patch(p) => Some(&p.element),
            _ => None,
        }
    }

    /// Platform reference of the element, if this is a patch scope
    pub fn element_reference(&self) -> Option<&str> {
        self.element().and_then(|e| e.reference.as_deref())
    }

    /// Patch scopes asking for a merge trigger the merge action on acceptance
    pub fn requests_merge(&self) -> bool {
        matches!(self, Scope::Patch(p) if p.action == PatchAction::Merge)
    }
}

impl From<Project> for Scope {
    fn from(p: Project) -> Self {
        Scope::Project(p)
    }
}

impl From<Activity> for Scope {
    fn from(a: Activity) -> Self {
        Scope::Activity(a)
    }
}

impl From<Task> for Scope {
    fn from(t: Task) -> Self {
        Scope::Task(t)
    }
}

impl From<Patch> for Scope {
    fn from(p: Patch) -> Self {
        Scope::Patch(p)
    }
}

/// Lifecycle of a collaboration's scope; monotonic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeStatus {
    #[default]
    Accepted,
    Partial,
    Completed,
}

impl ScopeStatus {
    /// Move forward to `next`; never moves backwards
    pub fn advance(&mut self, next: ScopeStatus) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeStatus::Accepted => write!(f, "ACCEPTED"),
            ScopeStatus::Partial => write!(f, "PARTIAL"),
            ScopeStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}
