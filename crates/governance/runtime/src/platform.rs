//! Code-hosting platform surface: trait definition and in-memory implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{RuntimeError, RuntimeResult};

/// Facts and actions the governance runtime needs from the platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Whether the element's status checks pass.
    async fn check_status(&self, element: &str) -> RuntimeResult<bool>;

    /// Whether the element carries `label`.
    async fn has_label(&self, element: &str, label: &str) -> RuntimeResult<bool>;

    async fn set_label(&self, element: &str, label: &str) -> RuntimeResult<()>;

    /// Merge an accepted element.
    async fn merge(&self, element: &str) -> RuntimeResult<()>;
}

#[derive(Debug, Default)]
struct PlatformState {
    statuses: HashMap<String, bool>,
    labels: HashMap<String, BTreeSet<String>>,
    merged: Vec<String>,
    failing: BTreeSet<String>,
    stalled: bool,
}

/// An in-memory platform for testing and replay.
///
/// Unknown elements report passing status checks and no labels. A stalled
/// platform never answers fact queries, which exercises the timeout path.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, element: &str, passing: bool) {
        self.state().statuses.insert(element.to_string(), passing);
    }

    /// Make every call about `element` fail.
    pub fn fail_element(&self, element: &str) {
        self.state().failing.insert(element.to_string());
    }

    pub fn stall(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    pub fn labels(&self, element: &str) -> BTreeSet<String> {
        self.state().labels.get(element).cloned().unwrap_or_default()
    }

    pub fn merged(&self) -> Vec<String> {
        self.state().merged.clone()
    }

    fn check_failing(&self, element: &str) -> RuntimeResult<()> {
        if self.state().failing.contains(element) {
            return Err(RuntimeError::Platform(format!("element unavailable: {element}")));
        }
        Ok(())
    }

    async fn wait_if_stalled(&self) {
        let stalled = self.state().stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn check_status(&self, element: &str) -> RuntimeResult<bool> {
        self.wait_if_stalled().await;
        self.check_failing(element)?;
        Ok(self.state().statuses.get(element).copied().unwrap_or(true))
    }

    async fn has_label(&self, element: &str, label: &str) -> RuntimeResult<bool> {
        self.wait_if_stalled().await;
        self.check_failing(element)?;
        Ok(self
            .state()
            .labels
            .get(element)
            .is_some_and(|labels| labels.contains(label)))
    }

    async fn set_label(&self, element: &str, label: &str) -> RuntimeResult<()> {
        self.check_failing(element)?;
        self.state()
            .labels
            .entry(element.to_string())
            .or_default()
            .insert(label.to_string());
        Ok(())
    }

    async fn merge(&self, element: &str) -> RuntimeResult<()> {
        self.check_failing(element)?;
        self.state().merged.push(element.to_string());
        Ok(())
    }
}
