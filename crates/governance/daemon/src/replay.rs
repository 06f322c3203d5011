//! Event log replay
//!
//! Policies are read as one JSON document; events as JSON lines, one
//! [`GovernanceEvent`] per line. Blank lines and lines starting with `#`
//! are skipped.

use anyhow::{Context, Result};
use governance_runtime::{GovernanceRuntime, Platform, RuntimeConfig};
use governance_types::{
    CollaborationId, CollaborationOutcome, Directive, GovernanceEvent, PolicyForest,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

// ── Loading ─────────────────────────────────────────────────────────

pub fn parse_forest(json: &str) -> Result<PolicyForest> {
    serde_json::from_str(json).context("Invalid policy forest")
}

pub fn load_forest(path: &Path) -> Result<PolicyForest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policies from {}", path.display()))?;
    parse_forest(&json).with_context(|| format!("In {}", path.display()))
}

pub fn parse_events(lines: &str) -> Result<Vec<GovernanceEvent>> {
    lines
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid event on line {}", index + 1))
        })
        .collect()
}

pub fn load_events(path: &Path) -> Result<Vec<GovernanceEvent>> {
    let lines = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events from {}", path.display()))?;
    parse_events(&lines).with_context(|| format!("In {}", path.display()))
}

// ── Summary ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RootSummary {
    pub id: String,
    pub kind: &'static str,
    pub level: &'static str,
}

/// What a validated forest governs
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForestSummary {
    pub policies: usize,
    pub roles: usize,
    pub roots: Vec<RootSummary>,
}

pub fn summarize(forest: &PolicyForest) -> ForestSummary {
    ForestSummary {
        policies: forest.len(),
        roles: forest.roles().count(),
        roots: forest
            .roots()
            .map(|policy| RootSummary {
                id: policy.id.to_string(),
                kind: policy.kind.name(),
                level: policy.scope.level(),
            })
            .collect(),
    }
}

// ── Replay ──────────────────────────────────────────────────────────

/// Decisions, merges and final outcomes of one replay
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReplayReport {
    pub directives: Vec<Directive>,
    pub outcomes: BTreeMap<CollaborationId, CollaborationOutcome>,
}

impl ReplayReport {
    pub fn accepted(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, CollaborationOutcome::Decided { accepted: true }))
            .count()
    }
}

/// Feed `events` through a fresh runtime and wait for them to settle
pub async fn replay(
    config: RuntimeConfig,
    forest: PolicyForest,
    events: Vec<GovernanceEvent>,
    platform: Arc<dyn Platform>,
) -> Result<ReplayReport> {
    let runtime = GovernanceRuntime::start(config, forest, platform);

    let mut receiver = runtime.subscribe();
    let collector = tokio::spawn(async move {
        let mut directives = Vec::new();
        loop {
            match receiver.recv().await {
                Ok(directive @ (Directive::DecisionReached { .. } | Directive::Merge { .. })) => {
                    directives.push(directive)
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Replay fell behind; directives dropped")
                }
                Err(RecvError::Closed) => break,
            }
        }
        directives
    });

    let total = events.len();
    for event in events {
        runtime.submit(event).await?;
    }
    runtime.flush().await?;
    let outcomes = runtime.outcomes().await.into_iter().collect();
    runtime.shutdown().await?;

    let directives = collector.await.context("Directive collector failed")?;
    tracing::info!(events = total, directives = directives.len(), "Replay finished");
    Ok(ReplayReport {
        directives,
        outcomes,
    })
}
