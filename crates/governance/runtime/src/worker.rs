//! Collaboration workers
//!
//! One task per collaboration owns its `CollaborationState` and applies
//! that collaboration's events strictly in arrival order. Platform facts
//! are resolved before each event; directives are executed against the
//! platform and then broadcast.

use crate::client::PlatformClient;
use chrono::{DateTime, Utc};
use governance_engine::{CollaborationState, EngineSettings};
use governance_types::{
    CollaborationId, CollaborationOutcome, Directive, GovernanceEvent, IndividualId, PolicyForest,
    PolicyId, Scope,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// Outcomes by collaboration, shared with the runtime handle
pub(crate) type OutcomeTable = Arc<RwLock<HashMap<CollaborationId, CollaborationOutcome>>>;

pub(crate) enum WorkerCommand {
    Event(GovernanceEvent),
    /// Answered once every earlier command has been applied
    Flush(oneshot::Sender<()>),
}

/// Everything a worker shares with the rest of the runtime
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub client: PlatformClient,
    pub directives: broadcast::Sender<Directive>,
    pub outcomes: OutcomeTable,
    pub idle_gc: bool,
    pub capacity: usize,
}

pub(crate) struct Proposal {
    pub id: CollaborationId,
    pub scope: Scope,
    pub creator: IndividualId,
    pub rationale: Option<String>,
}

pub(crate) struct WorkerHandle {
    pub sender: mpsc::Sender<WorkerCommand>,
    pub task: JoinHandle<()>,
}

struct Worker {
    ctx: WorkerContext,
    id: CollaborationId,
    mailbox: mpsc::WeakSender<WorkerCommand>,
    timers: Vec<JoinHandle<()>>,
}

/// Spawn the worker for a newly proposed collaboration
pub(crate) fn spawn(
    ctx: WorkerContext,
    forest: Arc<PolicyForest>,
    settings: EngineSettings,
    proposal: Proposal,
) -> WorkerHandle {
    let (sender, receiver) = mpsc::channel(ctx.capacity.max(1));
    let worker = Worker {
        ctx,
        id: proposal.id.clone(),
        mailbox: sender.downgrade(),
        timers: Vec::new(),
    };
    let task = tokio::spawn(worker.run(forest, settings, proposal, receiver));
    WorkerHandle { sender, task }
}

impl Worker {
    async fn run(
        mut self,
        forest: Arc<PolicyForest>,
        settings: EngineSettings,
        proposal: Proposal,
        mut receiver: mpsc::Receiver<WorkerCommand>,
    ) {
        let queries = CollaborationState::queries_for_scope(&forest, &proposal.scope);
        let facts = self.ctx.client.resolve(queries).await;
        let proposed = CollaborationState::propose(
            forest,
            settings,
            proposal.id,
            proposal.scope,
            proposal.creator,
            proposal.rationale,
            &facts,
        );
        let mut state = match proposed {
            Ok((state, directives)) => {
                self.execute(directives).await;
                state
            }
            Err(e) => {
                tracing::error!(collaboration_id = %self.id, error = %e, "Proposal failed");
                return;
            }
        };

        if !self.publish(&state).await {
            while let Some(command) = receiver.recv().await {
                match command {
                    WorkerCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                    WorkerCommand::Event(event) => {
                        let facts = self.ctx.client.resolve(state.external_queries()).await;
                        match state.apply(&event, &facts) {
                            Ok(directives) => self.execute(directives).await,
                            Err(e) => tracing::error!(
                                collaboration_id = %self.id,
                                event = event.kind(),
                                error = %e,
                                "Event rejected"
                            ),
                        }
                        if self.publish(&state).await {
                            break;
                        }
                    }
                }
            }
        }

        for timer in self.timers.drain(..) {
            timer.abort();
        }
        tracing::debug!(collaboration_id = %self.id, "Collaboration worker stopped");
    }

    /// Record the current outcome; true when the worker may stop
    async fn publish(&self, state: &CollaborationState) -> bool {
        let outcome = state.outcome();
        self.ctx
            .outcomes
            .write()
            .await
            .insert(self.id.clone(), outcome);
        self.ctx.idle_gc && outcome.is_final()
    }

    async fn execute(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match &directive {
                Directive::ScheduleDeadline { policy, at, .. } => {
                    self.schedule(policy.clone(), *at);
                }
                Directive::SetLabel { element, label, .. } => {
                    if let Err(e) = self.ctx.client.set_label(element, label).await {
                        tracing::warn!(
                            collaboration_id = %self.id,
                            element = %element,
                            label = %label,
                            error = %e,
                            "Failed to set label"
                        );
                    }
                }
                Directive::Merge { element, .. } => match self.ctx.client.merge(element).await {
                    Ok(()) => tracing::info!(
                        collaboration_id = %self.id,
                        element = %element,
                        "Element merged"
                    ),
                    Err(e) => tracing::warn!(
                        collaboration_id = %self.id,
                        element = %element,
                        error = %e,
                        "Failed to merge"
                    ),
                },
                Directive::DecisionReached { .. } => {}
            }
            // No subscribers is fine
            let _ = self.ctx.directives.send(directive);
        }
    }

    /// One-shot timer feeding `DeadlineElapsed` back into this worker
    fn schedule(&mut self, policy: PolicyId, at: DateTime<Utc>) {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let mailbox = self.mailbox.clone();
        let event = GovernanceEvent::DeadlineElapsed {
            collaboration_id: self.id.clone(),
            policy: policy.clone(),
        };
        tracing::debug!(
            collaboration_id = %self.id,
            policy = %policy,
            delay_ms = delay.as_millis() as u64,
            "Deadline scheduled"
        );
        self.timers.retain(|timer| !timer.is_finished());
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The worker may be gone; the timer is then a no-op
            if let Some(sender) = mailbox.upgrade() {
                let _ = sender.send(WorkerCommand::Event(event)).await;
            }
        }));
    }
}
