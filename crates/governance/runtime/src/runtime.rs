//! Governance runtime: event dispatch across collaboration workers
//!
//! A dispatcher task owns the current policy forest and is the only
//! writer of the individual registry, which the handle can read. It
//! spawns one worker per proposed collaboration and routes every
//! collaboration-scoped event to it, so events of one collaboration are
//! applied in arrival order while different
//! collaborations run in parallel.

use crate::client::PlatformClient;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::platform::Platform;
use crate::worker::{self, OutcomeTable, Proposal, WorkerCommand, WorkerContext, WorkerHandle};
use futures::future::join_all;
use governance_engine::{EngineSettings, IndividualRegistry};
use governance_types::{
    CollaborationId, CollaborationOutcome, Directive, GovernanceEvent, Individual, IndividualId,
    PolicyForest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// Buffered directives per subscriber
const DIRECTIVE_BUFFER: usize = 1024;

enum Command {
    Event(GovernanceEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running governance runtime
pub struct GovernanceRuntime {
    commands: mpsc::Sender<Command>,
    directives: broadcast::Sender<Directive>,
    outcomes: OutcomeTable,
    registry: Arc<RwLock<IndividualRegistry>>,
    dispatcher: JoinHandle<()>,
}

impl GovernanceRuntime {
    /// Start the dispatcher; must be called within a tokio runtime
    pub fn start(config: RuntimeConfig, forest: PolicyForest, platform: Arc<dyn Platform>) -> Self {
        let (commands, receiver) = mpsc::channel(config.workers.channel_capacity.max(1));
        let (directives, _) = broadcast::channel(DIRECTIVE_BUFFER);
        let outcomes: OutcomeTable = Arc::new(RwLock::new(HashMap::new()));

        let mut registry = IndividualRegistry::new();
        registry.register_forest(&forest);
        let registry = Arc::new(RwLock::new(registry));
        tracing::info!(
            policies = forest.len(),
            roots = forest.roots().count(),
            timeout_ms = config.checks.timeout_ms,
            "Governance runtime started"
        );

        let dispatcher = Dispatcher {
            forest: Arc::new(forest),
            registry: Arc::clone(&registry),
            settings: config.engine_settings(),
            ctx: WorkerContext {
                client: PlatformClient::new(
                    platform,
                    config.check_timeout(),
                    config.checks.retries,
                ),
                directives: directives.clone(),
                outcomes: Arc::clone(&outcomes),
                idle_gc: config.workers.idle_gc,
                capacity: config.workers.channel_capacity,
            },
            workers: HashMap::new(),
        };

        Self {
            commands,
            directives,
            outcomes,
            registry,
            dispatcher: tokio::spawn(dispatcher.run(receiver)),
        }
    }

    /// Queue an event
    pub async fn submit(&self, event: GovernanceEvent) -> RuntimeResult<()> {
        self.commands
            .send(Command::Event(event))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Receive every directive emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Directive> {
        self.directives.subscribe()
    }

    pub async fn outcome(&self, id: &CollaborationId) -> Option<CollaborationOutcome> {
        self.outcomes.read().await.get(id).copied()
    }

    pub async fn outcomes(&self) -> HashMap<CollaborationId, CollaborationOutcome> {
        self.outcomes.read().await.clone()
    }

    /// Profile of an individual seen in the forest or in any event so far
    pub async fn individual(&self, id: &IndividualId) -> Option<Individual> {
        self.registry.read().await.get(id).cloned()
    }

    /// Wait until every event submitted so far has been applied
    pub async fn flush(&self) -> RuntimeResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Flush(done))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        wait.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Drain queued events and stop every task
    pub async fn shutdown(self) -> RuntimeResult<()> {
        drop(self.commands);
        self.dispatcher
            .await
            .map_err(|e| RuntimeError::Worker(e.to_string()))
    }
}

struct Dispatcher {
    forest: Arc<PolicyForest>,
    registry: Arc<RwLock<IndividualRegistry>>,
    settings: EngineSettings,
    ctx: WorkerContext,
    workers: HashMap<CollaborationId, WorkerHandle>,
}

impl Dispatcher {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Event(event) => self.dispatch(event).await,
                Command::Flush(done) => {
                    self.flush().await;
                    let _ = done.send(());
                }
            }
        }

        // Closing the mailboxes lets each worker drain and stop
        let tasks: Vec<JoinHandle<()>> = self
            .workers
            .drain()
            .map(|(_, handle)| handle.task)
            .collect();
        for result in join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Collaboration worker panicked");
            }
        }
        tracing::info!("Governance runtime stopped");
    }

    async fn dispatch(&mut self, event: GovernanceEvent) {
        tracing::debug!(event = event.kind(), "Dispatching event");
        match event {
            GovernanceEvent::CollaborationProposed {
                id,
                scope,
                creator,
                rationale,
            } => {
                let known = self.workers.contains_key(&id)
                    || self.ctx.outcomes.read().await.contains_key(&id);
                if known {
                    tracing::warn!(collaboration_id = %id, "Duplicate proposal ignored");
                    return;
                }
                self.registry.write().await.ensure(&creator);
                let handle = worker::spawn(
                    self.ctx.clone(),
                    Arc::clone(&self.forest),
                    self.settings.clone(),
                    Proposal {
                        id: id.clone(),
                        scope,
                        creator,
                        rationale,
                    },
                );
                self.workers.insert(id, handle);
            }
            GovernanceEvent::PolicyReloaded { forest } => {
                let registered = self.registry.write().await.register_forest(&forest);
                tracing::info!(
                    policies = forest.len(),
                    individuals = registered,
                    "Policy forest reloaded"
                );
                self.forest = Arc::new(forest);
            }
            GovernanceEvent::UserRegistered { login } => {
                self.registry.write().await.ensure(&login);
            }
            event => {
                if let GovernanceEvent::Voted { individual, .. } = &event {
                    self.registry.write().await.ensure(individual);
                }
                let Some(id) = event.collaboration_id().cloned() else {
                    return;
                };
                self.route(id, event).await;
            }
        }
    }

    async fn route(&mut self, id: CollaborationId, event: GovernanceEvent) {
        let Some(handle) = self.workers.get(&id) else {
            tracing::warn!(
                collaboration_id = %id,
                event = event.kind(),
                "Event for unknown collaboration dropped"
            );
            return;
        };
        if handle.sender.send(WorkerCommand::Event(event)).await.is_err() {
            // Worker finished with the collaboration
            tracing::debug!(collaboration_id = %id, "Event after completion dropped");
            self.workers.remove(&id);
        }
    }

    async fn flush(&mut self) {
        let mut waits = Vec::new();
        let mut finished = Vec::new();
        for (id, handle) in &self.workers {
            let (done, wait) = oneshot::channel();
            if handle.sender.send(WorkerCommand::Flush(done)).await.is_ok() {
                waits.push(wait);
            } else {
                finished.push(id.clone());
            }
        }
        // A worker that stops before answering drops its sender
        join_all(waits).await;
        for id in finished {
            self.workers.remove(&id);
        }
    }
}
