//! # governance-engine
//!
//! Decides, from accumulating votes and declared rules, whether a
//! proposed collaboration is accepted. The engine is synchronous and
//! performs no I/O; platform facts arrive through a [`ConditionOracle`].
//!
//! ## Core Components
//!
//! - **Scope matcher**: picks the root policy governing a scope
//! - **Ballot**: voter eligibility, vote weights and tallies
//! - **Conditions**: PRE, CONCURRENT and POST condition evaluation
//! - **Evaluator**: per-kind decisions and early decidability
//! - **Composition**: phase expansion, aggregation and carry-over
//! - **CollaborationState**: everything one collaboration mutates
//! - **GovernanceEngine**: forest, individual registry and collaborations
//!
//! ## Decision Flow
//!
//! A proposal selects its governing policy and opens the starting
//! instances. Each vote is recorded into every open instance the voter
//! may vote on; instances whose outcome is already certain are decided
//! at once, the rest wait for more votes or their deadline. Decisions
//! propagate upward through leader-driven and composed parents until the
//! root decides.

#![deny(unsafe_code)]

pub mod ballot;
pub mod composition;
pub mod conditions;
pub mod engine;
pub mod evaluator;
pub mod facts;
pub mod registry;
pub mod scope_matcher;
pub mod state;

pub use ballot::{Eligibility, Tally};
pub use composition::{ComposedVerdict, PhaseState, StartPlan};
pub use conditions::ConditionState;
pub use engine::GovernanceEngine;
pub use evaluator::{BallotView, Certainty, Evaluation, ThresholdRule};
pub use facts::{ConditionOracle, ExternalFacts};
pub use registry::IndividualRegistry;
pub use scope_matcher::{find_policy_for, ScopeMatch};
pub use state::{CollaborationState, DecisionAttempt, EngineSettings, VoteReceipt};
