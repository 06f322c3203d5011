//! # governance-daemon
//!
//! Support code for `governd`, the command-line front end of the
//! governance runtime.
//!
//! - **replay**: load a policy forest and a JSON-lines event log, run the
//!   events through a [`GovernanceRuntime`](governance_runtime::GovernanceRuntime)
//!   and collect the decisions and merges it produced
//! - **summarize**: describe the governing roots of a forest after
//!   validation

#![deny(unsafe_code)]

pub mod replay;

pub use replay::{
    load_events, load_forest, parse_events, parse_forest, replay, summarize, ForestSummary,
    ReplayReport, RootSummary,
};
