//! Governance Domain Types
//!
//! This crate defines the domain types for collaborative-decision
//! governance: policies that decide, from accumulating votes and declared
//! rules, whether a proposed unit of work (a collaboration) is accepted.
//!
//! # Key Concepts
//!
//! - **Scope**: what a collaboration is about (Project ⊃ Activity ⊃ Task,
//!   with a Patch variant carrying an action and a labelled element).
//! - **Policy**: a closed set of kinds (majority, absolute majority,
//!   consensus, lazy consensus, voting, leader-driven) plus composed
//!   policies that sequence or parallelize phases.
//! - **Policy Forest**: the validated set of loaded policies, linked
//!   parent to child; malformed structure is rejected at load.
//! - **Ballot Box**: votes recorded against one opened policy instance.
//! - **Decision**: the immutable outcome of one policy instance.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. Entities live
//! in owning tables keyed by newtype ids; cross references are ids.

#![deny(unsafe_code)]

mod collaboration;
mod errors;
mod event;
mod forest;
mod ids;
mod participant;
mod policy;
mod scope;

pub use collaboration::*;
pub use errors::*;
pub use event::*;
pub use forest::*;
pub use ids::*;
pub use participant::*;
pub use policy::*;
pub use scope::*;
