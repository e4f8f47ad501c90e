//! Attribute-set exploration engine
//!
//! This crate implements the lattice explorers that search for an
//! attribute set keeping the sensitivity below a threshold at the lowest
//! usability cost:
//! - Entropy: rank attributes by marginal entropy, grow one selection
//! - ConditionalEntropy: grow the selection by the best joint entropy
//! - FPSelect: multi-path best-first lattice search with pruning
//!
//! The three algorithms share one controller ([`Exploration`]): the
//! feasibility check, the trace, the solution bookkeeping, and the
//! synchronous/asynchronous execution modes. The worker pool accelerates
//! the per-attribute measure scans and the FPSelect level expansion; the
//! observable results never depend on the worker count.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conditional_entropy;
pub mod controller;
pub mod entropy;
pub mod fpselect;

#[cfg(test)]
mod test_support;

pub use controller::{Exploration, ExplorationHandle};
