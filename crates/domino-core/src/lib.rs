//! # DOMINO Core Library
//!
//! Discrete optimization over many interacting variables by dynamic programming
//! on a junction tree.
//!
//! Each *entity* chooses one of a finite set of configurations. Caller-supplied
//! scoring terms each depend on a few entities; the library finds the joint
//! configurations of all entities with the best combined score, exactly when
//! storage is unbounded and approximately when the caller opts into bounded
//! storage or lossy filters.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data: the [`EntitySystem`](core::models::system::EntitySystem),
//!   subsets and assignments, the scoring-term interface, the interaction graph
//!   and junction tree, and binary/CSV I/O.
//!
//! - **[`engine`]: The Logic Core.** Stateful inference: configuration, potential
//!   tables, assignment containers, filters, per-node elimination and
//!   back-tracking.
//!
//! - **[`workflows`]: The Public API.** Complete runs, from scoring terms to ranked
//!   solutions, plus a brute-force reference solver.

pub mod core;
pub mod engine;
pub mod workflows;
