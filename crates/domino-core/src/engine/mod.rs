//! # Engine Module
//!
//! The inference machinery that turns a junction tree and a set of scoring
//! terms into ranked joint assignments.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Number of solutions, score semantics, storage and limits
//! - **Scoring** ([`semantics`], [`potentials`], [`cache`]) - Objective direction, score
//!   combination and per-node local score tables
//! - **Storage** ([`containers`]) - Pluggable per-node assignment containers, from unbounded
//!   lists to keep-best heaps and disk-backed record files
//! - **Filtering** ([`filters`]) - Vetoes applied to candidate assignments before storage
//! - **Tasks** ([`tasks`]) - Bottom-up node elimination and top-down back-tracking
//! - **Run state** ([`context`], [`state`], [`progress`]) - Shared bound, node lifecycle,
//!   solutions and progress events
//! - **Error Handling** ([`error`]) - Engine errors and their [`error::ErrorKind`]
//!
//! A run is exact when no container discards a feasible assignment and every
//! filter is lossless.

pub(crate) mod cache;
pub mod config;
pub mod containers;
pub mod context;
pub mod error;
pub mod filters;
pub mod potentials;
pub mod progress;
pub mod semantics;
pub mod state;
pub mod tasks;
