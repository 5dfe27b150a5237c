//! # Workflows Module
//!
//! Top-level entry points. Each workflow takes an [`EntitySystem`](crate::core::models::system::EntitySystem),
//! a list of scoring terms and an [`InferenceConfig`](crate::engine::config::InferenceConfig),
//! and returns ranked full joint assignments.
//!
//! - **Optimization** ([`optimize`]) - Junction-tree decomposition followed by
//!   bottom-up elimination and back-tracking. Exact with unbounded storage.
//! - **Exhaustive search** ([`exhaustive`]) - Brute-force enumeration of every
//!   joint configuration, for small problems and as a reference.

pub mod exhaustive;
pub mod optimize;
