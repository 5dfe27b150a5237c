//! # Core Module
//!
//! Stateless building blocks of the optimizer: the discrete variables being
//! assigned, the scoring-term interface, the graph structures that organize
//! the search, and on-disk formats for assignments and solutions.
//!
//! ## Architecture
//!
//! - **Problem Representation** ([`models`]) - Entities, configuration spaces, subsets and assignments
//! - **Scoring Interface** ([`scoring`]) - Pluggable local scoring terms
//! - **Decomposition** ([`graph`]) - Interaction graph, triangulation and junction tree
//! - **File I/O** ([`io`]) - Binary assignment records and CSV solution tables
//! - **Utilities** ([`utils`]) - Mixed-radix enumeration and union-find
//!
//! Nothing in this layer holds run state; the [`crate::engine`] layer owns
//! everything that changes during inference.

pub mod graph;
pub mod io;
pub mod models;
pub mod scoring;
pub mod utils;
