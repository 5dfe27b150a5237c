//! Computational units of an inference run.
//!
//! - [`elimination`] processes one junction-tree node in the bottom-up pass,
//!   producing its [`elimination::NodeTable`].
//! - [`backtracking`] walks the finished tables top-down to rebuild full
//!   joint assignments.

pub mod backtracking;
pub mod elimination;
