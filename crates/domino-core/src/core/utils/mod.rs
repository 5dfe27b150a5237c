//! Small algorithmic helpers shared by the graph and engine layers.

pub mod disjoint_sets;
pub mod enumeration;
