//! Provides input/output functionality for assignment data.
//!
//! This module contains the fixed-width binary record format used by
//! disk-backed assignment containers and a CSV format for exchanging solved
//! assignments with other tools. Both share a trait-based interface for
//! reading from and writing to readers, writers and paths.

pub mod records;
pub mod solutions;
pub mod traits;
