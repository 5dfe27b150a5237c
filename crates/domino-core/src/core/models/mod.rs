//! # Core Models Module
//!
//! Data structures describing the discrete optimization problem itself:
//! the entities being assigned, their configuration spaces, subsets of
//! entities, and scored joint configurations (assignments).
//!
//! ## Key Components
//!
//! - [`ids`] - Stable identifier type for entities
//! - [`entity`] - An entity and its configuration space
//! - [`system`] - The full set of entities, with name lookup and validation
//! - [`subset`] - Canonically ordered entity sets and state projection
//! - [`assignment`] - A joint configuration of a subset with its score
//!
//! ## Usage
//!
//! ```ignore
//! use domino::core::models::{system::EntitySystem, subset::Subset};
//!
//! let mut system = EntitySystem::new();
//! let a = system.add_entity("A", 2)?;
//! let b = system.add_entity("B", 3)?;
//! assert_eq!(system.domain_size(&Subset::new([a, b])), 6);
//! ```

pub mod assignment;
pub mod entity;
pub mod ids;
pub mod subset;
pub mod system;
