//! # Scoring Module
//!
//! The interface between the optimizer and the caller's scoring functions.
//! A scoring term declares a small support set of entities and returns a
//! weighted score for any joint configuration of that support. The crate
//! never interprets what a term computes; it only enumerates, combines and
//! prunes.
//!
//! - [`term`] - The [`term::ScoringTerm`] trait, [`term::TermScore`], and two
//!   ready-made implementations (closure-backed and table-backed terms).

pub mod term;
