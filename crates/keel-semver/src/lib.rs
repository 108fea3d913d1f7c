//! Semantic versioning library for the keel resolver
//!
//! This crate provides semantic version parsing and comparison together with
//! a canonical range-constraint algebra: intersection, union, complement and
//! containment over disjoint unions of version ranges, with npm-style range
//! sugar (`^`, `~`, hyphen ranges, x-ranges) lowered to primitive
//! comparators at parse time.

pub mod constraint;
mod version;

pub use constraint::Constraint;
pub use version::{SemverError, Version};
