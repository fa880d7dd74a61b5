//! # Broadside Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Battle fixtures (uniform fields, roster builders)
//! - Determinism test harness
//! - Balance statistics over many battles
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
