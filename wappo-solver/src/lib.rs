//! State-space search over Wappo levels.
//!
//! Four strategies (breadth-first, memoized depth-first, pure backtracking,
//! A*) explore the turn graph produced by `wappo_core::Game`, keyed by
//! canonical snapshot strings.

pub mod solver;
pub mod stats;

pub use solver::{Algorithm, SolveError, SolveOptions, Solution, Solver};
pub use stats::SolveStats;
