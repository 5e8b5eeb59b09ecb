//! # Workflows Module
//!
//! High-level entry points that tie the `engine` and `core` layers together into
//! complete scientific procedures.
//!
//! - **SigmaA Estimation** ([`estimate`]) - Aligns observed, calculated and free-flag
//!   arrays, normalizes them, estimates sigmaA on a resolution grid, smooths the
//!   estimates, and derives alpha, beta and figures of merit for every reflection.

pub mod estimate;
