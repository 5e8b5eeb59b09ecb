//! # Engine Module
//!
//! This module holds the configurable, fallible machinery that the estimation
//! workflow is assembled from.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Estimator parameters and the builder that validates them
//! - **Error Handling** ([`error`]) - The error type surfaced by every estimation step
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events for front ends
//! - **Tasks** ([`tasks`]) - Kernel-width resolution, sampling grids, and per-point
//!   maximum-likelihood estimation
//!
//! ## Key Capabilities
//!
//! - **Exactly-one kernel width** enforced at configuration time
//! - **Bounded sigmaA estimation** through a sigmoid reparametrization of an unconstrained
//!   L-BFGS search
//! - **Independent grid points** that can be evaluated in parallel

pub mod config;
pub mod error;
pub mod progress;
pub mod tasks;
