//! # SigmaA Core Library
//!
//! Maximum-likelihood estimation of sigmaA, the resolution-dependent correlation
//! between observed and model structure factors, together with the alpha/beta
//! parameters and figures of merit derived from it.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless reflection models (`MillerArray`, `UnitCell`,
//!   asymmetric-unit mapping), numerical routines (Bessel functions, Chebyshev fitting,
//!   L-BFGS minimization), and the statistical services built on them (kernel
//!   normalization and the sigmaA likelihood).
//!
//! - **[`engine`]: The Logic Core.** Validated configuration, the error type, progress
//!   reporting, and the tasks that resolve kernel widths, build sampling grids, and
//!   estimate sigmaA at a single resolution.
//!
//! - **[`workflows`]: The Public API.** [`workflows::estimate::run`] executes the complete
//!   estimation from aligned input arrays to per-reflection results.

pub mod core;
pub mod engine;
pub mod workflows;
