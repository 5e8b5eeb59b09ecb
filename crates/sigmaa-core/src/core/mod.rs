//! # Core Module
//!
//! This module provides the stateless building blocks of the library: the
//! reflection data model, the numerical routines, and the statistical services
//! that the estimation engine is assembled from.
//!
//! ## Architecture
//!
//! - **Reflection Representation** ([`models`]) - Miller indices, unit cells, asymmetric-unit
//!   mapping, and position-aligned reflection arrays
//! - **Numerics** ([`math`]) - Modified Bessel functions, Chebyshev series fitting, and the
//!   one-dimensional L-BFGS minimizer
//! - **Scaling Statistics** ([`scaling`]) - Kernel normalization to E-values and the
//!   sigmaA likelihood target
//!
//! Nothing in this module keeps state between calls; every value is created from its
//! inputs and owned by the caller.

pub mod math;
pub mod models;
pub mod scaling;
