//! Computational units of the estimator.
//!
//! `binning` turns configuration into a kernel width and a resolution sampling grid;
//! `point_estimate` finds the maximum-likelihood sigmaA at a single grid point.

pub mod binning;
pub mod point_estimate;
