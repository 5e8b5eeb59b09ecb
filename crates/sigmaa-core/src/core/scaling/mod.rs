//! Statistical services on reflection data: resolution-dependent normalization
//! to E-values and the kernel-weighted sigmaA likelihood.

pub mod likelihood;
pub mod normalization;
