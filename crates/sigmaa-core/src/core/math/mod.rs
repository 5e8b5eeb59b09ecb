//! Numerical building blocks used by the estimator: modified Bessel functions,
//! Chebyshev series with weighted least-squares fitting, and a one-dimensional
//! unconstrained minimizer.

pub mod chebyshev;
pub mod minimize;
pub mod special;
