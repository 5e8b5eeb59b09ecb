//! # Core Models Module
//!
//! This module contains the data structures used to represent indexed diffraction data
//! in the SigmaA library.
//!
//! ## Overview
//!
//! Reflection data is stored as positionally aligned columns: a [`reflections::ReflectionSet`]
//! holds the Miller indices and their symmetry attributes, and a [`reflections::MillerArray`]
//! attaches one datum (amplitude, intensity, structure factor or flag) to each reflection.
//! Every downstream computation relies on arrays sharing the same index ordering.
//!
//! ## Key Components
//!
//! - [`miller`] - Miller index triple
//! - [`cell`] - Unit cell and reciprocal metric (resolution of each reflection)
//! - [`asu`] - Asymmetric-unit mapping and Friedel transforms of data
//! - [`reflections`] - Reflection sets, Miller arrays and observed-data kinds
//!
//! ## Usage
//!
//! ```ignore
//! use sigmaa::core::models::{cell::UnitCell, miller::MillerIndex, reflections::*};
//!
//! let cell = UnitCell::cubic(40.0)?;
//! let set = ReflectionSet::acentric(cell, vec![MillerIndex::new(1, 2, 3)]);
//! let f_obs = MillerArray::new(set, vec![125.0])?;
//! ```

pub mod asu;
pub mod cell;
pub mod miller;
pub mod reflections;
