use super::asu::{AsymmetricUnit, FriedelValue};
use super::cell::UnitCell;
use super::miller::MillerIndex;
use num_complex::Complex64;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ReflectionError {
    #[error("Column '{column}' has {actual} entries but the reflection set has {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Epsilon multiplicity must be at least 1, got {value} for reflection {index}")]
    InvalidEpsilon { index: MillerIndex, value: f64 },
}

fn check_length(column: &'static str, expected: usize, actual: usize) -> Result<(), ReflectionError> {
    if expected != actual {
        return Err(ReflectionError::LengthMismatch {
            column,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Indices of a reflection list together with their per-reflection symmetry
/// attributes. All vectors are positionally aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionSet {
    cell: UnitCell,
    indices: Vec<MillerIndex>,
    centric: Vec<bool>,
    epsilons: Vec<f64>,
}

impl ReflectionSet {
    /// Builds a set with unit epsilon multiplicities.
    pub fn new(
        cell: UnitCell,
        indices: Vec<MillerIndex>,
        centric: Vec<bool>,
    ) -> Result<Self, ReflectionError> {
        check_length("centric", indices.len(), centric.len())?;
        let epsilons = vec![1.0; indices.len()];
        Ok(Self {
            cell,
            indices,
            centric,
            epsilons,
        })
    }

    /// Builds a set where every reflection is acentric, as in space group P1.
    pub fn acentric(cell: UnitCell, indices: Vec<MillerIndex>) -> Self {
        let n = indices.len();
        Self {
            cell,
            indices,
            centric: vec![false; n],
            epsilons: vec![1.0; n],
        }
    }

    pub fn with_epsilons(mut self, epsilons: Vec<f64>) -> Result<Self, ReflectionError> {
        check_length("epsilon", self.indices.len(), epsilons.len())?;
        if let Some((&index, &value)) = self
            .indices
            .iter()
            .zip(&epsilons)
            .find(|&(_, &eps)| !(eps >= 1.0 && eps.is_finite()))
        {
            return Err(ReflectionError::InvalidEpsilon { index, value });
        }
        self.epsilons = epsilons;
        Ok(self)
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn indices(&self) -> &[MillerIndex] {
        &self.indices
    }

    pub fn centric_flags(&self) -> &[bool] {
        &self.centric
    }

    pub fn epsilons(&self) -> &[f64] {
        &self.epsilons
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn d_star_sq(&self) -> Vec<f64> {
        self.indices
            .iter()
            .map(|&index| self.cell.d_star_sq(index))
            .collect()
    }

    /// Resolution metric (1/d)³ per reflection.
    pub fn d_star_cubed(&self) -> Vec<f64> {
        self.indices
            .iter()
            .map(|&index| self.cell.d_star_sq(index).powf(1.5))
            .collect()
    }

    pub fn min_max_d_star_sq(&self) -> Option<(f64, f64)> {
        self.indices.iter().fold(None, |acc, &index| {
            let value = self.cell.d_star_sq(index);
            Some(match acc {
                None => (value, value),
                Some((lo, hi)) => (lo.min(value), hi.max(value)),
            })
        })
    }

    pub fn indices_all_eq(&self, other: &ReflectionSet) -> bool {
        self.indices == other.indices
    }

    pub fn select(&self, mask: &[bool]) -> Result<Self, ReflectionError> {
        check_length("selection", self.len(), mask.len())?;
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        Ok(self.take(&positions))
    }

    fn take(&self, positions: &[usize]) -> Self {
        Self {
            cell: self.cell.clone(),
            indices: positions.iter().map(|&i| self.indices[i]).collect(),
            centric: positions.iter().map(|&i| self.centric[i]).collect(),
            epsilons: positions.iter().map(|&i| self.epsilons[i]).collect(),
        }
    }
}

/// A reflection set carrying one datum per reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct MillerArray<T> {
    set: ReflectionSet,
    data: Vec<T>,
}

impl<T: Copy> MillerArray<T> {
    pub fn new(set: ReflectionSet, data: Vec<T>) -> Result<Self, ReflectionError> {
        check_length("data", set.len(), data.len())?;
        Ok(Self { set, data })
    }

    pub fn set(&self) -> &ReflectionSet {
        &self.set
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn indices(&self) -> &[MillerIndex] {
        self.set.indices()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map_data<U, F>(&self, f: F) -> MillerArray<U>
    where
        F: Fn(T) -> U,
    {
        MillerArray {
            set: self.set.clone(),
            data: self.data.iter().map(|&value| f(value)).collect(),
        }
    }

    pub fn select(&self, mask: &[bool]) -> Result<Self, ReflectionError> {
        let set = self.set.select(mask)?;
        let data = self
            .data
            .iter()
            .zip(mask)
            .filter_map(|(&value, &keep)| keep.then_some(value))
            .collect();
        Ok(Self { set, data })
    }

    /// Keeps the reflections whose index also occurs in `other`, reordered to
    /// follow `other`'s index order.
    pub fn common_set<U: Copy>(&self, other: &MillerArray<U>) -> Self {
        let lookup: HashMap<MillerIndex, usize> = self
            .indices()
            .iter()
            .enumerate()
            .map(|(i, &index)| (index, i))
            .collect();
        let positions: Vec<usize> = other
            .indices()
            .iter()
            .filter_map(|index| lookup.get(index).copied())
            .collect();
        Self {
            set: self.set.take(&positions),
            data: positions.iter().map(|&i| self.data[i]).collect(),
        }
    }

    pub fn indices_all_eq<U: Copy>(&self, other: &MillerArray<U>) -> bool {
        self.set.indices_all_eq(&other.set)
    }
}

impl<T: FriedelValue> MillerArray<T> {
    /// Replaces every index by its asymmetric-unit representative, applying the
    /// Friedel transform to data whose index was flipped.
    pub fn map_to_asu(&self, asu: &dyn AsymmetricUnit) -> Self {
        let mut set = self.set.clone();
        let mut data = self.data.clone();
        for (index, value) in set.indices.iter_mut().zip(data.iter_mut()) {
            let (mapped, flipped) = asu.map(*index);
            *index = mapped;
            if flipped {
                *value = value.friedel_mate();
            }
        }
        Self { set, data }
    }
}

impl MillerArray<f64> {
    /// Converts intensities to amplitudes; non-positive intensities map to zero.
    pub fn intensities_as_amplitudes(&self) -> Self {
        self.map_data(|intensity| if intensity > 0.0 { intensity.sqrt() } else { 0.0 })
    }
}

impl MillerArray<Complex64> {
    pub fn amplitudes(&self) -> MillerArray<f64> {
        self.map_data(|value| value.norm())
    }
}

/// Observed diffraction data as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedData {
    Amplitudes(MillerArray<f64>),
    Intensities(MillerArray<f64>),
    StructureFactors(MillerArray<Complex64>),
}

impl ObservedData {
    pub fn kind(&self) -> &'static str {
        match self {
            ObservedData::Amplitudes(_) => "amplitude",
            ObservedData::Intensities(_) => "intensity",
            ObservedData::StructureFactors(_) => "complex structure factor",
        }
    }

    pub fn is_real(&self) -> bool {
        !matches!(self, ObservedData::StructureFactors(_))
    }

    pub fn set(&self) -> &ReflectionSet {
        match self {
            ObservedData::Amplitudes(array) | ObservedData::Intensities(array) => array.set(),
            ObservedData::StructureFactors(array) => array.set(),
        }
    }
}
