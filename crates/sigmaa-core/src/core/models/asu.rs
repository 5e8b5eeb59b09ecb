use super::miller::MillerIndex;
use num_complex::Complex64;

/// Folds Miller indices into a canonical representative set.
///
/// Implementors return the representative of `index` together with a flag that
/// is `true` when the representative is the Friedel mate of the input, so that
/// phased data can be conjugated accordingly.
pub trait AsymmetricUnit: Sync {
    fn map(&self, index: MillerIndex) -> (MillerIndex, bool);

    fn contains(&self, index: MillerIndex) -> bool {
        self.map(index).0 == index
    }
}

/// Asymmetric unit of the Laue group -1, i.e. Friedel's law with no further
/// symmetry. A reflection is canonical when `l > 0`, or `l == 0 && h > 0`, or
/// `l == 0 && h == 0 && k >= 0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FriedelAsu;

impl FriedelAsu {
    #[inline]
    fn is_canonical(index: MillerIndex) -> bool {
        index.l > 0 || (index.l == 0 && (index.h > 0 || (index.h == 0 && index.k >= 0)))
    }
}

impl AsymmetricUnit for FriedelAsu {
    fn map(&self, index: MillerIndex) -> (MillerIndex, bool) {
        if Self::is_canonical(index) {
            (index, false)
        } else {
            (-index, true)
        }
    }
}

/// A per-reflection datum that knows how to transform into its Friedel mate.
pub trait FriedelValue: Copy {
    fn friedel_mate(self) -> Self;
}

impl FriedelValue for f64 {
    #[inline]
    fn friedel_mate(self) -> Self {
        self
    }
}

impl FriedelValue for bool {
    #[inline]
    fn friedel_mate(self) -> Self {
        self
    }
}

impl FriedelValue for Complex64 {
    #[inline]
    fn friedel_mate(self) -> Self {
        self.conj()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_indices_are_unchanged() {
        let asu = FriedelAsu;
        for index in [
            MillerIndex::new(-3, 2, 1),
            MillerIndex::new(1, -5, 0),
            MillerIndex::new(0, 4, 0),
            MillerIndex::new(0, 0, 0),
        ] {
            assert_eq!(asu.map(index), (index, false));
            assert!(asu.contains(index));
        }
    }

    #[test]
    fn non_canonical_indices_map_to_friedel_mate() {
        let asu = FriedelAsu;
        assert_eq!(
            asu.map(MillerIndex::new(3, -2, -1)),
            (MillerIndex::new(-3, 2, 1), true)
        );
        assert_eq!(
            asu.map(MillerIndex::new(-1, 5, 0)),
            (MillerIndex::new(1, -5, 0), true)
        );
        assert_eq!(
            asu.map(MillerIndex::new(0, -4, 0)),
            (MillerIndex::new(0, 4, 0), true)
        );
    }

    #[test]
    fn complex_friedel_mate_is_conjugate() {
        let value = Complex64::new(1.5, -2.0);
        assert_eq!(value.friedel_mate(), Complex64::new(1.5, 2.0));
        assert_eq!(2.5_f64.friedel_mate(), 2.5);
        assert!(true.friedel_mate());
    }
}
