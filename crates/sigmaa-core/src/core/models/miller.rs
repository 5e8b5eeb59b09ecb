use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

/// Integer triple identifying a diffraction reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MillerIndex {
    pub h: i32,
    pub k: i32,
    pub l: i32,
}

impl MillerIndex {
    pub const fn new(h: i32, k: i32, l: i32) -> Self {
        Self { h, k, l }
    }

    #[inline]
    pub fn is_origin(&self) -> bool {
        self.h == 0 && self.k == 0 && self.l == 0
    }

    #[inline]
    pub fn as_f64(&self) -> [f64; 3] {
        [self.h as f64, self.k as f64, self.l as f64]
    }
}

impl Neg for MillerIndex {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.h, -self.k, -self.l)
    }
}

impl From<[i32; 3]> for MillerIndex {
    fn from(hkl: [i32; 3]) -> Self {
        Self::new(hkl[0], hkl[1], hkl[2])
    }
}

impl fmt::Display for MillerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.h, self.k, self.l)
    }
}
