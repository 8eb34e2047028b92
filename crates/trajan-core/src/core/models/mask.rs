use std::ops::{BitAnd, BitOr, Not};

/// A bitset over the atom indices of a frame.
///
/// Produced by selection evaluation and by frame flag queries, consumed by the
/// alignment kernels and the selection-scoped metrics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AtomMask {
    bits: Vec<bool>,
}

impl AtomMask {
    pub fn none(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    pub fn all(len: usize) -> Self {
        Self {
            bits: vec![true; len],
        }
    }

    pub fn from_fn(len: usize, f: impl FnMut(usize) -> bool) -> Self {
        Self {
            bits: (0..len).map(f).collect(),
        }
    }

    /// Builds a mask from explicit indices; out-of-range indices are ignored and
    /// repeated indices simply set the same bit again.
    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        let mut mask = Self::none(len);
        for &index in indices {
            mask.set(index, true);
        }
        mask
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, value: bool) {
        if let Some(bit) = self.bits.get_mut(index) {
            *bit = value;
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }
}

impl BitAnd for &AtomMask {
    type Output = AtomMask;

    fn bitand(self, rhs: Self) -> AtomMask {
        AtomMask::from_fn(self.len().max(rhs.len()), |i| self.get(i) && rhs.get(i))
    }
}

impl BitOr for &AtomMask {
    type Output = AtomMask;

    fn bitor(self, rhs: Self) -> AtomMask {
        AtomMask::from_fn(self.len().max(rhs.len()), |i| self.get(i) || rhs.get(i))
    }
}

impl Not for &AtomMask {
    type Output = AtomMask;

    fn not(self) -> AtomMask {
        AtomMask::from_fn(self.len(), |i| !self.get(i))
    }
}
