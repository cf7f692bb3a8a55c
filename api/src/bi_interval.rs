//! The state of a bidirectional search: two equal-length ranges of BWT rows,
//! one matching the pattern and one matching its reverse complement.

use crate::range_vector::RangeVector;

/// A pair of equal-length BWT ranges, stored as the two start rows and a
/// shared length. The ranges can be in either SA space (not counting the
/// end-marker rows at the head of the BWT) or in BWT space; the functions
/// producing them document which.
///
/// `end_offset` is the number of rows covered minus one, so that a value of
/// -1 encodes the canonical empty interval. The empty interval is absorbing
/// under extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BiInterval {
    /// First row of the range matching the pattern itself.
    pub forward_start: usize,
    /// First row of the range matching the reverse complement of the pattern.
    pub reverse_start: usize,
    /// Length of either range, minus one. Negative means empty.
    pub end_offset: isize,
}

impl BiInterval {
    pub const EMPTY: BiInterval = BiInterval {
        forward_start: 0,
        reverse_start: 0,
        end_offset: -1,
    };

    pub fn new(forward_start: usize, reverse_start: usize, end_offset: isize) -> Self {
        BiInterval { forward_start, reverse_start, end_offset }
    }

    pub fn is_empty(&self) -> bool {
        self.end_offset < 0
    }

    /// Number of rows covered, identical on the forward and reverse side.
    pub fn len(&self) -> usize {
        if self.end_offset < 0 {
            0
        } else {
            self.end_offset as usize + 1
        }
    }

    /// Swaps the two strands, turning the interval of a pattern into the
    /// interval of its reverse complement. Its own inverse.
    #[must_use]
    pub fn flip(&self) -> Self {
        BiInterval {
            forward_start: self.reverse_start,
            reverse_start: self.forward_start,
            end_offset: self.end_offset,
        }
    }

    /// The partition range containing the whole forward side, or -1 when the
    /// two endpoints fall in different ranges or the interval is empty.
    pub fn range(&self, ranges: &RangeVector) -> i64 {
        if self.is_empty() {
            return -1;
        }
        let first = ranges.range_of(self.forward_start);
        let last = ranges.range_of(self.forward_start + self.end_offset as usize);
        if first == last {
            first as i64
        } else {
            -1
        }
    }

    /// How many partition ranges the forward side overlaps.
    pub fn range_count(&self, ranges: &RangeVector) -> usize {
        if self.is_empty() {
            return 0;
        }
        let first = ranges.range_of(self.forward_start);
        let last = ranges.range_of(self.forward_start + self.end_offset as usize);
        last - first + 1
    }
}

impl std::fmt::Display for BiInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "(empty)")
        } else {
            write!(
                f,
                "({}-{}|{}-{})",
                self.forward_start,
                self.forward_start + self.end_offset as usize,
                self.reverse_start,
                self.reverse_start + self.end_offset as usize,
            )
        }
    }
}
