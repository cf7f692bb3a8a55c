//! A partition of BWT positions into consecutive ranges.
//!
//! The partition is stored as a bit vector with rank support, with bit i set
//! iff position i is the first position of a range. Mapping against a
//! partition only behaves sensibly when the partition respects strands: the
//! rows covering the reverse complement of each range must again form a
//! range of the partition. That is the caller's contract; nothing here can
//! check it.

use std::io::Read;
use std::io::Write;

use simple_sds_sbwt::bit_vector::BitVector;
use simple_sds_sbwt::ops::{BitVec, Rank};
use simple_sds_sbwt::raw_vector::{AccessRaw, RawVector};
use simple_sds_sbwt::serialize::Serialize;

#[derive(Clone)]
pub struct RangeVector {
    marks: BitVector,
}

impl RangeVector {
    /// Builds a partition of `[0, len)` from the strictly increasing start
    /// positions of its ranges. The first range must start at position 0 so
    /// that every position belongs to some range.
    pub fn from_starts(starts: &[usize], len: usize) -> Self {
        assert!(!starts.is_empty() && starts[0] == 0, "a partition must cover position 0");
        let mut raw = RawVector::with_len(len, false);
        let mut prev = 0usize;
        for (i, &start) in starts.iter().enumerate() {
            assert!(start < len, "range start {} outside the partitioned space", start);
            assert!(i == 0 || start > prev, "range starts must be strictly increasing");
            raw.set_bit(start, true);
            prev = start;
        }
        let mut marks = BitVector::from(raw);
        marks.enable_rank();
        RangeVector { marks }
    }

    /// Number of positions covered by the partition.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.len() == 0
    }

    /// Number of ranges in the partition.
    pub fn num_ranges(&self) -> usize {
        self.marks.count_ones()
    }

    /// The range containing position `pos`.
    pub fn range_of(&self, pos: usize) -> usize {
        assert!(pos < self.marks.len(), "position {} outside the partitioned space", pos);
        self.marks.rank(pos + 1) - 1
    }

    /// Writes the partition to the writer and returns the number of bytes
    /// written. Load again with [RangeVector::load].
    pub fn serialize<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        self.marks.serialize(out)?;
        Ok(self.marks.size_in_bytes())
    }

    /// Loads a partition previously written with [RangeVector::serialize].
    pub fn load<R: Read>(input: &mut R) -> std::io::Result<Self> {
        let mut marks = BitVector::load(input)?;
        marks.enable_rank();
        Ok(RangeVector { marks })
    }
}
