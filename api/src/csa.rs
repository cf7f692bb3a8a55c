//! The Burrows-Wheeler backend behind the FMD layer: per-base rank vectors,
//! the C array, a sampled suffix array for locating, and per-sequence
//! bookkeeping over a collection of texts.
//!
//! The collection is conceptually the concatenation `T0 $ T1 $ ...` where
//! each text is followed by its own end marker. End markers sort below every
//! base and among themselves by text number, so the rows of the suffixes
//! starting at an end marker occupy BWT positions `[0, S)` for a collection
//! of S texts. End markers are never represented in the per-base rank
//! vectors; the extension logic accounts for them analytically.

use std::io::Read;
use std::io::Write;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use simple_sds_sbwt::bit_vector::BitVector;
use simple_sds_sbwt::ops::{BitVec, Rank};
use simple_sds_sbwt::raw_vector::RawVector;
use simple_sds_sbwt::serialize::Serialize;

use crate::util;
use crate::util::{base_rank, ALPHABET, NUM_BASES};

/// Occurrence vector for a single base: one bit per BWT row, set iff the row's
/// BWT character is that base.
///
/// Rank queries come in the two boundary conventions of the original RLCSA
/// vectors: the plain variant counts set bits in `[0, pos]`, and the
/// `at_least` variant returns the 1-based rank of the first set bit at or
/// after `pos`. The `at_least` variant is the one matching the rank notation
/// of Li (2012).
#[derive(Clone)]
pub struct OccVector {
    bits: BitVector,
}

impl OccVector {
    pub(crate) fn new(raw: RawVector) -> Self {
        let mut bits = BitVector::from(raw);
        bits.enable_rank();
        OccVector { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Number of set bits in the whole vector.
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn rank(&self, pos: usize, at_least: bool) -> usize {
        if at_least {
            self.ones_before(pos) + 1
        } else {
            self.ones_through(pos)
        }
    }

    /// Set bits strictly before `pos`.
    pub(crate) fn ones_before(&self, pos: usize) -> usize {
        self.bits.rank(pos.min(self.bits.len()))
    }

    /// Set bits at or before `pos`.
    pub(crate) fn ones_through(&self, pos: usize) -> usize {
        self.bits.rank((pos + 1).min(self.bits.len()))
    }

    fn marked(&self, pos: usize) -> bool {
        self.bits.get(pos)
    }

    fn serialize<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        self.bits.serialize(out)?;
        Ok(self.bits.size_in_bytes())
    }

    fn load<R: Read>(input: &mut R) -> std::io::Result<Self> {
        let mut bits = BitVector::load(input)?;
        bits.enable_rank();
        Ok(OccVector { bits })
    }
}

/// The C array over {A,C,G,T,N}: per-base totals and prefix sums in byte
/// order (A < C < G < N < T). End markers are excluded; callers add the
/// number of sequences where BWT coordinates are needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alphabet {
    counts: [usize; NUM_BASES],
}

impl Alphabet {
    pub(crate) fn new(counts: [usize; NUM_BASES]) -> Self {
        Alphabet { counts }
    }

    /// Occurrences of the base in the collection.
    pub fn count(&self, c: u8) -> usize {
        base_rank(c).map_or(0, |b| self.counts[b])
    }

    /// Number of characters with a byte value strictly below `c`.
    pub fn cumulative(&self, c: u8) -> usize {
        ALPHABET
            .iter()
            .enumerate()
            .filter(|&(_, &base)| base < c)
            .map(|(b, _)| self.counts[b])
            .sum()
    }

    /// Inclusive SA-coordinate range of the suffixes starting with `c`, or
    /// `None` if the base does not occur.
    pub fn range(&self, c: u8) -> Option<(usize, usize)> {
        let count = self.count(c);
        if count == 0 {
            return None;
        }
        let low = self.cumulative(c);
        Some((low, low + count - 1))
    }
}

/// A compressed suffix array over a text collection: everything the
/// bidirectional search layer consumes, and nothing else.
#[derive(Clone)]
pub struct Csa {
    n_seqs: usize,
    data_size: usize,
    alphabet: Alphabet,
    occ: [Option<OccVector>; NUM_BASES],
    starts: Vec<usize>,
    sample_rate: usize,
    sample_marks: BitVector,
    sample_values: Vec<u64>,
}

impl Csa {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        n_seqs: usize,
        data_size: usize,
        alphabet: Alphabet,
        occ: [Option<OccVector>; NUM_BASES],
        starts: Vec<usize>,
        sample_rate: usize,
        sample_marks: BitVector,
        sample_values: Vec<u64>,
    ) -> Self {
        Csa { n_seqs, data_size, alphabet, occ, starts, sample_rate, sample_marks, sample_values }
    }

    /// Number of texts in the collection.
    pub fn sequences(&self) -> usize {
        self.n_seqs
    }

    /// Total length of the collection, end markers included. This is also the
    /// number of BWT rows.
    pub fn size(&self) -> usize {
        self.data_size
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The occurrence vector of a base, or `None` when the base never occurs
    /// (or `c` is not a base).
    pub fn occurrences(&self, c: u8) -> Option<&OccVector> {
        self.occ[base_rank(c)?].as_ref()
    }

    /// Length of a stored text, end marker not included.
    pub fn sequence_length(&self, text_id: usize) -> usize {
        assert!(text_id < self.n_seqs);
        let end = if text_id + 1 < self.n_seqs {
            self.starts[text_id + 1]
        } else {
            self.data_size
        };
        end - self.starts[text_id] - 1
    }

    /// The BWT character of a row, or `None` for an end marker.
    pub fn bwt_char(&self, row: usize) -> Option<u8> {
        assert!(row < self.data_size);
        for (b, &base) in ALPHABET.iter().enumerate() {
            if let Some(occ) = &self.occ[b] {
                if occ.marked(row) {
                    return Some(base);
                }
            }
        }
        None
    }

    /// One backward search step on an inclusive range of BWT rows. Returns
    /// `None` when the step empties the range or `c` does not occur.
    pub fn lf(&self, range: (usize, usize), c: u8) -> Option<(usize, usize)> {
        let occ = self.occurrences(c)?;
        let base = self.n_seqs + self.alphabet.cumulative(c);
        let low = base + occ.ones_before(range.0);
        let high = base + occ.ones_through(range.1);
        if high == low {
            None
        } else {
            Some((low, high - 1))
        }
    }

    fn lf_step(&self, row: usize, c: u8) -> usize {
        let occ = self.occurrences(c).expect("LF step on an absent character");
        self.n_seqs + self.alphabet.cumulative(c) + occ.ones_before(row)
    }

    /// Classical one-directional backward search. Returns the inclusive
    /// SA-coordinate range of the pattern, or `None` if it does not occur.
    pub fn count(&self, pattern: &[u8]) -> Option<(usize, usize)> {
        if pattern.is_empty() {
            return Some((0, self.data_size - self.n_seqs - 1));
        }
        let mut range = (0, self.data_size - 1);
        for &c in pattern.iter().rev() {
            range = self.lf(range, c)?;
        }
        Some((range.0 - self.n_seqs, range.1 - self.n_seqs))
    }

    /// Position in the collection of the suffix with the given SA-coordinate
    /// rank, by walking the BWT backward to the nearest sampled row. Every
    /// text start is sampled, so the walk never crosses an end marker.
    pub fn locate(&self, sa_index: usize) -> usize {
        assert!(sa_index < self.data_size - self.n_seqs, "SA index out of range");
        let mut row = sa_index + self.n_seqs;
        let mut steps = 0;
        loop {
            if self.sample_marks.get(row) {
                return self.sample_values[self.sample_marks.rank(row)] as usize + steps;
            }
            let c = self.bwt_char(row).expect("walked past an unsampled text start");
            row = self.lf_step(row, c);
            steps += 1;
        }
    }

    /// Translates a position in the collection into a (text, offset) pair.
    pub fn relative_position(&self, pos: usize) -> (usize, usize) {
        assert!(pos < self.data_size);
        let text = self.starts.partition_point(|&start| start <= pos) - 1;
        (text, pos - self.starts[text])
    }

    /// Reconstructs a stored text by walking the BWT backward from the row of
    /// its end marker.
    pub fn extract(&self, text_id: usize) -> Vec<u8> {
        assert!(text_id < self.n_seqs);
        let mut out = Vec::with_capacity(self.sequence_length(text_id));
        let mut row = text_id;
        while let Some(c) = self.bwt_char(row) {
            out.push(c);
            row = self.lf_step(row, c);
        }
        out.reverse();
        out
    }

    /// Writes the structure to the writer and returns the number of bytes
    /// written. Load again with [Csa::load].
    pub fn serialize<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        let mut n_written = 0usize;

        n_written += util::write_bytes(out, &(self.n_seqs as u64).to_le_bytes())?;
        n_written += util::write_bytes(out, &(self.data_size as u64).to_le_bytes())?;
        n_written += util::write_bytes(out, &(self.sample_rate as u64).to_le_bytes())?;

        for b in 0..NUM_BASES {
            n_written += util::write_bytes(out, &(self.alphabet.counts[b] as u64).to_le_bytes())?;
        }

        n_written += util::write_bytes(out, &(self.starts.len() as u64).to_le_bytes())?;
        for &start in &self.starts {
            n_written += util::write_bytes(out, &(start as u64).to_le_bytes())?;
        }

        for b in 0..NUM_BASES {
            match &self.occ[b] {
                None => n_written += util::write_bytes(out, &[0u8])?,
                Some(occ) => {
                    n_written += util::write_bytes(out, &[1u8])?;
                    n_written += occ.serialize(out)?;
                }
            }
        }

        self.sample_marks.serialize(out)?;
        n_written += self.sample_marks.size_in_bytes();

        n_written += util::write_bytes(out, &(self.sample_values.len() as u64).to_le_bytes())?;
        for &value in &self.sample_values {
            n_written += util::write_bytes(out, &value.to_le_bytes())?;
        }

        Ok(n_written)
    }

    /// Loads a structure previously written with [Csa::serialize].
    pub fn load<R: Read>(input: &mut R) -> std::io::Result<Self> {
        let n_seqs = input.read_u64::<LittleEndian>()? as usize;
        let data_size = input.read_u64::<LittleEndian>()? as usize;
        let sample_rate = input.read_u64::<LittleEndian>()? as usize;

        let mut counts = [0usize; NUM_BASES];
        for count in counts.iter_mut() {
            *count = input.read_u64::<LittleEndian>()? as usize;
        }

        let starts_len = input.read_u64::<LittleEndian>()? as usize;
        let mut starts = Vec::with_capacity(starts_len);
        for _ in 0..starts_len {
            starts.push(input.read_u64::<LittleEndian>()? as usize);
        }

        let mut occ: [Option<OccVector>; NUM_BASES] = Default::default();
        for slot in occ.iter_mut() {
            let mut present = [0u8];
            input.read_exact(&mut present)?;
            if present[0] != 0 {
                *slot = Some(OccVector::load(input)?);
            }
        }

        let mut sample_marks = BitVector::load(input)?;
        sample_marks.enable_rank();

        let values_len = input.read_u64::<LittleEndian>()? as usize;
        let mut sample_values = Vec::with_capacity(values_len);
        for _ in 0..values_len {
            sample_values.push(input.read_u64::<LittleEndian>()?);
        }

        Ok(Csa {
            n_seqs,
            data_size,
            alphabet: Alphabet::new(counts),
            occ,
            starts,
            sample_rate,
            sample_marks,
            sample_values,
        })
    }
}
