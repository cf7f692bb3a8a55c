//! The FMD-index proper: an index of DNA sequences over {A,C,G,T,N} in which
//! every text is present together with its reverse complement, so that an
//! ongoing search can be extended by a character at either end in O(1).
//!
//! See "Exploring single-sample SNP and INDEL calling with whole-genome de
//! novo assembly" (Li, 2012), which defines the FMD-index. One deliberate
//! departure from the paper: the reverse side of an interval is subdivided in
//! the byte order of the complemented bases (T,G,C,N,A), not with N last.

use std::io::Read;
use std::io::Write;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::bi_interval::BiInterval;
use crate::csa::Csa;
use crate::util;
use crate::util::{base_rank, is_base, reverse_complement, ALPHABET, NUM_BASES, REV_ALPHABET};

// When non-compatible changes to the serialization format occur, update the
// version number here to the current version
const SERIALIZATION_MAGIC_STRING: &[u8] = b"fmdfile-v0.1.0";

/// A read-only FMD-index over a sequence collection closed under reverse
/// complementation. Construct with [FmdIndexBuilder](crate::FmdIndexBuilder)
/// or load a serialized one with [FmdIndex::load].
///
/// All queries take `&self`; concurrent use from multiple threads needs no
/// synchronization. The only mutable state is a pair of relaxed telemetry
/// counters drained by [FmdIndex::stats].
pub struct FmdIndex {
    csa: Csa,
    pub(crate) extend_ops: AtomicU64,
    pub(crate) restart_ops: AtomicU64,
}

impl FmdIndex {
    pub fn new(csa: Csa) -> Self {
        FmdIndex { csa, extend_ops: AtomicU64::new(0), restart_ops: AtomicU64::new(0) }
    }

    /// The backing suffix-array structure.
    pub fn csa(&self) -> &Csa {
        &self.csa
    }

    /// Consumes the index and returns the backing structure.
    pub fn into_csa(self) -> Csa {
        self.csa
    }

    /// Number of texts in the collection, reverse complements included.
    pub fn sequences(&self) -> usize {
        self.csa.sequences()
    }

    /// Number of BWT rows (total collection length, end markers included).
    pub fn size(&self) -> usize {
        self.csa.size()
    }

    /// The interval covering every BWT row: the match of the empty pattern.
    pub(crate) fn whole_bwt(&self) -> BiInterval {
        BiInterval::new(0, 0, self.csa.size() as isize - 1)
    }

    /// The interval of all single-character matches of `c`, in BWT
    /// coordinates. Empty if `c` is not a base or does not occur.
    pub fn char_position(&self, c: u8) -> BiInterval {
        if !is_base(c) {
            return BiInterval::EMPTY;
        }
        let forward = match self.csa.alphabet().range(c) {
            Some(range) => range,
            None => return BiInterval::EMPTY,
        };
        let reverse = match self.csa.alphabet().range(reverse_complement(c)) {
            Some(range) => range,
            None => return BiInterval::EMPTY,
        };
        // Equal by closure of the collection under reverse complementation.
        debug_assert_eq!(forward.1 - forward.0, reverse.1 - reverse.0);
        let s = self.csa.sequences();
        BiInterval::new(forward.0 + s, reverse.0 + s, (forward.1 - forward.0) as isize)
    }

    /// Extends a search by one character in O(1): with `backward` the
    /// character is prepended to the pattern, otherwise appended. Ranges are
    /// in BWT coordinates.
    ///
    /// Soft failures (a character outside ACGTN, a base that never occurs, a
    /// match that runs out) all come back as an empty interval, which is
    /// absorbing under further extension.
    pub fn extend(&self, range: BiInterval, c: u8, backward: bool) -> BiInterval {
        if range.is_empty() || !is_base(c) {
            return BiInterval::EMPTY;
        }
        if !backward {
            // Forward extension is backward extension of the complement on
            // the flipped interval.
            return self.extend(range.flip(), reverse_complement(c), true).flip();
        }

        let s = self.csa.sequences();

        // One candidate per base, filled in by a small dynamic program. A
        // candidate whose occurrence vector is absent keeps length -1 but
        // still receives its slot in the reverse-range layout below.
        let mut candidates = [BiInterval::EMPTY; NUM_BASES];
        let mut accounted = 0usize;
        for (b, &base) in ALPHABET.iter().enumerate() {
            // Rows of characters sorting below this base, end markers included.
            let start = self.csa.alphabet().cumulative(base) + s - 1;
            match self.csa.occurrences(base) {
                None => {
                    candidates[b] = BiInterval::new(start + 1, 0, -1);
                }
                Some(occ) => {
                    let low = occ.rank(range.forward_start, true);
                    let high =
                        occ.rank((range.forward_start as isize + range.end_offset) as usize, false);
                    candidates[b] =
                        BiInterval::new(start + low, 0, high as isize - low as isize);
                    accounted += candidates[b].len();
                }
            }
        }

        // Rows followed by an end marker are in no occurrence vector; they
        // make up the difference and sit at the head of the reverse range.
        assert!(
            accounted <= range.len(),
            "per-base occurrence counts exceed the extended interval"
        );
        let end_markers = range.len() - accounted;

        // Subdivide the reverse range in complement byte order.
        let mut reverse = range.reverse_start + end_markers;
        for &base in REV_ALPHABET.iter() {
            let b = base_rank(base).unwrap();
            candidates[b].reverse_start = reverse;
            reverse += candidates[b].len();
        }

        candidates[base_rank(c).unwrap()]
    }

    /// The occurrence interval of a pattern, in SA coordinates, searching in
    /// the chosen direction. The empty pattern matches every row; a pattern
    /// that does not occur comes back as the empty interval.
    pub fn count(&self, pattern: &[u8], backward: bool) -> BiInterval {
        if pattern.is_empty() {
            return self.whole_bwt();
        }
        let mut position;
        if backward {
            position = self.char_position(*pattern.last().unwrap());
            if position.is_empty() {
                return position;
            }
            for &c in pattern[..pattern.len() - 1].iter().rev() {
                position = self.extend(position, c, true);
                if position.is_empty() {
                    return BiInterval::EMPTY;
                }
            }
        } else {
            position = self.char_position(pattern[0]);
            if position.is_empty() {
                return position;
            }
            for &c in &pattern[1..] {
                position = self.extend(position, c, false);
                if position.is_empty() {
                    return BiInterval::EMPTY;
                }
            }
        }
        self.to_sa_coordinates(position)
    }

    /// Shifts an interval from BWT coordinates down to SA coordinates.
    pub(crate) fn to_sa_coordinates(&self, mut position: BiInterval) -> BiInterval {
        let s = self.csa.sequences();
        position.forward_start -= s;
        position.reverse_start -= s;
        position
    }

    /// The collection position of every row of an SA-coordinate interval, in
    /// row order.
    pub fn locate_all(&self, position: &BiInterval) -> Vec<usize> {
        let mut out = Vec::with_capacity(position.len());
        for offset in 0..position.len() {
            out.push(self.csa.locate(position.forward_start + offset));
        }
        out
    }

    /// Drains the telemetry counters: extension steps and search restarts
    /// performed by the mapping operations since the last call. Best effort
    /// under concurrency, not a synchronization primitive.
    pub fn stats(&self) -> (u64, u64) {
        (self.extend_ops.swap(0, Ordering::Relaxed), self.restart_ops.swap(0, Ordering::Relaxed))
    }

    /// Writes the index to the writer and returns the number of bytes
    /// written. The telemetry counters are not persisted.
    pub fn serialize<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        let mut n_written = 0usize;
        let magic_string_length = [SERIALIZATION_MAGIC_STRING.len() as u8];
        n_written += util::write_bytes(out, &magic_string_length)?;
        n_written += util::write_bytes(out, SERIALIZATION_MAGIC_STRING)?;
        n_written += self.csa.serialize(out)?;
        Ok(n_written)
    }

    /// Loads an index previously written with [FmdIndex::serialize].
    pub fn load<R: Read>(input: &mut R) -> std::io::Result<Self> {
        let mut magic_string_length = [0u8];
        input.read_exact(&mut magic_string_length)?;
        let mut magic_string_buf = vec![0u8; magic_string_length[0] as usize];
        input.read_exact(&mut magic_string_buf)?;
        if magic_string_buf != SERIALIZATION_MAGIC_STRING {
            panic!(
                "Error loading FMD index: incorrect version string: expected \"{}\", found \"{}\"",
                String::from_utf8_lossy(SERIALIZATION_MAGIC_STRING),
                String::from_utf8_lossy(&magic_string_buf)
            );
        }
        Ok(FmdIndex::new(Csa::load(input)?))
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::builder::FmdIndexBuilder;
    use crate::util::{random_dna, reverse_complement_of};

    fn closed_collection(inputs: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut texts = Vec::new();
        for &input in inputs {
            texts.push(input.to_vec());
            texts.push(reverse_complement_of(input));
        }
        texts
    }

    fn build(inputs: &[&[u8]]) -> (FmdIndex, Vec<Vec<u8>>) {
        let index = FmdIndexBuilder::new().sample_rate(4).run_from_slices(inputs);
        (index, closed_collection(inputs))
    }

    fn naive_occurrences(texts: &[Vec<u8>], pattern: &[u8]) -> usize {
        texts
            .iter()
            .map(|t| {
                if pattern.len() > t.len() {
                    0
                } else {
                    t.windows(pattern.len()).filter(|w| *w == pattern).count()
                }
            })
            .sum()
    }

    // Substrings worth probing: all short windows of the texts plus some
    // misses.
    fn probe_patterns(texts: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let mut patterns: Vec<Vec<u8>> = Vec::new();
        for text in texts {
            for len in 1..=text.len().min(6) {
                for window in text.windows(len).step_by(3) {
                    patterns.push(window.to_vec());
                }
            }
        }
        patterns.push(b"NAN".to_vec());
        patterns.push(random_dna(5, 99));
        patterns.push(random_dna(9, 100));
        patterns
    }

    #[test]
    fn count_agrees_with_naive_in_both_directions() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        for pattern in probe_patterns(&texts) {
            let expected = naive_occurrences(&texts, &pattern);
            let backward = index.count(&pattern, true);
            let forward = index.count(&pattern, false);
            assert_eq!(backward.len(), expected, "pattern {:?}", String::from_utf8_lossy(&pattern));
            assert_eq!(forward.len(), expected, "pattern {:?}", String::from_utf8_lossy(&pattern));
            if !backward.is_empty() {
                assert_eq!(backward, forward);
            }
        }
    }

    #[test]
    fn count_positions_are_real_occurrences() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        for pattern in probe_patterns(&texts) {
            let hits = index.count(&pattern, true);
            for position in index.locate_all(&hits) {
                let (text, offset) = index.csa().relative_position(position);
                assert_eq!(&texts[text][offset..offset + pattern.len()], pattern.as_slice());
            }
        }
    }

    #[test]
    fn empty_pattern_matches_everything() {
        let (index, _) = build(&[b"ACGT"]);
        assert_eq!(index.count(b"", true).len(), index.size());
        assert_eq!(index.count(b"", false).len(), index.size());
    }

    #[test]
    fn forward_and_reverse_sides_stay_equal_in_length() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        for pattern in probe_patterns(&texts) {
            // Walk backward across the pattern checking the interval of the
            // reverse side against the reverse complement of each suffix.
            let mut position = index.char_position(pattern[pattern.len() - 1]);
            for step in (0..pattern.len() - 1).rev() {
                position = index.extend(position, pattern[step], true);
                if position.is_empty() {
                    break;
                }
                let suffix = &pattern[step..];
                let rc = reverse_complement_of(suffix);
                assert_eq!(position.len(), naive_occurrences(&texts, &rc));
                assert_eq!(position.len(), naive_occurrences(&texts, suffix));
            }
        }
    }

    #[test]
    fn reverse_side_is_the_reverse_complement_interval() {
        let (index, _) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        // The flip of the interval of P is the interval of revcomp(P): its
        // forward side must locate real occurrences of revcomp(P).
        for pattern in [b"GAT".as_slice(), b"TTAC".as_slice(), b"CC".as_slice(), b"ACA".as_slice()] {
            let position = index.count(pattern, true);
            let rc = reverse_complement_of(pattern);
            let rc_position = index.count(&rc, true);
            assert_eq!(position.flip(), rc_position);
        }
    }

    #[test]
    fn forward_extension_matches_backward_on_flip() {
        let (index, _) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        for seed in [b'A', b'C', b'G', b'T'] {
            let position = index.char_position(seed);
            for c in ALPHABET {
                let forward = index.extend(position, c, false);
                let via_flip = index.extend(position.flip(), reverse_complement(c), true).flip();
                assert_eq!(forward, via_flip);
            }
        }
    }

    #[test]
    fn empty_interval_is_absorbing() {
        let (index, _) = build(&[b"ACGT"]);
        for c in ALPHABET {
            assert!(index.extend(BiInterval::EMPTY, c, true).is_empty());
            assert!(index.extend(BiInterval::EMPTY, c, false).is_empty());
        }
    }

    #[test]
    fn invalid_characters_give_empty_intervals() {
        let (index, _) = build(&[b"ACGT"]);
        let position = index.char_position(b'A');
        assert!(index.extend(position, b'X', true).is_empty());
        assert!(index.extend(position, b'x', false).is_empty());
        assert!(index.extend(position, b'$', true).is_empty());
        assert!(index.char_position(b'q').is_empty());
    }

    #[test]
    fn extension_candidates_partition_the_parent() {
        // Backward-extending with every base plus the end-marker share must
        // account for every row of the parent interval.
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCNGTT"]);
        for pattern in probe_patterns(&texts) {
            let position = index.count(&pattern, true);
            if position.is_empty() {
                continue;
            }
            let bwt_position = BiInterval::new(
                position.forward_start + index.sequences(),
                position.reverse_start + index.sequences(),
                position.end_offset,
            );
            let extended: usize =
                ALPHABET.iter().map(|&c| index.extend(bwt_position, c, true).len()).sum();
            // The rows not reachable by any base are occurrences at the very
            // start of a text.
            let at_text_start = texts
                .iter()
                .filter(|t| t.len() >= pattern.len() && t[..pattern.len()] == pattern[..])
                .count();
            assert_eq!(extended + at_text_start, bwt_position.len());
        }
    }

    #[test]
    fn absent_bases_still_get_layout_positions() {
        // A collection over C/G only: extending toward A or T finds nothing,
        // but the forward extension used for dead-end detection must still
        // report where the missing child would begin.
        let (index, _) = build(&[b"CCGG"]);
        let position = index.count(b"CCGG", true);
        let bwt_position = BiInterval::new(
            position.forward_start + index.sequences(),
            position.reverse_start + index.sequences(),
            position.end_offset,
        );
        let child_a = index.extend(bwt_position, b'A', false);
        assert!(child_a.is_empty());
        // "CCGG" only occurs at the end of a text, so the would-be child
        // starts past the whole end-marker share.
        assert_eq!(child_a.forward_start, bwt_position.forward_start + bwt_position.len());
    }

    #[test]
    fn serialization_round_trip() {
        let inputs: Vec<Vec<u8>> = vec![random_dna(50, 11), random_dna(33, 12)];
        let refs: Vec<&[u8]> = inputs.iter().map(|v| v.as_slice()).collect();
        let index = FmdIndexBuilder::new().run_from_slices(&refs);

        let mut buf = Vec::<u8>::new();
        index.serialize(&mut buf).unwrap();
        let loaded = FmdIndex::load(&mut buf.as_slice()).unwrap();

        assert_eq!(loaded.sequences(), index.sequences());
        assert_eq!(loaded.size(), index.size());
        for pattern in [&inputs[0][..10], &inputs[1][..7], b"ACGT".as_slice()] {
            assert_eq!(loaded.count(pattern, true), index.count(pattern, true));
        }
    }

    #[test]
    #[should_panic(expected = "incorrect version string")]
    fn load_rejects_unknown_format() {
        let bogus = [3u8, b'f', b'o', b'o'];
        let _ = FmdIndex::load(&mut bogus.as_slice());
    }
}
