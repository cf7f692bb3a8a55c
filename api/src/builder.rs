//! Index construction: suffix sorting, BWT derivation and the succinct
//! support structures, packaged behind a builder.

use bitvec::prelude::*;
use rayon::prelude::*;
use simple_sds_sbwt::bit_vector::BitVector;
use simple_sds_sbwt::ops::Rank;

use crate::csa::{Alphabet, Csa, OccVector};
use crate::fmd::FmdIndex;
use crate::util;
use crate::util::{base_rank, is_base, NUM_BASES};
use crate::SeqStream;

pub(crate) const END_MARKER: u8 = b'$';

/// Builds an [FmdIndex] from a stream of sequences.
///
/// By default every input sequence is indexed together with its reverse
/// complement, interleaved: input k becomes text 2k and its reverse
/// complement text 2k+1. Bidirectional search is only correct over a
/// collection closed under reverse complementation; turning
/// [add_rev_comp](FmdIndexBuilder::add_rev_comp) off asserts that the input
/// is already closed.
///
/// ```
/// use fmd::FmdIndexBuilder;
///
/// let index = FmdIndexBuilder::new().run_from_slices(&[b"ACGTT".as_slice()]);
/// assert_eq!(index.sequences(), 2);
/// assert_eq!(index.count(b"ACGTT", true).len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct FmdIndexBuilder {
    sample_rate: usize,
    add_rev_comp: bool,
}

impl Default for FmdIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FmdIndexBuilder {
    pub fn new() -> Self {
        FmdIndexBuilder { sample_rate: 32, add_rev_comp: true }
    }

    /// Suffix array sample rate: smaller is faster to locate and larger is
    /// smaller on disk. Text starts are always sampled.
    pub fn sample_rate(mut self, rate: usize) -> Self {
        assert!(rate >= 1, "the sample rate must be positive");
        self.sample_rate = rate;
        self
    }

    /// Whether to index the reverse complement of every input sequence
    /// alongside it. Defaults to true; with false the caller promises the
    /// input collection is already closed under reverse complementation.
    pub fn add_rev_comp(mut self, add: bool) -> Self {
        self.add_rev_comp = add;
        self
    }

    /// Reads every sequence from the stream and builds the index. Lower-case
    /// bases are folded to upper case; anything outside ACGTN panics.
    pub fn run<S: SeqStream>(&self, mut input: S) -> FmdIndex {
        let mut texts: Vec<Vec<u8>> = Vec::new();
        while let Some(seq) = input.stream_next() {
            let mut text = seq.to_vec();
            text.make_ascii_uppercase();
            assert!(!text.is_empty(), "cannot index an empty sequence");
            for &c in &text {
                assert!(is_base(c), "sequence contains a character outside ACGTN: {:?}", c as char);
            }
            if self.add_rev_comp {
                let rc = util::reverse_complement_of(&text);
                texts.push(text);
                texts.push(rc);
            } else {
                texts.push(text);
            }
        }
        assert!(!texts.is_empty(), "cannot build an index over no sequences");

        let total: usize = texts.iter().map(|t| t.len()).sum();
        log::info!("building an index over {} sequences, {} bases", texts.len(), total);
        FmdIndex::new(build_csa(&texts, self.sample_rate))
    }

    /// Builds the index from a slice of ascii sequences.
    pub fn run_from_slices(&self, seqs: &[&[u8]]) -> FmdIndex {
        self.run(util::SliceSeqStream::new(seqs))
    }

    /// Builds the index from a slice of ascii sequence vectors.
    pub fn run_from_vecs(&self, seqs: &[Vec<u8>]) -> FmdIndex {
        self.run(util::VecSeqStream::new(seqs))
    }
}

fn build_csa(texts: &[Vec<u8>], sample_rate: usize) -> Csa {
    let n_seqs = texts.len();
    let total: usize = texts.iter().map(|t| t.len() + 1).sum();
    let mut starts = Vec::with_capacity(n_seqs);
    let mut concat = Vec::with_capacity(total);
    for text in texts {
        starts.push(concat.len());
        concat.extend_from_slice(text);
        concat.push(END_MARKER);
    }
    let n = concat.len();

    log::debug!("sorting {} suffixes", n);
    let sa = suffix_array(&concat, n_seqs);

    let mut counts = [0usize; NUM_BASES];
    for &c in &concat {
        if let Some(b) = base_rank(c) {
            counts[b] += 1;
        }
    }

    log::debug!("building occurrence vectors");
    let bwt: Vec<u8> = sa.iter().map(|&p| if p == 0 { concat[n - 1] } else { concat[p - 1] }).collect();
    let mut occ_bits = vec![bitvec![u64, Lsb0; 0; n]; NUM_BASES];
    for (row, &c) in bwt.iter().enumerate() {
        if let Some(b) = base_rank(c) {
            occ_bits[b].set(row, true);
        }
    }
    let occ: Vec<Option<OccVector>> = occ_bits
        .into_par_iter()
        .enumerate()
        .map(|(b, bits)| {
            if counts[b] == 0 {
                None
            } else {
                Some(OccVector::new(util::bitvec_to_raw(bits)))
            }
        })
        .collect();
    let occ: [Option<OccVector>; NUM_BASES] = match occ.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!(),
    };

    // Sample the suffix array: every position at the sample rate, plus every
    // text start so locate walks never cross an end marker.
    let mut mark_bits = bitvec![u64, Lsb0; 0; n];
    let mut sample_values = Vec::new();
    for (row, &p) in sa.iter().enumerate() {
        if p % sample_rate == 0 || starts.binary_search(&p).is_ok() {
            mark_bits.set(row, true);
            sample_values.push(p as u64);
        }
    }
    let mut sample_marks = BitVector::from(util::bitvec_to_raw(mark_bits));
    sample_marks.enable_rank();

    Csa::from_parts(
        n_seqs,
        n,
        Alphabet::new(counts),
        occ,
        starts,
        sample_rate,
        sample_marks,
        sample_values,
    )
}

// Generalized suffix array by prefix doubling. End markers rank below every
// base from the first round, with ties between markers broken by text number,
// which is what puts the S end-marker rows at the head of the BWT.
fn suffix_array(concat: &[u8], n_seqs: usize) -> Vec<usize> {
    let n = concat.len();
    let mut rank: Vec<i64> = Vec::with_capacity(n);
    let mut end_markers_seen = 0i64;
    for &c in concat {
        if c == END_MARKER {
            rank.push(end_markers_seen);
            end_markers_seen += 1;
        } else {
            // Bases keep their byte order; initial ranks need not be dense.
            rank.push(n_seqs as i64 + c as i64);
        }
    }

    let mut sa: Vec<usize> = (0..n).collect();
    let mut next_rank: Vec<i64> = vec![0; n];
    let mut k = 1usize;
    loop {
        {
            let key = |i: usize| (rank[i], if i + k < n { rank[i + k] } else { -1 });
            sa.par_sort_unstable_by_key(|&i| key(i));
            next_rank[sa[0]] = 0;
            for w in 1..n {
                next_rank[sa[w]] = next_rank[sa[w - 1]] + (key(sa[w]) != key(sa[w - 1])) as i64;
            }
        }
        std::mem::swap(&mut rank, &mut next_rank);
        if rank[sa[n - 1]] == (n - 1) as i64 {
            break;
        }
        k *= 2;
    }
    sa
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::util::random_dna;

    #[test]
    fn suffix_sorting_small_example() {
        // ACA$ + C$: suffixes in order are $0, $1, A$, ACA$, C$, CA$.
        let concat = b"ACA$C$".to_vec();
        let sa = suffix_array(&concat, 2);
        assert_eq!(sa, vec![3, 5, 2, 0, 4, 1]);
    }

    #[test]
    fn suffix_sorting_matches_naive_on_random_input() {
        let texts = [random_dna(97, 61), random_dna(13, 62), b"AAAAAAAA".to_vec()];
        let mut concat = Vec::new();
        for text in &texts {
            concat.extend_from_slice(text);
            concat.push(END_MARKER);
        }
        let sa = suffix_array(&concat, texts.len());

        let mut expected: Vec<usize> = (0..concat.len()).collect();
        expected.sort_by(|&a, &b| {
            let (mut i, mut j) = (a, b);
            loop {
                match concat[i].cmp(&concat[j]) {
                    std::cmp::Ordering::Equal => {
                        if concat[i] == END_MARKER {
                            return i.cmp(&j);
                        }
                        i += 1;
                        j += 1;
                    }
                    other => return other,
                }
            }
        });
        assert_eq!(sa, expected);
    }

    #[test_log::test]
    fn reverse_complements_are_interleaved() {
        let index = FmdIndexBuilder::new().run_from_slices(&[b"ACGTT".as_slice(), b"GGA".as_slice()]);
        assert_eq!(index.sequences(), 4);
        assert_eq!(index.csa().extract(0), b"ACGTT".to_vec());
        assert_eq!(index.csa().extract(1), b"AACGT".to_vec());
        assert_eq!(index.csa().extract(2), b"GGA".to_vec());
        assert_eq!(index.csa().extract(3), b"TCC".to_vec());
    }

    #[test]
    fn lower_case_input_is_folded() {
        let index = FmdIndexBuilder::new().run_from_slices(&[b"acgtt".as_slice()]);
        assert_eq!(index.csa().extract(0), b"ACGTT".to_vec());
    }

    #[test]
    fn closure_can_be_left_to_the_caller() {
        let index =
            FmdIndexBuilder::new().add_rev_comp(false).run_from_slices(&[b"AAAA".as_slice(), b"TTTT".as_slice()]);
        assert_eq!(index.sequences(), 2);
        assert_eq!(index.count(b"AA", true).len(), 3);
    }

    #[test]
    #[should_panic(expected = "outside ACGTN")]
    fn invalid_bases_are_rejected() {
        let _ = FmdIndexBuilder::new().run_from_slices(&[b"ACGU".as_slice()]);
    }

    #[test]
    #[should_panic(expected = "empty sequence")]
    fn empty_sequences_are_rejected() {
        let _ = FmdIndexBuilder::new().run_from_slices(&[b"".as_slice()]);
    }

    #[test_log::test]
    fn sample_rate_does_not_change_results() {
        let input = random_dna(120, 71);
        for rate in [1usize, 3, 16, 64, 1024] {
            let index = FmdIndexBuilder::new().sample_rate(rate).run_from_slices(&[&input]);
            let hits = index.count(&input[10..30], true);
            assert_eq!(hits.len(), 1);
            let (text, offset) = index.csa().relative_position(index.csa().locate(hits.forward_start));
            assert_eq!((text, offset), (0, 10));
        }
    }
}
