//! Alphabet tables, reverse complementation and small helpers used across the crate.

use std::io::Cursor;
use std::io::Read;

use simple_sds_sbwt::raw_vector::RawVector;
use simple_sds_sbwt::serialize::Serialize;

/// The DNA bases recognized by the index. This is also the order in which
/// extension candidates and suffix-tree children are visited.
pub const ALPHABET: [u8; 5] = *b"ACGTN";

/// The bases ordered by the byte value of their reverse complements. Backward
/// extension subdivides the reverse-complement side of a search interval in
/// this order. Changing it silently corrupts the reverse side of every
/// interval, so don't.
pub const REV_ALPHABET: [u8; 5] = *b"TGCNA";

pub const NUM_BASES: usize = 5;

// Maps the ascii codes of A,C,G,T,N to their positions in ALPHABET.
// All other bytes map to 255. Other code depends on this choice: don't touch it.
const BASE_TO_RANK: [u8; 256] = {
    let mut table = [255u8; 256];
    table[b'A' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b'N' as usize] = 4;
    table
};

/// Position of `c` in [ALPHABET], or `None` for anything else.
pub fn base_rank(c: u8) -> Option<usize> {
    match BASE_TO_RANK[c as usize] {
        255 => None,
        r => Some(r as usize),
    }
}

/// Returns true if the byte is a valid DNA base. Only capital letters are
/// allowed, and N counts.
pub fn is_base(c: u8) -> bool {
    BASE_TO_RANK[c as usize] != 255
}

/// The reverse complement of a single base. N is its own reverse complement.
/// Panics on anything outside ACGTN; callers are expected to sanitize first.
pub fn reverse_complement(c: u8) -> u8 {
    match c {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'N' => b'N',
        _ => panic!("cannot reverse complement {:?}", c as char),
    }
}

/// Reverses the given ascii DNA sequence and replaces each base with its
/// complement. Panics on characters outside ACGTN.
pub fn reverse_complement_in_place(seq: &mut [u8]) {
    for c in seq.iter_mut() {
        *c = reverse_complement(*c);
    }
    seq.reverse();
}

/// The reverse complement of a sequence as a new vector.
pub fn reverse_complement_of(seq: &[u8]) -> Vec<u8> {
    let mut out = seq.to_vec();
    reverse_complement_in_place(&mut out);
    out
}

// Returns the number of bytes written
pub(crate) fn write_bytes<W: std::io::Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<usize> {
    out.write_all(bytes)?;
    Ok(bytes.len())
}

pub(crate) fn bitvec_to_raw(bv: bitvec::vec::BitVec<u64, bitvec::order::Lsb0>) -> RawVector {
    // Let's use the deserialization function in simple_sds_sbwt for a raw bitvector.
    // It requires the following header:
    let mut header = [0u64, 0u64]; // bits, words
    header[0] = bv.len() as u64; // Assumes little-endian byte order
    header[1] = bv.len().div_ceil(64) as u64;

    let header_bytes = bytemuck::cast_slice(&header);
    let raw_data = bytemuck::cast_slice(bv.as_raw_slice());
    let mut data_with_header = Cursor::new(header_bytes).chain(Cursor::new(raw_data));

    RawVector::load(&mut data_with_header).unwrap()
}

/// Creates a [crate::SeqStream] out of a slice of ascii sequences.
pub struct SliceSeqStream<'a> {
    slices: &'a [&'a [u8]],
    cur_slice_idx: usize,
}

impl<'a> SliceSeqStream<'a> {
    /// Creates a [crate::SeqStream] out of a slice of ascii sequences.
    pub fn new(slices: &'a [&'a [u8]]) -> Self {
        Self { slices, cur_slice_idx: 0 }
    }
}

impl crate::SeqStream for SliceSeqStream<'_> {
    fn stream_next(&mut self) -> Option<&[u8]> {
        if self.cur_slice_idx == self.slices.len() {
            None
        } else {
            let s = self.slices[self.cur_slice_idx];
            self.cur_slice_idx += 1;
            Some(s)
        }
    }
}

/// Creates a [crate::SeqStream] out of a slice of ascii vectors.
pub struct VecSeqStream<'a> {
    seqs: &'a [Vec<u8>],
    cur_seq_idx: usize,
}

impl<'a> VecSeqStream<'a> {
    /// Creates a [crate::SeqStream] out of a slice of ascii vectors.
    pub fn new(seqs: &'a [Vec<u8>]) -> Self {
        Self { seqs, cur_seq_idx: 0 }
    }
}

impl crate::SeqStream for VecSeqStream<'_> {
    fn stream_next(&mut self) -> Option<&[u8]> {
        if self.cur_seq_idx == self.seqs.len() {
            None
        } else {
            let s = &self.seqs[self.cur_seq_idx];
            self.cur_seq_idx += 1;
            Some(s)
        }
    }
}

#[cfg(test)]
pub(crate) fn random_dna(len: usize, seed: u64) -> Vec<u8> {
    use rand_chacha::rand_core::{RngCore, SeedableRng};

    let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| match rng.next_u64() % 4 {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            3 => b'T',
            _ => unreachable!(),
        })
        .collect()
}
