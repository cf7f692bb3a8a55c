//! An FMD-index over the DNA alphabet {A,C,G,T,N}.
//!
//! The index stores every sequence of a collection together with its reverse
//! complement, so one search finds forward and reverse-complement occurrences
//! at the same time, and a search interval can be extended by a character at
//! either end in O(1) ([FmdIndex::extend]). On top of the bidirectional
//! search sit pattern counting ([FmdIndex::count]), per-base mapping of query
//! sequences to unique (text, offset) positions ([FmdIndex::map]) or to
//! ranges of a caller-supplied partition of BWT space
//! ([FmdIndex::map_to_ranges]), and a depth-bounded iterator over every
//! string occurring in the collection ([FmdIndex::suffixes]).
//!
//! The design follows "Exploring single-sample SNP and INDEL calling with
//! whole-genome de novo assembly" (Li, 2012), which defines the FMD-index.
//!
//! # Example
//!
//! ```
//! use fmd::FmdIndexBuilder;
//!
//! // "GATTACA" is indexed together with its reverse complement "TGTAATC".
//! let index = FmdIndexBuilder::new().run_from_slices(&[b"GATTACA".as_slice()]);
//!
//! // Counting sees both strands: "TAC" occurs forward, "GTA" on the other.
//! assert_eq!(index.count(b"TAC", true).len(), 1);
//! assert_eq!(index.count(b"GTA", true).len(), 1);
//!
//! // Every base of the query that has enough context maps to text 0.
//! let mappings = index.map(b"GATTACA", 0, None);
//! assert!(mappings.iter().any(|m| m.is_mapped && m.text == 0));
//! ```

pub mod bi_interval;
pub mod builder;
pub mod csa;
pub mod fmd;
pub mod iterator;
pub mod mapping;
pub mod range_vector;
pub mod util;

pub use bi_interval::BiInterval;
pub use builder::FmdIndexBuilder;
pub use csa::Csa;
pub use fmd::FmdIndex;
pub use iterator::SuffixIterator;
pub use mapping::{MapAttemptResult, Mapping};
pub use range_vector::RangeVector;

/// An interface to read sequences one at a time from some source.
pub trait SeqStream {
    /// Returns the next sequence in the stream, or `None` at the end. The
    /// slice is only valid until the next call.
    fn stream_next(&mut self) -> Option<&[u8]>;
}
