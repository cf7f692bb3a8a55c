//! Base-level mapping of query sequences onto the indexed collection.
//!
//! Each query base is assigned the unique (text, offset) it must correspond
//! to, given the shortest stretch of left context that makes its search
//! interval a singleton, or reported unmapped when no amount of available
//! context disambiguates it. A variant maps bases into a caller-supplied
//! partition of BWT space instead of exact positions.

use std::sync::atomic::Ordering;

use crate::bi_interval::BiInterval;
use crate::fmd::FmdIndex;
use crate::range_vector::RangeVector;

/// Where one query base landed: a (text, offset) pair when the base was
/// pinned to a unique position, with `is_mapped` false otherwise (the pair is
/// meaningless then).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub text: usize,
    pub offset: usize,
    pub is_mapped: bool,
}

impl Mapping {
    pub fn to(text: usize, offset: usize) -> Self {
        Mapping { text, offset, is_mapped: true }
    }

    pub fn unmapped() -> Self {
        Mapping { text: 0, offset: 0, is_mapped: false }
    }
}

/// Working state carried between bases while mapping: the current interval,
/// whether the last step settled the current base, and how many characters of
/// context the interval covers.
///
/// `is_mapped` together with a singleton interval means the last extension
/// pinned a unique answer; together with an empty interval it means the last
/// extension overshot and the caller should restart on the same base.
#[derive(Clone, Copy, Debug)]
pub struct MapAttemptResult {
    pub position: BiInterval,
    pub is_mapped: bool,
    pub characters: usize,
}

impl Default for MapAttemptResult {
    fn default() -> Self {
        MapAttemptResult { position: BiInterval::EMPTY, is_mapped: false, characters: 0 }
    }
}

impl FmdIndex {
    /// Attempts to pin `pattern[index]` from scratch: starting with the base
    /// itself, extends backward until the interval becomes a singleton
    /// (mapped), becomes empty (unmapped; the last non-empty interval is
    /// returned so the caller can retry the same base), or runs out of
    /// pattern (unmapped).
    pub fn map_position(&self, pattern: &[u8], index: usize) -> MapAttemptResult {
        let mut result = MapAttemptResult {
            position: self.char_position(pattern[index]),
            is_mapped: false,
            characters: 1,
        };
        if result.position.is_empty() {
            return result;
        }
        if result.position.len() == 1 {
            result.is_mapped = true;
            return result;
        }
        for i in (0..index).rev() {
            let next = self.extend(result.position, pattern[i], true);
            self.extend_ops.fetch_add(1, Ordering::Relaxed);
            if next.is_empty() {
                return result;
            }
            result.position = next;
            result.characters += 1;
            if next.len() == 1 {
                result.is_mapped = true;
                return result;
            }
        }
        result
    }

    /// Maps every base of `query[start..start + length]` to its unique
    /// position in the collection, or to nothing. `length` of `None` means to
    /// the end of the query.
    ///
    /// The reported offset is the position of the queried base itself, not of
    /// the start of the matched context. Between bases the search interval is
    /// reused: after a successful restart the interval is extended forward
    /// with each following base until it runs out, which costs O(1) per base
    /// on the happy path.
    pub fn map(&self, query: &[u8], start: usize, length: Option<usize>) -> Vec<Mapping> {
        assert!(start <= query.len(), "mapping window outside the query");
        let length = length.unwrap_or(query.len() - start);
        assert!(start + length <= query.len(), "mapping window outside the query");

        let mut mappings = Vec::with_capacity(length);
        let mut location = MapAttemptResult::default();
        let mut i = start;
        while i < start + length {
            if location.position.is_empty() {
                // Start over from this base with no context.
                self.restart_ops.fetch_add(1, Ordering::Relaxed);
                location = self.map_position(query, i);
            } else {
                // Try to carry the context from the previous base.
                location.position = self.extend(location.position, query[i], false);
                location.characters += 1;
                self.extend_ops.fetch_add(1, Ordering::Relaxed);
            }

            if location.is_mapped && location.position.len() == 1 {
                let sa_index = location.position.forward_start - self.sequences();
                let (text, offset) = self.csa().relative_position(self.csa().locate(sa_index));
                mappings.push(Mapping::to(text, offset + location.characters - 1));
                i += 1;
            } else if location.is_mapped && location.position.is_empty() {
                // We extended ourselves into the void: retry this base under
                // restart semantics. No mapping is emitted this round.
            } else {
                mappings.push(Mapping::unmapped());
                // Try extending again on the next base if anything is left of
                // the interval.
                location.is_mapped = true;
                i += 1;
            }
        }
        mappings
    }

    /// Classical one-directional helper: shrinks the interval of
    /// `pattern[..=index]` from the right end leftward until it becomes a
    /// singleton or empty. Returns the final inclusive SA range (or `None`
    /// when the search emptied on the first character) and the number of
    /// characters consumed. An empty pattern or index 0 yields the whole SA
    /// and 0 consumed.
    pub fn count_until_unique(
        &self,
        pattern: &[u8],
        index: usize,
    ) -> (Option<(usize, usize)>, usize) {
        let s = self.sequences();
        if pattern.is_empty() || index == 0 {
            return (Some((0, self.size() - s - 1)), 0);
        }
        let mut range = match self.csa().lf((0, self.size() - 1), pattern[index]) {
            Some(range) => range,
            None => return (None, 1),
        };
        let mut consumed = 1;
        let mut i = index;
        while range.0 != range.1 && i > 0 {
            i -= 1;
            match self.csa().lf(range, pattern[i]) {
                None => break,
                Some(next) => {
                    range = next;
                    consumed += 1;
                }
            }
        }
        (Some((range.0 - s, range.1 - s)), consumed)
    }

    /// Maps a query window with plain LF-based backward search instead of the
    /// bidirectional machinery. Slower, but an independent oracle: agrees
    /// with [FmdIndex::map] on every base both report mapped.
    pub fn map_fm(&self, query: &[u8], start: usize, length: Option<usize>) -> Vec<Mapping> {
        assert!(start <= query.len(), "mapping window outside the query");
        let length = length.unwrap_or(query.len() - start);
        assert!(start + length <= query.len(), "mapping window outside the query");

        let mut mappings = Vec::with_capacity(length);
        for i in start..start + length {
            let (range, characters) = self.count_until_unique(query, i);
            match range {
                Some((low, high)) if low == high && characters > 0 => {
                    let (text, offset) = self.csa().relative_position(self.csa().locate(low));
                    mappings.push(Mapping::to(text, offset + characters - 1));
                }
                _ => mappings.push(Mapping::unmapped()),
            }
        }
        mappings
    }

    /// Attempts to pin `pattern[index]` to a single partition range:
    /// starting with the base itself, extends forward (right context) until
    /// the forward interval is contained in one range of the partition,
    /// becomes empty, or runs out of pattern. The mirror image of
    /// [FmdIndex::map_position].
    pub fn map_position_to_ranges(
        &self,
        ranges: &RangeVector,
        pattern: &[u8],
        index: usize,
    ) -> MapAttemptResult {
        let mut result = MapAttemptResult {
            position: self.char_position(pattern[index]),
            is_mapped: false,
            characters: 1,
        };
        if result.position.is_empty() {
            return result;
        }
        if result.position.range(ranges) != -1 {
            result.is_mapped = true;
            return result;
        }
        for i in index + 1..pattern.len() {
            let next = self.extend(result.position, pattern[i], false);
            self.extend_ops.fetch_add(1, Ordering::Relaxed);
            if next.is_empty() {
                return result;
            }
            result.position = next;
            result.characters += 1;
            if next.range(ranges) != -1 {
                result.is_mapped = true;
                return result;
            }
        }
        result
    }

    /// Maps every base of `query[start..start + length]` to the range of the
    /// partition its interval is contained in, or -1. The partition must
    /// cover all of BWT space and respect strands (the reverse complement of
    /// each range is again a range).
    ///
    /// The window is scanned right to left, carrying the interval backward
    /// between bases; on over-extension the scan steps back toward the base
    /// that failed. The result is in query order.
    pub fn map_to_ranges(
        &self,
        ranges: &RangeVector,
        query: &[u8],
        start: usize,
        length: Option<usize>,
    ) -> Vec<i64> {
        assert!(start <= query.len(), "mapping window outside the query");
        let length = length.unwrap_or(query.len() - start);
        assert!(start + length <= query.len(), "mapping window outside the query");

        let mut mapped = Vec::with_capacity(length);
        let mut location = MapAttemptResult::default();
        let mut i = (start + length) as isize - 1;
        while i >= start as isize {
            let index = i as usize;
            if location.position.is_empty() {
                self.restart_ops.fetch_add(1, Ordering::Relaxed);
                location = self.map_position_to_ranges(ranges, query, index);
            } else {
                location.position = self.extend(location.position, query[index], true);
                location.characters += 1;
                self.extend_ops.fetch_add(1, Ordering::Relaxed);
            }

            let range = location.position.range(ranges);
            if location.is_mapped && range != -1 {
                mapped.push(range);
                i -= 1;
            } else if location.is_mapped && location.position.is_empty() {
                // Over-extension: retry the base that failed.
            } else {
                mapped.push(-1);
                location.is_mapped = true;
                i -= 1;
            }
        }
        // The scan pushed right to left; hand the results back in query order.
        mapped.reverse();
        mapped
    }
}
