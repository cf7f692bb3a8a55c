//! Depth-first iteration over every string of a fixed length occurring in
//! the indexed collection, with the interval of each.

use crate::bi_interval::BiInterval;
use crate::fmd::FmdIndex;
use crate::util::{ALPHABET, NUM_BASES};

// One level of the depth-first search: the interval of the node and the next
// child base to try, as an index into ALPHABET.
#[derive(Clone, Copy, Debug)]
struct Frame {
    position: BiInterval,
    next_base: usize,
}

/// Iterates over `(pattern, interval)` pairs for every distinct string of
/// length `depth` in the collection, in lexicographic order of [ALPHABET].
/// Intervals are in SA coordinates and sized by the occurrence count.
///
/// With `report_dead_ends`, shorter patterns whose continuation runs into the
/// end of a text are also emitted, once each, before their subtree; the
/// synthetic interval covers only the end-bounded rows and its reverse side
/// is not meaningful.
///
/// Cloning deep-copies the search stack; the clones advance independently.
#[derive(Clone)]
pub struct SuffixIterator<'a> {
    index: &'a FmdIndex,
    depth: usize,
    report_dead_ends: bool,
    stack: Vec<Frame>,
    pattern: Vec<u8>,
}

impl FmdIndex {
    /// Starts a depth-first enumeration of the strings of length `depth`
    /// occurring in the collection. `depth` must be at least 1.
    pub fn suffixes(&self, depth: usize, report_dead_ends: bool) -> SuffixIterator<'_> {
        assert!(depth >= 1, "iteration depth must be at least 1");
        SuffixIterator {
            index: self,
            depth,
            report_dead_ends,
            stack: vec![Frame { position: self.whole_bwt(), next_base: 0 }],
            pattern: Vec::with_capacity(depth),
        }
    }
}

impl Iterator for SuffixIterator<'_> {
    type Item = (Vec<u8>, BiInterval);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = *self.stack.last()?;

            // A full-depth node was yielded on arrival; both it and a node
            // with no children left are done.
            if self.pattern.len() == self.depth || top.next_base >= NUM_BASES {
                self.stack.pop();
                self.pattern.pop();
                continue;
            }

            let mut descended = false;
            for b in top.next_base..NUM_BASES {
                self.stack.last_mut().unwrap().next_base = b + 1;
                let child = self.index.extend(top.position, ALPHABET[b], false);
                if child.is_empty() {
                    continue;
                }
                self.stack.push(Frame { position: child, next_base: 0 });
                self.pattern.push(ALPHABET[b]);
                descended = true;

                if self.pattern.len() == self.depth {
                    return Some((self.pattern.clone(), self.index.to_sa_coordinates(child)));
                }

                if self.report_dead_ends {
                    // Rows of this node that precede its alphabetically first
                    // child are continued only by an end marker. Emit them
                    // before descending; exploration resumes from this node
                    // on the next call.
                    let child_a = self.index.extend(child, b'A', false);
                    if child_a.forward_start != child.forward_start {
                        let hole = BiInterval::new(
                            child.forward_start,
                            child.reverse_start,
                            child_a.forward_start as isize - child.forward_start as isize - 1,
                        );
                        return Some((self.pattern.clone(), self.index.to_sa_coordinates(hole)));
                    }
                }
                break;
            }

            if !descended {
                // Every remaining child was empty; the frame is exhausted and
                // gets popped on the next pass.
                continue;
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::builder::FmdIndexBuilder;
    use crate::util::{random_dna, reverse_complement_of};
    use std::collections::HashMap;

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

    // Distinct strings of the given length with occurrence counts.
    fn naive_spectrum(texts: &[Vec<u8>], len: usize) -> HashMap<Vec<u8>, usize> {
        let mut counts = HashMap::new();
        for text in texts {
            if text.len() < len {
                continue;
            }
            for window in text.windows(len) {
                *counts.entry(window.to_vec()).or_insert(0) += 1;
            }
        }
        counts
    }

    // Distinct strings shorter than `depth` that end some text, with the
    // number of texts they end.
    fn naive_dead_ends(texts: &[Vec<u8>], depth: usize) -> HashMap<Vec<u8>, usize> {
        let mut counts = HashMap::new();
        for text in texts {
            for len in 1..depth.min(text.len() + 1) {
                *counts.entry(text[text.len() - len..].to_vec()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn check_enumeration(inputs: &[&[u8]], depth: usize) {
        let (index, texts) = build(inputs);
        let expected = naive_spectrum(&texts, depth);

        let mut seen = HashMap::new();
        for (pattern, interval) in index.suffixes(depth, false) {
            assert_eq!(pattern.len(), depth);
            assert!(!interval.is_empty());
            let previous = seen.insert(pattern.clone(), interval.len());
            assert!(previous.is_none(), "{:?} yielded twice", String::from_utf8_lossy(&pattern));
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn enumerates_every_substring_once() {
        check_enumeration(&[b"GATTACAGATTACA", b"CCAGTNGG"], 3);
        check_enumeration(&[b"GATTACAGATTACA", b"CCAGTNGG"], 1);
        let long = random_dna(80, 51);
        check_enumeration(&[&long], 5);
    }

    #[test]
    fn patterns_come_out_in_alphabet_order() {
        let (index, _) = build(&[b"GATTACAGATTACA"]);
        let rank = |c: u8| ALPHABET.iter().position(|&b| b == c).unwrap();
        let patterns: Vec<Vec<u8>> =
            index.suffixes(3, false).map(|(pattern, _)| pattern).collect();
        let mut sorted = patterns.clone();
        sorted.sort_by_key(|p| p.iter().map(|&c| rank(c)).collect::<Vec<_>>());
        assert_eq!(patterns, sorted);
    }

    #[test]
    fn intervals_locate_the_right_occurrences() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCAGTNGG"]);
        for (pattern, interval) in index.suffixes(4, false) {
            for position in index.locate_all(&interval) {
                let (text, offset) = index.csa().relative_position(position);
                assert_eq!(&texts[text][offset..offset + 4], pattern.as_slice());
            }
        }
    }

    #[test]
    fn dead_ends_cover_the_text_ends() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCAGT"]);
        let depth = 4;
        let expected = naive_dead_ends(&texts, depth);

        let mut seen = HashMap::new();
        for (pattern, interval) in index.suffixes(depth, true) {
            if pattern.len() == depth {
                continue;
            }
            assert!(!interval.is_empty());
            let previous = seen.insert(pattern.clone(), interval.len());
            assert!(previous.is_none(), "{:?} yielded twice", String::from_utf8_lossy(&pattern));
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn dead_ends_do_not_disturb_the_full_depth_yields() {
        let (index, texts) = build(&[b"GATTACAGATTACA", b"CCAGT"]);
        let with_dead_ends: HashMap<Vec<u8>, usize> = index
            .suffixes(4, true)
            .filter(|(pattern, _)| pattern.len() == 4)
            .map(|(pattern, interval)| (pattern, interval.len()))
            .collect();
        assert_eq!(with_dead_ends, naive_spectrum(&texts, 4));
    }

    #[test]
    fn two_base_sequence_at_depth_two() {
        // "AC" indexed with its reverse complement "GT": exactly those two
        // strings at depth 2, one occurrence each.
        let (index, _) = build(&[b"AC"]);
        let yields: Vec<(Vec<u8>, usize)> =
            index.suffixes(2, false).map(|(pattern, interval)| (pattern, interval.len())).collect();
        assert_eq!(yields, vec![(b"AC".to_vec(), 1), (b"GT".to_vec(), 1)]);
    }

    #[test]
    fn clones_advance_independently() {
        let (index, _) = build(&[b"GATTACAGATTACA"]);
        let mut iter = index.suffixes(3, false);
        let first = iter.next().unwrap();
        let mut copy = iter.clone();
        let from_original: Vec<_> = iter.collect();
        let from_copy: Vec<_> = copy.by_ref().collect();
        assert_eq!(from_original, from_copy);
        assert_ne!(Some(&first), from_copy.first());
    }

    #[test]
    #[should_panic(expected = "depth must be at least 1")]
    fn zero_depth_is_rejected() {
        let (index, _) = build(&[b"AC"]);
        let _ = index.suffixes(0, false);
    }

    #[test]
    fn deeper_than_any_text_yields_nothing() {
        let (index, _) = build(&[b"ACG"]);
        assert_eq!(index.suffixes(4, false).count(), 0);
        // With dead ends, the texts themselves surface as end-bounded
        // prefixes of the requested depth.
        let dead_ends: Vec<Vec<u8>> =
            index.suffixes(4, true).map(|(pattern, _)| pattern).collect();
        assert!(dead_ends.contains(&b"ACG".to_vec()));
        assert!(dead_ends.contains(&b"CGT".to_vec()));
    }
}
