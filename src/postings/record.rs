//! In-memory postings record: a primary key plus its sorted pair list
//!
//! A record is born with only its primary key, grows during a build via
//! [`increase_count`](PostingsRecord::increase_count) or
//! [`set_counts`](PostingsRecord::set_counts), and is frozen once written.
//! Reads hand back immutable records whose pair list is never mutated
//! again.
//!
//! Pair-list invariants, re-established by every mutating operation:
//! secondary keys strictly ascending, no duplicates, weights finite and
//! non-negative.

use std::io::{Read, Write};

use crate::error::{CuttleError, Result};
use crate::postings::codec::{self, Weight};
use crate::postings::types::PostingsKey;

/// One postings list: `primary_key -> [(secondary_key, weight)]`
#[derive(Clone, Debug, PartialEq)]
pub struct PostingsRecord<P, S, W = u64> {
    primary_key: P,
    counts: Vec<(S, W)>,
}

impl<P, S, W> PostingsRecord<P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    /// An empty record for the given primary key
    pub fn new(primary_key: P) -> Self {
        Self {
            primary_key,
            counts: Vec::new(),
        }
    }

    pub fn primary_key(&self) -> P {
        self.primary_key
    }

    /// The weight stored for `key`, or zero if the key is absent
    pub fn count(&self, key: S) -> W {
        match self.counts.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.counts[idx].1,
            Err(_) => W::zero(),
        }
    }

    /// Borrowed view of the sorted pair list
    pub fn counts(&self) -> &[(S, W)] {
        &self.counts
    }

    /// Replace the pair list, re-establishing the sort order and merging
    /// duplicate keys by summing their weights
    pub fn set_counts<I>(&mut self, counts: I)
    where
        I: IntoIterator<Item = (S, W)>,
    {
        self.counts.clear();
        self.counts.extend(counts);
        self.counts.sort_unstable_by_key(|&(k, _)| k);

        // coalesce duplicates in place
        let mut kept = 0;
        for idx in 0..self.counts.len() {
            if kept > 0 && self.counts[kept - 1].0 == self.counts[idx].0 {
                self.counts[kept - 1].1 =
                    self.counts[kept - 1].1.accumulate(self.counts[idx].1);
            } else {
                self.counts[kept] = self.counts[idx];
                kept += 1;
            }
        }
        self.counts.truncate(kept);
        debug_assert!(self.counts.iter().all(|&(_, w)| w.is_valid()));
    }

    /// Add `delta` to the weight for `key`, inserting the pair if absent.
    ///
    /// Bulk construction should prefer [`set_counts`](Self::set_counts);
    /// an out-of-place insert costs a shift of the tail.
    pub fn increase_count(&mut self, key: S, delta: W) {
        match self.counts.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.counts[idx].1 = self.counts[idx].1.accumulate(delta),
            Err(idx) => self.counts.insert(idx, (key, delta)),
        }
    }

    /// Union this record's pairs with `other`'s, summing weights on shared
    /// keys. Both sides are sorted, so a single linear pass merges them.
    ///
    /// The primary key of `self` is retained; `other`'s is ignored (both
    /// sides are being grouped under the same key during chunk coalescing).
    pub fn merge_with(&mut self, other: Self) {
        if other.counts.is_empty() {
            return;
        }
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }

        let left = std::mem::take(&mut self.counts);
        let right = other.counts;
        let mut merged = Vec::with_capacity(left.len() + right.len());

        let mut l = 0;
        let mut r = 0;
        while l < left.len() && r < right.len() {
            match left[l].0.cmp(&right[r].0) {
                std::cmp::Ordering::Less => {
                    merged.push(left[l]);
                    l += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(right[r]);
                    r += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push((left[l].0, left[l].1.accumulate(right[r].1)));
                    l += 1;
                    r += 1;
                }
            }
        }
        merged.extend_from_slice(&left[l..]);
        merged.extend_from_slice(&right[r..]);

        self.counts = merged;
    }

    /// Sum of all weights; rankers read this as a document length or a
    /// corpus-wide term frequency
    pub fn total_weight(&self) -> W {
        self.counts
            .iter()
            .fold(W::zero(), |total, &(_, w)| total.accumulate(w))
    }

    /// Serialize the full record: primary key varint followed by the
    /// counts section. Returns the number of bytes written.
    pub fn write_packed<O: Write>(&self, out: &mut O) -> std::io::Result<usize> {
        let mut bytes = codec::write_uint(out, self.primary_key.to_u64())?;
        bytes += self.write_counts(out)?;
        Ok(bytes)
    }

    /// Serialize the counts section alone: varint pair count, first
    /// secondary key absolute, then strictly-positive key gaps, with each
    /// key followed by its weight.
    pub fn write_counts<O: Write>(&self, out: &mut O) -> std::io::Result<usize> {
        let mut bytes = codec::write_uint(out, self.counts.len() as u64)?;
        let mut prev = 0u64;
        for (idx, &(key, weight)) in self.counts.iter().enumerate() {
            let raw = key.to_u64();
            let gap = if idx == 0 { raw } else { raw - prev };
            bytes += codec::write_uint(out, gap)?;
            bytes += weight.write_to(out)?;
            prev = raw;
        }
        Ok(bytes)
    }

    /// Deserialize a record written by [`write_packed`](Self::write_packed),
    /// replacing this record's contents.
    ///
    /// Returns the number of bytes consumed, or 0 on a clean EOF before
    /// the primary key. Truncation inside the record and non-monotonic key
    /// gaps surface as errors.
    pub fn read_packed<R: Read>(&mut self, input: &mut R) -> Result<usize> {
        let (raw_pk, mut bytes) = match codec::read_uint_opt(input)? {
            Some(header) => header,
            None => return Ok(0),
        };
        self.primary_key = P::from_u64(raw_pk);

        let (len, consumed) = codec::read_uint_from(input)?;
        bytes += consumed;

        self.counts.clear();
        self.counts.reserve(len.min(1024) as usize);
        let mut prev = 0u64;
        for idx in 0..len {
            let (gap, consumed) = codec::read_uint_from(input)?;
            bytes += consumed;
            if idx > 0 && gap == 0 {
                return Err(CuttleError::Corrupt(format!(
                    "zero key gap in record {}",
                    raw_pk
                )));
            }
            let key = if idx == 0 { gap } else { prev + gap };
            let (weight, consumed) = W::read_from(input)?;
            bytes += consumed;
            self.counts.push((S::from_u64(key), weight));
            prev = key;
        }

        // release the slack a shorter record leaves behind
        self.counts.shrink_to_fit();
        Ok(bytes)
    }
}
