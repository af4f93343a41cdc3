//! An ordered set of integers stored as disjoint ranges.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;

/// A set of `u32` stored as disjoint, non-adjacent inclusive ranges.
///
/// Overlapping and adjacent ranges are merged on insertion, so the stored
/// ranges are always canonical and two spans with the same members compare
/// equal.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    // ranges[a] = b means [a, b] is in the set
    ranges: BTreeMap<u32, u32>,
}

impl Span {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The number of members.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|(start, end)| (*end - *start) as u64 + 1)
            .sum()
    }

    pub fn insert(&mut self, value: u32) {
        self.insert_range(value..=value)
    }

    /// Insert a range, merging with any overlapping or adjacent ranges.
    pub fn insert_range(&mut self, range: RangeInclusive<u32>) {
        let (mut start, mut end) = range.into_inner();
        if end < start {
            return;
        }
        // at most one earlier range can touch the new one
        if let Some((&prev_start, &prev_end)) = self.ranges.range(..start).next_back() {
            if prev_end >= end {
                return;
            }
            if prev_end.saturating_add(1) >= start {
                start = prev_start;
                self.ranges.remove(&prev_start);
            }
        }
        // any number of later ranges may be swallowed
        while let Some((&next_start, &next_end)) = self.ranges.range(start..).next() {
            if next_start > end.saturating_add(1) {
                break;
            }
            end = end.max(next_end);
            self.ranges.remove(&next_start);
        }
        self.ranges.insert(start, end);
    }

    /// Remove every member in `range`.
    pub fn remove_range(&mut self, range: RangeInclusive<u32>) {
        let (start, end) = range.into_inner();
        if end < start {
            return;
        }
        let touching: Vec<_> = self
            .ranges
            .range(..=end)
            .rev()
            .take_while(|&(_, &e)| e >= start)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in touching {
            self.ranges.remove(&s);
            if s < start {
                self.ranges.insert(s, start - 1);
            }
            if e > end {
                self.ranges.insert(end + 1, e);
            }
        }
    }

    pub fn remove(&mut self, value: u32) {
        self.remove_range(value..=value)
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges
            .range(..=value)
            .next_back()
            .is_some_and(|(_, &end)| end >= value)
    }

    /// The canonical ranges, in order.
    pub fn ranges(&self) -> impl Iterator<Item = RangeInclusive<u32>> + '_ {
        self.ranges.iter().map(|(a, b)| *a..=*b)
    }

    /// The members, in order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges().flatten()
    }

    /// The position of `value` among the ordered members.
    pub fn index_of(&self, value: u32) -> Option<usize> {
        let mut skipped = 0usize;
        for (&start, &end) in self.ranges.range(..=value) {
            if value <= end {
                return Some(skipped + (value - start) as usize);
            }
            skipped += (end - start) as usize + 1;
        }
        None
    }

    pub fn union(&self, other: &Span) -> Span {
        let mut out = self.clone();
        out.extend(other.ranges());
        out
    }

    pub fn intersection(&self, other: &Span) -> Span {
        let mut out = Span::new();
        let mut a = self.ranges().peekable();
        let mut b = other.ranges().peekable();
        while let (Some(ra), Some(rb)) = (a.peek(), b.peek()) {
            let start = *ra.start().max(rb.start());
            let end = *ra.end().min(rb.end());
            if start <= end {
                out.ranges.insert(start, end);
            }
            if ra.end() < rb.end() {
                a.next();
            } else {
                b.next();
            }
        }
        out
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &Span) -> Span {
        let mut out = self.clone();
        for range in other.ranges() {
            out.remove_range(range);
        }
        out
    }
}

impl Extend<RangeInclusive<u32>> for Span {
    fn extend<I: IntoIterator<Item = RangeInclusive<u32>>>(&mut self, iter: I) {
        iter.into_iter().for_each(|r| self.insert_range(r));
    }
}

impl Extend<u32> for Span {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        iter.into_iter().for_each(|v| self.insert(v));
    }
}

impl FromIterator<u32> for Span {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut out = Span::new();
        out.extend(iter);
        out
    }
}

impl FromIterator<RangeInclusive<u32>> for Span {
    fn from_iter<I: IntoIterator<Item = RangeInclusive<u32>>>(iter: I) -> Self {
        let mut out = Span::new();
        out.extend(iter);
        out
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span[")?;
        for (i, (start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}..={end}")?;
            }
        }
        write!(f, "]")
    }
}
