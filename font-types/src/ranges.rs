//! Helpers for grouping and accumulating sequences of integers.

/// A run of values that each differ from their predecessor by `delta`.
///
/// `stop` is exclusive: it is the value that would follow the last member.
/// A run whose next value would not fit in an `i64` ends there, with `stop`
/// clamped to the `i64` limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Run {
    pub start: i64,
    pub stop: i64,
    pub delta: i64,
}

impl Run {
    /// The number of members in the run.
    pub fn len(&self) -> usize {
        if self.delta == 0 {
            return 0;
        }
        let span = self.stop as i128 - self.start as i128;
        (span / self.delta as i128).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An iterator over the [`Run`]s in a sequence.
///
/// See [`contiguous_groups`].
#[derive(Debug, Clone)]
pub struct ContiguousGroups<I> {
    iter: I,
    delta: i64,
    allow_zeroes: bool,
    current: Option<(i64, i64)>,
}

impl<I> Iterator for ContiguousGroups<I>
where
    I: Iterator<Item = i64>,
{
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        for value in self.iter.by_ref() {
            let Some((start, prev)) = self.current else {
                self.current = Some((value, value));
                continue;
            };
            match prev.checked_add(self.delta) {
                Some(expected) if value == expected || (value == 0 && self.allow_zeroes) => {
                    self.current = Some((start, expected));
                }
                _ => {
                    self.current = Some((value, value));
                    return Some(Run {
                        start,
                        stop: prev.saturating_add(self.delta),
                        delta: self.delta,
                    });
                }
            }
        }
        let (start, prev) = self.current.take()?;
        Some(Run {
            start,
            stop: prev.saturating_add(self.delta),
            delta: self.delta,
        })
    }
}

/// Split a sequence into maximal runs whose members differ by `delta`.
///
/// ```
/// # use font_types::{contiguous_groups, Run};
/// let runs: Vec<_> = contiguous_groups([3u16, 4, 5, 9, 10], 1).collect();
/// assert_eq!(runs, [Run { start: 3, stop: 6, delta: 1 }, Run { start: 9, stop: 11, delta: 1 }]);
/// ```
pub fn contiguous_groups<T: Into<i64>>(
    iter: impl IntoIterator<Item = T>,
    delta: i64,
) -> ContiguousGroups<impl Iterator<Item = i64>> {
    ContiguousGroups {
        iter: iter.into_iter().map(Into::into),
        delta,
        allow_zeroes: false,
        current: None,
    }
}

/// Like [`contiguous_groups`], but a zero continues the current run as if it
/// were the expected next value.
pub fn contiguous_groups_allow_zeroes<T: Into<i64>>(
    iter: impl IntoIterator<Item = T>,
    delta: i64,
) -> ContiguousGroups<impl Iterator<Item = i64>> {
    ContiguousGroups {
        allow_zeroes: true,
        ..contiguous_groups(iter, delta)
    }
}

/// Yield each item paired with its successor: `(s0, s1), (s1, s2), ...`
pub fn pairwise<T: Clone>(iter: impl IntoIterator<Item = T>) -> impl Iterator<Item = (T, T)> {
    let mut iter = iter.into_iter();
    let mut prev = iter.next();
    std::iter::from_fn(move || {
        let next = iter.next()?;
        let first = prev.replace(next.clone())?;
        Some((first, next))
    })
}

/// Given item lengths, return the start index of each item followed by the
/// index just past the last item.
///
/// The result always has one more element than the input.
pub fn cumulative_offsets(lengths: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut total = 0;
    let mut out = vec![0];
    out.extend(lengths.into_iter().map(|len| {
        total += len;
        total
    }));
    out
}
