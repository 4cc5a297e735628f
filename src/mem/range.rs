use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
};

/// Contiguous span of addresses, `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl Range {
    pub fn new(start: usize, size: usize) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }

    /// Smallest range covering every `(start, size)` span, `None` if there is none.
    ///
    /// Gaps between the spans are part of the result.
    pub fn spanning<I: IntoIterator<Item = (usize, usize)>>(spans: I) -> Option<Range> {
        spans
            .into_iter()
            .map(|(start, size)| Range::new(start, size))
            .reduce(|acc, r| Range {
                start: std::cmp::min(acc.start, r.start),
                end: std::cmp::max(acc.end, r.end),
            })
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::Range;

    #[test]
    fn ut_range_new() {
        let range = Range::new(10, 2);
        assert_eq!(range.start, 10);
        assert_eq!(range.end, 12);
        assert_eq!(range.length(), 2);
        assert_eq!(range.to_string(), "[10, 12)");
    }

    #[test]
    fn ut_range_cmp() {
        let range0 = Range::new(100, 100);

        assert_eq!(range0.cmp(&Range::new(0, 50)), Ordering::Greater);
        assert_eq!(range0.cmp(&Range::new(200, 50)), Ordering::Less);
        assert_eq!(range0.cmp(&Range::new(100, 50)), Ordering::Greater);
        assert_eq!(range0.cmp(&Range::new(100, 150)), Ordering::Less);
        assert_eq!(range0.partial_cmp(&Range::new(100, 100)), Some(Ordering::Equal));
    }

    #[test]
    fn ut_range_spanning() {
        assert_eq!(Range::spanning(Vec::<(usize, usize)>::new()), None);
        assert_eq!(Range::spanning([(10, 2)]), Some(Range { start: 10, end: 12 }));
        assert_eq!(
            Range::spanning([(100, 4), (5, 1)]),
            Some(Range { start: 5, end: 104 })
        );
        // A short span inside a longer one does not shrink the end.
        assert_eq!(
            Range::spanning([(0, 8), (2, 1)]),
            Some(Range { start: 0, end: 8 })
        );
    }
}
