use std::fmt::{Display, Formatter};

/// Half-open range of row ordinals `[from, to)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn count(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    pub fn intersect(&self, other: &RowRange) -> Option<RowRange> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        (from < to).then_some(RowRange { from, to })
    }
}

/// Sorted set of disjoint, non-adjacent row ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRanges {
    ranges: Vec<RowRange>,
}

impl RowRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_single(from: u64, to: u64) -> Self {
        let mut ranges = Self::new();
        ranges.add(RowRange::new(from, to));
        ranges
    }

    /// Inserts `range`, merging it with any range it overlaps or touches.
    pub fn add(&mut self, range: RowRange) {
        if range.is_empty() {
            return;
        }
        let start = self.ranges.partition_point(|r| r.to < range.from);
        let end = self.ranges.partition_point(|r| r.from <= range.to);
        let mut merged = range;
        if start < end {
            merged.from = merged.from.min(self.ranges[start].from);
            merged.to = merged.to.max(self.ranges[end - 1].to);
        }
        self.ranges.splice(start..end, std::iter::once(merged));
    }

    pub fn union(left: &RowRanges, right: &RowRanges) -> RowRanges {
        let mut result = left.clone();
        for range in &right.ranges {
            result.add(*range);
        }
        result
    }

    pub fn intersection(left: &RowRanges, right: &RowRanges) -> RowRanges {
        let mut result = RowRanges::new();
        let (mut i, mut j) = (0, 0);
        while i < left.ranges.len() && j < right.ranges.len() {
            let (l, r) = (&left.ranges[i], &right.ranges[j]);
            if let Some(common) = l.intersect(r) {
                result.ranges.push(common);
            }
            if l.to <= r.to {
                i += 1;
            } else {
                j += 1;
            }
        }
        result
    }

    /// Total number of rows covered.
    pub fn count(&self) -> u64 {
        self.ranges.iter().map(RowRange::count).sum()
    }

    pub fn range_size(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, row: u64) -> bool {
        let idx = self.ranges.partition_point(|r| r.to <= row);
        self.ranges.get(idx).is_some_and(|r| r.from <= row)
    }

    /// First row covered, if any.
    pub fn from(&self) -> Option<u64> {
        self.ranges.first().map(|r| r.from)
    }

    /// One past the last row covered, if any.
    pub fn to(&self) -> Option<u64> {
        self.ranges.last().map(|r| r.to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowRange> {
        self.ranges.iter()
    }
}

impl Display for RowRanges {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "[{}, {})", r.from, r.to)?;
        }
        f.write_str("]")
    }
}
