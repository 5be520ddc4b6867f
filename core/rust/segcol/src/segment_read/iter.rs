use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::array::ArrayColumnIterator;
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::condition::ColumnCondition;
use crate::segment_read::default_value::DefaultValueColumnIterator;
use crate::segment_read::row_ranges::RowRanges;
use crate::segment_read::scalar::ScalarColumnIterator;

/// Outcome of one `next_batch` call.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BatchRead {
    pub rows: usize,
    pub has_null: bool,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IteratorStats {
    /// Uncompressed page body bytes handed out by the page source.
    pub bytes_read: u64,
    pub pages_decoded: u64,
}

/// Pull-based cursor over the rows of one column.
///
/// Every iterator must be positioned with a seek before the first
/// `next_batch`.
#[derive(Debug)]
pub enum ColumnIterator {
    /// A column without rows.
    Empty,
    Scalar(ScalarColumnIterator),
    Array(Box<ArrayColumnIterator>),
    Default(DefaultValueColumnIterator),
}

impl ColumnIterator {
    pub fn seek_to_first(&mut self) -> SegmentResult<()> {
        match self {
            ColumnIterator::Empty => Ok(()),
            ColumnIterator::Scalar(iter) => iter.seek_to_first(),
            ColumnIterator::Array(iter) => iter.seek_to_first(),
            ColumnIterator::Default(iter) => iter.seek_to_ordinal(0),
        }
    }

    pub fn seek_to_ordinal(&mut self, ordinal: u64) -> SegmentResult<()> {
        match self {
            ColumnIterator::Empty if ordinal == 0 => Ok(()),
            ColumnIterator::Empty => Err(fmt_err!(NotFound, "seek to ordinal {} of an empty column", ordinal)),
            ColumnIterator::Scalar(iter) => iter.seek_to_ordinal(ordinal),
            ColumnIterator::Array(iter) => iter.seek_to_ordinal(ordinal),
            ColumnIterator::Default(iter) => iter.seek_to_ordinal(ordinal),
        }
    }

    /// Rewinds to the first row of the current page.
    /// Iterators without pages stay where they are.
    pub fn seek_to_page_start(&mut self) -> SegmentResult<()> {
        match self {
            ColumnIterator::Scalar(iter) => iter.seek_to_page_start(),
            ColumnIterator::Array(iter) => iter.seek_to_page_start(),
            ColumnIterator::Empty | ColumnIterator::Default(_) => Ok(()),
        }
    }

    pub fn current_ordinal(&self) -> u64 {
        match self {
            ColumnIterator::Empty => 0,
            ColumnIterator::Scalar(iter) => iter.current_ordinal(),
            ColumnIterator::Array(iter) => iter.current_ordinal(),
            ColumnIterator::Default(iter) => iter.current_ordinal(),
        }
    }

    pub fn next_batch(&mut self, count: usize, sink: &mut dyn ColumnSink) -> SegmentResult<BatchRead> {
        match self {
            ColumnIterator::Empty => Ok(BatchRead::default()),
            ColumnIterator::Scalar(iter) => iter.next_batch(count, sink),
            ColumnIterator::Array(iter) => iter.next_batch(count, sink),
            ColumnIterator::Default(iter) => iter.next_batch(count, sink),
        }
    }

    /// Replaces `row_ranges` with the zone map survivors when the column
    /// has a zone map, leaves it untouched otherwise.
    pub fn get_row_ranges_by_zone_map(
        &self,
        cond: &dyn ColumnCondition,
        delete_cond: Option<&dyn ColumnCondition>,
        row_ranges: &mut RowRanges,
    ) -> SegmentResult<()> {
        if let ColumnIterator::Scalar(iter) = self {
            if iter.reader().has_zone_map() {
                *row_ranges = iter.reader().prune_by_zone_map(cond, delete_cond)?;
            }
        }
        Ok(())
    }

    pub fn get_row_ranges_by_bloom_filter(
        &self,
        cond: &dyn ColumnCondition,
        row_ranges: &mut RowRanges,
    ) -> SegmentResult<()> {
        if let ColumnIterator::Scalar(iter) = self {
            if iter.reader().has_bloom_filter() && cond.can_use_bloom_filter() {
                *row_ranges = iter.reader().prune_by_bloom_filter(cond, row_ranges)?;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> IteratorStats {
        match self {
            ColumnIterator::Scalar(iter) => *iter.stats(),
            ColumnIterator::Array(iter) => iter.stats(),
            ColumnIterator::Empty | ColumnIterator::Default(_) => IteratorStats::default(),
        }
    }
}
