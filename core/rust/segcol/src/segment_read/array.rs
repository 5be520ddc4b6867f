//! Array columns.
//!
//! An array is stored as three columns of its own: the flattened items, one
//! length per row and, for nullable arrays, one null flag per row. Reading
//! `n` rows reads `n` lengths and flags, then as many items as the lengths
//! add up to.

use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::array::OffsetColumn;
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::iter::{BatchRead, ColumnIterator, IteratorStats};
use crate::segment_read::scalar::{ScalarColumnIterator, ScalarColumnReader};
use crate::segment_read::{ColumnIteratorOptions, ColumnReader};
use std::sync::Arc;

#[derive(Debug)]
pub struct ArrayColumnReader {
    item: Box<ColumnReader>,
    lengths: Arc<ScalarColumnReader>,
    null_flags: Option<Arc<ScalarColumnReader>>,
}

impl ArrayColumnReader {
    pub fn new(
        item: ColumnReader,
        lengths: Arc<ScalarColumnReader>,
        null_flags: Option<Arc<ScalarColumnReader>>,
    ) -> Self {
        Self { item: Box::new(item), lengths, null_flags }
    }

    /// One length per row, so the lengths column has the row count.
    pub fn num_rows(&self) -> u64 {
        self.lengths.num_rows()
    }

    pub fn is_nullable(&self) -> bool {
        self.null_flags.is_some()
    }

    pub fn item_reader(&self) -> &ColumnReader {
        &self.item
    }

    pub fn new_iterator(&self, opts: ColumnIteratorOptions) -> ColumnIterator {
        if self.num_rows() == 0 {
            return ColumnIterator::Empty;
        }
        ColumnIterator::Array(Box::new(ArrayColumnIterator {
            item: self.item.new_iterator(opts),
            lengths: ScalarColumnIterator::new(self.lengths.clone(), opts),
            null_flags: self
                .null_flags
                .as_ref()
                .map(|reader| ScalarColumnIterator::new(reader.clone(), opts)),
            item_num_rows: self.item.num_rows(),
            current_ordinal: 0,
        }))
    }
}

#[derive(Debug)]
pub struct ArrayColumnIterator {
    item: ColumnIterator,
    lengths: ScalarColumnIterator,
    null_flags: Option<ScalarColumnIterator>,
    item_num_rows: u64,
    current_ordinal: u64,
}

impl ArrayColumnIterator {
    pub fn current_ordinal(&self) -> u64 {
        self.current_ordinal
    }

    pub fn seek_to_first(&mut self) -> SegmentResult<()> {
        self.lengths.seek_to_first()?;
        if let Some(null_flags) = self.null_flags.as_mut() {
            null_flags.seek_to_first()?;
        }
        self.item.seek_to_first()?;
        self.current_ordinal = 0;
        Ok(())
    }

    pub fn seek_to_ordinal(&mut self, ordinal: u64) -> SegmentResult<()> {
        self.lengths.seek_to_ordinal(ordinal)?;
        if let Some(null_flags) = self.null_flags.as_mut() {
            null_flags.seek_to_ordinal(ordinal)?;
        }
        let item_ordinal = if ordinal == self.lengths.reader().num_rows() {
            self.item_num_rows
        } else {
            self.item_ordinal_of(ordinal)?
        };
        self.item.seek_to_ordinal(item_ordinal)?;
        self.current_ordinal = ordinal;
        Ok(())
    }

    pub fn seek_to_page_start(&mut self) -> SegmentResult<()> {
        let first_ordinal = self
            .lengths
            .current_page()
            .map(|page| page.first_ordinal)
            .ok_or_else(|| fmt_err!(Internal, "seek to page start before any page was loaded"))?;
        self.seek_to_ordinal(first_ordinal)
    }

    // The lengths page knows where its first array starts among the items.
    // Summing the lengths from there up to `ordinal` gives the item position.
    // Leaves the lengths iterator at `ordinal`.
    fn item_ordinal_of(&mut self, ordinal: u64) -> SegmentResult<u64> {
        let (page_first_ordinal, page_first_item) = self
            .lengths
            .current_page()
            .map(|page| (page.first_ordinal, page.first_array_item_ordinal))
            .ok_or_else(|| fmt_err!(Internal, "lengths iterator is not positioned"))?;
        let rows = (ordinal - page_first_ordinal) as usize;
        if rows == 0 {
            return Ok(page_first_item);
        }
        let mut lengths = OffsetColumn::new(self.lengths.reader().field_type())?;
        self.lengths.seek_to_page_start()?;
        let read = self.lengths.next_batch(rows, &mut lengths)?;
        if read.rows != rows {
            return Err(fmt_err!(
                Corruption,
                "lengths page holds {} rows before ordinal {}, read {}",
                rows,
                ordinal,
                read.rows
            ));
        }
        let skipped_items: u64 = (1..=rows).map(|idx| lengths.get(idx)).sum();
        Ok(page_first_item + skipped_items)
    }

    pub fn next_batch(&mut self, count: usize, dst: &mut dyn ColumnSink) -> SegmentResult<BatchRead> {
        let array = dst
            .as_array_sink()
            .ok_or_else(|| fmt_err!(Internal, "array column read into a non-array sink"))?;
        let start_row = array.offsets().len();

        // 1. lengths land one slot ahead of the row they close
        let lengths = self.lengths.next_batch(count, array.offsets())?;
        if lengths.has_null {
            return Err(fmt_err!(
                Internal,
                "array lengths column {} returned nulls",
                self.lengths.reader().path()
            ));
        }
        let rows = lengths.rows;
        array.convert_lengths_to_offsets(start_row, rows)?;
        if rows == 0 {
            return Ok(BatchRead::default());
        }

        // 2. null flags
        let has_null = self.null_flags.is_some();
        if let Some(null_flags) = self.null_flags.as_mut() {
            let flags = array
                .null_flags()
                .ok_or_else(|| fmt_err!(Internal, "nullable array read into a sink without null flags"))?;
            let read = null_flags.next_batch(rows, flags)?;
            if read.rows != rows {
                return Err(fmt_err!(
                    Corruption,
                    "array null flags ended after {} of {} rows",
                    read.rows,
                    rows
                ));
            }
        }

        // 3. items
        let items_start = array.item_offset(start_row);
        let items_end = array.item_offset(start_row + rows);
        let num_items = items_end - items_start;
        let mut rebuild = false;
        if num_items > 0 {
            rebuild = array.ensure_item_capacity(items_end);
            let read = self.item.next_batch(num_items, array.items())?;
            if read.rows != num_items {
                return Err(fmt_err!(
                    Corruption,
                    "array items ended after {} of {} items",
                    read.rows,
                    num_items
                ));
            }
        }
        array.prepare_for_read(start_row, rows, rebuild);

        // 4.
        self.current_ordinal += rows as u64;
        Ok(BatchRead { rows, has_null })
    }

    pub fn stats(&self) -> IteratorStats {
        let mut stats = self.item.stats();
        let children = std::iter::once(&self.lengths).chain(self.null_flags.as_ref());
        for child in children {
            stats.bytes_read += child.stats().bytes_read;
            stats.pages_decoded += child.stats().pages_decoded;
        }
        stats
    }
}
