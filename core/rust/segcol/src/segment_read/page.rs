use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::io::PageHandle;
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::decoders::dict::DictWordTable;
use crate::segment_read::decoders::null_runs::NullRunDecoder;
use crate::segment_read::decoders::PageDecoder;
use crate::segment_read::encoding::EncodingInfo;
use crate::segment_read::index::ordinal::PageCursor;
use std::sync::Arc;

/// Decode state of the data page an iterator is positioned in.
///
/// Row positions (`offset_in_page`) count nulls, value positions inside
/// `data` do not. The null run decoder, when present, is always at
/// `offset_in_page`.
#[derive(Debug)]
pub struct ParsedPage {
    pub page_index: usize,
    pub first_ordinal: u64,
    pub num_rows: usize,
    pub offset_in_page: usize,
    /// Lengths columns only: ordinal of the first item of the page's first array.
    pub first_array_item_ordinal: u64,
    pub has_null: bool,
    pub page_size: usize,
    data: PageDecoder,
    nulls: Option<NullRunDecoder>,
}

impl ParsedPage {
    pub fn create<F>(handle: PageHandle, cursor: &PageCursor, encoding: &EncodingInfo, dict: F) -> SegmentResult<Self>
    where
        F: FnOnce() -> SegmentResult<Arc<DictWordTable>>,
    {
        let footer = *handle.data_footer()?;
        if footer.first_ordinal != cursor.first_ordinal || u64::from(footer.num_values) != cursor.num_rows() {
            return Err(fmt_err!(
                Corruption,
                "page {} holds rows [{}, +{}), ordinal index expects [{}, {})",
                cursor.page_index,
                footer.first_ordinal,
                footer.num_values,
                cursor.first_ordinal,
                cursor.end_ordinal
            ));
        }
        let num_rows = footer.num_values as usize;
        let body = handle.body;
        let nullmap_size = footer.nullmap_size as usize;
        if nullmap_size > body.len() {
            return Err(fmt_err!(
                Corruption,
                "null map of {} bytes in a page body of {} bytes",
                nullmap_size,
                body.len()
            ));
        }
        let values_end = body.len() - nullmap_size;
        let nulls = if nullmap_size > 0 {
            Some(NullRunDecoder::try_new(&body[values_end..], num_rows)?)
                .filter(|nulls| nulls.null_count() > 0)
        } else {
            None
        };
        let null_count = nulls.as_ref().map_or(0, NullRunDecoder::null_count);
        let data = encoding.create_page_decoder(body.slice(..values_end), num_rows - null_count, dict)?;
        Ok(Self {
            page_index: cursor.page_index,
            first_ordinal: footer.first_ordinal,
            num_rows,
            offset_in_page: 0,
            first_array_item_ordinal: footer.first_array_item_ordinal,
            has_null: nulls.is_some(),
            page_size: body.len(),
            data,
            nulls,
        })
    }

    pub fn contains(&self, ordinal: u64) -> bool {
        self.first_ordinal <= ordinal && ordinal < self.first_ordinal + self.num_rows as u64
    }

    pub fn remaining(&self) -> usize {
        self.num_rows - self.offset_in_page
    }

    pub fn has_remaining(&self) -> bool {
        self.offset_in_page < self.num_rows
    }

    /// Moves to row `pos` of the page. Forward seeks resume the null runs
    /// from the current row, backward seeks replay them from the page start.
    pub fn seek_to_position(&mut self, pos: usize) -> SegmentResult<()> {
        if pos > self.num_rows {
            return Err(fmt_err!(
                Internal,
                "seek to row {} of a page of {} rows",
                pos,
                self.num_rows
            ));
        }
        match self.nulls.as_mut() {
            None => self.data.seek_to_position_in_page(pos)?,
            Some(nulls) => {
                let offset_in_data = if pos < nulls.position() {
                    nulls.rewind();
                    0
                } else {
                    self.data.current_index()
                };
                let skips = pos - nulls.position();
                let skipped_nulls = nulls.skip(skips);
                self.data
                    .seek_to_position_in_page(offset_in_data + skips - skipped_nulls)?;
            }
        }
        self.offset_in_page = pos;
        Ok(())
    }

    /// Reads up to `rows` rows into `sink`. Returns the rows read and
    /// whether any of them was null.
    pub fn next_batch(&mut self, rows: usize, sink: &mut dyn ColumnSink) -> SegmentResult<(usize, bool)> {
        let rows = rows.min(self.remaining());
        let mut saw_null = false;
        match self.nulls.as_mut() {
            None => read_values(&mut self.data, rows, sink)?,
            Some(nulls) => {
                let mut left = rows;
                while left > 0 {
                    let (is_null, len) = nulls.next_run(left).ok_or_else(|| {
                        fmt_err!(Corruption, "null map ends {} rows before the page does", left)
                    })?;
                    if is_null {
                        sink.push_nulls(len)?;
                        saw_null = true;
                    } else {
                        read_values(&mut self.data, len, sink)?;
                    }
                    left -= len;
                }
            }
        }
        self.offset_in_page += rows;
        Ok((rows, saw_null))
    }
}

fn read_values(data: &mut PageDecoder, count: usize, sink: &mut dyn ColumnSink) -> SegmentResult<()> {
    let read = data.next_batch(count, sink)?;
    if read != count {
        return Err(fmt_err!(
            Corruption,
            "page decoder returned {} values, null map promises {}",
            read,
            count
        ));
    }
    Ok(())
}
