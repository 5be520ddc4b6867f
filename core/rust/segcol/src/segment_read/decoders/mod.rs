use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::ColumnSink;

pub mod dict;
pub mod null_runs;
pub mod plain;
pub mod rle;

use dict::DictPageDecoder;
use plain::{PlainBinaryDecoder, PlainFixedDecoder};
use rle::RleBoolDecoder;

/// Decoder for the non-null values of one data page.
#[derive(Debug)]
pub enum PageDecoder {
    PlainFixed(PlainFixedDecoder),
    PlainBinary(PlainBinaryDecoder),
    Dict(DictPageDecoder),
    RleBool(RleBoolDecoder),
}

impl PageDecoder {
    /// Number of values in the page.
    pub fn count(&self) -> usize {
        match self {
            PageDecoder::PlainFixed(d) => d.count(),
            PageDecoder::PlainBinary(d) => d.count(),
            PageDecoder::Dict(d) => d.count(),
            PageDecoder::RleBool(d) => d.count(),
        }
    }

    /// Index of the next value to decode.
    pub fn current_index(&self) -> usize {
        match self {
            PageDecoder::PlainFixed(d) => d.position(),
            PageDecoder::PlainBinary(d) => d.position(),
            PageDecoder::Dict(d) => d.position(),
            PageDecoder::RleBool(d) => d.position(),
        }
    }

    pub fn seek_to_position_in_page(&mut self, pos: usize) -> SegmentResult<()> {
        if pos > self.count() {
            return Err(fmt_err!(
                Corruption,
                "seek to value {} in a page of {} values",
                pos,
                self.count()
            ));
        }
        match self {
            PageDecoder::PlainFixed(d) => d.seek(pos),
            PageDecoder::PlainBinary(d) => d.seek(pos),
            PageDecoder::Dict(d) => d.seek(pos),
            PageDecoder::RleBool(d) => d.seek(pos),
        }
        Ok(())
    }

    /// Pushes up to `count` values, returns how many were available.
    pub fn next_batch(&mut self, count: usize, sink: &mut dyn ColumnSink) -> SegmentResult<usize> {
        match self {
            PageDecoder::PlainFixed(d) => d.push_slice(sink, count),
            PageDecoder::PlainBinary(d) => d.push_slice(sink, count),
            PageDecoder::Dict(d) => d.push_slice(sink, count),
            PageDecoder::RleBool(d) => {
                let values = d.next_slice(count);
                sink.push_fixed_slice(values, values.len())?;
                Ok(values.len())
            }
        }
    }
}
