use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::io::ByteCursor;
use crate::segment_read::column_sink::ColumnSink;
use bytes::Bytes;
use std::ops::Range;

/// Packed fixed-width values.
#[derive(Debug)]
pub struct PlainFixedDecoder {
    values: Bytes,
    width: usize,
    count: usize,
    pos: usize,
}

impl PlainFixedDecoder {
    pub fn try_new(values: Bytes, width: usize) -> SegmentResult<Self> {
        if values.len() % width != 0 {
            return Err(fmt_err!(
                Corruption,
                "plain page of {} bytes is not a multiple of value width {}",
                values.len(),
                width
            ));
        }
        let count = values.len() / width;
        Ok(Self { values, width, count, pos: 0 })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn push_slice(&mut self, sink: &mut dyn ColumnSink, count: usize) -> SegmentResult<usize> {
        let count = count.min(self.count - self.pos);
        let start = self.pos * self.width;
        sink.push_fixed_slice(&self.values[start..start + count * self.width], count)?;
        self.pos += count;
        Ok(count)
    }
}

/// `len:u32` prefixed byte strings.
#[derive(Debug)]
pub struct PlainBinaryDecoder {
    values: Bytes,
    spans: Vec<Range<usize>>,
    pos: usize,
}

impl PlainBinaryDecoder {
    pub fn try_new(values: Bytes) -> SegmentResult<Self> {
        let spans = {
            let mut cursor = ByteCursor::new(&values);
            let mut spans = Vec::new();
            while !cursor.is_empty() {
                let len = cursor.read_u32()? as usize;
                let start = cursor.position();
                cursor.read_bytes(len)?;
                spans.push(start..start + len);
            }
            spans
        };
        Ok(Self { values, spans, pos: 0 })
    }

    pub fn count(&self) -> usize {
        self.spans.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Value at `idx`, shared with the page buffer.
    pub fn get(&self, idx: usize) -> Bytes {
        self.values.slice(self.spans[idx].clone())
    }

    pub fn into_values(self) -> Vec<Bytes> {
        (0..self.count()).map(|idx| self.get(idx)).collect()
    }

    pub fn push_slice(&mut self, sink: &mut dyn ColumnSink, count: usize) -> SegmentResult<usize> {
        let end = (self.pos + count).min(self.spans.len());
        for span in &self.spans[self.pos..end] {
            sink.push_binary(&self.values[span.clone()])?;
        }
        let pushed = end - self.pos;
        self.pos = end;
        Ok(pushed)
    }
}
