use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::{ArraySink, ColumnBatch, ColumnSink, FixedColumn};
use num_traits::ToPrimitive;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;
use std::ops::Range;

/// Array lengths as they arrive from the lengths column, turned into
/// fenceposts in place. Holds `len() + 1` entries, the first being 0.
#[derive(Debug, Clone)]
pub struct OffsetColumn {
    length_type: FieldType,
    width: usize,
    offsets: Vec<u64>,
}

#[inline]
fn decode_length<T: ToPrimitive, const N: usize>(chunk: &[u8], from_le: fn([u8; N]) -> T) -> Option<u64> {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&chunk[..N]);
    from_le(bytes).to_u64()
}

impl OffsetColumn {
    pub fn new(length_type: FieldType) -> SegmentResult<Self> {
        let width = match length_type {
            FieldType::Int | FieldType::UnsignedInt => 4,
            FieldType::BigInt => 8,
            _ => {
                return Err(fmt_err!(
                    Corruption,
                    "array lengths cannot be stored as {}",
                    length_type.name()
                ))
            }
        };
        Ok(Self { length_type, width, offsets: vec![0] })
    }

    pub fn get(&self, idx: usize) -> u64 {
        self.offsets[idx]
    }

    fn convert_lengths_to_offsets(&mut self, start_row: usize, rows: usize) -> SegmentResult<()> {
        let end = start_row + rows;
        if end >= self.offsets.len() {
            return Err(fmt_err!(
                Internal,
                "cannot convert lengths up to row {}, only {} rows present",
                end,
                self.offsets.len() - 1
            ));
        }
        for i in start_row + 1..=end {
            self.offsets[i] += self.offsets[i - 1];
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.offsets.truncate(1);
    }
}

impl ColumnSink for OffsetColumn {
    fn field_type(&self) -> FieldType {
        self.length_type
    }

    fn is_nullable(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn capacity(&self) -> usize {
        self.offsets.capacity().saturating_sub(1)
    }

    fn reserve(&mut self, additional: usize) {
        self.offsets.reserve(additional);
    }

    fn push_fixed_slice(&mut self, values: &[u8], count: usize) -> SegmentResult<()> {
        if values.len() < count * self.width {
            return Err(fmt_err!(
                Corruption,
                "expected {} bytes for {} array lengths, got {}",
                count * self.width,
                count,
                values.len()
            ));
        }
        for chunk in values.chunks_exact(self.width).take(count) {
            let length = match self.length_type {
                FieldType::Int => decode_length(chunk, i32::from_le_bytes),
                FieldType::UnsignedInt => decode_length(chunk, u32::from_le_bytes),
                _ => decode_length(chunk, i64::from_le_bytes),
            };
            let length = length
                .ok_or_else(|| fmt_err!(Corruption, "negative array length"))?;
            self.offsets.push(length);
        }
        Ok(())
    }

    fn push_binary(&mut self, value: &[u8]) -> SegmentResult<()> {
        Err(fmt_err!(
            Internal,
            "binary value of {} bytes pushed into array lengths",
            value.len()
        ))
    }

    fn push_nulls(&mut self, count: usize) -> SegmentResult<()> {
        Err(fmt_err!(Internal, "array lengths reported {} nulls", count))
    }

    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()> {
        if value.is_null() {
            return self.push_nulls(count);
        }
        let bytes = value.storage_bytes();
        for _ in 0..count {
            self.push_fixed_slice(&bytes, 1)?;
        }
        Ok(())
    }
}

/// Rows of arrays over a flat item column.
#[derive(Debug)]
pub struct ArrayColumn {
    offsets: OffsetColumn,
    null_flags: Option<FixedColumn>,
    items: Box<ColumnBatch>,
    bounds: Vec<Range<usize>>,
}

impl ArrayColumn {
    pub fn new(
        length_type: FieldType,
        null_flags: Option<FixedColumn>,
        items: ColumnBatch,
    ) -> SegmentResult<Self> {
        Ok(Self {
            offsets: OffsetColumn::new(length_type)?,
            null_flags,
            items: Box::new(items),
            bounds: Vec::new(),
        })
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.null_flags
            .as_ref()
            .is_some_and(|flags| flags.raw(row)[0] != 0)
    }

    pub fn items(&self) -> &ColumnBatch {
        &self.items
    }

    pub fn row(&self, row: usize) -> SegmentResult<ArrayView<'_>> {
        let range = self.bounds.get(row).cloned().ok_or_else(|| {
            fmt_err!(Internal, "row {} out of {} read rows", row, self.bounds.len())
        })?;
        Ok(ArrayView { items: &self.items, range })
    }

    pub fn row_lengths(&self) -> Vec<usize> {
        self.bounds.iter().map(|r| r.len()).collect()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
        if let Some(flags) = self.null_flags.as_mut() {
            flags.clear();
        }
        self.items.clear();
        self.bounds.clear();
    }
}

impl ColumnSink for ArrayColumn {
    fn field_type(&self) -> FieldType {
        FieldType::Array
    }

    fn is_nullable(&self) -> bool {
        self.null_flags.is_some()
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn capacity(&self) -> usize {
        self.offsets.capacity()
    }

    fn reserve(&mut self, additional: usize) {
        self.offsets.reserve(additional);
        if let Some(flags) = self.null_flags.as_mut() {
            flags.reserve(additional);
        }
    }

    fn push_fixed_slice(&mut self, _values: &[u8], count: usize) -> SegmentResult<()> {
        Err(fmt_err!(Internal, "{} scalar values pushed into an array column", count))
    }

    fn push_binary(&mut self, _value: &[u8]) -> SegmentResult<()> {
        Err(fmt_err!(Internal, "binary value pushed into an array column"))
    }

    /// Null rows are empty arrays with the null flag set.
    fn push_nulls(&mut self, count: usize) -> SegmentResult<()> {
        let Some(flags) = self.null_flags.as_mut() else {
            return Err(fmt_err!(
                Internal,
                "{} nulls pushed into a non-nullable array column",
                count
            ));
        };
        flags.push_repeated(&Datum::Boolean(true), count)?;
        let end = self.offsets.get(self.offsets.len());
        let offsets = &mut self.offsets.offsets;
        offsets.resize(offsets.len() + count, end);
        let end = end as usize;
        self.bounds.extend((0..count).map(|_| end..end));
        Ok(())
    }

    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()> {
        if value.is_null() {
            return self.push_nulls(count);
        }
        Err(fmt_err!(Internal, "array columns have no scalar default value"))
    }

    fn as_array_sink(&mut self) -> Option<&mut dyn ArraySink> {
        Some(self)
    }
}

impl ArraySink for ArrayColumn {
    fn offsets(&mut self) -> &mut dyn ColumnSink {
        &mut self.offsets
    }

    fn null_flags(&mut self) -> Option<&mut dyn ColumnSink> {
        self.null_flags.as_mut().map(|flags| flags as &mut dyn ColumnSink)
    }

    fn items(&mut self) -> &mut dyn ColumnSink {
        &mut *self.items
    }

    fn convert_lengths_to_offsets(&mut self, start_row: usize, rows: usize) -> SegmentResult<()> {
        self.offsets.convert_lengths_to_offsets(start_row, rows)
    }

    fn item_offset(&self, row: usize) -> usize {
        self.offsets.get(row) as usize
    }

    fn ensure_item_capacity(&mut self, total_items: usize) -> bool {
        let before = self.items.capacity();
        if total_items > before {
            let additional = total_items - self.items.len();
            self.items.reserve(additional);
        }
        self.items.capacity() != before
    }

    fn prepare_for_read(&mut self, start_row: usize, rows: usize, rebuild: bool) {
        let from = if rebuild { 0 } else { start_row.min(self.bounds.len()) };
        self.bounds.truncate(from);
        for row in from..start_row + rows {
            let start = self.offsets.get(row) as usize;
            let end = self.offsets.get(row + 1) as usize;
            self.bounds.push(start..end);
        }
    }
}

/// One array row: a window over the item column.
#[derive(Debug)]
pub struct ArrayView<'a> {
    items: &'a ColumnBatch,
    range: Range<usize>,
}

impl ArrayView<'_> {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn value(&self, idx: usize) -> SegmentResult<Datum> {
        if idx >= self.len() {
            return Err(fmt_err!(Internal, "item {} out of {}", idx, self.len()));
        }
        self.items.value(self.range.start + idx)
    }

    pub fn values(&self) -> SegmentResult<Vec<Datum>> {
        self.range.clone().map(|idx| self.items.value(idx)).collect()
    }
}
