use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::ColumnSink;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;

/// A column of fixed width values, stored packed little-endian.
/// Null rows keep a zeroed slot so positions stay aligned.
#[derive(Debug, Clone)]
pub struct FixedColumn {
    field_type: FieldType,
    width: usize,
    data: Vec<u8>,
    /// Present only for nullable columns, one flag per row.
    nulls: Option<Vec<bool>>,
}

impl FixedColumn {
    pub fn new(field_type: FieldType, nullable: bool) -> SegmentResult<Self> {
        let width = field_type.fixed_size().ok_or_else(|| {
            fmt_err!(
                UnsupportedType,
                "{} values have no fixed width",
                field_type.name()
            )
        })?;
        Ok(Self {
            field_type,
            width,
            data: Vec::new(),
            nulls: nullable.then(Vec::new),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Raw bytes of `row`, zeroed for nulls.
    pub fn raw(&self, row: usize) -> &[u8] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.as_ref().is_some_and(|nulls| nulls[row])
    }

    pub fn null_count(&self) -> usize {
        self.nulls
            .as_ref()
            .map_or(0, |nulls| nulls.iter().filter(|&&n| n).count())
    }

    pub fn value(&self, row: usize) -> SegmentResult<Datum> {
        if row >= self.len() {
            return Err(fmt_err!(Internal, "row {} out of {} rows", row, self.len()));
        }
        if self.is_null(row) {
            return Ok(Datum::Null);
        }
        Ok(Datum::from_storage(self.field_type, self.raw(row))?)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.clear();
        }
    }

    fn mark_not_null(&mut self, count: usize) {
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.resize(nulls.len() + count, false);
        }
    }
}

impl ColumnSink for FixedColumn {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn is_nullable(&self) -> bool {
        self.nulls.is_some()
    }

    fn len(&self) -> usize {
        self.data.len() / self.width
    }

    fn capacity(&self) -> usize {
        self.data.capacity() / self.width
    }

    fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional * self.width);
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.reserve(additional);
        }
    }

    fn push_fixed_slice(&mut self, values: &[u8], count: usize) -> SegmentResult<()> {
        let size = count * self.width;
        if values.len() < size {
            return Err(fmt_err!(
                Corruption,
                "expected {} bytes for {} {} values, got {}",
                size,
                count,
                self.field_type.name(),
                values.len()
            ));
        }
        self.data.extend_from_slice(&values[..size]);
        self.mark_not_null(count);
        Ok(())
    }

    fn push_binary(&mut self, value: &[u8]) -> SegmentResult<()> {
        if value.len() != self.width {
            return Err(fmt_err!(
                Internal,
                "binary value of {} bytes pushed into {} column",
                value.len(),
                self.field_type.name()
            ));
        }
        self.push_fixed_slice(value, 1)
    }

    fn push_nulls(&mut self, count: usize) -> SegmentResult<()> {
        let Some(nulls) = self.nulls.as_mut() else {
            return Err(fmt_err!(
                Internal,
                "{} nulls pushed into a non-nullable {} column",
                count,
                self.field_type.name()
            ));
        };
        nulls.resize(nulls.len() + count, true);
        self.data.resize(self.data.len() + count * self.width, 0);
        Ok(())
    }

    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()> {
        if value.is_null() {
            return self.push_nulls(count);
        }
        let bytes = value.storage_bytes();
        if bytes.len() != self.width {
            return Err(fmt_err!(
                Internal,
                "value {} does not fit a {} column",
                value,
                self.field_type.name()
            ));
        }
        self.data.reserve(count * self.width);
        for _ in 0..count {
            self.data.extend_from_slice(&bytes);
        }
        self.mark_not_null(count);
        Ok(())
    }
}
