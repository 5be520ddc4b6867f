use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::ColumnSink;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;

/// A column of variable length byte strings.
#[derive(Debug, Clone)]
pub struct BinaryColumn {
    field_type: FieldType,
    data: Vec<u8>,
    /// Fenceposts into `data`, `len() + 1` entries.
    offsets: Vec<usize>,
    nulls: Option<Vec<bool>>,
}

impl BinaryColumn {
    pub fn new(field_type: FieldType, nullable: bool) -> Self {
        Self {
            field_type,
            data: Vec::new(),
            offsets: vec![0],
            nulls: nullable.then(Vec::new),
        }
    }

    pub fn get(&self, row: usize) -> &[u8] {
        &self.data[self.offsets[row]..self.offsets[row + 1]]
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.as_ref().is_some_and(|nulls| nulls[row])
    }

    pub fn value(&self, row: usize) -> SegmentResult<Datum> {
        if row >= self.len() {
            return Err(fmt_err!(Internal, "row {} out of {} rows", row, self.len()));
        }
        if self.is_null(row) {
            return Ok(Datum::Null);
        }
        Ok(Datum::Bytes(self.get(row).to_vec()))
    }

    /// Total payload size in bytes.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.offsets.truncate(1);
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.clear();
        }
    }

    fn push_value(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
        self.offsets.push(self.data.len());
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.push(false);
        }
    }
}

impl ColumnSink for BinaryColumn {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn is_nullable(&self) -> bool {
        self.nulls.is_some()
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn capacity(&self) -> usize {
        self.offsets.capacity().saturating_sub(1)
    }

    fn reserve(&mut self, additional: usize) {
        self.offsets.reserve(additional);
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.reserve(additional);
        }
    }

    fn push_fixed_slice(&mut self, _values: &[u8], count: usize) -> SegmentResult<()> {
        Err(fmt_err!(
            Internal,
            "{} fixed width values pushed into a {} column",
            count,
            self.field_type.name()
        ))
    }

    fn push_binary(&mut self, value: &[u8]) -> SegmentResult<()> {
        self.push_value(value);
        Ok(())
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
        let end = self.data.len();
        self.offsets.resize(self.offsets.len() + count, end);
        Ok(())
    }

    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()> {
        match value {
            Datum::Null => self.push_nulls(count),
            Datum::Bytes(bytes) => {
                self.data.reserve(bytes.len() * count);
                for _ in 0..count {
                    self.push_value(bytes);
                }
                Ok(())
            }
            other => Err(fmt_err!(
                Internal,
                "value {} does not fit a {} column",
                other,
                self.field_type.name()
            )),
        }
    }
}
